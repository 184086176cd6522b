use super::*;
use axum::extract::FromRequestParts;
use axum::http::Request;

fn parts(headers: &[(&str, &str)]) -> Parts {
    let mut builder = Request::builder().uri("/api/editor");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap().into_parts().0
}

#[tokio::test]
async fn user_id_header_is_required() {
    let mut p = parts(&[]);
    let err = AuthUser::from_request_parts(&mut p, &()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.body().code, "E_UNAUTHENTICATED");
}

#[tokio::test]
async fn blank_user_id_is_rejected() {
    let mut p = parts(&[(USER_ID_HEADER, "   ")]);
    assert!(AuthUser::from_request_parts(&mut p, &()).await.is_err());
}

#[tokio::test]
async fn profile_headers_are_collected() {
    let mut p = parts(&[
        (USER_ID_HEADER, "uid-1"),
        (USER_EMAIL_HEADER, "a@example.test"),
        (USER_NAME_HEADER, " Ada "),
        (USER_PHOTO_HEADER, "https://example.test/a.png"),
    ]);
    let user = AuthUser::from_request_parts(&mut p, &()).await.unwrap();
    assert_eq!(user.uid(), "uid-1");
    assert_eq!(user.profile.email, "a@example.test");
    assert_eq!(user.profile.display_name, "Ada");
    assert_eq!(user.profile.photo_url.as_deref(), Some("https://example.test/a.png"));
}

#[tokio::test]
async fn optional_headers_default_to_empty() {
    let mut p = parts(&[(USER_ID_HEADER, "uid-2")]);
    let user = AuthUser::from_request_parts(&mut p, &()).await.unwrap();
    assert_eq!(user.profile.email, "");
    assert!(user.profile.photo_url.is_none());
}
