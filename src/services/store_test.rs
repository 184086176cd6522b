use super::*;
use crate::error::ErrorCode;

// =========================================================================
// MemoryStore
// =========================================================================

#[tokio::test]
async fn memory_set_get_remove() {
    let store = MemoryStore::default();
    assert_eq!(store.get("u1", CURRENT_IMAGE_KEY).await.unwrap(), None);

    store.set("u1", CURRENT_IMAGE_KEY, "data:image/png;base64,AAAA").await.unwrap();
    assert_eq!(store.get("u1", CURRENT_IMAGE_KEY).await.unwrap().as_deref(), Some("data:image/png;base64,AAAA"));

    store.remove("u1", CURRENT_IMAGE_KEY).await.unwrap();
    assert_eq!(store.get("u1", CURRENT_IMAGE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn memory_users_are_isolated() {
    let store = MemoryStore::default();
    store.set("alice", CUSTOM_API_KEY_KEY, "a-key").await.unwrap();
    assert_eq!(store.get("bob", CUSTOM_API_KEY_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn memory_rejects_oversized_values() {
    let store = MemoryStore::new(4);
    let err = store.set("u1", CURRENT_IMAGE_KEY, "too long").await.unwrap_err();
    assert!(matches!(err, StoreError::QuotaExceeded { size: 8, limit: 4, .. }));
    assert_eq!(err.error_code(), "E_STORAGE_QUOTA");
    assert!(err.to_string().contains("too large"));
    assert_eq!(store.get("u1", CURRENT_IMAGE_KEY).await.unwrap(), None);
}

// =========================================================================
// FileStore
// =========================================================================

#[tokio::test]
async fn file_store_round_trips_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileStore::open(dir.path(), DEFAULT_MAX_VALUE_BYTES).await.unwrap();
        store.set("u1", CURRENT_IMAGE_KEY, "img").await.unwrap();
        store.set("u1", CUSTOM_API_KEY_KEY, "key").await.unwrap();
    }

    let reopened = FileStore::open(dir.path(), DEFAULT_MAX_VALUE_BYTES).await.unwrap();
    assert_eq!(reopened.get("u1", CURRENT_IMAGE_KEY).await.unwrap().as_deref(), Some("img"));
    assert_eq!(reopened.get("u1", CUSTOM_API_KEY_KEY).await.unwrap().as_deref(), Some("key"));
}

#[tokio::test]
async fn file_store_names_documents_by_hash() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path(), DEFAULT_MAX_VALUE_BYTES).await.unwrap();
    store.set("../../etc/passwd", CURRENT_IMAGE_KEY, "x").await.unwrap();

    let names: Vec<String> = std::fs::read_dir(store.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".json"));
    assert_eq!(names[0].len(), 64 + ".json".len());
}

#[tokio::test]
async fn file_store_remove_keeps_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path(), DEFAULT_MAX_VALUE_BYTES).await.unwrap();
    store.set("u1", CURRENT_IMAGE_KEY, "img").await.unwrap();
    store.set("u1", CUSTOM_API_KEY_KEY, "key").await.unwrap();

    store.remove("u1", CUSTOM_API_KEY_KEY).await.unwrap();
    assert_eq!(store.get("u1", CUSTOM_API_KEY_KEY).await.unwrap(), None);
    assert_eq!(store.get("u1", CURRENT_IMAGE_KEY).await.unwrap().as_deref(), Some("img"));

    // Removing a missing key is fine.
    store.remove("nobody", CUSTOM_API_KEY_KEY).await.unwrap();
}

#[tokio::test]
async fn file_store_reports_corrupt_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path(), DEFAULT_MAX_VALUE_BYTES).await.unwrap();
    store.set("u1", CURRENT_IMAGE_KEY, "img").await.unwrap();
    std::fs::write(store.document_path("u1"), b"{not json").unwrap();

    let err = store.get("u1", CURRENT_IMAGE_KEY).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[tokio::test]
async fn file_store_enforces_value_limit() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path(), 2).await.unwrap();
    assert!(matches!(
        store.set("u1", CURRENT_IMAGE_KEY, "abc").await,
        Err(StoreError::QuotaExceeded { .. })
    ));
}

#[test]
fn default_limit_fits_a_maximum_size_image() {
    let encoded = crate::image::MAX_IMAGE_BYTES.div_ceil(3) * 4;
    let uri_len = "data:image/webp;base64,".len() + encoded;
    assert!(uri_len <= DEFAULT_MAX_VALUE_BYTES);
    assert!(DEFAULT_MAX_VALUE_BYTES > 64 * 1024 * 1024);
}
