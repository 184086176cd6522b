//! Structured error codes shared by services and HTTP handlers.
//!
//! DESIGN
//! ======
//! Every service error carries a grep-able `E_*` code and a retryable flag.
//! Handlers render them as `{ code, message, retryable }` JSON bodies so the
//! editor UI can show the message and decide whether to offer a retry.

use serde::Serialize;

/// Grepable error code and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// JSON error payload returned by every `/api` route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ErrorBody {
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Flaky;

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "upstream hiccup")
        }
    }

    impl ErrorCode for Flaky {
        fn error_code(&self) -> &'static str {
            "E_FLAKY"
        }

        fn retryable(&self) -> bool {
            true
        }
    }

    #[derive(Debug)]
    struct Plain;

    impl std::fmt::Display for Plain {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "bad input")
        }
    }

    impl ErrorCode for Plain {
        fn error_code(&self) -> &'static str {
            "E_PLAIN"
        }
    }

    #[test]
    fn body_carries_code_message_and_retryable() {
        let body = ErrorBody::from_error(&Flaky);
        assert_eq!(body.code, "E_FLAKY");
        assert_eq!(body.message, "upstream hiccup");
        assert!(body.retryable);
    }

    #[test]
    fn retryable_defaults_to_false() {
        let body = ErrorBody::from_error(&Plain);
        assert!(!body.retryable);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "E_PLAIN");
        assert_eq!(json["message"], "bad input");
    }
}
