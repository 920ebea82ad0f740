use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}

/// Compare a presented secret against the configured one in constant time.
///
/// This is the single authorization predicate for shared-secret guarded
/// endpoints (scheduler triggers, internal hooks).
pub fn verify_shared_secret(presented: &str, expected: &Secret<String>) -> bool {
    let expected_bytes = expected.expose_secret().as_bytes();
    let presented_bytes = presented.as_bytes();

    if expected_bytes.len() != presented_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(presented_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_secret_verifies() {
        let expected = Secret::new("cron-secret-123".to_string());
        assert!(verify_shared_secret("cron-secret-123", &expected));
    }

    #[test]
    fn wrong_secret_rejected() {
        let expected = Secret::new("cron-secret-123".to_string());
        assert!(!verify_shared_secret("cron-secret-124", &expected));
        assert!(!verify_shared_secret("", &expected));
        assert!(!verify_shared_secret("cron-secret-1234", &expected));
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
