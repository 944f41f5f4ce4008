mod admin_session;
mod analytics;
mod app;
mod customer;
mod order;
mod role;

pub use admin_session::*;
pub use analytics::*;
pub use app::*;
pub use customer::*;
pub use order::*;
pub use role::*;

pub use crate::pricing::{Complexity, Feature, Timeline};

/// Basic email format validation.
///
/// Requires exactly one @, a non-empty local part without spaces, and a
/// domain with at least one inner dot. Not RFC 5322, just a sanity check.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    !local.is_empty()
        && !local.contains(' ')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains(' ')
}

#[cfg(test)]
mod tests {
    use super::is_valid_email;

    #[test]
    fn test_rejects_invalid_email_format() {
        for email in [
            "",
            "notanemail",
            "user@",
            "@example.com",
            "user@nodot",
            "@@@@",
            "user@.com",
            "user@com.",
            "user name@example.com",
        ] {
            assert!(!is_valid_email(email), "'{}' should be rejected", email);
        }
    }

    #[test]
    fn test_accepts_valid_email_format() {
        for email in [
            "user@example.com",
            "user+tag@example.com",
            "user.name@example.com",
            "user@sub.example.com",
            "u@e.co",
            "USER@EXAMPLE.COM",
        ] {
            assert!(is_valid_email(email), "'{}' should be accepted", email);
        }
    }
}
