//! Prefixed ID generation for AppForge entities.
//!
//! All IDs use an `af_` brand prefix so they never collide with payment
//! provider IDs (Stripe's `cs_`, `pi_`, `cus_`, etc.).
//!
//! Format: `af_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &[
    "af_ord_", "af_cus_", "af_app_", "af_ses_", "af_role_",
];

/// Validate that a string is a valid AppForge prefixed ID.
///
/// Cheap check to reject garbage before hitting the database.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Order,
    Customer,
    App,
    AdminSession,
    Role,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Order => "af_ord",
            Self::Customer => "af_cus",
            Self::App => "af_app",
            Self::AdminSession => "af_ses",
            Self::Role => "af_role",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = EntityType::Order.gen_id();
        assert!(id.starts_with("af_ord_"));
        // af_ord_ (7 chars) + 32 hex chars
        assert_eq!(id.len(), 39);
    }

    #[test]
    fn test_all_prefixes_unique() {
        let prefixes = [
            EntityType::Order.prefix(),
            EntityType::Customer.prefix(),
            EntityType::App.prefix(),
            EntityType::AdminSession.prefix(),
            EntityType::Role.prefix(),
        ];

        let mut seen = std::collections::HashSet::new();
        for prefix in prefixes {
            assert!(seen.insert(prefix), "Duplicate prefix found: {}", prefix);
        }
    }

    #[test]
    fn test_is_valid_prefixed_id() {
        assert!(is_valid_prefixed_id("af_ord_a1b2c3d4e5f6789012345678901234ab"));
        assert!(is_valid_prefixed_id("af_role_00000000000000000000000000000000"));
        assert!(is_valid_prefixed_id(&EntityType::Customer.gen_id()));
        assert!(is_valid_prefixed_id(&EntityType::AdminSession.gen_id()));

        assert!(!is_valid_prefixed_id(""));
        assert!(!is_valid_prefixed_id("a1b2c3d4-e5f6-7890-1234-567890123456"));
        assert!(!is_valid_prefixed_id("af_unknown_a1b2c3d4e5f6789012345678901234ab"));
        assert!(!is_valid_prefixed_id("af_ord_a1b2c3d4"));
        assert!(!is_valid_prefixed_id("af_ord_a1b2c3d4e5f6789012345678901234gg"));
        assert!(!is_valid_prefixed_id("cs_test_a1b2c3d4e5f6789012345678901234ab"));
    }
}
