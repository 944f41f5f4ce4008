use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

use crate::error::FieldError;

/// Fixed permission catalog for the admin dashboard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
pub enum Permission {
    #[serde(rename = "orders:read")]
    #[strum(serialize = "orders:read")]
    OrdersRead,
    #[serde(rename = "orders:write")]
    #[strum(serialize = "orders:write")]
    OrdersWrite,
    #[serde(rename = "customers:read")]
    #[strum(serialize = "customers:read")]
    CustomersRead,
    #[serde(rename = "customers:write")]
    #[strum(serialize = "customers:write")]
    CustomersWrite,
    #[serde(rename = "apps:read")]
    #[strum(serialize = "apps:read")]
    AppsRead,
    #[serde(rename = "apps:write")]
    #[strum(serialize = "apps:write")]
    AppsWrite,
    #[serde(rename = "analytics:read")]
    #[strum(serialize = "analytics:read")]
    AnalyticsRead,
    #[serde(rename = "security:manage")]
    #[strum(serialize = "security:manage")]
    SecurityManage,
}

impl Permission {
    pub fn all() -> Vec<Permission> {
        Permission::iter().collect()
    }

    pub fn is_read(&self) -> bool {
        self.as_ref().ends_with(":read")
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::OrdersRead => "View orders and build progress",
            Self::OrdersWrite => "Cancel, refund and retry orders",
            Self::CustomersRead => "View customer profiles",
            Self::CustomersWrite => "Create, edit and delete customers",
            Self::AppsRead => "View delivered apps",
            Self::AppsWrite => "Create, edit and delete apps",
            Self::AnalyticsRead => "View financial analytics",
            Self::SecurityManage => "Manage roles and admin sessions",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionInfo {
    pub name: Permission,
    pub description: &'static str,
}

/// Seeded roles as (name, description). Permissions come from `built_in_permissions`.
pub const BUILT_IN_ROLES: [(&str, &str); 3] = [
    ("super_admin", "Full access including security management"),
    ("admin", "Full access except security management"),
    ("viewer", "Read-only access"),
];

pub fn built_in_permissions(role: &str) -> Vec<Permission> {
    match role {
        "super_admin" => Permission::all(),
        "admin" => Permission::iter()
            .filter(|p| *p != Permission::SecurityManage)
            .collect(),
        "viewer" => Permission::iter().filter(Permission::is_read).collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
    pub built_in: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Permissions arrive as strings so unknown names become field errors.
#[derive(Debug, Deserialize)]
pub struct CreateRole {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRole {
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

pub fn parse_permissions(raw: &[String]) -> Result<Vec<Permission>, Vec<FieldError>> {
    let mut permissions = Vec::new();
    let mut errors = Vec::new();
    for (i, name) in raw.iter().enumerate() {
        match name.parse::<Permission>() {
            Ok(p) if !permissions.contains(&p) => permissions.push(p),
            Ok(_) => {}
            Err(_) => errors.push(FieldError::new(
                format!("permissions[{}]", i),
                format!("{}: {}", crate::error::msg::UNKNOWN_PERMISSION, name),
            )),
        }
    }
    if errors.is_empty() { Ok(permissions) } else { Err(errors) }
}

/// Role names are lowercase identifiers.
pub fn is_valid_role_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 50
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names() {
        assert_eq!(Permission::OrdersRead.as_ref(), "orders:read");
        assert_eq!(
            "security:manage".parse::<Permission>().unwrap(),
            Permission::SecurityManage
        );
    }

    #[test]
    fn test_built_in_role_permissions() {
        assert_eq!(built_in_permissions("super_admin").len(), 8);
        assert!(!built_in_permissions("admin").contains(&Permission::SecurityManage));
        assert!(built_in_permissions("viewer").iter().all(Permission::is_read));
        assert!(built_in_permissions("nobody").is_empty());
    }

    #[test]
    fn test_parse_permissions_reports_unknown() {
        let errors = parse_permissions(&["orders:read".into(), "root:all".into()]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "permissions[1]");
    }
}
