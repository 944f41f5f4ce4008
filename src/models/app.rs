use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::FieldError;

use super::{AppType, DeliveryMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AppStatus {
    Active,
    Maintenance,
    Suspended,
    Archived,
}

/// A delivered (or manually registered) application.
#[derive(Debug, Clone, Serialize)]
pub struct AppRecord {
    pub id: String,
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
    pub name: String,
    pub app_type: AppType,
    pub delivery_method: DeliveryMethod,
    pub delivery_url: Option<String>,
    pub admin_url: Option<String>,
    pub status: AppStatus,
    pub version: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateApp {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub name: String,
    pub app_type: AppType,
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub delivery_url: Option<String>,
    #[serde(default)]
    pub admin_url: Option<String>,
    #[serde(default)]
    pub status: Option<AppStatus>,
    #[serde(default)]
    pub version: Option<String>,
}

impl CreateApp {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        if self.name.trim().is_empty() {
            return Err(vec![FieldError::new("name", "App name is required")]);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateApp {
    pub name: Option<String>,
    pub delivery_url: Option<String>,
    pub admin_url: Option<String>,
    pub status: Option<AppStatus>,
    pub version: Option<String>,
}

impl UpdateApp {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        if let Some(ref name) = self.name
            && name.trim().is_empty()
        {
            return Err(vec![FieldError::new("name", "App name is required")]);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppListQuery {
    #[serde(default)]
    pub status: Option<AppStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}
