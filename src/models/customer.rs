use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{FieldError, msg};

use super::is_valid_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Vip,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub name: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub status: CustomerStatus,
    pub notes: Option<String>,
    pub total_orders: i64,
    pub total_spent_cents: i64,
    pub last_order_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomer {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<CustomerStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateCustomer {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if !is_valid_email(&self.email) {
            errors.push(FieldError::new("email", msg::INVALID_EMAIL_FORMAT));
        }
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", msg::NAME_EMPTY));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCustomer {
    pub email: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
}

impl UpdateCustomer {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(ref email) = self.email
            && !is_valid_email(email)
        {
            errors.push(FieldError::new("email", msg::INVALID_EMAIL_FORMAT));
        }
        if let Some(ref name) = self.name
            && name.trim().is_empty()
        {
            errors.push(FieldError::new("name", msg::NAME_EMPTY));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}
