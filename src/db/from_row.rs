//! `FromRow` mapping for the stored records. Columns are read by name, so
//! the `*_COLS` lists only need to contain every field, in any order.

use rusqlite::{Connection, OptionalExtension, Row, ToSql, types::Type};
use serde::de::DeserializeOwned;

use crate::models::*;

/// Text column holding a strum enum value.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    raw.parse::<T>().map_err(|_| {
        let idx = row.as_ref().column_index(col).unwrap_or_default();
        rusqlite::Error::InvalidColumnType(idx, col.to_string(), Type::Text)
    })
}

/// Text column holding a JSON array or object.
fn parse_json<T: DeserializeOwned>(row: &Row, col: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|e| {
        let idx = row.as_ref().column_index(col).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn flag(row: &Row, col: &str) -> rusqlite::Result<bool> {
    Ok(row.get::<_, i64>(col)? != 0)
}

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ORDER_COLS: &str = "id, status, progress, current_stage, customer_id, customer_name, customer_email, company, phone, app_name, app_description, app_type, platforms, complexity, timeline, features, design_style, color_scheme, integrations, reference_urls, delivery_method, github_username, subdomain, additional_notes, price_cents, currency, checkout_session_id, payment_intent_id, delivery_url, admin_url, error_message, created_at, updated_at, paid_at, build_started_at, completed_at, failed_at, cancelled_at, refunded_at";

pub const CUSTOMER_COLS: &str = "id, email, name, company, phone, status, notes, total_orders, total_spent_cents, last_order_at, created_at, updated_at";

pub const APP_COLS: &str = "id, order_id, customer_id, name, app_type, delivery_method, delivery_url, admin_url, status, version, created_at, updated_at";

pub const ADMIN_SESSION_COLS: &str = "id, token_hash, token_prefix, admin_email, role, ip_address, user_agent, created_at, expires_at, last_activity, is_active";

pub const ROLE_COLS: &str = "id, name, description, permissions, built_in, created_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get("id")?,
            status: parse_enum(row, "status")?,
            progress: row.get("progress")?,
            current_stage: row.get("current_stage")?,
            customer_id: row.get("customer_id")?,
            customer_name: row.get("customer_name")?,
            customer_email: row.get("customer_email")?,
            company: row.get("company")?,
            phone: row.get("phone")?,
            app_name: row.get("app_name")?,
            app_description: row.get("app_description")?,
            app_type: parse_enum(row, "app_type")?,
            platforms: parse_json(row, "platforms")?,
            complexity: parse_enum(row, "complexity")?,
            timeline: parse_enum(row, "timeline")?,
            features: parse_json(row, "features")?,
            design_style: row.get("design_style")?,
            color_scheme: row.get("color_scheme")?,
            integrations: parse_json(row, "integrations")?,
            reference_urls: parse_json(row, "reference_urls")?,
            delivery_method: parse_enum(row, "delivery_method")?,
            github_username: row.get("github_username")?,
            subdomain: row.get("subdomain")?,
            additional_notes: row.get("additional_notes")?,
            price_cents: row.get("price_cents")?,
            currency: row.get("currency")?,
            checkout_session_id: row.get("checkout_session_id")?,
            payment_intent_id: row.get("payment_intent_id")?,
            delivery_url: row.get("delivery_url")?,
            admin_url: row.get("admin_url")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            paid_at: row.get("paid_at")?,
            build_started_at: row.get("build_started_at")?,
            completed_at: row.get("completed_at")?,
            failed_at: row.get("failed_at")?,
            cancelled_at: row.get("cancelled_at")?,
            refunded_at: row.get("refunded_at")?,
        })
    }
}

impl FromRow for Customer {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Customer {
            id: row.get("id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            company: row.get("company")?,
            phone: row.get("phone")?,
            status: parse_enum(row, "status")?,
            notes: row.get("notes")?,
            total_orders: row.get("total_orders")?,
            total_spent_cents: row.get("total_spent_cents")?,
            last_order_at: row.get("last_order_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl FromRow for AppRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AppRecord {
            id: row.get("id")?,
            order_id: row.get("order_id")?,
            customer_id: row.get("customer_id")?,
            name: row.get("name")?,
            app_type: parse_enum(row, "app_type")?,
            delivery_method: parse_enum(row, "delivery_method")?,
            delivery_url: row.get("delivery_url")?,
            admin_url: row.get("admin_url")?,
            status: parse_enum(row, "status")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl FromRow for AdminSession {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AdminSession {
            id: row.get("id")?,
            token_hash: row.get("token_hash")?,
            token_prefix: row.get("token_prefix")?,
            admin_email: row.get("admin_email")?,
            role: row.get("role")?,
            ip_address: row.get("ip_address")?,
            user_agent: row.get("user_agent")?,
            created_at: row.get("created_at")?,
            expires_at: row.get("expires_at")?,
            last_activity: row.get("last_activity")?,
            is_active: flag(row, "is_active")?,
        })
    }
}

impl FromRow for Role {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Role {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            permissions: parse_json(row, "permissions")?,
            built_in: flag(row, "built_in")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
