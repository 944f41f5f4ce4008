use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{Connection, ErrorCode, params, types::Value};

use crate::crypto::{generate_session_token, hash_secret, token_display_prefix};
use crate::error::{AppError, Result, msg};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    ADMIN_SESSION_COLS, APP_COLS, CUSTOMER_COLS, FromRow, ORDER_COLS, ROLE_COLS, query_all,
    query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

/// Escape `LIKE` wildcards so user input matches literally under `ESCAPE '\'`.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Map a UNIQUE constraint failure to a 409 with the given message.
fn unique_violation(e: rusqlite::Error, message: &str) -> AppError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::ConstraintViolation => {
            AppError::Conflict(message.to_string())
        }
        other => other.into(),
    }
}

/// Builder for dynamic UPDATE statements with optional fields.
///
/// `when_status_in` adds a status guard, which turns the update into an
/// atomic compare-and-set: the affected-row count says whether this caller
/// won the transition.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
    status_guard: Vec<String>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
            status_guard: Vec::new(),
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a column to an explicit value (including NULL).
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    fn when_status_in(mut self, statuses: &[OrderStatus]) -> Self {
        self.status_guard = statuses.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    fn build_sql(&mut self) -> (String, Vec<Value>) {
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = std::mem::take(&mut self.fields)
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        values.push(self.id.clone().into());

        let mut sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        if !self.status_guard.is_empty() {
            let placeholders = vec!["?"; self.status_guard.len()].join(", ");
            sql.push_str(&format!(" AND status IN ({})", placeholders));
            values.extend(self.status_guard.drain(..).map(Value::from));
        }
        (sql, values)
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        let (sql, values) = self.build_sql();
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }

    /// Execute the update and return the updated row.
    /// Returns None if no rows matched.
    fn execute_returning<T: FromRow>(
        mut self,
        conn: &Connection,
        returning_cols: &str,
    ) -> std::result::Result<Option<T>, rusqlite::Error> {
        use rusqlite::OptionalExtension;

        if self.fields.is_empty() {
            return Ok(None);
        }
        let (sql, values) = self.build_sql();
        let sql = format!("{} RETURNING {}", sql, returning_cols);
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
    }
}

// ============ Orders ============

pub fn create_order(
    conn: &Connection,
    input: &NewOrder,
    customer_id: Option<&str>,
    price_cents: i64,
    currency: &str,
) -> Result<Order> {
    let id = EntityType::Order.gen_id();
    let now = now();
    let features: Vec<&str> = input.features.iter().map(|f| f.as_ref()).collect();

    conn.execute(
        "INSERT INTO orders (
            id, status, progress, customer_id, customer_name, customer_email, company, phone,
            app_name, app_description, app_type, platforms, complexity, timeline, features,
            design_style, color_scheme, integrations, reference_urls, delivery_method,
            github_username, subdomain, additional_notes, price_cents, currency,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, 0, ?3, ?4, ?5, ?6, ?7,
            ?8, ?9, ?10, ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18, ?19,
            ?20, ?21, ?22, ?23, ?24,
            ?25, ?25
        )",
        params![
            &id,
            OrderStatus::PendingPayment.as_ref(),
            customer_id,
            &input.customer_name,
            &input.customer_email,
            &input.company,
            &input.phone,
            &input.app_name,
            &input.app_description,
            input.app_type.as_ref(),
            to_json(&input.platforms)?,
            input.complexity.as_ref(),
            input.timeline.as_ref(),
            to_json(&features)?,
            &input.design_style,
            &input.color_scheme,
            to_json(&input.integrations)?,
            to_json(&input.reference_urls)?,
            input.delivery_method.as_ref(),
            &input.github_username,
            &input.subdomain,
            &input.additional_notes,
            price_cents,
            currency,
            now,
        ],
    )?;

    get_order_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("Order vanished after insert".into()))
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

pub fn get_order_by_checkout_session(conn: &Connection, session_id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE checkout_session_id = ?1", ORDER_COLS),
        &[&session_id],
    )
}

pub fn get_order_by_payment_intent(conn: &Connection, payment_intent: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE payment_intent_id = ?1", ORDER_COLS),
        &[&payment_intent],
    )
}

pub fn set_order_checkout_session(conn: &Connection, id: &str, session_id: &str) -> Result<bool> {
    UpdateBuilder::new("orders", id)
        .set("checkout_session_id", session_id.to_string())
        .with_updated_at()
        .execute(conn)
}

pub fn list_orders(
    conn: &Connection,
    status: Option<OrderStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Order>, i64)> {
    match status {
        Some(status) => {
            let status = status.as_ref();
            let orders = query_all(
                conn,
                &format!(
                    "SELECT {} FROM orders WHERE status = ?1 ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
                    ORDER_COLS
                ),
                &[&status, &limit, &offset],
            )?;
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM orders WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )?;
            Ok((orders, total))
        }
        None => {
            let orders = query_all(
                conn,
                &format!(
                    "SELECT {} FROM orders ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2",
                    ORDER_COLS
                ),
                &[&limit, &offset],
            )?;
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
            Ok((orders, total))
        }
    }
}

/// Claim `pending_payment → paid`. Returns false if another caller already
/// moved the order (or it is in a state that cannot be paid).
pub fn try_mark_order_paid(conn: &Connection, id: &str, payment_intent: Option<&str>) -> Result<bool> {
    UpdateBuilder::new("orders", id)
        .set("status", OrderStatus::Paid.as_ref().to_string())
        .set("paid_at", now())
        .set_opt("payment_intent_id", payment_intent.map(String::from))
        .with_updated_at()
        .when_status_in(&OrderStatus::sources_for(OrderStatus::Paid))
        .execute(conn)
}

/// Claim `paid | build_failed → building`, resetting progress.
pub fn try_start_build(conn: &Connection, id: &str) -> Result<bool> {
    UpdateBuilder::new("orders", id)
        .set("status", OrderStatus::Building.as_ref().to_string())
        .set("progress", 0i64)
        .set("build_started_at", now())
        .set_nullable::<String>("current_stage", None)
        .set_nullable::<String>("error_message", None)
        .set_nullable::<i64>("failed_at", None)
        .with_updated_at()
        .when_status_in(&OrderStatus::sources_for(OrderStatus::Building))
        .execute(conn)
}

/// Record stage progress. Only applies while the order is still building.
pub fn advance_build(conn: &Connection, id: &str, progress: i64, stage: &str) -> Result<bool> {
    UpdateBuilder::new("orders", id)
        .set("progress", progress.clamp(0, 100))
        .set("current_stage", stage.to_string())
        .with_updated_at()
        .when_status_in(&[OrderStatus::Building])
        .execute(conn)
}

pub fn try_complete_build(
    conn: &Connection,
    id: &str,
    delivery_url: &str,
    admin_url: Option<&str>,
) -> Result<bool> {
    UpdateBuilder::new("orders", id)
        .set("status", OrderStatus::Completed.as_ref().to_string())
        .set("progress", 100)
        .set("completed_at", now())
        .set("delivery_url", delivery_url.to_string())
        .set_nullable("admin_url", admin_url.map(String::from))
        .with_updated_at()
        .when_status_in(&OrderStatus::sources_for(OrderStatus::Completed))
        .execute(conn)
}

/// Move into `payment_failed` or `build_failed` with an error message.
pub fn try_fail_order(conn: &Connection, id: &str, to: OrderStatus, error: &str) -> Result<bool> {
    debug_assert!(matches!(to, OrderStatus::PaymentFailed | OrderStatus::BuildFailed));
    UpdateBuilder::new("orders", id)
        .set("status", to.as_ref().to_string())
        .set("error_message", error.to_string())
        .set("failed_at", now())
        .with_updated_at()
        .when_status_in(&OrderStatus::sources_for(to))
        .execute(conn)
}

pub fn try_cancel_order(conn: &Connection, id: &str) -> Result<bool> {
    UpdateBuilder::new("orders", id)
        .set("status", OrderStatus::Cancelled.as_ref().to_string())
        .set("cancelled_at", now())
        .with_updated_at()
        .when_status_in(&OrderStatus::sources_for(OrderStatus::Cancelled))
        .execute(conn)
}

pub fn try_refund_order(conn: &Connection, id: &str) -> Result<bool> {
    UpdateBuilder::new("orders", id)
        .set("status", OrderStatus::Refunded.as_ref().to_string())
        .set("refunded_at", now())
        .with_updated_at()
        .when_status_in(&OrderStatus::sources_for(OrderStatus::Refunded))
        .execute(conn)
}

/// Unpaid orders created before `created_before` become `payment_failed`.
pub fn order_ids_with_status(conn: &Connection, status: OrderStatus) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM orders WHERE status = ?1 ORDER BY created_at, id")?;
    let ids = stmt
        .query_map(params![status.as_ref()], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn expire_stale_orders(conn: &Connection, created_before: i64) -> Result<usize> {
    let now = now();
    let affected = conn.execute(
        "UPDATE orders SET status = ?1, error_message = 'Checkout expired', failed_at = ?2, updated_at = ?2
         WHERE status = ?3 AND created_at < ?4",
        params![
            OrderStatus::PaymentFailed.as_ref(),
            now,
            OrderStatus::PendingPayment.as_ref(),
            created_before
        ],
    )?;
    Ok(affected)
}

// ============ Build logs ============

pub fn append_build_log(conn: &Connection, order_id: &str, message: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO build_logs (order_id, message, created_at) VALUES (?1, ?2, ?3)",
        params![order_id, message, now()],
    )?;
    Ok(())
}

/// Log lines for an order, oldest first.
pub fn get_build_logs(conn: &Connection, order_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT message FROM build_logs WHERE order_id = ?1 ORDER BY id")?;
    let logs = stmt
        .query_map(params![order_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(logs)
}

pub fn get_order_with_logs(conn: &Connection, id: &str) -> Result<Option<OrderWithLogs>> {
    let Some(order) = get_order_by_id(conn, id)? else {
        return Ok(None);
    };
    let build_logs = get_build_logs(conn, id)?;
    Ok(Some(OrderWithLogs { order, build_logs }))
}

// ============ Customers ============

/// Create or refresh the customer profile behind a new order.
pub fn upsert_customer_for_order(conn: &Connection, input: &NewOrder) -> Result<Customer> {
    let now = now();
    let customer = conn.query_row(
        &format!(
            "INSERT INTO customers (id, email, name, company, phone, status, total_orders, total_spent_cents, last_order_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'active', 1, 0, ?6, ?6, ?6)
             ON CONFLICT(email) DO UPDATE SET
                total_orders = total_orders + 1,
                last_order_at = excluded.last_order_at,
                company = COALESCE(customers.company, excluded.company),
                phone = COALESCE(customers.phone, excluded.phone),
                updated_at = excluded.updated_at
             RETURNING {}",
            CUSTOMER_COLS
        ),
        params![
            EntityType::Customer.gen_id(),
            &input.customer_email,
            &input.customer_name,
            &input.company,
            &input.phone,
            now
        ],
        Customer::from_row,
    )?;
    Ok(customer)
}

pub fn add_customer_spend(conn: &Connection, customer_id: &str, cents: i64) -> Result<()> {
    conn.execute(
        "UPDATE customers SET total_spent_cents = total_spent_cents + ?1, updated_at = ?2 WHERE id = ?3",
        params![cents, now(), customer_id],
    )?;
    Ok(())
}

pub fn create_customer(conn: &Connection, input: &CreateCustomer) -> Result<Customer> {
    let id = EntityType::Customer.gen_id();
    let now = now();
    let status = input.status.unwrap_or(CustomerStatus::Active);
    conn.execute(
        "INSERT INTO customers (id, email, name, company, phone, status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            &id,
            input.email.trim().to_lowercase(),
            input.name.trim(),
            &input.company,
            &input.phone,
            status.as_ref(),
            &input.notes,
            now
        ],
    )
    .map_err(|e| unique_violation(e, msg::CUSTOMER_EMAIL_EXISTS))?;

    get_customer_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("Customer vanished after insert".into()))
}

pub fn get_customer_by_id(conn: &Connection, id: &str) -> Result<Option<Customer>> {
    query_one(
        conn,
        &format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLS),
        &[&id],
    )
}

pub fn get_customer_by_email(conn: &Connection, email: &str) -> Result<Option<Customer>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM customers WHERE email = ?1", CUSTOMER_COLS),
        &[&email],
    )
}

pub fn list_customers(
    conn: &Connection,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Customer>, i64)> {
    let pattern = format!("%{}%", escape_like(&search.unwrap_or("").trim().to_lowercase()));
    let customers = query_all(
        conn,
        &format!(
            "SELECT {} FROM customers
             WHERE lower(name) LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\'
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
            CUSTOMER_COLS
        ),
        &[&pattern, &limit, &offset],
    )?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM customers WHERE lower(name) LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\'",
        params![pattern],
        |row| row.get(0),
    )?;
    Ok((customers, total))
}

pub fn update_customer(conn: &Connection, id: &str, input: &UpdateCustomer) -> Result<Option<Customer>> {
    UpdateBuilder::new("customers", id)
        .set_opt("email", input.email.as_ref().map(|e| e.trim().to_lowercase()))
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_opt("company", input.company.clone())
        .set_opt("phone", input.phone.clone())
        .set_opt("status", input.status.map(|s| s.as_ref().to_string()))
        .set_opt("notes", input.notes.clone())
        .with_updated_at()
        .execute_returning(conn, CUSTOMER_COLS)
        .map_err(|e| unique_violation(e, msg::CUSTOMER_EMAIL_EXISTS))
}

/// Delete a customer. Orders and apps keep their data but lose the link.
pub fn delete_customer(conn: &Connection, id: &str) -> Result<bool> {
    conn.execute("UPDATE orders SET customer_id = NULL WHERE customer_id = ?1", params![id])?;
    conn.execute("UPDATE apps SET customer_id = NULL WHERE customer_id = ?1", params![id])?;
    let affected = conn.execute("DELETE FROM customers WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

// ============ Apps ============

pub fn create_app(conn: &Connection, input: &CreateApp) -> Result<AppRecord> {
    let id = EntityType::App.gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO apps (id, order_id, customer_id, name, app_type, delivery_method, delivery_url, admin_url, status, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            &id,
            &input.order_id,
            &input.customer_id,
            input.name.trim(),
            input.app_type.as_ref(),
            input.delivery_method.as_ref(),
            &input.delivery_url,
            &input.admin_url,
            input.status.unwrap_or(AppStatus::Active).as_ref(),
            input.version.as_deref().unwrap_or("1.0.0"),
            now
        ],
    )
    .map_err(|e| unique_violation(e, "An app already exists for this order"))?;

    get_app_by_id(conn, &id)?.ok_or_else(|| AppError::Internal("App vanished after insert".into()))
}

/// Register the app delivered by a completed order. Idempotent per order.
pub fn create_app_for_order(conn: &Connection, order: &Order) -> Result<AppRecord> {
    let now = now();
    conn.execute(
        "INSERT OR IGNORE INTO apps (id, order_id, customer_id, name, app_type, delivery_method, delivery_url, admin_url, status, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', '1.0.0', ?9, ?9)",
        params![
            EntityType::App.gen_id(),
            &order.id,
            &order.customer_id,
            &order.app_name,
            order.app_type.as_ref(),
            order.delivery_method.as_ref(),
            &order.delivery_url,
            &order.admin_url,
            now
        ],
    )?;

    query_one(
        conn,
        &format!("SELECT {} FROM apps WHERE order_id = ?1", APP_COLS),
        &[&order.id],
    )?
    .ok_or_else(|| AppError::Internal("App vanished after insert".into()))
}

pub fn get_app_by_id(conn: &Connection, id: &str) -> Result<Option<AppRecord>> {
    query_one(
        conn,
        &format!("SELECT {} FROM apps WHERE id = ?1", APP_COLS),
        &[&id],
    )
}

pub fn get_app_by_order(conn: &Connection, order_id: &str) -> Result<Option<AppRecord>> {
    query_one(
        conn,
        &format!("SELECT {} FROM apps WHERE order_id = ?1", APP_COLS),
        &[&order_id],
    )
}

pub fn list_apps(
    conn: &Connection,
    status: Option<AppStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<AppRecord>, i64)> {
    let status = status.map(|s| s.as_ref().to_string());
    let apps = query_all(
        conn,
        &format!(
            "SELECT {} FROM apps WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
            APP_COLS
        ),
        &[&status, &limit, &offset],
    )?;
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM apps WHERE (?1 IS NULL OR status = ?1)",
        params![status],
        |row| row.get(0),
    )?;
    Ok((apps, total))
}

pub fn update_app(conn: &Connection, id: &str, input: &UpdateApp) -> Result<Option<AppRecord>> {
    UpdateBuilder::new("apps", id)
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_opt("delivery_url", input.delivery_url.clone())
        .set_opt("admin_url", input.admin_url.clone())
        .set_opt("status", input.status.map(|s| s.as_ref().to_string()))
        .set_opt("version", input.version.clone())
        .with_updated_at()
        .execute_returning(conn, APP_COLS)
        .map_err(Into::into)
}

pub fn delete_app(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM apps WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

// ============ Admin sessions ============

/// Create a session. Returns the stored record and the plaintext token,
/// which is never persisted.
pub fn create_admin_session(
    conn: &Connection,
    input: &CreateAdminSession,
) -> Result<(AdminSession, String)> {
    let id = EntityType::AdminSession.gen_id();
    let token = generate_session_token();
    let now = now();

    conn.execute(
        "INSERT INTO admin_sessions (id, token_hash, token_prefix, admin_email, role, ip_address, user_agent, created_at, expires_at, last_activity, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?8, 1)",
        params![
            &id,
            hash_secret(&token),
            token_display_prefix(&token),
            &input.admin_email,
            &input.role,
            &input.ip_address,
            &input.user_agent,
            now,
            now + input.ttl_secs
        ],
    )?;

    let session = get_admin_session_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("Session vanished after insert".into()))?;
    Ok((session, token))
}

pub fn get_admin_session_by_id(conn: &Connection, id: &str) -> Result<Option<AdminSession>> {
    query_one(
        conn,
        &format!("SELECT {} FROM admin_sessions WHERE id = ?1", ADMIN_SESSION_COLS),
        &[&id],
    )
}

/// Look up an active, unexpired session by its plaintext token.
pub fn get_active_session_by_token(conn: &Connection, token: &str) -> Result<Option<AdminSession>> {
    let hash = hash_secret(token);
    let now = now();
    query_one(
        conn,
        &format!(
            "SELECT {} FROM admin_sessions WHERE token_hash = ?1 AND is_active = 1 AND expires_at > ?2",
            ADMIN_SESSION_COLS
        ),
        &[&hash, &now],
    )
}

pub fn touch_admin_session(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE admin_sessions SET last_activity = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

pub fn revoke_admin_session(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE admin_sessions SET is_active = 0 WHERE id = ?1 AND is_active = 1",
        params![id],
    )?;
    Ok(affected > 0)
}

pub fn revoke_admin_session_by_token(conn: &Connection, token: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE admin_sessions SET is_active = 0 WHERE token_hash = ?1 AND is_active = 1",
        params![hash_secret(token)],
    )?;
    Ok(affected > 0)
}

pub fn list_admin_sessions(
    conn: &Connection,
    active_only: bool,
    limit: i64,
    offset: i64,
) -> Result<(Vec<AdminSession>, i64)> {
    let now = now();
    let filter = "WHERE ?1 = 0 OR (is_active = 1 AND expires_at > ?2)";
    let sessions = query_all(
        conn,
        &format!(
            "SELECT {} FROM admin_sessions {} ORDER BY created_at DESC, id LIMIT ?3 OFFSET ?4",
            ADMIN_SESSION_COLS, filter
        ),
        &[&active_only, &now, &limit, &offset],
    )?;
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM admin_sessions {}", filter),
        params![active_only, now],
        |row| row.get(0),
    )?;
    Ok((sessions, total))
}

/// Deactivate expired sessions and purge ones long past expiry.
/// Returns (deactivated, deleted).
pub fn cleanup_admin_sessions(conn: &Connection, purge_after_secs: i64) -> Result<(usize, usize)> {
    let now = now();
    let deactivated = conn.execute(
        "UPDATE admin_sessions SET is_active = 0 WHERE is_active = 1 AND expires_at <= ?1",
        params![now],
    )?;
    let deleted = conn.execute(
        "DELETE FROM admin_sessions WHERE expires_at <= ?1",
        params![now - purge_after_secs],
    )?;
    Ok((deactivated, deleted))
}

// ============ Roles ============

pub fn list_roles(conn: &Connection) -> Result<Vec<Role>> {
    query_all(
        conn,
        &format!("SELECT {} FROM roles ORDER BY built_in DESC, name", ROLE_COLS),
        &[],
    )
}

pub fn get_role_by_id(conn: &Connection, id: &str) -> Result<Option<Role>> {
    query_one(
        conn,
        &format!("SELECT {} FROM roles WHERE id = ?1", ROLE_COLS),
        &[&id],
    )
}

pub fn get_role_by_name(conn: &Connection, name: &str) -> Result<Option<Role>> {
    query_one(
        conn,
        &format!("SELECT {} FROM roles WHERE name = ?1", ROLE_COLS),
        &[&name],
    )
}

pub fn create_role(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    permissions: &[Permission],
) -> Result<Role> {
    let id = EntityType::Role.gen_id();
    conn.execute(
        "INSERT INTO roles (id, name, description, permissions, built_in, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        params![&id, name, description, to_json(&permissions)?, now()],
    )
    .map_err(|e| unique_violation(e, msg::ROLE_NAME_EXISTS))?;

    get_role_by_id(conn, &id)?.ok_or_else(|| AppError::Internal("Role vanished after insert".into()))
}

pub fn update_role(
    conn: &Connection,
    id: &str,
    description: Option<&str>,
    permissions: Option<&[Permission]>,
) -> Result<Option<Role>> {
    let permissions = permissions.map(to_json).transpose()?;
    let updated = UpdateBuilder::new("roles", id)
        .set_opt("description", description.map(String::from))
        .set_opt("permissions", permissions)
        .with_updated_at()
        .execute_returning(conn, ROLE_COLS)?;
    match updated {
        Some(role) => Ok(Some(role)),
        // Nothing to change: return the role as-is
        None => get_role_by_id(conn, id),
    }
}

pub fn delete_role(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM roles WHERE id = ?1 AND built_in = 0", params![id])?;
    Ok(affected > 0)
}

// ============ Webhook events ============

pub fn webhook_event_seen(conn: &Connection, event_id: &str) -> Result<bool> {
    let seen: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM webhook_events WHERE event_id = ?1)",
        params![event_id],
        |row| row.get(0),
    )?;
    Ok(seen)
}

/// Record a processed event. Returns false if it was already recorded.
pub fn record_webhook_event(conn: &Connection, event_id: &str, event_type: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (event_id, event_type, received_at) VALUES (?1, ?2, ?3)",
        params![event_id, event_type, now()],
    )?;
    Ok(affected > 0)
}

// ============ Analytics ============

/// SQL list of statuses that count as captured revenue.
fn revenue_statuses() -> String {
    [
        OrderStatus::Paid,
        OrderStatus::Building,
        OrderStatus::Completed,
        OrderStatus::BuildFailed,
    ]
    .iter()
    .map(|s| format!("'{}'", s.as_ref()))
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn compute_financial_analytics(conn: &Connection, currency: &str) -> Result<FinancialAnalytics> {
    let revenue_in = revenue_statuses();

    let mut orders_by_status = BTreeMap::new();
    {
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM orders GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (status, count) = row?;
            orders_by_status.insert(status, count);
        }
    }
    let order_count: i64 = orders_by_status.values().sum();

    let (paid_order_count, total_revenue_cents): (i64, i64) = conn.query_row(
        &format!(
            "SELECT COUNT(*), COALESCE(SUM(price_cents), 0) FROM orders WHERE status IN ({})",
            revenue_in
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let refunded_cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(price_cents), 0) FROM orders WHERE status = 'refunded'",
        [],
        |row| row.get(0),
    )?;

    let mut revenue_by_complexity = BTreeMap::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT complexity, SUM(price_cents) FROM orders WHERE status IN ({}) GROUP BY complexity",
            revenue_in
        ))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (complexity, cents) = row?;
            revenue_by_complexity.insert(complexity, cents);
        }
    }

    let revenue_by_month = {
        let mut stmt = conn.prepare(&format!(
            "SELECT strftime('%Y-%m', COALESCE(paid_at, created_at), 'unixepoch') AS month,
                    SUM(price_cents), COUNT(*)
             FROM orders WHERE status IN ({})
             GROUP BY month ORDER BY month DESC LIMIT 12",
            revenue_in
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(MonthlyRevenue {
                month: row.get(0)?,
                revenue_cents: row.get(1)?,
                orders: row.get(2)?,
            })
        })?;
        let mut months = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        months.reverse();
        months
    };

    // Refunded orders were paid at some point too.
    let reached_payment = paid_order_count + orders_by_status.get("refunded").copied().unwrap_or(0);
    let conversion_rate = if order_count > 0 {
        reached_payment as f64 / order_count as f64
    } else {
        0.0
    };
    let average_order_value_cents = if paid_order_count > 0 {
        total_revenue_cents / paid_order_count
    } else {
        0
    };

    Ok(FinancialAnalytics {
        currency: currency.to_string(),
        order_count,
        paid_order_count,
        total_revenue_cents,
        refunded_cents,
        average_order_value_cents,
        conversion_rate,
        orders_by_status,
        revenue_by_complexity,
        revenue_by_month,
    })
}
