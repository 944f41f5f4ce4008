use chrono::Utc;
use rusqlite::{Connection, params};

use crate::id::EntityType;
use crate::models::{BUILT_IN_ROLES, built_in_permissions};

/// Initialize the database schema and seed built-in roles.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Orders: one row per customer app order, driven through the
        -- pending_payment -> paid -> building -> completed lifecycle.
        -- List-valued form fields are stored as JSON arrays.
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL CHECK (status IN (
                'pending_payment', 'paid', 'building', 'completed',
                'payment_failed', 'build_failed', 'refunded', 'cancelled'
            )),
            progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            current_stage TEXT,
            customer_id TEXT,
            customer_name TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            company TEXT,
            phone TEXT,
            app_name TEXT NOT NULL,
            app_description TEXT NOT NULL,
            app_type TEXT NOT NULL,
            platforms TEXT NOT NULL DEFAULT '[]',
            complexity TEXT NOT NULL,
            timeline TEXT NOT NULL,
            features TEXT NOT NULL DEFAULT '[]',
            design_style TEXT,
            color_scheme TEXT,
            integrations TEXT NOT NULL DEFAULT '[]',
            reference_urls TEXT NOT NULL DEFAULT '[]',
            delivery_method TEXT NOT NULL CHECK (delivery_method IN ('github', 'zip', 'deployed')),
            github_username TEXT,
            subdomain TEXT,
            additional_notes TEXT,
            price_cents INTEGER NOT NULL CHECK (price_cents > 0),
            currency TEXT NOT NULL,
            checkout_session_id TEXT,
            payment_intent_id TEXT,
            delivery_url TEXT,
            admin_url TEXT,
            error_message TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            paid_at INTEGER,
            build_started_at INTEGER,
            completed_at INTEGER,
            failed_at INTEGER,
            cancelled_at INTEGER,
            refunded_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
        CREATE INDEX IF NOT EXISTS idx_orders_created ON orders(created_at);
        CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_checkout_session ON orders(checkout_session_id)
            WHERE checkout_session_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_orders_payment_intent ON orders(payment_intent_id)
            WHERE payment_intent_id IS NOT NULL;

        -- Build log lines, append-only, ordered by rowid.
        CREATE TABLE IF NOT EXISTS build_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_build_logs_order ON build_logs(order_id, id);

        -- Customer profiles, upserted by email on order intake.
        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            company TEXT,
            phone TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive', 'vip')),
            notes TEXT,
            total_orders INTEGER NOT NULL DEFAULT 0,
            total_spent_cents INTEGER NOT NULL DEFAULT 0,
            last_order_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Delivered apps. At most one per order; manual entries have no order.
        CREATE TABLE IF NOT EXISTS apps (
            id TEXT PRIMARY KEY,
            order_id TEXT UNIQUE,
            customer_id TEXT,
            name TEXT NOT NULL,
            app_type TEXT NOT NULL,
            delivery_method TEXT NOT NULL,
            delivery_url TEXT,
            admin_url TEXT,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'maintenance', 'suspended', 'archived')),
            version TEXT NOT NULL DEFAULT '1.0.0',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_apps_status ON apps(status);

        -- Admin dashboard sessions. Only the token hash is stored.
        -- Revocation clears is_active; rows are purged by the cleanup task.
        CREATE TABLE IF NOT EXISTS admin_sessions (
            id TEXT PRIMARY KEY,
            token_hash TEXT NOT NULL UNIQUE,
            token_prefix TEXT NOT NULL,
            admin_email TEXT NOT NULL,
            role TEXT NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            last_activity INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_admin_sessions_active ON admin_sessions(is_active, expires_at);

        -- Admin roles with a JSON array of permission names.
        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            permissions TEXT NOT NULL DEFAULT '[]',
            built_in INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Processed payment provider events (replay prevention).
        CREATE TABLE IF NOT EXISTS webhook_events (
            event_id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            received_at INTEGER NOT NULL
        );
        "#,
    )?;

    seed_built_in_roles(conn)
}

fn seed_built_in_roles(conn: &Connection) -> rusqlite::Result<()> {
    let now = Utc::now().timestamp();
    for (name, description) in BUILT_IN_ROLES {
        let perms = built_in_permissions(name);
        let permissions: Vec<&str> = perms
            .iter()
            .map(|p| p.as_ref())
            .collect();
        let permissions = serde_json::to_string(&permissions)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        conn.execute(
            "INSERT OR IGNORE INTO roles (id, name, description, permissions, built_in, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
            params![EntityType::Role.gen_id(), name, description, permissions, now],
        )?;
    }
    Ok(())
}

/// Pragmas applied to every pooled connection.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        "#,
    )
}

/// Enable WAL for file-backed databases (no-op for in-memory ones).
pub fn enable_wal(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        "#,
    )
}
