mod from_row;
mod schema;
pub mod queries;

pub use schema::{configure_connection, enable_wal, init_db};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::{AdminCredentials, BuildSimulationConfig, DeliveryConfig};
use crate::payments::CheckoutGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler and background task.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Public URL for checkout return links and zip downloads (no trailing slash)
    pub base_url: String,
    pub dev_mode: bool,
    pub admin: AdminCredentials,
    pub session_ttl_secs: i64,
    /// Stripe webhook signing secret. Webhooks are rejected when unset.
    pub webhook_secret: Option<String>,
    pub currency: String,
    pub checkout: CheckoutGateway,
    pub build: BuildSimulationConfig,
    pub delivery: DeliveryConfig,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| configure_connection(conn));
    Pool::builder().max_size(10).build(manager)
}
