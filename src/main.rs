use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::time::Duration;

use appforge::config::Config;
use appforge::db::{AppState, create_pool, enable_wal, init_db, queries};
use appforge::handlers;
use appforge::lifecycle;
use appforge::models::{
    AppType, Complexity, CreateCustomer, CustomerStatus, DeliveryMethod, Feature, NewOrder,
    Timeline,
};
use appforge::payments::{CheckoutGateway, SimulatedCheckout, StripeClient};
use appforge::pricing::{calculate_price, to_cents};

/// Sessions more than this far past expiry are deleted by the cleanup task.
const SESSION_PURGE_AFTER_SECS: i64 = 7 * 24 * 3600;

#[derive(Parser, Debug)]
#[command(name = "appforge")]
#[command(about = "Order intake, payment and simulated build pipeline for custom apps")]
struct Cli {
    /// Seed the database with demo customers, orders and apps (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

fn demo_order(name: &str, email: &str, app_name: &str, delivery_method: DeliveryMethod) -> NewOrder {
    let features = vec![Feature::Authentication, Feature::AdminPanel];
    let price = calculate_price(Complexity::Medium, Timeline::TwoWeeks, &features);
    NewOrder {
        customer_name: name.to_string(),
        customer_email: email.to_string(),
        company: None,
        phone: None,
        app_name: app_name.to_string(),
        app_description: format!("{} for internal operations", app_name),
        app_type: AppType::Web,
        platforms: vec!["web".to_string()],
        complexity: Complexity::Medium,
        timeline: Timeline::TwoWeeks,
        features,
        design_style: Some("minimal".to_string()),
        color_scheme: None,
        integrations: Vec::new(),
        reference_urls: Vec::new(),
        delivery_method,
        github_username: (delivery_method == DeliveryMethod::Github).then(|| "octocat".to_string()),
        subdomain: None,
        additional_notes: None,
        client_price: price,
    }
}

/// Seeds the database with demo data for the dashboard.
/// Only runs in dev mode and when no customers exist yet.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let (_, existing) = queries::list_customers(&conn, None, 1, 0).expect("Failed to count customers");
    if existing > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let vip = queries::create_customer(
        &conn,
        &CreateCustomer {
            email: "dana@northwind.test".to_string(),
            name: "Dana Reyes".to_string(),
            company: Some("Northwind".to_string()),
            phone: None,
            status: Some(CustomerStatus::Vip),
            notes: Some("Repeat customer".to_string()),
        },
    )
    .expect("Failed to create demo customer");
    tracing::info!("Customer: {} ({})", vip.name, vip.id);

    // One delivered order
    let delivered = demo_order("Dana Reyes", &vip.email, "Fleet Tracker", DeliveryMethod::Github);
    let price_cents = to_cents(delivered.client_price);
    let order = queries::create_order(&conn, &delivered, Some(&vip.id), price_cents, &state.currency)
        .expect("Failed to create demo order");
    queries::try_mark_order_paid(&conn, &order.id, Some("pi_seed_delivered"))
        .expect("Failed to mark demo order paid");
    queries::add_customer_spend(&conn, &vip.id, price_cents).expect("Failed to record spend");
    queries::try_start_build(&conn, &order.id).expect("Failed to start demo build");
    let urls = appforge::build::delivery_urls(&order, &state.delivery, &state.base_url);
    queries::try_complete_build(&conn, &order.id, &urls.delivery_url, urls.admin_url.as_deref())
        .expect("Failed to complete demo build");
    let order = queries::get_order_by_id(&conn, &order.id)
        .expect("Failed to reload demo order")
        .expect("Demo order missing");
    let app = queries::create_app_for_order(&conn, &order).expect("Failed to create demo app");
    tracing::info!("Completed order: {} -> app {}", order.id, app.id);

    // One order still waiting for payment
    let pending = demo_order("Sam Okafor", "sam@example.test", "Clinic Booking", DeliveryMethod::Zip);
    let customer = queries::upsert_customer_for_order(&conn, &pending).expect("Failed to upsert customer");
    let order = queries::create_order(
        &conn,
        &pending,
        Some(&customer.id),
        to_cents(pending.client_price),
        &state.currency,
    )
    .expect("Failed to create pending demo order");
    tracing::info!("Pending order: {}", order.id);

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");
}

/// Spawns a background task that periodically cleans up admin sessions and
/// expires unpaid orders. Runs every 5 minutes.
fn spawn_cleanup_task(state: AppState, pending_order_ttl_hours: i64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60);

        loop {
            tokio::time::sleep(interval).await;

            let conn = match state.db.get() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to get db connection for cleanup: {}", e);
                    continue;
                }
            };

            match queries::cleanup_admin_sessions(&conn, SESSION_PURGE_AFTER_SECS) {
                Ok((deactivated, deleted)) if deactivated + deleted > 0 => {
                    tracing::debug!(
                        "Admin sessions: {} deactivated, {} purged",
                        deactivated,
                        deleted
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to clean up admin sessions: {}", e),
            }

            if let Err(e) = lifecycle::expire_stale_orders(&conn, pending_order_ttl_hours) {
                tracing::warn!("Failed to expire stale orders: {}", e);
            }
        }
    });

    tracing::info!("Background cleanup task started (runs every 5 minutes)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "appforge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        enable_wal(&conn).expect("Failed to enable WAL");
        init_db(&conn).expect("Failed to initialize database");
    }

    let checkout = match config.stripe {
        Some(ref stripe) => CheckoutGateway::Stripe(StripeClient::new(stripe)),
        None => {
            if !config.dev_mode {
                tracing::warn!("STRIPE_SECRET_KEY not set; using simulated checkout outside dev mode");
            }
            CheckoutGateway::Simulated(SimulatedCheckout::new(&config.base_url))
        }
    };
    tracing::info!("Checkout gateway: {}", checkout.name());

    if config.admin.email.is_none() || config.admin.password.is_none() {
        tracing::warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set; admin login is disabled");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        dev_mode: config.dev_mode,
        admin: config.admin.clone(),
        session_ttl_secs: config.session_ttl_hours * 3600,
        webhook_secret: config.webhook_secret.clone(),
        currency: config.currency.clone(),
        checkout,
        build: config.build,
        delivery: config.delivery.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set APPFORGE_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    if let Err(e) = lifecycle::recover_interrupted_builds(&state) {
        tracing::error!("Failed to recover interrupted builds: {}", e);
    }
    spawn_cleanup_task(state.clone(), config.pending_order_ttl_hours);

    let app = handlers::app(state, config.rate_limit);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("AppForge server listening on {}", addr);

    // Peer addresses feed the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
