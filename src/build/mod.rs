//! Simulated build pipeline.
//!
//! A paid order is driven through a fixed list of stages by a detached tokio
//! task. Each stage write is guarded by `status = 'building'`, so cancelling
//! or refunding an order stops its build at the next stage boundary.

pub mod delivery;
mod stages;

pub use delivery::{DeliveryUrls, delivery_urls, slug};
pub use stages::{BUILD_STAGES, BuildStage, stage_progress};

use std::time::Duration;

use rand::Rng;

use crate::config::BuildSimulationConfig;
use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::OrderStatus;

fn step_delay(config: &BuildSimulationConfig) -> Duration {
    let min = config.step_min_ms;
    let max = config.step_max_ms.max(min);
    let ms = if max == min {
        min
    } else {
        rand::thread_rng().gen_range(min..=max)
    };
    Duration::from_millis(ms)
}

/// Claim `paid → building` and run the pipeline in the background.
/// Only the caller that wins the claim runs the stages.
pub fn spawn_build(state: AppState, order_id: String) {
    tokio::spawn(async move {
        let claimed = match state.db.get() {
            Ok(conn) => start_build(&conn, &order_id),
            Err(e) => Err(e.into()),
        };
        match claimed {
            Ok(true) => run_and_report(&state, &order_id).await,
            Ok(false) => {
                tracing::debug!("Build for order {} already claimed, skipping", order_id);
            }
            Err(e) => {
                tracing::error!("Failed to start build for order {}: {}", order_id, e);
            }
        }
    });
}

/// Run the pipeline for an order the caller already moved to `building`.
pub fn spawn_claimed_build(state: AppState, order_id: String) {
    tokio::spawn(async move {
        run_and_report(&state, &order_id).await;
    });
}

fn start_build(conn: &rusqlite::Connection, order_id: &str) -> Result<bool> {
    if !queries::try_start_build(conn, order_id)? {
        return Ok(false);
    }
    queries::append_build_log(conn, order_id, "Build started")?;
    tracing::info!("Order {} moved to building", order_id);
    Ok(true)
}

async fn run_and_report(state: &AppState, order_id: &str) {
    if let Err(e) = run_stages(state, order_id).await {
        tracing::error!("Build for order {} failed: {}", order_id, e);
        let failed = state.db.get().map_err(AppError::from).and_then(|conn| {
            let moved = queries::try_fail_order(
                &conn,
                order_id,
                OrderStatus::BuildFailed,
                &e.to_string(),
            )?;
            if moved {
                queries::append_build_log(&conn, order_id, &format!("Build failed: {}", e))?;
            }
            Ok(moved)
        });
        if let Err(e) = failed {
            tracing::error!("Failed to mark order {} as build_failed: {}", order_id, e);
        }
    }
}

async fn run_stages(state: &AppState, order_id: &str) -> Result<()> {
    for (i, stage) in BUILD_STAGES.iter().enumerate() {
        let delay = step_delay(&state.build);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        let conn = state.db.get()?;
        let progress = stage_progress(i);
        if !queries::advance_build(&conn, order_id, progress, stage.name)? {
            tracing::info!(
                "Build for order {} stopped at stage '{}': order left building",
                order_id,
                stage.name
            );
            return Ok(());
        }
        queries::append_build_log(&conn, order_id, &format!("[{}%] {}", progress, stage.log))?;
    }

    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;
    let urls = delivery_urls(&order, &state.delivery, &state.base_url);

    if !queries::try_complete_build(&conn, order_id, &urls.delivery_url, urls.admin_url.as_deref())? {
        tracing::info!("Order {} left building before completion", order_id);
        return Ok(());
    }
    queries::append_build_log(
        &conn,
        order_id,
        &format!("Build completed, delivered via {}: {}", order.delivery_method.as_ref(), urls.delivery_url),
    )?;

    let order = queries::get_order_by_id(&conn, order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;
    let app = queries::create_app_for_order(&conn, &order)?;
    tracing::info!("Order {} completed, app {} registered", order_id, app.id);
    Ok(())
}
