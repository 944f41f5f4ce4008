use axum::extract::State;
use serde::Serialize;

use crate::build::slug;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path};
use crate::id::is_valid_prefixed_id;
use crate::models::{AppType, DeliveryMethod, Feature, OrderStatus};

/// Describes the archive for a zip-delivered order.
#[derive(Debug, Serialize)]
pub struct DownloadManifest {
    pub order_id: String,
    pub app_name: String,
    pub file_name: String,
    pub app_type: AppType,
    pub platforms: Vec<String>,
    pub features: Vec<Feature>,
    pub contents: Vec<&'static str>,
    pub completed_at: Option<i64>,
}

const ARCHIVE_CONTENTS: [&str; 5] = ["README.md", "src/", "tests/", "docs/", "deploy/"];

pub async fn get_download(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<DownloadManifest>> {
    if !is_valid_prefixed_id(&order_id) {
        return Err(AppError::NotFound(msg::ORDER_NOT_FOUND.into()));
    }

    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &order_id)?
        .filter(|o| o.delivery_method == DeliveryMethod::Zip)
        .ok_or_else(|| AppError::NotFound(msg::NOT_A_ZIP_DELIVERY.into()))?;

    if order.status != OrderStatus::Completed {
        return Err(AppError::Conflict(msg::DOWNLOAD_NOT_READY.into()));
    }

    Ok(Json(DownloadManifest {
        file_name: format!("{}.zip", slug(&order.app_name)),
        order_id: order.id,
        app_name: order.app_name,
        app_type: order.app_type,
        platforms: order.platforms,
        features: order.features,
        contents: ARCHIVE_CONTENTS.to_vec(),
        completed_at: order.completed_at,
    }))
}
