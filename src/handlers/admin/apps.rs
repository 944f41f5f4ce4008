use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AdminContext;
use crate::models::{AppListQuery, AppRecord, CreateApp, Permission, UpdateApp};
use crate::pagination::{Page, Paginated};

use super::DeleteResponse;

pub async fn list_apps(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Query(query): Query<AppListQuery>,
) -> Result<Json<Paginated<AppRecord>>> {
    ctx.require(Permission::AppsRead)?;
    let page = Page::new(query.limit, query.offset);
    let conn = state.db.get()?;
    let (apps, total) = queries::list_apps(&conn, query.status, page.limit, page.offset)?;
    Ok(Json(Paginated::new(apps, total, page)))
}

pub async fn get_app(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(app_id): Path<String>,
) -> Result<Json<AppRecord>> {
    ctx.require(Permission::AppsRead)?;
    let conn = state.db.get()?;
    let app = queries::get_app_by_id(&conn, &app_id)?.or_not_found(msg::APP_NOT_FOUND)?;
    Ok(Json(app))
}

pub async fn create_app(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Json(input): Json<CreateApp>,
) -> Result<Json<AppRecord>> {
    ctx.require(Permission::AppsWrite)?;
    input.validate().map_err(AppError::Validation)?;
    let conn = state.db.get()?;
    if let Some(ref order_id) = input.order_id {
        queries::get_order_by_id(&conn, order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;
    }
    if let Some(ref customer_id) = input.customer_id {
        queries::get_customer_by_id(&conn, customer_id)?.or_not_found(msg::CUSTOMER_NOT_FOUND)?;
    }
    let app = queries::create_app(&conn, &input)?;
    tracing::info!("App {} registered by {}", app.id, ctx.session.admin_email);
    Ok(Json(app))
}

pub async fn update_app(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(app_id): Path<String>,
    Json(input): Json<UpdateApp>,
) -> Result<Json<AppRecord>> {
    ctx.require(Permission::AppsWrite)?;
    input.validate().map_err(AppError::Validation)?;
    let conn = state.db.get()?;
    let app = match queries::update_app(&conn, &app_id, &input)? {
        Some(app) => app,
        None => queries::get_app_by_id(&conn, &app_id)?.or_not_found(msg::APP_NOT_FOUND)?,
    };
    Ok(Json(app))
}

pub async fn delete_app(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(app_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    ctx.require(Permission::AppsWrite)?;
    let conn = state.db.get()?;
    if !queries::delete_app(&conn, &app_id)? {
        return Err(AppError::NotFound(msg::APP_NOT_FOUND.into()));
    }
    Ok(Json(DeleteResponse { deleted: true }))
}
