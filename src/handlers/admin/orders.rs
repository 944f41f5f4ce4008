use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::lifecycle;
use crate::middleware::AdminContext;
use crate::models::{Order, OrderListQuery, OrderWithLogs, Permission};
use crate::pagination::{Page, Paginated};

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Paginated<Order>>> {
    ctx.require(Permission::OrdersRead)?;
    let page = Page::new(query.limit, query.offset);
    let conn = state.db.get()?;
    let (orders, total) = queries::list_orders(&conn, query.status, page.limit, page.offset)?;
    Ok(Json(Paginated::new(orders, total, page)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderWithLogs>> {
    ctx.require(Permission::OrdersRead)?;
    let conn = state.db.get()?;
    let order = queries::get_order_with_logs(&conn, &order_id)?.or_not_found(msg::ORDER_NOT_FOUND)?;
    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    ctx.require(Permission::OrdersWrite)?;
    let conn = state.db.get()?;
    let order = lifecycle::cancel_order(&conn, &order_id)?.into_result("cancel")?;
    tracing::info!("Order {} cancelled by {}", order.id, ctx.session.admin_email);
    Ok(Json(order))
}

pub async fn refund_order(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    ctx.require(Permission::OrdersWrite)?;
    let conn = state.db.get()?;
    let order = lifecycle::refund_order(&conn, &order_id)?.into_result("refund")?;
    tracing::info!("Order {} refunded by {}", order.id, ctx.session.admin_email);
    Ok(Json(order))
}

pub async fn retry_build(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    ctx.require(Permission::OrdersWrite)?;
    let order = lifecycle::retry_build(&state, &order_id)?.into_result("retry the build of")?;
    Ok(Json(order))
}
