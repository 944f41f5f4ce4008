use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AdminContext;
use crate::models::{CreateCustomer, Customer, CustomerListQuery, Permission, UpdateCustomer};
use crate::pagination::{Page, Paginated};

use super::DeleteResponse;

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<Paginated<Customer>>> {
    ctx.require(Permission::CustomersRead)?;
    let page = Page::new(query.limit, query.offset);
    let conn = state.db.get()?;
    let (customers, total) =
        queries::list_customers(&conn, query.search.as_deref(), page.limit, page.offset)?;
    Ok(Json(Paginated::new(customers, total, page)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(customer_id): Path<String>,
) -> Result<Json<Customer>> {
    ctx.require(Permission::CustomersRead)?;
    let conn = state.db.get()?;
    let customer =
        queries::get_customer_by_id(&conn, &customer_id)?.or_not_found(msg::CUSTOMER_NOT_FOUND)?;
    Ok(Json(customer))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Json(input): Json<CreateCustomer>,
) -> Result<Json<Customer>> {
    ctx.require(Permission::CustomersWrite)?;
    input.validate().map_err(AppError::Validation)?;
    let conn = state.db.get()?;
    let customer = queries::create_customer(&conn, &input)?;
    tracing::info!("Customer {} created by {}", customer.id, ctx.session.admin_email);
    Ok(Json(customer))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(customer_id): Path<String>,
    Json(input): Json<UpdateCustomer>,
) -> Result<Json<Customer>> {
    ctx.require(Permission::CustomersWrite)?;
    input.validate().map_err(AppError::Validation)?;
    let conn = state.db.get()?;
    let customer = match queries::update_customer(&conn, &customer_id, &input)? {
        Some(customer) => customer,
        // Empty patch: nothing was written, report the current record
        None => queries::get_customer_by_id(&conn, &customer_id)?
            .or_not_found(msg::CUSTOMER_NOT_FOUND)?,
    };
    Ok(Json(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(customer_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    ctx.require(Permission::CustomersWrite)?;
    let conn = state.db.get()?;
    if !queries::delete_customer(&conn, &customer_id)? {
        return Err(AppError::NotFound(msg::CUSTOMER_NOT_FOUND.into()));
    }
    tracing::info!("Customer {} deleted by {}", customer_id, ctx.session.admin_email);
    Ok(Json(DeleteResponse { deleted: true }))
}
