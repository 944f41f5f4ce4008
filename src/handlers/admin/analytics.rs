use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::AdminContext;
use crate::models::{FinancialAnalytics, Permission};

pub async fn get_analytics(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
) -> Result<Json<FinancialAnalytics>> {
    ctx.require(Permission::AnalyticsRead)?;
    let conn = state.db.get()?;
    Ok(Json(queries::compute_financial_analytics(&conn, &state.currency)?))
}
