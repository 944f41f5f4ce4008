use axum::extract::{Extension, State};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, FieldError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::middleware::AdminContext;
use crate::models::{
    AdminSession, CreateRole, Permission, PermissionInfo, Role, SessionListQuery, UpdateRole,
    is_valid_role_name, parse_permissions,
};
use crate::pagination::{Page, Paginated};

use super::DeleteResponse;

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

pub async fn list_permissions(
    Extension(ctx): Extension<AdminContext>,
) -> Result<Json<Vec<PermissionInfo>>> {
    ctx.require(Permission::SecurityManage)?;
    let catalog = Permission::all()
        .into_iter()
        .map(|p| PermissionInfo {
            name: p,
            description: p.description(),
        })
        .collect();
    Ok(Json(catalog))
}

pub async fn list_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
) -> Result<Json<Vec<Role>>> {
    ctx.require(Permission::SecurityManage)?;
    let conn = state.db.get()?;
    Ok(Json(queries::list_roles(&conn)?))
}

pub async fn get_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(role_id): Path<String>,
) -> Result<Json<Role>> {
    ctx.require(Permission::SecurityManage)?;
    let conn = state.db.get()?;
    let role = queries::get_role_by_id(&conn, &role_id)?.or_not_found(msg::ROLE_NOT_FOUND)?;
    Ok(Json(role))
}

pub async fn create_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Json(input): Json<CreateRole>,
) -> Result<Json<Role>> {
    ctx.require(Permission::SecurityManage)?;

    let name = input.name.trim();
    let mut errors = Vec::new();
    if !is_valid_role_name(name) {
        errors.push(FieldError::new(
            "name",
            "Role name must be 1-50 lowercase letters, digits or underscores",
        ));
    }
    let permissions = match parse_permissions(&input.permissions) {
        Ok(p) => p,
        Err(mut e) => {
            errors.append(&mut e);
            Vec::new()
        }
    };
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let conn = state.db.get()?;
    let role = queries::create_role(&conn, name, input.description.as_deref(), &permissions)?;
    tracing::info!("Role {} created by {}", role.name, ctx.session.admin_email);
    Ok(Json(role))
}

pub async fn update_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(role_id): Path<String>,
    Json(input): Json<UpdateRole>,
) -> Result<Json<Role>> {
    ctx.require(Permission::SecurityManage)?;
    let permissions = input
        .permissions
        .as_deref()
        .map(parse_permissions)
        .transpose()
        .map_err(AppError::Validation)?;

    let conn = state.db.get()?;
    let role = queries::update_role(
        &conn,
        &role_id,
        input.description.as_deref(),
        permissions.as_deref(),
    )?
    .or_not_found(msg::ROLE_NOT_FOUND)?;
    tracing::info!("Role {} updated by {}", role.name, ctx.session.admin_email);
    Ok(Json(role))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(role_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    ctx.require(Permission::SecurityManage)?;
    let conn = state.db.get()?;
    let role = queries::get_role_by_id(&conn, &role_id)?.or_not_found(msg::ROLE_NOT_FOUND)?;
    if role.built_in {
        return Err(AppError::BadRequest(msg::BUILT_IN_ROLE.into()));
    }
    let deleted = queries::delete_role(&conn, &role_id)?;
    if deleted {
        tracing::info!("Role {} deleted by {}", role.name, ctx.session.admin_email);
    }
    Ok(Json(DeleteResponse { deleted }))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<Paginated<AdminSession>>> {
    ctx.require(Permission::SecurityManage)?;
    let page = Page::new(query.limit, query.offset);
    let conn = state.db.get()?;
    let (sessions, total) =
        queries::list_admin_sessions(&conn, query.active_only, page.limit, page.offset)?;
    Ok(Json(Paginated::new(sessions, total, page)))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(session_id): Path<String>,
) -> Result<Json<RevokeResponse>> {
    ctx.require(Permission::SecurityManage)?;
    let conn = state.db.get()?;
    queries::get_admin_session_by_id(&conn, &session_id)?.or_not_found(msg::SESSION_NOT_FOUND)?;
    let revoked = queries::revoke_admin_session(&conn, &session_id)?;
    if revoked {
        tracing::info!("Session {} revoked by {}", session_id, ctx.session.admin_email);
    }
    Ok(Json(RevokeResponse { revoked }))
}
