use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use wander_db::models::UserChanges;
use wander_types::api::{Paginated, UpdateUserRequest};
use wander_types::models::{Role, User};
use wander_types::query::UserQuery;

use crate::auth::hash_password;
use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::Viewer;
use crate::state::{AppState, run_db};
use crate::validate::{check_password, normalize_email, required_text};

pub async fn list_users(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Paginated<User>>, ApiError> {
    viewer.admin()?;

    let window = query.pagination();
    let (rows, total) = run_db(&state, move |db| db.list_users(&query)).await?;
    let users = rows.into_iter().map(convert::user).collect();

    Ok(Json(Paginated::new(users, window, total)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    viewer.owner_or_admin(user_id)?;

    let id = user_id.to_string();
    let row = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(convert::user(row)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let claims = viewer.owner_or_admin(user_id)?;
    if req.role.is_some() && !claims.is_admin() {
        return Err(ApiError::Forbidden("only admins may change roles"));
    }

    let mut changes = UserChanges {
        name: req.name.as_deref().map(|n| required_text("name", n, 100)).transpose()?,
        email: req.email.as_deref().map(normalize_email).transpose()?,
        password_hash: None,
        role: req.role.map(|r| r.as_str().to_string()),
    };
    if let Some(password) = &req.password {
        check_password(password)?;
        changes.password_hash = Some(hash_password(password)?);
    }

    let id = user_id.to_string();
    let demoting = req.role == Some(Role::User);
    let row = run_db(&state, move |db| {
        let Some(current) = db.get_user_by_id(&id)? else {
            return Ok(Err(ApiError::NotFound("user")));
        };
        if let Some(email) = &changes.email {
            if let Some(other) = db.get_user_by_email(email)? {
                if other.id != id {
                    return Ok(Err(ApiError::conflict("email is already registered")));
                }
            }
        }
        if demoting && current.role == Role::Admin.as_str() && db.count_admins()? <= 1 {
            return Ok(Err(ApiError::conflict("cannot demote the last admin")));
        }

        db.update_user(&id, &changes)?;
        Ok(db.get_user_by_id(&id)?.ok_or(ApiError::NotFound("user")))
    })
    .await??;

    info!("User {} updated by {}", user_id, claims.sub);
    Ok(Json(convert::user(row)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let claims = viewer.owner_or_admin(user_id)?;

    let id = user_id.to_string();
    run_db(&state, move |db| {
        let Some(current) = db.get_user_by_id(&id)? else {
            return Ok(Err(ApiError::NotFound("user")));
        };
        if current.role == Role::Admin.as_str() && db.count_admins()? <= 1 {
            return Ok(Err(ApiError::conflict("cannot delete the last admin")));
        }
        db.delete_user(&id)?;
        Ok(Ok(()))
    })
    .await??;

    info!("User {} deleted by {}", user_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}
