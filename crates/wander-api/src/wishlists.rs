use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use wander_db::models::WishlistRow;
use wander_types::api::{AddWishlistDestinationRequest, Paginated, WishlistRequest};
use wander_types::models::{Wishlist, WishlistDetail};
use wander_types::query::PageQuery;

use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::Viewer;
use crate::state::{AppState, run_db};
use crate::validate::required_text;

const MAX_NAME_CHARS: usize = 100;

pub async fn list_wishlists(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Wishlist>>, ApiError> {
    let claims = viewer.claims()?;
    let owner = (!claims.is_admin()).then(|| claims.sub.to_string());

    let window = page.pagination();
    let (rows, total) =
        run_db(&state, move |db| db.list_wishlists(owner.as_deref(), window)).await?;

    let wishlists = rows.into_iter().map(convert::wishlist).collect();
    Ok(Json(Paginated::new(wishlists, window, total)))
}

pub async fn get_wishlist(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(wishlist_id): Path<Uuid>,
) -> Result<Json<WishlistDetail>, ApiError> {
    viewer.claims()?;
    let row = load_wishlist(&state, wishlist_id).await?;
    viewer.owner_or_admin(convert::parse_id(&row.user_id))?;

    Ok(Json(load_detail(&state, row).await?))
}

pub async fn create_wishlist(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(req): Json<WishlistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = viewer.claims()?;
    let name = required_text("name", &req.name, MAX_NAME_CHARS)?;

    let wishlist_id = Uuid::new_v4();
    let id = wishlist_id.to_string();
    let user_id = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.create_wishlist(&id, &user_id, &name)?;
        db.get_wishlist(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("wishlist"))?;

    info!("Wishlist {} created by {}", wishlist_id, claims.sub);
    Ok((StatusCode::CREATED, Json(convert::wishlist(row))))
}

pub async fn rename_wishlist(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(wishlist_id): Path<Uuid>,
    Json(req): Json<WishlistRequest>,
) -> Result<Json<Wishlist>, ApiError> {
    viewer.claims()?;
    let name = required_text("name", &req.name, MAX_NAME_CHARS)?;
    let existing = load_wishlist(&state, wishlist_id).await?;
    viewer.owner_or_admin(convert::parse_id(&existing.user_id))?;

    let id = existing.id;
    let row = run_db(&state, move |db| {
        db.rename_wishlist(&id, &name)?;
        db.get_wishlist(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("wishlist"))?;

    Ok(Json(convert::wishlist(row)))
}

pub async fn delete_wishlist(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(wishlist_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    viewer.claims()?;
    let existing = load_wishlist(&state, wishlist_id).await?;
    viewer.owner_or_admin(convert::parse_id(&existing.user_id))?;

    let id = existing.id;
    if !run_db(&state, move |db| db.delete_wishlist(&id)).await? {
        return Err(ApiError::NotFound("wishlist"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_destination(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(wishlist_id): Path<Uuid>,
    Json(req): Json<AddWishlistDestinationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    viewer.claims()?;
    let existing = load_wishlist(&state, wishlist_id).await?;
    viewer.owner_or_admin(convert::parse_id(&existing.user_id))?;

    let id = existing.id.clone();
    let destination_id = req.destination_id.to_string();
    run_db(&state, move |db| {
        if db.get_destination(&destination_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("destination")));
        }
        if !db.add_wishlist_destination(&id, &destination_id)? {
            return Ok(Err(ApiError::conflict("destination is already in this wishlist")));
        }
        Ok(Ok(()))
    })
    .await??;

    let row = load_wishlist(&state, wishlist_id).await?;
    Ok((StatusCode::CREATED, Json(load_detail(&state, row).await?)))
}

pub async fn remove_destination(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((wishlist_id, destination_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    viewer.claims()?;
    let existing = load_wishlist(&state, wishlist_id).await?;
    viewer.owner_or_admin(convert::parse_id(&existing.user_id))?;

    let id = existing.id;
    let destination_id = destination_id.to_string();
    let removed =
        run_db(&state, move |db| db.remove_wishlist_destination(&id, &destination_id)).await?;
    if !removed {
        return Err(ApiError::NotFound("wishlist entry"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn load_wishlist(state: &AppState, wishlist_id: Uuid) -> Result<WishlistRow, ApiError> {
    let id = wishlist_id.to_string();
    run_db(state, move |db| db.get_wishlist(&id))
        .await?
        .ok_or(ApiError::NotFound("wishlist"))
}

async fn load_detail(state: &AppState, row: WishlistRow) -> Result<WishlistDetail, ApiError> {
    let id = row.id.clone();
    let destinations = run_db(state, move |db| db.get_wishlist_destinations(&id)).await?;

    Ok(WishlistDetail {
        wishlist: convert::wishlist(row),
        destinations: destinations.into_iter().map(convert::destination).collect(),
    })
}
