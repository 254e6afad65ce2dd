use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use wander_types::api::{CreateReviewRequest, Paginated, UpdateReviewRequest};
use wander_types::models::Review;
use wander_types::query::ReviewQuery;

use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::Viewer;
use crate::state::{AppState, run_db};
use crate::validate::optional_text;

const MAX_COMMENT_CHARS: usize = 2000;

pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Paginated<Review>>, ApiError> {
    if let Some(min) = query.min_rating {
        check_rating(min)?;
    }

    let window = query.pagination();
    let (rows, total) = run_db(&state, move |db| db.list_reviews(&query)).await?;
    let reviews = rows.into_iter().map(convert::review).collect();

    Ok(Json(Paginated::new(reviews, window, total)))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> Result<Json<Review>, ApiError> {
    let id = review_id.to_string();
    let row = run_db(&state, move |db| db.get_review(&id))
        .await?
        .ok_or(ApiError::NotFound("review"))?;

    Ok(Json(convert::review(row)))
}

pub async fn create_review(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = viewer.claims()?;
    check_rating(req.rating)?;
    let comment = optional_text("comment", req.comment, MAX_COMMENT_CHARS)?;

    let review_id = Uuid::new_v4();
    let id = review_id.to_string();
    let user_id = claims.sub.to_string();
    let destination_id = req.destination_id.to_string();
    let rating = req.rating;

    let row = run_db(&state, move |db| {
        if db.get_destination(&destination_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("destination")));
        }
        if db.find_user_review(&user_id, &destination_id)?.is_some() {
            return Ok(Err(ApiError::conflict("you have already reviewed this destination")));
        }
        db.create_review(&id, &user_id, &destination_id, rating, comment.as_deref())?;
        Ok(db.get_review(&id)?.ok_or(ApiError::NotFound("review")))
    })
    .await??;

    info!("Review {} posted on {} by {}", review_id, req.destination_id, claims.sub);
    Ok((StatusCode::CREATED, Json(convert::review(row))))
}

pub async fn update_review(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<UpdateReviewRequest>,
) -> Result<Json<Review>, ApiError> {
    viewer.claims()?;
    if let Some(rating) = req.rating {
        check_rating(rating)?;
    }
    let comment = req
        .comment
        .map(|c| optional_text("comment", Some(c), MAX_COMMENT_CHARS))
        .transpose()?;

    let existing = load_review(&state, review_id).await?;
    viewer.owner_or_admin(convert::parse_id(&existing.user_id))?;

    let rating = req.rating.unwrap_or(existing.rating);
    let comment = comment.unwrap_or(existing.comment);
    let id = existing.id;
    let row = run_db(&state, move |db| {
        db.update_review(&id, rating, comment.as_deref())?;
        db.get_review(&id)
    })
    .await?
    .ok_or(ApiError::NotFound("review"))?;

    Ok(Json(convert::review(row)))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(review_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    viewer.claims()?;
    let existing = load_review(&state, review_id).await?;
    let claims = viewer.owner_or_admin(convert::parse_id(&existing.user_id))?;

    let id = existing.id;
    if !run_db(&state, move |db| db.delete_review(&id)).await? {
        return Err(ApiError::NotFound("review"));
    }

    info!("Review {} deleted by {}", review_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

async fn load_review(
    state: &AppState,
    review_id: Uuid,
) -> Result<wander_db::models::ReviewRow, ApiError> {
    let id = review_id.to_string();
    run_db(state, move |db| db.get_review(&id))
        .await?
        .ok_or(ApiError::NotFound("review"))
}

fn check_rating(rating: u8) -> Result<(), ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::validation("rating must be between 1 and 5"));
    }
    Ok(())
}
