use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use wander_db::models::DestinationFields;
use wander_types::api::{CreateDestinationRequest, Paginated, UpdateDestinationRequest};
use wander_types::models::{Destination, Review};
use wander_types::query::{DestinationQuery, PageQuery, ReviewQuery};

use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::Viewer;
use crate::state::{AppState, run_db};
use crate::validate::{check_coordinates, optional_text, required_text};

const MAX_IMAGES: usize = 20;

pub async fn list_destinations(
    State(state): State<AppState>,
    Query(query): Query<DestinationQuery>,
) -> Result<Json<Paginated<Destination>>, ApiError> {
    let window = query.pagination();
    let (rows, total) = run_db(&state, move |db| db.list_destinations(&query)).await?;
    let destinations = rows.into_iter().map(convert::destination).collect();

    Ok(Json(Paginated::new(destinations, window, total)))
}

pub async fn get_destination(
    State(state): State<AppState>,
    Path(destination_id): Path<Uuid>,
) -> Result<Json<Destination>, ApiError> {
    let id = destination_id.to_string();
    let row = run_db(&state, move |db| db.get_destination(&id))
        .await?
        .ok_or(ApiError::NotFound("destination"))?;

    Ok(Json(convert::destination(row)))
}

pub async fn list_destination_reviews(
    State(state): State<AppState>,
    Path(destination_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Review>>, ApiError> {
    let query = ReviewQuery {
        destination_id: Some(destination_id),
        page: page.page,
        limit: page.limit,
        ..Default::default()
    };
    let window = query.pagination();

    let id = destination_id.to_string();
    let (rows, total) = run_db(&state, move |db| {
        if db.get_destination(&id)?.is_none() {
            return Ok(Err(ApiError::NotFound("destination")));
        }
        Ok(Ok(db.list_reviews(&query)?))
    })
    .await??;

    let reviews = rows.into_iter().map(convert::review).collect();
    Ok(Json(Paginated::new(reviews, window, total)))
}

pub async fn create_destination(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(req): Json<CreateDestinationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = viewer.admin()?;

    let fields = DestinationFields {
        name: required_text("name", &req.name, 200)?,
        country: required_text("country", &req.country, 100)?,
        city: required_text("city", &req.city, 100)?,
        description: optional_text("description", req.description, 5000)?,
        latitude: req.latitude,
        longitude: req.longitude,
        images: clean_images(req.images)?,
    };
    check_coordinates(fields.latitude, fields.longitude)?;

    let destination_id = Uuid::new_v4();
    let id = destination_id.to_string();
    let row = run_db(&state, move |db| {
        if db.find_destination_by_key(&fields.name, &fields.country, &fields.city)?.is_some() {
            return Ok(Err(duplicate(&fields)));
        }
        db.create_destination(&id, &fields)?;
        Ok(db.get_destination(&id)?.ok_or(ApiError::NotFound("destination")))
    })
    .await??;

    info!("Destination {} ({}) created by {}", destination_id, row.name, claims.sub);
    Ok((StatusCode::CREATED, Json(convert::destination(row))))
}

pub async fn update_destination(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(destination_id): Path<Uuid>,
    Json(req): Json<UpdateDestinationRequest>,
) -> Result<Json<Destination>, ApiError> {
    viewer.admin()?;

    let name = req.name.as_deref().map(|v| required_text("name", v, 200)).transpose()?;
    let country = req.country.as_deref().map(|v| required_text("country", v, 100)).transpose()?;
    let city = req.city.as_deref().map(|v| required_text("city", v, 100)).transpose()?;
    let description = req
        .description
        .map(|v| optional_text("description", Some(v), 5000))
        .transpose()?;
    let images = req.images.map(clean_images).transpose()?;
    check_coordinates(req.latitude, req.longitude)?;

    let id = destination_id.to_string();
    let row = run_db(&state, move |db| {
        let Some(current) = db.get_destination(&id)? else {
            return Ok(Err(ApiError::NotFound("destination")));
        };

        let fields = DestinationFields {
            name: name.unwrap_or(current.name),
            country: country.unwrap_or(current.country),
            city: city.unwrap_or(current.city),
            // An explicit empty description clears it.
            description: description.unwrap_or(current.description),
            latitude: req.latitude.or(current.latitude),
            longitude: req.longitude.or(current.longitude),
            images: images.unwrap_or(current.images),
        };

        if let Some(other) = db.find_destination_by_key(&fields.name, &fields.country, &fields.city)? {
            if other != id {
                return Ok(Err(duplicate(&fields)));
            }
        }

        db.update_destination(&id, &fields)?;
        Ok(db.get_destination(&id)?.ok_or(ApiError::NotFound("destination")))
    })
    .await??;

    Ok(Json(convert::destination(row)))
}

pub async fn delete_destination(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(destination_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let claims = viewer.admin()?;

    let id = destination_id.to_string();
    let deleted = run_db(&state, move |db| db.delete_destination(&id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("destination"));
    }

    info!("Destination {} deleted by {}", destination_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

fn clean_images(images: Vec<String>) -> Result<Vec<String>, ApiError> {
    if images.len() > MAX_IMAGES {
        return Err(ApiError::validation(format!(
            "at most {} images per destination",
            MAX_IMAGES
        )));
    }
    images
        .iter()
        .map(|url| required_text("image url", url, 2048))
        .collect()
}

fn duplicate(fields: &DestinationFields) -> ApiError {
    ApiError::conflict(format!(
        "destination '{}' already exists in {}, {}",
        fields.name, fields.city, fields.country
    ))
}
