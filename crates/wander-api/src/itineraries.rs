use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;
use uuid::Uuid;

use wander_db::models::{ItineraryFields, ItineraryRow, StopRow};
use wander_db::queries::ItineraryScope;
use wander_types::api::{
    CreateItineraryRequest, Paginated, RemoveStopQuery, StopInput, UpdateItineraryRequest,
};
use wander_types::models::{Itinerary, ItineraryDetail};
use wander_types::query::{ItineraryQuery, PageQuery};

use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::Viewer;
use crate::planning::{MAX_NOTES_CHARS, check_day, plan_stops, referenced_destinations, trip_days};
use crate::state::{AppState, run_db};
use crate::validate::{optional_text, required_text};

const MAX_TITLE_CHARS: usize = 200;
const MAX_DESCRIPTION_CHARS: usize = 5000;

/// Caller's itineraries; admins see everybody's and may narrow by `user_id`.
pub async fn list_itineraries(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<ItineraryQuery>,
) -> Result<Json<Paginated<Itinerary>>, ApiError> {
    let claims = viewer.claims()?;
    let owner = if claims.is_admin() {
        query.user_id.map(|id| id.to_string())
    } else {
        Some(claims.sub.to_string())
    };

    let window = query.pagination();
    let (rows, total) = run_db(&state, move |db| {
        let scope = match &owner {
            Some(owner) => ItineraryScope::Owner(owner.as_str()),
            None => ItineraryScope::All,
        };
        db.list_itineraries(scope, window)
    })
    .await?;

    let itineraries = rows.into_iter().map(convert::itinerary).collect();
    Ok(Json(Paginated::new(itineraries, window, total)))
}

pub async fn list_public_itineraries(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Itinerary>>, ApiError> {
    let window = page.pagination();
    let (rows, total) =
        run_db(&state, move |db| db.list_itineraries(ItineraryScope::Public, window)).await?;

    let itineraries = rows.into_iter().map(convert::itinerary).collect();
    Ok(Json(Paginated::new(itineraries, window, total)))
}

/// Private itineraries are reported as missing to everybody but the owner
/// and admins.
pub async fn get_itinerary(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(itinerary_id): Path<Uuid>,
) -> Result<Json<ItineraryDetail>, ApiError> {
    let (row, stops) = load_detail(&state, itinerary_id).await?;

    let owner = convert::parse_id(&row.user_id);
    let visible = row.is_public || viewer.0.as_ref().is_some_and(|c| c.can_act_for(owner));
    if !visible {
        return Err(ApiError::NotFound("itinerary"));
    }

    Ok(Json(detail(row, stops)))
}

pub async fn create_itinerary(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(req): Json<CreateItineraryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = viewer.claims()?;

    let fields = ItineraryFields {
        title: required_text("title", &req.title, MAX_TITLE_CHARS)?,
        description: optional_text("description", req.description, MAX_DESCRIPTION_CHARS)?,
        start_date: req.start_date.to_string(),
        end_date: req.end_date.to_string(),
        is_public: req.is_public,
    };
    let days = trip_days(req.start_date, req.end_date)?;
    let plan = plan_stops(req.destinations, days)?;

    let itinerary_id = Uuid::new_v4();
    let id = itinerary_id.to_string();
    let user_id = claims.sub.to_string();
    let stop_count = plan.len();
    run_db(&state, move |db| {
        if !db.missing_destinations(&referenced_destinations(&plan))?.is_empty() {
            return Ok(Err(ApiError::NotFound("destination")));
        }
        db.create_itinerary(&id, &user_id, &fields, &plan)?;
        Ok(Ok(()))
    })
    .await??;

    info!(
        "Itinerary {} created by {} with {} stops",
        itinerary_id, claims.sub, stop_count
    );

    let (row, stops) = load_detail(&state, itinerary_id).await?;
    Ok((StatusCode::CREATED, Json(detail(row, stops))))
}

pub async fn update_itinerary(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(itinerary_id): Path<Uuid>,
    Json(req): Json<UpdateItineraryRequest>,
) -> Result<Json<ItineraryDetail>, ApiError> {
    viewer.claims()?;
    let (current, current_stops) = load_detail(&state, itinerary_id).await?;
    viewer.owner_or_admin(convert::parse_id(&current.user_id))?;

    let start = req.start_date.unwrap_or_else(|| convert::parse_date(&current.start_date));
    let end = req.end_date.unwrap_or_else(|| convert::parse_date(&current.end_date));
    let days = trip_days(start, end)?;

    let fields = ItineraryFields {
        title: match req.title.as_deref() {
            Some(title) => required_text("title", title, MAX_TITLE_CHARS)?,
            None => current.title,
        },
        description: match req.description {
            Some(text) => optional_text("description", Some(text), MAX_DESCRIPTION_CHARS)?,
            None => current.description,
        },
        start_date: start.to_string(),
        end_date: end.to_string(),
        is_public: req.is_public.unwrap_or(current.is_public),
    };

    let plan = match req.destinations {
        Some(stops) => Some(plan_stops(stops, days)?),
        None => {
            if let Some(last) = current_stops.iter().map(|s| s.day).max() {
                if last > days {
                    return Err(ApiError::validation(format!(
                        "new dates leave stops on day {} outside the trip",
                        last
                    )));
                }
            }
            None
        }
    };

    let id = current.id;
    run_db(&state, move |db| {
        if let Some(plan) = &plan {
            if !db.missing_destinations(&referenced_destinations(plan))?.is_empty() {
                return Ok(Err(ApiError::NotFound("destination")));
            }
        }
        if !db.update_itinerary(&id, &fields, plan.as_deref())? {
            return Ok(Err(ApiError::NotFound("itinerary")));
        }
        Ok(Ok(()))
    })
    .await??;

    let (row, stops) = load_detail(&state, itinerary_id).await?;
    Ok(Json(detail(row, stops)))
}

pub async fn delete_itinerary(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(itinerary_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    viewer.claims()?;
    let (current, _) = load_detail(&state, itinerary_id).await?;
    let claims = viewer.owner_or_admin(convert::parse_id(&current.user_id))?;

    let id = current.id;
    if !run_db(&state, move |db| db.delete_itinerary(&id)).await? {
        return Err(ApiError::NotFound("itinerary"));
    }

    info!("Itinerary {} deleted by {}", itinerary_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

/// Places one destination on a day, shifting later stops of that day.
pub async fn add_stop(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(itinerary_id): Path<Uuid>,
    Json(stop): Json<StopInput>,
) -> Result<impl IntoResponse, ApiError> {
    viewer.claims()?;
    let (current, _) = load_detail(&state, itinerary_id).await?;
    viewer.owner_or_admin(convert::parse_id(&current.user_id))?;

    let days = trip_days(
        convert::parse_date(&current.start_date),
        convert::parse_date(&current.end_date),
    )?;
    check_day(stop.day, days)?;
    let notes = optional_text("notes", stop.notes, MAX_NOTES_CHARS)?;

    let id = current.id;
    let destination_id = stop.destination_id.to_string();
    let day = stop.day;
    let order_index = stop.order_index;
    run_db(&state, move |db| {
        if db.get_destination(&destination_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("destination")));
        }
        let stops = db.get_itinerary_stops(&id)?;
        if stops.iter().any(|s| s.destination_id == destination_id && s.day == day) {
            return Ok(Err(ApiError::conflict(format!(
                "destination is already on day {}",
                day
            ))));
        }
        db.insert_stop(&id, &destination_id, day, order_index, notes.as_deref())?;
        Ok(Ok(()))
    })
    .await??;

    let (row, stops) = load_detail(&state, itinerary_id).await?;
    Ok((StatusCode::CREATED, Json(detail(row, stops))))
}

/// Removes a stop. `day` may be omitted when the destination appears once.
pub async fn remove_stop(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((itinerary_id, destination_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<RemoveStopQuery>,
) -> Result<Json<ItineraryDetail>, ApiError> {
    viewer.claims()?;
    let (current, stops) = load_detail(&state, itinerary_id).await?;
    viewer.owner_or_admin(convert::parse_id(&current.user_id))?;

    let destination_id = destination_id.to_string();
    let days: Vec<u32> = stops
        .iter()
        .filter(|s| s.destination_id == destination_id)
        .filter(|s| query.day.is_none_or(|d| d == s.day))
        .map(|s| s.day)
        .collect();

    let day = match days.as_slice() {
        [] => return Err(ApiError::NotFound("stop")),
        [day] => *day,
        _ => {
            return Err(ApiError::validation(
                "destination appears on several days; pass ?day=",
            ));
        }
    };

    let id = current.id;
    if !run_db(&state, move |db| db.remove_stop(&id, &destination_id, day)).await? {
        return Err(ApiError::NotFound("stop"));
    }

    let (row, stops) = load_detail(&state, itinerary_id).await?;
    Ok(Json(detail(row, stops)))
}

async fn load_detail(
    state: &AppState,
    itinerary_id: Uuid,
) -> Result<(ItineraryRow, Vec<StopRow>), ApiError> {
    let id = itinerary_id.to_string();
    run_db(state, move |db| {
        let Some(row) = db.get_itinerary(&id)? else {
            return Ok(None);
        };
        let stops = db.get_itinerary_stops(&id)?;
        Ok(Some((row, stops)))
    })
    .await?
    .ok_or(ApiError::NotFound("itinerary"))
}

fn detail(row: ItineraryRow, stops: Vec<StopRow>) -> ItineraryDetail {
    ItineraryDetail {
        itinerary: convert::itinerary(row),
        destinations: stops.into_iter().map(convert::stop).collect(),
    }
}
