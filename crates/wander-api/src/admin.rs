use axum::{Extension, extract::State};
use serde_json::{Value, json};

use wander_types::api::StatsResponse;

use crate::error::ApiError;
use crate::extract::Json;
use crate::middleware::Viewer;
use crate::state::{AppState, run_db};

pub async fn stats(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<StatsResponse>, ApiError> {
    viewer.admin()?;

    let counts = run_db(&state, |db| db.table_counts()).await?;
    Ok(Json(StatsResponse {
        users: counts.users,
        destinations: counts.destinations,
        itineraries: counts.itineraries,
        reviews: counts.reviews,
        wishlists: counts.wishlists,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
