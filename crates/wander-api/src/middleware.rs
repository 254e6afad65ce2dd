use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;
use uuid::Uuid;

use wander_types::api::Claims;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

pub const TOKEN_COOKIE: &str = "token";

/// Who is calling. Anonymous requests carry `Viewer(None)`.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Claims>);

impl Viewer {
    /// Claims of a signed-in caller, or 401.
    pub fn claims(&self) -> Result<&Claims, ApiError> {
        self.0.as_ref().ok_or(ApiError::Unauthorized("authentication required"))
    }

    /// Claims of an admin caller; 401 when anonymous, 403 otherwise.
    pub fn admin(&self) -> Result<&Claims, ApiError> {
        let claims = self.claims()?;
        if !claims.is_admin() {
            return Err(ApiError::Forbidden("admin role required"));
        }
        Ok(claims)
    }

    /// Claims of the owner of a record or an admin.
    pub fn owner_or_admin(&self, owner_id: Uuid) -> Result<&Claims, ApiError> {
        let claims = self.claims()?;
        if !claims.can_act_for(owner_id) {
            return Err(ApiError::Forbidden("not allowed to modify this resource"));
        }
        Ok(claims)
    }
}

/// Decode the session token from the Authorization header or the `token`
/// cookie and attach a [`Viewer`]. A token that is present but invalid, or
/// whose account has been deleted, is rejected outright instead of silently
/// downgrading to anonymous.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.strip_prefix("Bearer ")
                .map(str::to_string)
                .ok_or(ApiError::Unauthorized("malformed authorization header"))
        })
        .transpose()?;

    let token = bearer.or_else(|| {
        CookieJar::from_headers(req.headers())
            .get(TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    });

    let viewer = match token {
        Some(token) => {
            let claims = decode_token(&state.jwt_secret, &token)?;
            let id = claims.sub.to_string();
            if run_db(&state, move |db| db.get_user_by_id(&id)).await?.is_none() {
                return Err(ApiError::Unauthorized("account no longer exists"));
            }
            debug!("Authenticated {} as {}", claims.sub, claims.role);
            Viewer(Some(claims))
        }
        None => Viewer(None),
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("invalid or expired token"))?;

    Ok(token_data.claims)
}
