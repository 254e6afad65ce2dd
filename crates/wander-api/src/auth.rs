use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use wander_types::api::{
    AuthResponse, Claims, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, VerifyEmailRequest,
};
use wander_types::models::{Role, User};

use crate::convert;
use crate::error::ApiError;
use crate::extract::Json;
use crate::middleware::{TOKEN_COOKIE, Viewer};
use crate::state::{AppState, run_db};
use crate::validate::{check_password, masked_email, normalize_email, required_text};

/// Reset tokens are valid for one hour.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    let name = required_text("name", &req.name, 100)?;
    check_password(&req.password)?;

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let verification_token = random_token();

    let row = run_db(&state, {
        let email = email.clone();
        let verification_token = verification_token.clone();
        move |db| {
            if db.get_user_by_email(&email)?.is_some() {
                return Ok(None);
            }
            let id = user_id.to_string();
            db.create_user(
                &id,
                &email,
                &name,
                &password_hash,
                Role::User.as_str(),
                Some(&verification_token),
            )?;
            db.get_user_by_id(&id)
        }
    })
    .await?
    .ok_or_else(|| ApiError::conflict("email is already registered"))?;

    info!("Registered user {} ({})", user_id, masked_email(&email));
    // Mail delivery lives outside this service; operators read the token here.
    debug!("Verification token for {}: {}", user_id, verification_token);

    let user = convert::user(row);
    let token = create_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(&state, token.clone())),
        Json(AuthResponse { user, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let lookup = email.clone();
    let row = run_db(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .ok_or(ApiError::Unauthorized("invalid email or password"))?;

    if !verify_password(&req.password, &row.password_hash)? {
        warn!("Failed login for {}", masked_email(&email));
        return Err(ApiError::Unauthorized("invalid email or password"));
    }

    let user = convert::user(row);
    let token = create_token(&state, &user)?;
    info!("User {} logged in", user.id);

    Ok((
        jar.add(session_cookie(&state, token.clone())),
        Json(AuthResponse { user, token }),
    ))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        jar.remove(Cookie::build(TOKEN_COOKIE).path("/")),
    )
}

pub async fn me(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<User>, ApiError> {
    let id = viewer.claims()?.sub.to_string();
    let row = run_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(convert::user(row)))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = req.token.trim().to_string();
    if token.is_empty() {
        return Err(ApiError::validation("token is required"));
    }

    let verified = run_db(&state, move |db| db.verify_email(&token)).await?;
    if !verified {
        return Err(ApiError::validation("verification token is invalid"));
    }

    Ok(Json(serde_json::json!({ "verified": true })))
}

/// Always answers 202 so the endpoint cannot be used to probe for accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Ok(email) = normalize_email(&req.email) else {
        return Ok(StatusCode::ACCEPTED);
    };

    let token = random_token();
    let digest = token_digest(&token);
    let user_id = run_db(&state, move |db| {
        let Some(user) = db.get_user_by_email(&email)? else {
            return Ok(None);
        };
        db.set_reset_token(&user.id, &digest, RESET_TOKEN_TTL_MINUTES)?;
        Ok(Some(user.id))
    })
    .await?;

    if let Some(user_id) = user_id {
        info!("Issued password reset token for user {}", user_id);
        debug!("Reset token for {}: {}", user_id, token);
    }

    Ok(StatusCode::ACCEPTED)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_password(&req.password)?;
    let digest = token_digest(req.token.trim());
    let password_hash = hash_password(&req.password)?;

    let reset = run_db(&state, move |db| db.reset_password(&digest, &password_hash)).await?;
    if !reset {
        return Err(ApiError::validation("reset token is invalid or expired"));
    }

    Ok(Json(serde_json::json!({ "reset": true })))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash is unreadable: {}", e)))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

pub fn create_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(token)
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.cookie_secure)
        .build()
}

/// 256 bits of randomness, URL-safe.
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Only digests of reset tokens are stored.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
