use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, User};
use crate::query::Pagination;

// -- JWT Claims --

/// Claims carried by every session token, whether sent as a bearer header
/// or as the `token` cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on any record; everybody else only on their own.
    pub fn can_act_for(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.sub == owner_id
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

// -- Destinations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDestinationRequest {
    pub name: String,
    pub country: String,
    pub city: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDestinationRequest {
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Option<Vec<String>>,
}

// -- Itineraries --

/// A destination the client wants placed on a given day.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopInput {
    pub destination_id: Uuid,
    pub day: u32,
    pub order_index: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateItineraryRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub destinations: Vec<StopInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItineraryRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_public: Option<bool>,
    /// When present, replaces the whole destination list.
    pub destinations: Option<Vec<StopInput>>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveStopQuery {
    pub day: Option<u32>,
}

// -- Reviews --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReviewRequest {
    pub destination_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateReviewRequest {
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

// -- Wishlists --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WishlistRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddWishlistDestinationRequest {
    pub destination_id: Uuid,
}

// -- Listing --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, window: Pagination, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(window.limit)) as u32;
        Self {
            data,
            pagination: PaginationMeta {
                page: window.page,
                limit: window.limit,
                total,
                total_pages,
            },
        }
    }
}

// -- Admin --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub users: u64,
    pub destinations: u64,
    pub itineraries: u64,
    pub reviews: u64,
    pub wishlists: u64,
}
