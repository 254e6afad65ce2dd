/// Database row types — these map directly to SQLite rows.
/// Distinct from wander-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Column changes for an account. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<String>,
}

pub struct DestinationRow {
    pub id: String,
    pub name: String,
    pub country: String,
    pub city: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Vec<String>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Full set of writable destination columns.
#[derive(Debug, Clone)]
pub struct DestinationFields {
    pub name: String,
    pub country: String,
    pub city: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Vec<String>,
}

pub struct ItineraryRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub is_public: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Writable itinerary columns. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone)]
pub struct ItineraryFields {
    pub title: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub is_public: bool,
}

/// An `itinerary_destinations` row joined with its destination.
pub struct StopRow {
    pub destination_id: String,
    pub destination_name: String,
    pub city: String,
    pub country: String,
    pub day: u32,
    pub order_index: u32,
    pub notes: Option<String>,
}

/// A stop ready to be written: ordering already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct StopFields {
    pub destination_id: String,
    pub day: u32,
    pub order_index: u32,
    pub notes: Option<String>,
}

pub struct ReviewRow {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub destination_id: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct WishlistRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub destination_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCounts {
    pub users: u64,
    pub destinations: u64,
    pub itineraries: u64,
    pub reviews: u64,
    pub wishlists: u64,
}
