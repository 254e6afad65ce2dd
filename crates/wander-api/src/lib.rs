pub mod admin;
pub mod auth;
pub mod convert;
pub mod destinations;
pub mod error;
pub mod extract;
pub mod itineraries;
pub mod middleware;
pub mod planning;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod users;
pub mod validate;
pub mod wishlists;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
