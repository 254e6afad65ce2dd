use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::authenticate;
use crate::state::AppState;
use crate::{admin, auth, destinations, itineraries, reviews, users, wishlists};

/// Full HTTP surface. Every request passes through [`authenticate`], so
/// handlers decide for themselves whether a caller is required.
pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/verify-email", post(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/", get(users::list_users))
        .route(
            "/{user_id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        );

    let destination_routes = Router::new()
        .route(
            "/",
            get(destinations::list_destinations).post(destinations::create_destination),
        )
        .route(
            "/{destination_id}",
            get(destinations::get_destination)
                .put(destinations::update_destination)
                .delete(destinations::delete_destination),
        )
        .route(
            "/{destination_id}/reviews",
            get(destinations::list_destination_reviews),
        );

    let review_routes = Router::new()
        .route("/", get(reviews::list_reviews).post(reviews::create_review))
        .route(
            "/{review_id}",
            get(reviews::get_review)
                .put(reviews::update_review)
                .delete(reviews::delete_review),
        );

    let itinerary_routes = Router::new()
        .route(
            "/",
            get(itineraries::list_itineraries).post(itineraries::create_itinerary),
        )
        .route("/public", get(itineraries::list_public_itineraries))
        .route(
            "/{itinerary_id}",
            get(itineraries::get_itinerary)
                .put(itineraries::update_itinerary)
                .delete(itineraries::delete_itinerary),
        )
        .route("/{itinerary_id}/destinations", post(itineraries::add_stop))
        .route(
            "/{itinerary_id}/destinations/{destination_id}",
            delete(itineraries::remove_stop),
        );

    let wishlist_routes = Router::new()
        .route(
            "/",
            get(wishlists::list_wishlists).post(wishlists::create_wishlist),
        )
        .route(
            "/{wishlist_id}",
            get(wishlists::get_wishlist)
                .put(wishlists::rename_wishlist)
                .delete(wishlists::delete_wishlist),
        )
        .route("/{wishlist_id}/destinations", post(wishlists::add_destination))
        .route(
            "/{wishlist_id}/destinations/{destination_id}",
            delete(wishlists::remove_destination),
        );

    let api = Router::new()
        .nest("/users", user_routes)
        .nest("/destinations", destination_routes)
        .nest("/reviews", review_routes)
        .nest("/itineraries", itinerary_routes)
        .nest("/wishlists", wishlist_routes)
        .route("/admin/stats", get(admin::stats));

    Router::new()
        .nest("/api", api)
        .route("/health", get(admin::health))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
