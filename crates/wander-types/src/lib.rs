//! Wire types shared by the Wander API and database crates.

pub mod api;
pub mod models;
pub mod query;
