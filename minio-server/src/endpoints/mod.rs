//! HTTP endpoint handlers of the object API.
//!
//! Use [`routes`] to create a router with all endpoints.

use axum::Router;

use crate::state::ServiceState;

pub mod health;
mod objects;

/// Creates the router of the object API.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .merge(health::router())
        .merge(objects::router())
}
