//! viewgate-api
//!
//! Thin HTTP routing layer over the query execution gateway: request and
//! response models, handlers for buffered and streamed execution, catalog
//! browsing passthrough and health introspection, and the mapping from the
//! gateway error taxonomy to transport status codes.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

pub use routes::configure_routes;
pub use state::AppState;
