//! # viewgate-commons
//!
//! Shared types for the viewgate query gateway.
//!
//! This crate provides the foundational types used across all viewgate crates
//! (viewgate-sql, viewgate-engine, viewgate-api): the stored-view data model,
//! the gateway-wide error taxonomy, and the narrow trait through which the
//! document store holding view metadata is consumed.

pub mod errors;
pub mod models;
pub mod store;

pub use errors::{GatewayError, Result};
pub use models::{
    FilterClause, JoinOp, ParameterType, QueryOptions, StoredQuery, ViewField, ViewParameter,
};
pub use store::{InMemoryViewStore, ViewStore};
