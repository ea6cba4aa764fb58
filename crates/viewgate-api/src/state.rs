//! Shared application state for the HTTP handlers.

use std::sync::Arc;
use std::time::Duration;
use viewgate_commons::ViewStore;
use viewgate_engine::{AdmissionController, EnginePool, QueryGateway};

pub struct AppState {
    pub gateway: Arc<QueryGateway>,
    pub store: Arc<dyn ViewStore>,
    pub pool: Arc<EnginePool>,
    pub admission: Arc<AdmissionController>,
    /// Per-request execution deadline.
    pub request_timeout: Duration,
}
