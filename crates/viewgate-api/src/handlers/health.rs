// Health and occupancy introspection
use actix_web::{web, HttpResponse, Responder};

use crate::models::HealthResponse;
use crate::state::AppState;

/// Handler for `GET /api/v1/health`.
///
/// Read-only counters for operational monitoring: pool occupancy
/// (available/total) and admission occupancy (active/availableSlots).
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    let response = HealthResponse {
        status: "ok".to_string(),
        pool: state.pool.occupancy().into(),
        admission: state.admission.occupancy().into(),
    };
    HttpResponse::Ok().json(response)
}
