//! Request/response models and the error -> status mapping.

use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use viewgate_commons::{FilterClause, GatewayError, QueryOptions, StoredQuery, ViewField, ViewParameter};
use viewgate_engine::{AdmissionStats, PoolStats};

/// Body of `POST /views/{id}/query` and `/query/stream`.
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub filters: Vec<FilterClause>,

    #[serde(default)]
    pub limit: Option<u32>,

    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl ExecuteRequest {
    pub fn into_options(self) -> QueryOptions {
        QueryOptions {
            fields: self.fields,
            filters: self.filters,
            limit: self.limit,
            parameters: self.parameters,
        }
    }
}

/// Error body: stable error kind plus a human-readable message. The
/// rewritten SQL text is never echoed here.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            error: error_kind(err).to_string(),
            message: Some(err.to_string()),
        }
    }
}

fn error_kind(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::NotFound(_) => "Not found",
        GatewayError::SqlRejected(_) => "Query rejected",
        GatewayError::Parameter(_) => "Invalid parameter",
        GatewayError::AdmissionTimeout(_) => "Request timed out",
        GatewayError::Cancelled(_) => "Request timed out",
        GatewayError::CircuitOpen(_) => "Service unavailable",
        GatewayError::UpstreamCall(_) => "Query execution failed",
        GatewayError::Config(_) | GatewayError::Internal(_) => "Internal server error",
    }
}

/// Map a gateway error onto the transport status code.
pub fn error_response(err: &GatewayError) -> HttpResponse {
    let body = ErrorResponse::from_error(err);
    match err {
        GatewayError::NotFound(_) => HttpResponse::NotFound().json(body),
        GatewayError::SqlRejected(_) | GatewayError::Parameter(_) => {
            HttpResponse::BadRequest().json(body)
        }
        GatewayError::AdmissionTimeout(_) | GatewayError::Cancelled(_) => {
            HttpResponse::RequestTimeout().json(body)
        }
        GatewayError::CircuitOpen(_) => HttpResponse::ServiceUnavailable().json(body),
        GatewayError::UpstreamCall(_)
        | GatewayError::Config(_)
        | GatewayError::Internal(_) => HttpResponse::InternalServerError().json(body),
    }
}

/// Catalog view metadata. Deliberately excludes the base SQL text.
#[derive(Debug, Serialize)]
pub struct ViewSummary {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub fields: Vec<ViewField>,
    pub parameters: Vec<ViewParameter>,
    #[serde(rename = "ownerId", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(rename = "catalogId", skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
}

impl From<StoredQuery> for ViewSummary {
    fn from(query: StoredQuery) -> Self {
        Self {
            id: query.id,
            name: query.name,
            active: query.active,
            fields: query.fields,
            parameters: query.parameters,
            owner_id: query.owner_id,
            catalog_id: query.catalog_id,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub pool: PoolOccupancy,
    pub admission: AdmissionOccupancy,
}

#[derive(Debug, Serialize)]
pub struct PoolOccupancy {
    pub available: usize,
    pub total: usize,
}

impl From<PoolStats> for PoolOccupancy {
    fn from(stats: PoolStats) -> Self {
        Self {
            available: stats.available,
            total: stats.total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdmissionOccupancy {
    pub active: usize,
    #[serde(rename = "availableSlots")]
    pub available_slots: usize,
}

impl From<AdmissionStats> for AdmissionOccupancy {
    fn from(stats: AdmissionStats) -> Self {
        Self {
            active: stats.active,
            available_slots: stats.available_slots,
        }
    }
}
