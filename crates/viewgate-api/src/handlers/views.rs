// Catalog browsing passthrough over the view store
use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::Deserialize;
use viewgate_commons::GatewayError;

use crate::models::{error_response, ViewSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListViewsQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "catalogId")]
    pub catalog_id: Option<String>,
}

/// Handler for `GET /api/v1/views`.
pub async fn list_views(
    query: web::Query<ListViewsQuery>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state
        .store
        .list_by_filter(query.user_id.as_deref(), query.catalog_id.as_deref())
        .await
    {
        Ok(views) => {
            let summaries: Vec<ViewSummary> = views.into_iter().map(ViewSummary::from).collect();
            HttpResponse::Ok().json(summaries)
        }
        Err(err) => {
            error!("view listing failed: {}", err);
            error_response(&err)
        }
    }
}

/// Handler for `GET /api/v1/views/{id}`.
pub async fn get_view(path: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    let id = path.into_inner();
    match state.store.get_stored_query(&id).await {
        Ok(Some(view)) => HttpResponse::Ok().json(ViewSummary::from(view)),
        Ok(None) => error_response(&GatewayError::not_found(format!("stored query '{}'", id))),
        Err(err) => {
            error!("view lookup for '{}' failed: {}", id, err);
            error_response(&err)
        }
    }
}
