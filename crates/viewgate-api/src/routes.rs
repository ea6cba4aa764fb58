//! Route table for the gateway API.

use actix_web::web;

use crate::handlers;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health::health))
            .route("/views", web::get().to(handlers::views::list_views))
            .route("/views/{id}", web::get().to(handlers::views::get_view))
            .route(
                "/views/{id}/query",
                web::post().to(handlers::execute::execute_view),
            )
            .route(
                "/views/{id}/query/stream",
                web::post().to(handlers::execute::execute_view_stream),
            ),
    );
}
