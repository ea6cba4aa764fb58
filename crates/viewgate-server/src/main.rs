// viewgate server
//
// Main server binary: wires the view store, the SQL guard, the execution
// core and the HTTP surface together.

mod logging;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Result;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use viewgate_api::{configure_routes, AppState};
use viewgate_commons::{InMemoryViewStore, StoredQuery};
use viewgate_configs::GatewayConfig;
use viewgate_engine::{
    AdmissionController, BreakerRegistry, EngineAuthenticator, EnginePool, FlightConnector,
    QueryGateway, ENGINE_DEPENDENCY,
};
use viewgate_sql::{ParameterEngine, QueryBuilder, SqlValidator, ValidatorConfig};

#[actix_web::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = match GatewayConfig::from_file("config.toml") {
        Ok(cfg) => cfg,
        Err(_) => {
            eprintln!("Warning: config.toml not found, using defaults");
            GatewayConfig::default()
        }
    };

    logging::init_logging(&config.logging.level)?;

    info!("Starting viewgate server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Engine endpoint: {}, auth endpoint: {}",
        config.engine.endpoint, config.engine.auth_base
    );

    // View store (in-memory; definitions optionally loaded from a file)
    let store = Arc::new(InMemoryViewStore::new());
    if let Some(path) = &config.store.views_path {
        let count = load_views(store.as_ref(), path)?;
        info!("Loaded {} view definition(s) from {}", count, path);
    }

    // SQL guard
    let validator = Arc::new(SqlValidator::new(&ValidatorConfig {
        non_ascii_pattern: config.validator.non_ascii_pattern.clone(),
        reject_comments: config.validator.reject_comments,
    })?);
    let builder = QueryBuilder::new(validator.clone(), config.limits.default_limit)?;
    let params = ParameterEngine::new(validator.clone())?;

    // Execution core
    let admission = Arc::new(AdmissionController::new(&config.admission));
    let breakers = Arc::new(BreakerRegistry::new(&[ENGINE_DEPENDENCY], &config.breaker));
    let pool = Arc::new(EnginePool::new(
        Arc::new(FlightConnector::new(&config.engine)),
        &config.pool,
    ));
    let tokens = Arc::new(EngineAuthenticator::new(&config.engine)?);

    let gateway = Arc::new(QueryGateway::new(
        store.clone(),
        validator,
        builder,
        params,
        admission.clone(),
        breakers,
        pool.clone(),
        tokens,
        &config.limits,
    ));
    info!("Query gateway initialized");

    // Periodic maintenance: idle-handle retirement and stale-slot recovery
    {
        let pool = pool.clone();
        let admission = admission.clone();
        let interval = Duration::from_secs(config.limits.sweep_interval_seconds.max(1));
        actix_web::rt::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                pool.sweep_idle();
                admission.sweep_stale();
            }
        });
    }

    let state = web::Data::new(AppState {
        gateway,
        store,
        pool,
        admission,
        request_timeout: Duration::from_secs(config.engine.request_timeout_seconds),
    });

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(&bind_addr)?
    .workers(if config.server.workers == 0 {
        num_cpus::get()
    } else {
        config.server.workers
    })
    .run()
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn load_views(store: &InMemoryViewStore, path: &str) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read views file {}: {}", path, e))?;
    let views: Vec<StoredQuery> = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse views file {}: {}", path, e))?;
    let count = views.len();
    for view in views {
        store.register(view);
    }
    Ok(count)
}
