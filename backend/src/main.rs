mod routes;

use actix_web::{App, HttpServer, web};
use cookware_analyzer::{Analyzer, AnalyzerConfig};
use routes::configure_routes;
use std::env;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AnalyzerConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let analyzer = Arc::new(Analyzer::from_config(&config));
    let preload = analyzer.clone();
    let ready = web::block(move || preload.warm_up())
        .await
        .unwrap_or(false);
    if ready {
        log::info!("Model preloaded at startup");
    } else {
        log::warn!("No model available at startup, analyses will use demo mode");
    }

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!(
        "Starting server on {} (deployment: {})",
        bind_address,
        config.deployment
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(analyzer.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
