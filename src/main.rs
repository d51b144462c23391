use actix_web::{web, App, HttpServer};
use log::{info, warn};
use log4rs;
use std::sync::Arc;

use gallery_vault::app_state::AppState;
use gallery_vault::service::cleanup_worker::CleanupWorker;
use gallery_vault::service::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let app_state = AppState::new().unwrap_or_else(|e| {
        eprintln!("Failed to initialize application state: {}", e);
        std::process::exit(1);
    });

    if log4rs::init_file(&app_state.config.logging.config_file, Default::default()).is_err() {
        env_logger::init();
        warn!(
            "Log config {} not found, falling back to env_logger",
            app_state.config.logging.config_file
        );
    }

    if app_state.config.cleanup.enabled {
        let worker = CleanupWorker::new(
            Arc::clone(&app_state.consistency_service),
            app_state.config.cleanup.interval_secs,
        );
        worker.start_background();
    }

    let host = app_state.config.server.host.clone();
    let port = app_state.config.server.port;
    let workers = app_state.config.server.workers;
    let max_payload = app_state.config.server.max_payload_size as usize;
    info!("Starting server on {}:{}", host, port);

    let data = web::Data::new(app_state);
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(web::PayloadConfig::default().limit(max_payload))
            .app_data(data.clone())
            .configure(routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
