use actix_web::{HttpResponse, web};
use cookware_analyzer::{Analyzer, ApiError};
use log::error;
use shared::ErrorResponse;
use std::sync::Arc;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/analyze").route(web::post().to(handle_analyze)))
        .service(web::resource("/api/health").route(web::get().to(health_check)));
}

fn error_response(err: &ApiError) -> HttpResponse {
    let (mut builder, status_code) = match err {
        ApiError::Validation(_) => (HttpResponse::BadRequest(), 400),
        ApiError::PayloadTooLarge { .. } => (HttpResponse::PayloadTooLarge(), 413),
        ApiError::Internal(_) => (HttpResponse::InternalServerError(), 500),
    };
    builder.json(ErrorResponse {
        error: err.to_string(),
        message: "Analysis failed".into(),
        status_code,
    })
}

async fn read_body(payload: web::Payload, limit: usize) -> Result<web::Bytes, ApiError> {
    match payload.to_bytes_limited(limit).await {
        Ok(Ok(body)) => Ok(body),
        Ok(Err(e)) => Err(ApiError::Validation(format!("Failed to read request body: {}", e))),
        Err(_) => Err(ApiError::PayloadTooLarge { limit }),
    }
}

async fn handle_analyze(analyzer: web::Data<Arc<Analyzer>>, payload: web::Payload) -> HttpResponse {
    let analyzer = analyzer.get_ref().clone();
    let result = match read_body(payload, analyzer.max_body_bytes()).await {
        Ok(body) => web::block(move || analyzer.handle(&body))
            .await
            .unwrap_or_else(|e| Err(ApiError::Internal(e.to_string()))),
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => {
            match &e {
                ApiError::Validation(_) | ApiError::PayloadTooLarge { .. } => {
                    log::info!("Rejected analyze request: {}", e)
                }
                ApiError::Internal(msg) => error!("Analyze request failed: {}", msg),
            }
            error_response(&e)
        }
    }
}

async fn health_check(analyzer: web::Data<Arc<Analyzer>>) -> HttpResponse {
    HttpResponse::Ok().json(analyzer.health())
}
