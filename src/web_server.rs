use actix_web::{web, App, HttpResponse, HttpServer};
use serde::Deserialize;
use std::sync::Arc;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::extraction::DocumentExtractor;
use crate::processor;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    #[serde(default)]
    base64_image: Option<serde_json::Value>,
}

async fn process_receipt(
    extractor: web::Data<Arc<dyn DocumentExtractor>>,
    body: web::Json<ProcessRequest>,
) -> Result<HttpResponse, AppError> {
    let image = match body.into_inner().base64_image {
        Some(serde_json::Value::String(image)) if !image.is_empty() => image,
        _ => {
            log::debug!("Rejecting request without base64Image");
            return Err(AppError::MissingImage);
        }
    };

    match processor::process_receipt(extractor.get_ref().as_ref(), &image).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => {
            log::error!("Error: {}", e);
            Err(e)
        }
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Registers the receipt routes; shared by the server and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig, max_body_bytes: usize) {
    let json_config = web::JsonConfig::default()
        .limit(max_body_bytes)
        .error_handler(|err, _req| {
            log::debug!("Rejecting malformed request body: {}", err);
            AppError::InvalidInput(err.to_string()).into()
        });

    cfg.app_data(json_config)
        .route("/health", web::get().to(health))
        .route("/api/receipts", web::post().to(process_receipt))
        .route("/", web::post().to(process_receipt));
}

pub async fn start_web_server(
    config: Arc<AppConfig>,
    extractor: Arc<dyn DocumentExtractor>,
) -> std::io::Result<()> {
    let port = config.web_port;
    let max_body_bytes = config.max_body_bytes;
    let extractor_data = web::Data::new(extractor);

    log::info!("Starting web server on {}:{}", config.bind_address, port);

    HttpServer::new(move || {
        App::new()
            .app_data(extractor_data.clone())
            .configure(|cfg| configure(cfg, max_body_bytes))
    })
    .bind((config.bind_address.as_str(), port))?
    .run()
    .await
}
