use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::analyzer::FoodAnalyzer;
use crate::config::MAX_IMAGE_BYTES;
use crate::error::VisionError;
use crate::services::ImagePreparer;

pub struct AppState {
    pub analyzer: Arc<FoodAnalyzer>,
    pub preparer: Arc<dyn ImagePreparer>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn create_router(analyzer: Arc<FoodAnalyzer>, preparer: Arc<dyn ImagePreparer>) -> Router {
    let state = Arc::new(AppState { analyzer, preparer });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/analyze", post(analyze_handler))
        // multipart framing overhead on top of the image cap
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
        .with_state(state)
}

/// `POST /api/analyze`: multipart form with an `image` file field and an
/// optional `description` text field. Returns the analysis result as JSON.
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut image_bytes: Option<Vec<u8>> = None;
    let mut content_type: Option<String> = None;
    let mut description: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or("").to_string();
                match name.as_str() {
                    "image" => {
                        content_type = field.content_type().map(|c| c.to_string());
                        match field.bytes().await {
                            Ok(bytes) => image_bytes = Some(bytes.to_vec()),
                            Err(e) => {
                                return error_response(
                                    StatusCode::BAD_REQUEST,
                                    format!("failed to read image field: {}", e),
                                )
                            }
                        }
                    }
                    "description" => match field.text().await {
                        Ok(text) => description = Some(text),
                        Err(e) => {
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                format!("failed to read description field: {}", e),
                            )
                        }
                    },
                    _ => {} // ignore unknown fields
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("multipart error: {}", e))
            }
        }
    }

    let Some(bytes) = image_bytes else {
        return error_response(StatusCode::BAD_REQUEST, "missing image field".to_string());
    };

    let image = match state.preparer.prepare(bytes, content_type.as_deref()).await {
        Ok(image) => image,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.analyzer.analyze(&image, description.as_deref()).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => {
            log::error!("❌ Analysis request failed: {}", err);
            // Spent retry budget reads as "try again later"; a provider
            // rejection as a bad upstream response.
            let status = match &err {
                VisionError::Exhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            error_response(status, err.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

async fn root_handler() -> &'static str {
    "mealvision food analysis service - POST /api/analyze with an image"
}

async fn health_check() -> &'static str {
    "OK"
}
