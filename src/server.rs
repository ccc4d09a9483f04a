use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::DynamicImage;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::detector::FaceDetector;
use crate::error::Error;
use crate::metric::Metric;
use crate::service;
use crate::store::FaceStore;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FaceStore>,
    pub detector: Arc<dyn FaceDetector>,
    pub metric: Metric,
    pub threshold: f32,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecognizeRequest {
    image: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register_face", post(register_face))
        .route("/recognize_faces", post(recognize_faces))
        .route("/get_persons", get(get_persons))
        .with_state(state)
}

/// Binds `listen` and serves the API until shutdown.
pub async fn serve(listen: &str, state: AppState) -> Result<()> {
    let app = router(state).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn register_face(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let (name, image) = match (body.name.as_deref(), body.image.as_deref()) {
        (Some(name), Some(image)) if !name.is_empty() && !image.is_empty() => (name, image),
        _ => return error_json(StatusCode::BAD_REQUEST, "Name and image are required"),
    };

    let img = match decode_image(image) {
        Ok(img) => img,
        Err(e) => {
            warn!("register: {e}");
            return error_json(StatusCode::BAD_REQUEST, "Invalid image data");
        }
    };

    match service::register_face(&state.store, state.detector.as_ref(), name, &img).await {
        Ok(record) => (
            StatusCode::OK,
            Json(json!({ "success": true, "name": record.name })),
        )
            .into_response(),
        Err(Error::NoFaceDetected) => {
            error_json(StatusCode::BAD_REQUEST, "No face detected in the image")
        }
        Err(Error::Validation(msg)) => error_json(StatusCode::BAD_REQUEST, msg),
        Err(e) => {
            error!("register failed: {e}");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn recognize_faces(
    State(state): State<AppState>,
    Json(body): Json<RecognizeRequest>,
) -> Response {
    let image = match body.image.as_deref() {
        Some(image) if !image.is_empty() => image,
        _ => return error_json(StatusCode::BAD_REQUEST, "Image is required"),
    };

    let img = match decode_image(image) {
        Ok(img) => img,
        Err(e) => {
            warn!("recognize: {e}");
            return error_json(StatusCode::BAD_REQUEST, "Invalid image data");
        }
    };

    let detections = match state.detector.represent(&img).await {
        Ok(detections) => detections,
        Err(Error::NoFaceDetected) => {
            return error_json(StatusCode::BAD_REQUEST, "No faces found in the image")
        }
        Err(e) => {
            error!("recognize failed: {e}");
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, "Face recognition failed");
        }
    };

    let registry = match state.store.all() {
        Ok(registry) => registry,
        Err(e) => {
            error!("recognize failed: {e}");
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, "Face recognition failed");
        }
    };

    match service::recognize_faces(&detections, &registry, state.metric, state.threshold) {
        Ok(faces) => (
            StatusCode::OK,
            Json(json!({
                "faces": faces,
                "image_width": img.width(),
                "image_height": img.height(),
            })),
        )
            .into_response(),
        Err(Error::EmptyRegistry) => {
            error_json(StatusCode::NOT_FOUND, "No known faces in the database")
        }
        Err(e) => {
            // Internal detail stays out of the response on this path.
            error!("recognize failed: {e}");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Face recognition failed")
        }
    }
}

async fn get_persons(State(state): State<AppState>) -> Response {
    match state.store.persons() {
        Ok(persons) => (StatusCode::OK, Json(persons)).into_response(),
        Err(e) => {
            error!("listing persons failed: {e}");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list persons")
        }
    }
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Decodes a base64 transport image, tolerating a `data:image/...;base64,`
/// prefix, into pixels.
pub fn decode_image(data: &str) -> crate::Result<DynamicImage> {
    let data = match data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:image") => rest,
        _ => data,
    };
    let bytes = BASE64
        .decode(data)
        .map_err(|e| Error::ImageDecode(e.to_string()))?;
    image::load_from_memory(&bytes).map_err(|e| Error::ImageDecode(e.to_string()))
}
