//! HTTP gateway: thin plumbing between multipart requests and the engine.

use crate::engine::{EngineError, EngineHandle};
use axum::extract::{Multipart, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use facegate_core::{CuratorError, RecognitionOutcome, RecognizeError, TrainError};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub struct AppState {
    pub engine: EngineHandle,
    pub request_timeout: Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/enroll", post(enroll))
        .route("/train", post(train))
        .route("/recognize", post(recognize))
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `name` + `image` fields of a multipart upload. Either may be absent;
/// the handlers decide what that means.
struct Upload {
    name: Option<String>,
    image: Option<Vec<u8>>,
}

async fn read_upload(mut multipart: Multipart, name_field: &str) -> Result<Upload, Response> {
    let mut upload = Upload {
        name: None,
        image: None,
    };
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(bad_request(&format!("malformed multipart body: {e}"))),
        };
        match field.name() {
            Some(n) if n == name_field => match field.text().await {
                Ok(text) => upload.name = Some(text),
                Err(e) => return Err(bad_request(&format!("unreadable {name_field}: {e}"))),
            },
            Some("image") => match field.bytes().await {
                Ok(bytes) => upload.image = Some(bytes.to_vec()),
                Err(e) => return Err(bad_request(&format!("unreadable image: {e}"))),
            },
            _ => {}
        }
    }
    Ok(upload)
}

async fn enroll(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart, "name").await {
        Ok(upload) => upload,
        Err(resp) => return resp,
    };
    let (Some(name), Some(image)) = (upload.name, upload.image) else {
        return bad_request("name and image are required");
    };

    match with_timeout(state.request_timeout, state.engine.enroll(name, image)).await {
        Ok(Ok(curated)) => Json(serde_json::json!({
            "message": "image stored",
            "count": curated.count,
            "path": curated.remote_path,
            "mirrored": curated.mirrored,
        }))
        .into_response(),
        Ok(Err(e)) => engine_error(e),
        Err(resp) => resp,
    }
}

#[derive(Deserialize)]
struct TrainRequest {
    user_name: String,
}

async fn train(State(state): State<Arc<AppState>>, Json(req): Json<TrainRequest>) -> Response {
    match with_timeout(state.request_timeout, state.engine.train(req.user_name)).await {
        Ok(Ok(trained)) => Json(serde_json::json!({
            "status": "success",
            "model_path": trained.remote_path,
            "samples": trained.samples,
        }))
        .into_response(),
        // Expected training failures are results, not faults.
        Ok(Err(EngineError::Train(e @ (TrainError::NoDataset | TrainError::NoFaces)))) => {
            Json(serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            }))
            .into_response()
        }
        Ok(Err(e)) => engine_error(e),
        Err(resp) => resp,
    }
}

async fn recognize(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart, "username").await {
        Ok(upload) => upload,
        Err(resp) => return resp,
    };
    let (Some(name), Some(image)) = (upload.name, upload.image) else {
        return bad_request("username and image are required");
    };

    match with_timeout(state.request_timeout, state.engine.recognize(name, image)).await {
        Ok(Ok(outcome)) => outcome_response(outcome),
        Ok(Err(e)) => engine_error(e),
        Err(resp) => resp,
    }
}

fn outcome_response(outcome: RecognitionOutcome) -> Response {
    match outcome {
        RecognitionOutcome::Recognized {
            name,
            confidence,
            matcher,
        } => Json(serde_json::json!({
            "recognized_faces": [{
                "name": name,
                "confidence": confidence,
                "matcher": matcher,
            }],
        }))
        .into_response(),
        RecognitionOutcome::NoFaceDetected => {
            Json(serde_json::json!({"message": "no face detected"})).into_response()
        }
        RecognitionOutcome::NotRecognized => {
            Json(serde_json::json!({"message": "face not recognized"})).into_response()
        }
        RecognitionOutcome::ModelMissing => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "model not found"})),
        )
            .into_response(),
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = T>,
) -> Result<T, Response> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "operation timed out"})),
        )
            .into_response()
    })
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
        .into_response()
}

fn engine_error(e: EngineError) -> Response {
    let status = match &e {
        EngineError::Curator(CuratorError::MissingInput | CuratorError::InvalidImage(_))
        | EngineError::Train(TrainError::MissingInput)
        | EngineError::Recognize(RecognizeError::MissingInput | RecognizeError::InvalidImage(_)) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "request failed");
    }
    (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
}
