use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, warn};
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::{error::PredictErr, predict, state::AppState, upload};
use vision::dataset::has_image_extension;

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

const NO_FILE: &str = "No file uploaded";
const NO_FILE_SELECTED: &str = "No file selected";
const INVALID_TYPE: &str = "Invalid file type. Please upload an image.";

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Builds the service router: the upload page, the prediction endpoint and
/// the stored-upload file tree.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_handler))
        .nest_service("/uploads", ServeDir::new(state.upload_dir.clone()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

#[derive(Debug, Serialize)]
struct ResultBody {
    result: String,
    confidence: String,
    image_url: String,
}

fn validation_error(error: &'static str) -> Response {
    Json(ErrorBody { error }).into_response()
}

fn prediction_response(result: &str, confidence: f32, image_url: String) -> Response {
    Json(ResultBody {
        result: result.to_string(),
        confidence: format!("{confidence:.2}%"),
        image_url,
    })
    .into_response()
}

/// `POST /predict`: validate the multipart upload, persist it, then score
/// it. Validation failures answer with a structured error before any model
/// or filesystem work; scoring failures keep the documented result labels
/// but log the tagged cause.
async fn predict_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file: Option<(String, Bytes)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(data) => {
                        file = Some((filename, data));
                        break;
                    }
                    Err(e) => {
                        warn!("failed to read upload field: {e}");
                        return validation_error(NO_FILE);
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                warn!("malformed multipart request: {e}");
                return validation_error(NO_FILE);
            }
        }
    }

    let Some((filename, data)) = file else {
        return validation_error(NO_FILE);
    };
    if filename.is_empty() {
        return validation_error(NO_FILE_SELECTED);
    }
    if !has_image_extension(&filename) {
        return validation_error(INVALID_TYPE);
    }

    let stored = match upload::save_upload(&state.upload_dir, &filename, &data).await {
        Ok(path) => path,
        Err(e) => {
            let err = PredictErr::Upload(e);
            error!("{err}");
            return prediction_response(err.label(), 0.0, String::new());
        }
    };
    let image_url = format!(
        "/uploads/{}",
        stored
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    match &state.scorer {
        None => {
            let err = PredictErr::ModelUnavailable;
            warn!("{err}");
            prediction_response(err.label(), 0.0, image_url)
        }
        Some(scorer) => match predict::classify(scorer.as_ref(), &data) {
            Ok(prediction) => prediction_response(
                &prediction.label.to_string(),
                prediction.confidence,
                image_url,
            ),
            Err(err) => {
                error!("prediction failed: {err}");
                prediction_response(err.label(), 0.0, image_url)
            }
        },
    }
}
