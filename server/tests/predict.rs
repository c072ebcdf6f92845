use std::{fs, path::PathBuf, sync::Arc};

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use ndarray::Array4;
use tower::ServiceExt;

use server::{AppState, error::PredictErr, predict::Scorer, routes::router};

const BOUNDARY: &str = "test-boundary-7f9a";

struct Fixed(f32);

impl Scorer for Fixed {
    fn score(&self, _: Array4<f32>) -> Result<f32, PredictErr> {
        Ok(self.0)
    }
}

struct Failing;

impl Scorer for Failing {
    fn score(&self, _: Array4<f32>) -> Result<f32, PredictErr> {
        Err(PredictErr::Inference(vision::VisionErr::ShapeMismatch {
            what: "dense input width",
            got: 4608,
            expected: 9216,
        }))
    }
}

struct Unreachable;

impl Scorer for Unreachable {
    fn score(&self, _: Array4<f32>) -> Result<f32, PredictErr> {
        panic!("the scorer must not run for rejected uploads");
    }
}

fn upload_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("server-uploads-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; \
             name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn predict_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(state: AppState, request: Request<Body>) -> serde_json::Value {
    let response = router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([90, 120, 30]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn dir_is_empty(dir: &PathBuf) -> bool {
    fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn index_serves_the_upload_page() {
    let dir = upload_dir("index");
    let state = AppState::new(None, &dir);

    let response = router(state)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("Classifier"));

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn missing_file_field_writes_nothing() {
    let dir = upload_dir("missing-field");
    let state = AppState::new(Some(Arc::new(Unreachable)), &dir);

    let body = multipart_body("other", "dog1.jpg", &png_bytes());
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["error"], "No file uploaded");
    assert!(dir_is_empty(&dir));

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn empty_filename_writes_nothing() {
    let dir = upload_dir("empty-name");
    let state = AppState::new(Some(Arc::new(Unreachable)), &dir);

    let body = multipart_body("file", "", &png_bytes());
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["error"], "No file selected");
    assert!(dir_is_empty(&dir));

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn disallowed_extension_skips_model_and_disk() {
    let dir = upload_dir("bad-ext");
    let state = AppState::new(Some(Arc::new(Unreachable)), &dir);

    let body = multipart_body("file", "notes.txt", b"just some text");
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["error"], "Invalid file type. Please upload an image.");
    assert!(dir_is_empty(&dir));

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn extension_check_ignores_case() {
    let dir = upload_dir("case");
    let state = AppState::new(Some(Arc::new(Fixed(0.87))), &dir);

    let body = multipart_body("file", "DOG1.JPG", &png_bytes());
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["result"], "Dog");

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn no_model_returns_the_degenerate_result() {
    let dir = upload_dir("no-model");
    let state = AppState::new(None, &dir);

    let body = multipart_body("file", "dog1.jpg", &png_bytes());
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["result"], "Model not loaded");
    assert_eq!(reply["confidence"], "0.00%");
    assert_eq!(reply["image_url"], "/uploads/dog1.jpg");
    // The upload itself is still persisted.
    assert!(dir.join("dog1.jpg").exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn high_score_reads_as_dog() {
    let dir = upload_dir("dog");
    let state = AppState::new(Some(Arc::new(Fixed(0.87))), &dir);

    let body = multipart_body("file", "dog1.jpg", &png_bytes());
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["result"], "Dog");
    assert_eq!(reply["confidence"], "87.00%");
    assert_eq!(reply["image_url"], "/uploads/dog1.jpg");

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn low_score_reads_as_cat() {
    let dir = upload_dir("cat");
    let state = AppState::new(Some(Arc::new(Fixed(0.10))), &dir);

    let body = multipart_body("file", "cat1.png", &png_bytes());
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["result"], "Cat");
    assert_eq!(reply["confidence"], "90.00%");

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn scorer_failures_collapse_to_the_error_label() {
    let dir = upload_dir("failing");
    let state = AppState::new(Some(Arc::new(Failing)), &dir);

    let body = multipart_body("file", "dog1.jpg", &png_bytes());
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["result"], "Error");
    assert_eq!(reply["confidence"], "0.00%");

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn traversal_filenames_are_stored_sanitized() {
    let dir = upload_dir("traversal");
    let state = AppState::new(None, &dir);

    let body = multipart_body("file", "../../escape.png", &png_bytes());
    let reply = send(state, predict_request(body)).await;

    assert_eq!(reply["image_url"], "/uploads/escape.png");
    assert!(dir.join("escape.png").exists());

    fs::remove_dir_all(&dir).unwrap();
}
