use std::{env, io, path::PathBuf, sync::Arc};

use log::{info, warn};

use server::{
    AppState,
    predict::{CnnScorer, Scorer},
    routes,
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: &str = "7860";
const DEFAULT_MODEL_PATH: &str = "cat_dog_model.safetensors";
const DEFAULT_UPLOAD_DIR: &str = "static/uploads";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
    let model_path =
        PathBuf::from(env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string()));
    let upload_dir =
        PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string()));

    std::fs::create_dir_all(&upload_dir)?;

    // The model is read once here; a missing or broken artifact leaves the
    // service up, answering every request with the degenerate result.
    let scorer = match CnnScorer::load(&model_path) {
        Ok(scorer) => {
            info!("model loaded from {}", model_path.display());
            Some(Arc::new(scorer) as Arc<dyn Scorer>)
        }
        Err(e) => {
            warn!("model not loaded ({e}), serving without inference");
            None
        }
    };

    let state = AppState::new(scorer, upload_dir);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening at {addr}");

    axum::serve(listener, routes::router(state)).await
}
