pub mod error;
pub mod predict;
pub mod routes;
pub mod state;
pub mod upload;

pub use error::PredictErr;
pub use state::AppState;
