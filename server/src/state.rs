use std::{path::PathBuf, sync::Arc};

use crate::predict::Scorer;

/// Everything a request handler needs, built once at startup and injected
/// through the router. `scorer` stays `None` when no checkpoint could be
/// loaded; the service then serves degenerate responses instead of dying.
#[derive(Clone)]
pub struct AppState {
    pub scorer: Option<Arc<dyn Scorer>>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(scorer: Option<Arc<dyn Scorer>>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            scorer,
            upload_dir: upload_dir.into(),
        }
    }
}
