use std::{error::Error, fmt, io};

use vision::VisionErr;

/// Tagged failure modes of one prediction request. The wire contract
/// collapses most of these into the `"Error"` result, but logs keep the
/// variant so failure classes stay distinguishable.
#[derive(Debug)]
pub enum PredictErr {
    /// No model checkpoint could be loaded at startup.
    ModelUnavailable,
    /// The uploaded bytes did not decode as an image.
    Decode(VisionErr),
    /// The forward pass failed, e.g. on a shape mismatch after a model
    /// change.
    Inference(VisionErr),
    /// The accepted upload could not be written to disk.
    Upload(io::Error),
    /// A previous panic while scoring left the model lock poisoned.
    Poisoned,
}

impl PredictErr {
    /// The result label the response carries for this failure.
    pub fn label(&self) -> &'static str {
        match self {
            PredictErr::ModelUnavailable => "Model not loaded",
            _ => "Error",
        }
    }
}

impl fmt::Display for PredictErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictErr::ModelUnavailable => {
                write!(f, "model unavailable: no checkpoint was loaded at startup")
            }
            PredictErr::Decode(e) => write!(f, "decode failed: {e}"),
            PredictErr::Inference(e) => write!(f, "inference failed: {e}"),
            PredictErr::Upload(e) => write!(f, "upload failed: {e}"),
            PredictErr::Poisoned => write!(f, "model lock poisoned"),
        }
    }
}

impl Error for PredictErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PredictErr::Decode(e) | PredictErr::Inference(e) => Some(e),
            PredictErr::Upload(e) => Some(e),
            _ => None,
        }
    }
}
