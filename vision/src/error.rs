use std::{error::Error, fmt, io, path::PathBuf};

/// The vision crate's result type.
pub type Result<T> = std::result::Result<T, VisionErr>;

/// Failures surfaced by the network, the data pipeline and the checkpoint
/// store.
#[derive(Debug)]
pub enum VisionErr {
    Io(io::Error),
    Image(image::ImageError),
    Checkpoint(safetensors::SafeTensorError),
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    RankMismatch {
        what: &'static str,
    },
    MissingTensor {
        name: String,
    },
    TensorDtype {
        name: String,
    },
    MissingOptimizer,
    ClassLayout {
        path: PathBuf,
        found: usize,
    },
    EmptyClass {
        path: PathBuf,
    },
}

impl fmt::Display for VisionErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisionErr::Io(e) => write!(f, "io error: {e}"),
            VisionErr::Image(e) => write!(f, "image error: {e}"),
            VisionErr::Checkpoint(e) => write!(f, "checkpoint error: {e:?}"),
            VisionErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            VisionErr::RankMismatch { what } => {
                write!(f, "rank mismatch: {what} received a tensor of the wrong rank")
            }
            VisionErr::MissingTensor { name } => {
                write!(f, "checkpoint is missing tensor {name}")
            }
            VisionErr::TensorDtype { name } => {
                write!(f, "checkpoint tensor {name} is not f32")
            }
            VisionErr::MissingOptimizer => {
                write!(f, "fewer optimizer instances than trainable tensors")
            }
            VisionErr::ClassLayout { path, found } => write!(
                f,
                "{} must contain exactly two class directories, found {found}",
                path.display()
            ),
            VisionErr::EmptyClass { path } => {
                write!(f, "class directory {} contains no images", path.display())
            }
        }
    }
}

impl Error for VisionErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VisionErr::Io(e) => Some(e),
            VisionErr::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for VisionErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<image::ImageError> for VisionErr {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}

impl From<safetensors::SafeTensorError> for VisionErr {
    fn from(value: safetensors::SafeTensorError) -> Self {
        Self::Checkpoint(value)
    }
}
