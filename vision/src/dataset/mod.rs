mod folder;
mod loader;

pub use folder::{IMAGE_EXTENSIONS, ImageFolder, has_image_extension};
pub use loader::{Batch, BatchLoader};
