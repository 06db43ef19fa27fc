use thiserror::Error;

// Everything the terrain core can fail with.
// Out-of-grid queries and paint calls are not errors, they are no-ops.
#[derive(Debug, Error)]
pub enum MantleError {
    #[error("heightmap must be {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("generate or import heightmap first")]
    NoHeightField,

    #[error("failed to load heightmap image {url}: {source}")]
    ImageLoad {
        url: String,
        #[source]
        source: image::ImageError,
    },

    #[error("layer limit of {max} reached")]
    LayerLimit { max: usize },

    #[error("scene backend: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, MantleError>;
