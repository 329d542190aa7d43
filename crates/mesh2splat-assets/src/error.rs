use std::path::PathBuf;

/// Errors that can occur during scene loading.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to load glTF file '{0}': {1}")]
    GltfLoadFailed(PathBuf, String),

    #[error("primitive {primitive} of mesh '{mesh}' is missing the {accessor} accessor")]
    MissingAccessor {
        mesh: String,
        primitive: usize,
        accessor: &'static str,
    },

    #[error("primitive {primitive} of mesh '{mesh}' indexes past its {vertex_count} vertices")]
    InvalidIndices {
        mesh: String,
        primitive: usize,
        vertex_count: usize,
    },

    #[error("failed to load image {image}: {reason}")]
    ImageLoadFailed { image: usize, reason: String },

    #[error("I/O error loading '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("image {image} has unsupported pixel format {format}")]
    UnsupportedFormat { image: usize, format: String },
}
