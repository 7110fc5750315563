use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum PreviewError {
    /// A collaborator the requested operation needs was never injected.
    #[error("no {0} attached to the preview")]
    MissingCollaborator(&'static str),
    #[error("vegetation spawn requested before any height map was generated")]
    NoPriorGeneration,
    #[error("level of detail {lod} out of range (max {max})")]
    InvalidLod { lod: usize, max: usize },
    #[error("height map has {len} values, expected {size}x{size}")]
    SizeMismatch { len: usize, size: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PreviewError> = std::result::Result<T, E>;
