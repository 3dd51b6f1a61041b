use thiserror::Error;

/// Failure to produce a local pixel buffer for an icon.
#[derive(Error, Debug)]
pub enum AssetError {
    /// No local copy and no source to fetch it from
    #[error("icon not available locally: {0}")]
    Missing(String),

    #[error("failed to decode icon {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// The remote collaborator failed; never degraded silently
    #[error("failed to fetch icon {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    /// Whether the caller may carry on with degraded coverage
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AssetError::Missing(_) | AssetError::Decode { .. })
    }
}
