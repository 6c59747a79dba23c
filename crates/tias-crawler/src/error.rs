#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request was intentionally abandoned before (or while) rendering
    #[error("Ignored request {url}: {reason}")]
    Ignored { url: String, reason: String },

    #[error("Couldn't render {url} after {attempts} attempt(s): {source}")]
    Render {
        url: String,
        attempts: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl FetchError {
    /// Logs the failure, abandoned requests are only worth a warning
    pub fn log(&self) {
        match self {
            Self::Ignored { .. } => log::warn!("{self}"),
            Self::Render { .. } => log::error!("{self}"),
        }
    }
}
