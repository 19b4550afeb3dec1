use thiserror::Error;

/// Failure kinds surfaced by the retrieval pipeline and its gateways.
///
/// Guardrail blocks and low-relevance outcomes are not errors; they are
/// ordinary answers carrying findings.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing credential, unknown provider, or invalid setting. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An embedding or generation backend failed. Transient failures are retried first.
    #[error("upstream error from {provider}{}: {message}", fmt_status(.status))]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The persisted index is missing, unreadable, or malformed. Rebuild it.
    #[error("index data corruption: {0}")]
    DataCorruption(String),

    /// Caller-supplied input is out of bounds.
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn upstream(provider: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Upstream {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;
