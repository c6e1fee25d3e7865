use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the scrape pipeline and the stores.
///
/// Handlers turn these into structured JSON responses; none of them are fatal
/// to the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("could not parse page: {0}")]
    Parse(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl Error {
    pub fn network(url: &str, reason: impl ToString) -> Self {
        Error::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn article_not_found(id: i64) -> Self {
        Error::NotFound { kind: "article", id }
    }

    pub fn note_not_found(id: i64) -> Self {
        Error::NotFound { kind: "note", id }
    }

    /// Short machine-readable tag used in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Network { .. } => "network_error",
            Error::Parse(_) => "parse_error",
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Storage(_) => "storage_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
