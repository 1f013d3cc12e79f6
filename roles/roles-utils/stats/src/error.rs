use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error("Malformed JSON on line {line}: {source}")]
    MalformedLine {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Line {0} is not a JSON object")]
    NotAnObject(usize),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Malformed user document: {0}")]
    MalformedUser(#[from] serde_json::Error),

    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),
}

impl StatsError {
    /// True when the request itself was bad, as opposed to the upstream or its payload.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, StatsError::InvalidAddress(_))
    }
}
