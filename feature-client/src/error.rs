use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeatureStoreError>;

#[derive(Debug, Error)]
pub enum FeatureStoreError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The service answered 200 but the body carried an `error` object.
    #[error("feature service error {code}: {message}")]
    Service { code: i64, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid layer url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FeatureStoreError {
    fn from(err: reqwest::Error) -> Self {
        FeatureStoreError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FeatureStoreError {
    fn from(err: serde_json::Error) -> Self {
        FeatureStoreError::Parse(err.to_string())
    }
}
