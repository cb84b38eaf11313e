use thiserror::Error;

/// Common error type shared across pagecraft crates
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl From<String> for CommonError {
    fn from(s: String) -> Self {
        CommonError::Generic(s)
    }
}

impl From<&str> for CommonError {
    fn from(s: &str) -> Self {
        CommonError::Generic(s.to_string())
    }
}
