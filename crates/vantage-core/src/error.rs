//! Error types for vantage.

/// Main error type for vantage operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No global `window` (not running in a browser main thread).
    #[error("no global window available")]
    NoWindow,

    /// The window has no document attached.
    #[error("window has no document")]
    NoDocument,

    /// A CSS selector was rejected by the document.
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    /// Options object could not be decoded.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Any other failure reported by the platform layer.
    #[error("platform error: {0}")]
    Platform(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A toggle callback settled with a failure.
///
/// Carried by `in`/`out` callbacks that throw or reject. The trigger logs it
/// and skips the class toggle for that transition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("toggle callback failed: {0}")]
pub struct CallbackError(pub String);

impl From<&str> for CallbackError {
    fn from(s: &str) -> Self {
        CallbackError(s.to_string())
    }
}

impl From<String> for CallbackError {
    fn from(s: String) -> Self {
        CallbackError(s)
    }
}
