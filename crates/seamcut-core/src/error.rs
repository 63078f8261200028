//! Unified error type for the seamcut crates.
//!
//! Library code that can fail for reasons other than player misuse funnels
//! into [`Error`]. Player usage errors and seek outcomes have their own
//! narrower types in `seamcut-player`.

/// Configuration and input failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration is unusable.
    #[error("Config error: {0}")]
    Config(String),

    /// An edit (clip list) document could not be parsed.
    #[error("Edit parse error: {0}")]
    EditParse(String),
}

impl Error {
    /// Convenience constructor for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
