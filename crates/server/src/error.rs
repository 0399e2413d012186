//! Server error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing required configuration: {0} (set it in the environment or .env)")]
    MissingEnv(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
