use thiserror::Error;

/// Errors from the chat-completion endpoint.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// A network error occurred during the call.
    #[error("network: {0}")]
    Network(String),

    /// The endpoint returned an error response.
    #[error("endpoint api: {0}")]
    Api(String),

    /// The endpoint response could not be parsed.
    #[error("invalid endpoint response: {0}")]
    InvalidResponse(String),
}
