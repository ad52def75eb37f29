/// Error type returned by this crate.
///
/// Recognized API failures (400, 401, 404, 422, 429, ...) are not errors at
/// this level: they are returned as [`crate::ErrorOutcome`] values. Only
/// conditions a caller cannot reasonably continue from end up here.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network or request execution error from `reqwest`. Never retried.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Request arguments rejected before any network activity.
    #[error("validation error: {0}")]
    Validation(String),
    /// Invalid client configuration (retry delay, header, environment).
    #[error("configuration error: {0}")]
    Config(String),
    /// The server answered with a status code outside the known taxonomy.
    #[error("unrecognized http status {status}: {body}")]
    UnrecognizedStatus {
        /// Raw status code.
        status: u16,
        /// Response body, empty when it could not be read.
        body: String,
    },
    /// Response decoding error for the typed pipeline.
    #[error("decode error: {0}")]
    Decode(String),
}
