/// Errors raised by the domain layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller-supplied input was rejected before anything was sent.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A backend response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
}
