/// Errors from the remote platform client.
///
/// The `Display` text is recorded verbatim as a task's error message.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Remote request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform answered with a failure status or `success: false`.
    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{0} not found")]
    NotFound(String),

    /// The response body did not have the expected shape.
    #[error("Unexpected remote response: {0}")]
    Decode(String),
}
