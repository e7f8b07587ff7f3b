use thiserror::Error;

/// A per-message failure. The message is dropped and the session continues.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed JSON frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid analysis_result frame: {0}")]
    InvalidResult(#[source] serde_json::Error),

    #[error("non-text frame of {0} bytes")]
    Binary(usize),
}

/// A connection-level failure. Logged by the caller, never retried.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("failed to send handshake: {0}")]
    Send(#[source] tungstenite::Error),

    #[error("failed to encode handshake: {0}")]
    Encode(#[from] serde_json::Error),
}
