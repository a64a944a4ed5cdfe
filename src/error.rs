//! Error types for gymwire.

use thiserror::Error;

/// Main error type for all gymwire operations.
#[derive(Debug, Error)]
pub enum GymwireError {
    /// I/O error during pipe/socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Peer closed the stream before the expected number of bytes arrived.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A single read or write did not complete within the I/O timeout.
    #[error("Transport timeout")]
    Timeout,

    /// The stream drifted: a sentinel or flag value was not what the layout requires.
    #[error("Stream desynchronized: expected {expected}, got {actual}")]
    Desync {
        /// Value the layout requires at this position.
        expected: i32,
        /// Value actually read.
        actual: i32,
    },

    /// A done flag other than 0 or 1, which means the stream has drifted.
    #[error("Invalid done flag {value} for slot {slot}")]
    InvalidDoneFlag { slot: usize, value: i32 },

    /// Batch size is zero or does not fit the wire's `i32`.
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),

    /// Matrix dimensions do not match the session configuration.
    #[error("Shape mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    /// Flat action buffer length is not `batch_size * action_size`.
    #[error("Action buffer length {actual} does not match expected {expected}")]
    ActionLength { expected: usize, actual: usize },

    /// Step issued before any reset established a batch.
    #[error("Session not ready: reset must precede step")]
    NotReady,

    /// The session hit a fatal error earlier and cannot be reused.
    #[error("Session faulted")]
    SessionFaulted,

    /// The listener gave up waiting for peers.
    #[error("Handshake timeout: {connected} of {expected} peers connected")]
    HandshakeTimeout { connected: usize, expected: usize },

    /// Protocol error (invalid handshake values, unknown opcode, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),
}

impl GymwireError {
    /// Whether this error leaves the session unusable.
    ///
    /// Shape and readiness errors are raised before any I/O and can be
    /// retried with corrected input; everything touching the stream is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            GymwireError::ShapeMismatch { .. }
                | GymwireError::ActionLength { .. }
                | GymwireError::NotReady
                | GymwireError::InvalidBatchSize(_)
                | GymwireError::Config(_)
        )
    }
}

/// Result type alias using GymwireError.
pub type Result<T> = std::result::Result<T, GymwireError>;
