//! Error types for the rate limiter.

use std::io;

use thiserror::Error;

/// Errors produced by the limiter itself.
///
/// Errors from the wrapped stream's `read` and `write` are never wrapped in
/// this type; they reach the caller unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// The limiter was shut down before the operation could be admitted.
    #[error("stream closed")]
    Closed,

    /// A limiter was requested with a rate of zero operations per second.
    #[error("invalid rate limit: {rate}. Rate must be at least one operation per second.")]
    InvalidRate { rate: u32 },

    /// Closing the wrapped stream reported a failure.
    #[error("failed to close underlying stream: {message}")]
    CloseFailed { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns `true` for the closed-stream error.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            Error::Closed => io::Error::new(io::ErrorKind::BrokenPipe, Error::Closed),
            other => io::Error::other(other),
        }
    }
}

/// Returns `true` when `err` is the closed-stream error raised by a limiter
/// that was shut down before admitting the operation.
///
/// Underlying streams may also report `BrokenPipe`; those are not matched.
pub fn is_closed_stream(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
        && err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<Error>())
            .is_some_and(Error::is_closed)
}

pub type Result<T> = std::result::Result<T, Error>;
