//! Operation-rate limiting for bidirectional streams.
//!
//! [`wrap`] puts a [`RateLimiter`] in front of any [`Duplex`] stream. The
//! limiter caps how many reads and writes per second reach the stream, while
//! letting up to `max_burst` operations through ahead of the pace. Bytes are
//! not counted, only operations.
//!
//! ```no_run
//! use oplimit_core::{wrap, Duplex, IoStream};
//! use tokio::net::TcpStream;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = TcpStream::connect("127.0.0.1:7000").await?;
//! let limited = wrap(IoStream::new(conn), 20, 5)?;
//!
//! limited.write(b"hello").await?;
//! limited.close().await?;
//! limited.wait_closed().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Pacing works in whole-second cycles of `floor(100 / limit_rate)` seconds,
//! each followed by up to 100 drained tokens. Requested rates that do not
//! divide 100 are therefore only approximated (see
//! [`Limits::effective_rate`]), and rates above 100 are not paced at all.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod limiter;
pub mod limits;
mod pool;
mod replenish;
pub mod stream;

pub use error::{is_closed_stream, Error, Result};
pub use limiter::{wrap, RateLimiter};
pub use limits::{Limits, DRAIN_BATCH};
pub use stream::{Duplex, IoStream};
