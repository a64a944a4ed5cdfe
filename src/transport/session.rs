//! Exact-length byte transport over one duplex stream.
//!
//! The protocol has no length framing, so a single lost or extra byte shifts
//! every later value. [`Transport`] therefore only offers two primitives:
//!
//! - [`Transport::send`] writes the whole buffer and flushes, or fails
//! - [`Transport::recv`] returns exactly `n` bytes, or fails
//!
//! There is no partial result on either side.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{ScalarCodec, SCALAR_SIZE};
use crate::error::{GymwireError, Result};

/// Owns one duplex stream and moves raw bytes over it.
pub struct Transport<S> {
    stream: S,
    /// Bound on each individual send/recv. `None` waits forever.
    io_timeout: Option<Duration>,
    bytes_sent: u64,
    bytes_received: u64,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream with no I/O timeout.
    pub fn new(stream: S) -> Self {
        Self::with_io_timeout(stream, None)
    }

    /// Wrap a connected stream, bounding every send/recv by `io_timeout`.
    pub fn with_io_timeout(stream: S, io_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            io_timeout,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Write all of `bytes` and flush.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let timeout = self.io_timeout;
        let stream = &mut self.stream;
        run_with_timeout(timeout, async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await?;
        self.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    /// Read exactly `n` bytes.
    ///
    /// EOF before `n` bytes arrive is [`GymwireError::ConnectionClosed`].
    pub async fn recv(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(n);
        let timeout = self.io_timeout;
        let stream = &mut self.stream;
        run_with_timeout(timeout, stream.read_exact(&mut buf[..])).await?;
        self.bytes_received += n as u64;
        Ok(buf.freeze())
    }

    /// Read exactly one `i32`.
    pub async fn recv_i32(&mut self) -> Result<i32> {
        let mut bytes = self.recv(SCALAR_SIZE).await?;
        Ok(ScalarCodec::get_i32(&mut bytes))
    }

    /// Shut down the write half so the peer sees EOF.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Total bytes written since construction.
    #[inline]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Total bytes read since construction.
    #[inline]
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Configured per-operation timeout.
    #[inline]
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Consume the transport and return the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

async fn run_with_timeout<T, F>(timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| GymwireError::Timeout)?,
        None => fut.await,
    };
    outcome.map_err(map_io_error)
}

fn map_io_error(err: std::io::Error) -> GymwireError {
    match err.kind() {
        ErrorKind::UnexpectedEof => GymwireError::ConnectionClosed,
        _ => GymwireError::Io(err),
    }
}
