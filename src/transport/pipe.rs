//! Platform-specific pipe binding.
//!
//! - Unix: Unix Domain Socket
//! - Windows: Named Pipe
//!
//! # Example
//!
//! ```ignore
//! use gymwire::transport::{generate_pipe_path, PipeListener};
//!
//! let path = generate_pipe_path();
//! let listener = PipeListener::bind(&path).await?;
//! let stream = listener.accept().await?;
//! ```

use crate::error::Result;
use tokio::io::{AsyncRead, AsyncWrite};

use super::acceptor::{Acceptor, BoxedStream};

/// Generate a unique pipe path for this process.
///
/// Format:
/// - Unix: `/tmp/gymwire-{pid}-{random}.sock`
/// - Windows: `\\.\pipe\gymwire-{pid}-{random}`
pub fn generate_pipe_path() -> String {
    let pid = std::process::id();
    let rand: u64 = rand_u64();

    #[cfg(unix)]
    {
        format!("/tmp/gymwire-{}-{:x}.sock", pid, rand)
    }

    #[cfg(windows)]
    {
        format!(r"\\.\pipe\gymwire-{}-{:x}", pid, rand)
    }
}

fn rand_u64() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    // Two calls inside one clock tick must still differ.
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id() as u64;
    (nanos ^ seq.rotate_left(32)).wrapping_mul(0x517cc1b727220a95) ^ pid
}

// ============================================================================
// Unix Implementation
// ============================================================================

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use std::path::Path;
    use tokio::net::{UnixListener, UnixStream};

    /// Unix Domain Socket listener for the trainer side.
    pub struct PipeListener {
        listener: UnixListener,
        path: String,
    }

    /// Connected Unix Domain Socket, server side.
    pub struct PipeStream {
        stream: UnixStream,
    }

    impl PipeListener {
        /// Bind to a Unix socket path.
        ///
        /// Removes any stale socket file at the path before binding.
        pub async fn bind(path: &str) -> Result<Self> {
            if Path::new(path).exists() {
                std::fs::remove_file(path)?;
            }

            let listener = UnixListener::bind(path)?;
            tracing::debug!("pipe listener bound at {}", path);

            Ok(Self {
                listener,
                path: path.to_string(),
            })
        }

        /// Accept a single environment connection.
        pub async fn accept(&self) -> Result<PipeStream> {
            let (stream, _addr) = self.listener.accept().await?;
            Ok(PipeStream { stream })
        }

        /// Get the socket path.
        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl Drop for PipeListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    /// Connect to a trainer listening on `path` (environment side).
    pub async fn connect_pipe(path: &str) -> Result<BoxedStream> {
        let stream = UnixStream::connect(path).await?;
        Ok(Box::new(stream))
    }

    impl AsyncRead for PipeStream {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.stream).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for PipeStream {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::pin::Pin::new(&mut self.stream).poll_write(cx, buf)
        }

        fn poll_flush(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.stream).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.stream).poll_shutdown(cx)
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use crate::error::GymwireError;
    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeServer, ServerOptions};
    use tokio::sync::Mutex;

    /// Windows Named Pipe listener for the trainer side.
    ///
    /// Holds the next pipe instance so that a peer can connect before
    /// `accept` is called.
    pub struct PipeListener {
        path: String,
        next: Mutex<Option<NamedPipeServer>>,
    }

    /// Connected Named Pipe, server side.
    pub struct PipeStream {
        pipe: NamedPipeServer,
    }

    impl PipeListener {
        /// Create the first Named Pipe instance.
        pub async fn bind(path: &str) -> Result<Self> {
            let first = ServerOptions::new()
                .first_pipe_instance(true)
                .create(path)
                .map_err(GymwireError::Io)?;
            tracing::debug!("named pipe created at {}", path);

            Ok(Self {
                path: path.to_string(),
                next: Mutex::new(Some(first)),
            })
        }

        /// Accept a single environment connection.
        pub async fn accept(&self) -> Result<PipeStream> {
            let mut next = self.next.lock().await;
            let server = match next.take() {
                Some(server) => server,
                None => ServerOptions::new()
                    .create(&self.path)
                    .map_err(GymwireError::Io)?,
            };

            server.connect().await?;

            // Keep an instance open for the following peer.
            *next = Some(
                ServerOptions::new()
                    .create(&self.path)
                    .map_err(GymwireError::Io)?,
            );

            Ok(PipeStream { pipe: server })
        }

        /// Get the pipe path.
        pub fn path(&self) -> &str {
            &self.path
        }
    }

    /// Connect to a trainer listening on `path` (environment side).
    pub async fn connect_pipe(path: &str) -> Result<BoxedStream> {
        let client = ClientOptions::new().open(path)?;
        Ok(Box::new(client))
    }

    impl AsyncRead for PipeStream {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.pipe).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for PipeStream {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::pin::Pin::new(&mut self.pipe).poll_write(cx, buf)
        }

        fn poll_flush(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.pipe).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::pin::Pin::new(&mut self.pipe).poll_shutdown(cx)
        }
    }
}

// ============================================================================
// Platform-independent re-exports
// ============================================================================

#[cfg(unix)]
pub use unix_impl::{connect_pipe, PipeListener, PipeStream};

#[cfg(windows)]
pub use windows_impl::{connect_pipe, PipeListener, PipeStream};

impl Acceptor for PipeListener {
    type Stream = PipeStream;

    async fn accept(&self) -> Result<PipeStream> {
        PipeListener::accept(self).await
    }

    fn describe(&self) -> String {
        format!("pipe {}", self.path())
    }
}
