//! Listener abstraction shared by the TCP and pipe bindings.

use std::future::Future;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::error::Result;

use super::pipe::PipeListener;

/// Any reliable, ordered, duplex byte stream.
pub trait DuplexStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased stream, used when the binding is chosen at runtime.
pub type BoxedStream = Box<dyn DuplexStream>;

/// Source of incoming environment connections.
pub trait Acceptor {
    /// Stream type produced per connection.
    type Stream: DuplexStream + 'static;

    /// Wait for the next connection.
    fn accept(&self) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Human-readable address, for logs.
    fn describe(&self) -> String;
}

/// TCP binding.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Bind to the given address (e.g. `"127.0.0.1:5041"`).
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::debug!("tcp listener bound at {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    /// The local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

impl Acceptor for TcpAcceptor {
    type Stream = TcpStream;

    async fn accept(&self) -> Result<TcpStream> {
        let (stream, addr) = self.listener.accept().await?;
        // Every message is a handful of 4-byte writes; don't let Nagle hold them.
        stream.set_nodelay(true)?;
        tracing::debug!("accepted tcp connection from {}", addr);
        Ok(stream)
    }

    fn describe(&self) -> String {
        match self.listener.local_addr() {
            Ok(addr) => format!("tcp {}", addr),
            Err(_) => "tcp <unknown>".to_string(),
        }
    }
}

/// Connect to a trainer over TCP (environment side).
pub async fn connect_tcp(addr: &str) -> Result<BoxedStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(Box::new(stream))
}

/// Either binding, selected from configuration.
pub enum AnyAcceptor {
    Tcp(TcpAcceptor),
    Pipe(PipeListener),
}

impl Acceptor for AnyAcceptor {
    type Stream = BoxedStream;

    async fn accept(&self) -> Result<BoxedStream> {
        match self {
            AnyAcceptor::Tcp(tcp) => Ok(Box::new(tcp.accept().await?)),
            AnyAcceptor::Pipe(pipe) => Ok(Box::new(pipe.accept().await?)),
        }
    }

    fn describe(&self) -> String {
        match self {
            AnyAcceptor::Tcp(tcp) => tcp.describe(),
            AnyAcceptor::Pipe(pipe) => pipe.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_tcp_accept_and_connect() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap().to_string();
        assert!(acceptor.describe().starts_with("tcp 127.0.0.1:"));

        let peer = tokio::spawn(async move {
            let mut stream = connect_tcp(&addr).await.unwrap();
            stream.write_all(&[2, 0, 0, 0]).await.unwrap();
        });

        let mut stream = Acceptor::accept(&acceptor).await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [2, 0, 0, 0]);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_any_acceptor_boxes_tcp() {
        let acceptor = AnyAcceptor::Tcp(TcpAcceptor::bind("127.0.0.1:0").await.unwrap());
        let addr = match &acceptor {
            AnyAcceptor::Tcp(tcp) => tcp.local_addr().unwrap().to_string(),
            AnyAcceptor::Pipe(_) => unreachable!(),
        };

        let peer = tokio::spawn(async move {
            let mut stream = connect_tcp(&addr).await.unwrap();
            stream.write_all(b"ok").await.unwrap();
        });

        let mut stream: BoxedStream = acceptor.accept().await.unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ok");
        peer.await.unwrap();
    }
}
