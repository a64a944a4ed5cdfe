//! Server role: accept environment peers and run their handshakes.
//!
//! Peers are accepted one at a time. Each peer's handshake finishes before
//! the next connection is taken, so the returned sessions are in
//! registration order.

use std::time::Duration;

use crate::error::{GymwireError, Result};
use crate::protocol::{ProtocolEngine, ProtocolOptions};
use crate::transport::{Acceptor, Transport};

/// Accepts peers on a bound [`Acceptor`] and turns them into sessions.
pub struct SessionListener<A> {
    acceptor: A,
    options: ProtocolOptions,
    io_timeout: Option<Duration>,
}

impl<A: Acceptor> SessionListener<A> {
    /// Wrap a bound acceptor.
    pub fn new(acceptor: A, options: ProtocolOptions) -> Self {
        Self {
            acceptor,
            options,
            io_timeout: None,
        }
    }

    /// Bound every send/recv of the accepted sessions.
    pub fn with_io_timeout(mut self, io_timeout: Option<Duration>) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// The wrapped acceptor.
    pub fn acceptor(&self) -> &A {
        &self.acceptor
    }

    /// Accept exactly `expected` peers, waiting as long as it takes.
    pub async fn listen(&self, expected: usize) -> Result<Vec<ProtocolEngine<A::Stream>>> {
        check_expected(expected)?;
        let mut sessions = Vec::with_capacity(expected);
        self.accept_into(&mut sessions, expected).await?;
        Ok(sessions)
    }

    /// Accept exactly `expected` peers within `limit`.
    ///
    /// The limit covers the whole wait, handshakes included. When it elapses
    /// the already-connected sessions are dropped and the error reports how
    /// many had completed their handshake.
    pub async fn listen_timeout(
        &self,
        expected: usize,
        limit: Duration,
    ) -> Result<Vec<ProtocolEngine<A::Stream>>> {
        check_expected(expected)?;
        let mut sessions = Vec::with_capacity(expected);
        let outcome = tokio::time::timeout(limit, self.accept_into(&mut sessions, expected)).await;

        match outcome {
            Ok(result) => result.map(|()| sessions),
            Err(_) => {
                tracing::warn!(
                    "gave up waiting for peers on {}: {} of {} connected",
                    self.acceptor.describe(),
                    sessions.len(),
                    expected
                );
                Err(GymwireError::HandshakeTimeout {
                    connected: sessions.len(),
                    expected,
                })
            }
        }
    }

    async fn accept_into(
        &self,
        sessions: &mut Vec<ProtocolEngine<A::Stream>>,
        expected: usize,
    ) -> Result<()> {
        tracing::info!(
            "waiting for {} peer(s) on {}",
            expected,
            self.acceptor.describe()
        );
        while sessions.len() < expected {
            let stream = self.acceptor.accept().await?;
            let transport = Transport::with_io_timeout(stream, self.io_timeout);
            let session = ProtocolEngine::handshake(transport, self.options).await?;
            tracing::info!(
                "peer {} registered: action_size={}, state_size={}",
                sessions.len(),
                session.action_size(),
                session.state_size()
            );
            sessions.push(session);
        }
        Ok(())
    }
}

fn check_expected(expected: usize) -> Result<()> {
    if expected == 0 {
        return Err(GymwireError::Config(
            "expected_peers must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Dimensions;
    use crate::transport::{connect_tcp, TcpAcceptor};
    use tokio::io::AsyncWriteExt;

    async fn bound() -> (SessionListener<TcpAcceptor>, String) {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap().to_string();
        (SessionListener::new(acceptor, ProtocolOptions::default()), addr)
    }

    async fn announce(addr: &str, dims: Dimensions) -> crate::transport::BoxedStream {
        let mut stream = connect_tcp(addr).await.unwrap();
        stream.write_all(&dims.encode().unwrap()).await.unwrap();
        stream
    }

    #[tokio::test]
    async fn test_listen_keeps_registration_order() {
        let (listener, addr) = bound().await;

        let peers = tokio::spawn(async move {
            let first = announce(&addr, Dimensions::new(2, 3)).await;
            let second = announce(&addr, Dimensions::new(1, 1)).await;
            (first, second)
        });

        let sessions = listener.listen(2).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].dimensions(), Dimensions::new(2, 3));
        assert_eq!(sessions[1].dimensions(), Dimensions::new(1, 1));
        peers.await.unwrap();
    }

    #[tokio::test]
    async fn test_listen_zero_peers_is_config_error() {
        let (listener, _) = bound().await;
        assert!(matches!(
            listener.listen(0).await,
            Err(GymwireError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_listen_timeout_reports_connected_count() {
        let (listener, addr) = bound().await;

        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let peer = tokio::spawn(async move {
            let stream = announce(&addr, Dimensions::new(1, 1)).await;
            let _ = done_rx.await;
            drop(stream);
        });

        let err = listener
            .listen_timeout(2, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GymwireError::HandshakeTimeout {
                connected: 1,
                expected: 2
            }
        ));

        let _ = done_tx.send(());
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_handshake_fails_listen() {
        let (listener, addr) = bound().await;

        let peer = tokio::spawn(async move {
            let mut stream = connect_tcp(&addr).await.unwrap();
            stream.write_all(&(-1i32).to_le_bytes()).await.unwrap();
            stream.write_all(&3i32.to_le_bytes()).await.unwrap();
            stream
        });

        let err = listener.listen(1).await.unwrap_err();
        assert!(matches!(err, GymwireError::Protocol(_)));
        peer.await.unwrap();
    }
}
