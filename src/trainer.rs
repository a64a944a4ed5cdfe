//! Trainer-facing entry point.
//!
//! ```ignore
//! use gymwire::{Matrix, Trainer};
//!
//! let mut trainer = Trainer::builder()
//!     .tcp("127.0.0.1:5041")
//!     .expected_peers(2)
//!     .bind()
//!     .await?;
//!
//! let (state_size, action_size) = trainer.connect().await?;
//! let states = trainer.reset(8).await?;
//! let result = trainer.step(&Matrix::zeros(8, action_size)).await?;
//! ```

use std::time::Duration;

use crate::aggregator::Aggregator;
use crate::batch::{ActionMatrix, BatchOrchestrator, StateMatrix, StepBatch};
use crate::config::{Endpoint, GymConfig};
use crate::error::{GymwireError, Result};
use crate::listener::SessionListener;
use crate::transport::{Acceptor, AnyAcceptor, BoxedStream};

/// Builder for configuring and binding a [`Trainer`].
pub struct TrainerBuilder {
    config: GymConfig,
}

impl TrainerBuilder {
    /// Start from [`GymConfig::default`].
    pub fn new() -> Self {
        Self {
            config: GymConfig::default(),
        }
    }

    /// Listen on a TCP address.
    ///
    /// Default: `127.0.0.1:5041`
    pub fn tcp(mut self, addr: &str) -> Self {
        self.config.endpoint = Endpoint::Tcp {
            addr: addr.to_string(),
        };
        self
    }

    /// Listen on a Unix domain socket / named pipe.
    pub fn pipe(mut self, path: &str) -> Self {
        self.config.endpoint = Endpoint::Pipe {
            path: path.to_string(),
        };
        self
    }

    /// Number of peers to wait for in [`Trainer::connect`].
    ///
    /// Default: 1
    pub fn expected_peers(mut self, count: usize) -> Self {
        self.config.expected_peers = count;
        self
    }

    /// Bound the whole connect phase.
    ///
    /// Default: wait forever
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Bound each individual send/recv.
    ///
    /// Default: wait forever
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Send the render flag with every step request.
    ///
    /// Default: false
    pub fn render_flag(mut self, enabled: bool) -> Self {
        self.config.render_flag = enabled;
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &GymConfig {
        &self.config
    }

    /// Validate the configuration and bind the endpoint.
    pub async fn bind(self) -> Result<Trainer> {
        Trainer::from_config(self.config).await
    }
}

impl Default for TrainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Bound trainer endpoint and, once connected, the batched session.
pub struct Trainer {
    config: GymConfig,
    listener: SessionListener<AnyAcceptor>,
    session: Option<BatchOrchestrator<BoxedStream>>,
}

impl Trainer {
    /// Create a new trainer builder.
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::new()
    }

    /// Validate `config` and bind its endpoint.
    pub async fn from_config(config: GymConfig) -> Result<Self> {
        config.validate()?;
        let acceptor = config.endpoint.bind().await?;
        tracing::info!("trainer bound at {}", acceptor.describe());

        let listener = SessionListener::new(acceptor, config.protocol_options())
            .with_io_timeout(config.io_timeout());
        Ok(Self {
            config,
            listener,
            session: None,
        })
    }

    pub fn config(&self) -> &GymConfig {
        &self.config
    }

    /// The endpoint peers should connect to.
    ///
    /// For TCP this is the bound address, so binding port 0 reports the
    /// port actually chosen.
    pub fn endpoint(&self) -> Result<Endpoint> {
        match self.listener.acceptor() {
            AnyAcceptor::Tcp(tcp) => Ok(Endpoint::Tcp {
                addr: tcp.local_addr()?.to_string(),
            }),
            AnyAcceptor::Pipe(pipe) => Ok(Endpoint::Pipe {
                path: pipe.path().to_string(),
            }),
        }
    }

    /// Wait for the configured number of peers, run their handshakes and
    /// build the combined session.
    ///
    /// Returns `(state_size, action_size)` summed over all peers.
    pub async fn connect(&mut self) -> Result<(usize, usize)> {
        self.connect_peers(self.config.expected_peers).await
    }

    /// Like [`connect`](Self::connect), overriding the peer count.
    pub async fn connect_peers(&mut self, expected: usize) -> Result<(usize, usize)> {
        if self.session.is_some() {
            return Err(GymwireError::Config("trainer is already connected".to_string()));
        }

        let sessions = match self.config.handshake_timeout() {
            Some(limit) => self.listener.listen_timeout(expected, limit).await?,
            None => self.listener.listen(expected).await?,
        };

        let orchestrator = BatchOrchestrator::new(Aggregator::new(sessions)?);
        let dims = orchestrator.dimensions();
        tracing::info!(
            "connected to {} peer(s): state_size={}, action_size={}",
            orchestrator.peer_count(),
            dims.state_size,
            dims.action_size
        );
        self.session = Some(orchestrator);
        Ok((dims.state_size, dims.action_size))
    }

    /// Whether [`connect`](Self::connect) has completed.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Floats per state row, once connected.
    pub fn state_size(&self) -> Option<usize> {
        self.session.as_ref().map(BatchOrchestrator::state_size)
    }

    /// Floats per action row, once connected.
    pub fn action_size(&self) -> Option<usize> {
        self.session.as_ref().map(BatchOrchestrator::action_size)
    }

    /// Rows per batch, after the first reset.
    pub fn batch_size(&self) -> Option<usize> {
        self.session.as_ref().and_then(BatchOrchestrator::batch_size)
    }

    /// Start `batch_size` environments on every peer.
    pub async fn reset(&mut self, batch_size: usize) -> Result<StateMatrix> {
        self.session_mut()?.reset(batch_size).await
    }

    /// Step every slot with its action row.
    pub async fn step(&mut self, actions: &ActionMatrix) -> Result<StepBatch> {
        self.session_mut()?.step(actions).await
    }

    /// Step every slot and ask peers to render.
    ///
    /// Has no effect on the wire unless the render flag is enabled.
    pub async fn step_with_render(&mut self, actions: &ActionMatrix) -> Result<StepBatch> {
        self.session_mut()?.step_with_render(actions, true).await
    }

    /// Close every peer connection.
    pub async fn close(self) -> Result<()> {
        match self.session {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    fn session_mut(&mut self) -> Result<&mut BatchOrchestrator<BoxedStream>> {
        self.session.as_mut().ok_or(GymwireError::NotReady)
    }
}

fn duration_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
