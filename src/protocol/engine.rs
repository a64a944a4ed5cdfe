//! Protocol engine - handshake, reset and step over one transport.
//!
//! [`ProtocolEngine`] is one live session with one environment peer. Its
//! dimensions are fixed by the handshake; only the batch size changes, and
//! only on reset.
//!
//! # Example
//!
//! ```ignore
//! use gymwire::protocol::{ProtocolEngine, ProtocolOptions};
//! use gymwire::transport::Transport;
//!
//! let mut engine = ProtocolEngine::handshake(Transport::new(stream), ProtocolOptions::default()).await?;
//! let states = engine.reset(4).await?;              // 4 * state_size floats
//! let actions = vec![0.0; 4 * engine.action_size()];
//! let result = engine.step(&actions, false).await?;
//! ```

use std::fmt;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use super::state::{SessionEvent, SessionState};
use super::wire_format::{
    decode_done, encode_reset_request, encode_step_request, reset_response_len,
    step_response_len, verify_sync_token, Dimensions, ProtocolOptions, HANDSHAKE_SIZE,
};
use crate::codec::ScalarCodec;
use crate::error::{GymwireError, Result};
use crate::transport::Transport;

/// Flat, slot-major results of one step round.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResponse {
    /// `batch_size * state_size` floats.
    pub states: Vec<f32>,
    /// One reward per slot.
    pub rewards: Vec<f32>,
    /// One done flag per slot.
    pub dones: Vec<bool>,
}

/// One configured session with an environment peer (trainer role).
pub struct ProtocolEngine<S> {
    transport: Transport<S>,
    dims: Dimensions,
    /// `None` until the first successful reset.
    batch_size: Option<usize>,
    state: SessionState,
    options: ProtocolOptions,
}

impl<S> fmt::Debug for ProtocolEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("dims", &self.dims)
            .field("batch_size", &self.batch_size)
            .field("state", &self.state)
            .field("options", &self.options)
            .finish()
    }
}

impl<S> ProtocolEngine<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the trainer side of the handshake.
    ///
    /// Reads `action_size` then `state_size` from the peer. Nothing is sent
    /// back.
    pub async fn handshake(mut transport: Transport<S>, options: ProtocolOptions) -> Result<Self> {
        let mut bytes = transport.recv(HANDSHAKE_SIZE).await?;
        let action_size = ScalarCodec::get_i32(&mut bytes);
        let state_size = ScalarCodec::get_i32(&mut bytes);
        let dims = Dimensions::from_wire(action_size, state_size)?;

        tracing::info!(
            "handshake complete: action_size={}, state_size={}",
            dims.action_size,
            dims.state_size
        );

        let state = SessionState::Unconfigured
            .on(SessionEvent::HandshakeComplete)
            .unwrap_or(SessionState::Faulted);

        Ok(Self {
            transport,
            dims,
            batch_size: None,
            state,
            options,
        })
    }

    /// Floats per state vector.
    #[inline]
    pub fn state_size(&self) -> usize {
        self.dims.state_size
    }

    /// Floats per action vector.
    #[inline]
    pub fn action_size(&self) -> usize {
        self.dims.action_size
    }

    /// Dimensions learned from the handshake.
    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Current batch size, `None` before the first reset.
    #[inline]
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    /// Current protocol state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Protocol variant in use.
    #[inline]
    pub fn options(&self) -> ProtocolOptions {
        self.options
    }

    /// Whether a fatal error has made this session unusable.
    #[inline]
    pub fn is_faulted(&self) -> bool {
        self.state == SessionState::Faulted
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    /// Reset `batch_size` environments and return their initial states.
    ///
    /// Returns `batch_size * state_size` floats, slot-major. A wrong sync
    /// token is [`GymwireError::Desync`] and faults the session.
    pub async fn reset(&mut self, batch_size: usize) -> Result<Vec<f32>> {
        self.ensure_usable()?;
        let request = encode_reset_request(batch_size)?;
        self.transition(SessionEvent::ResetSent)?;

        tracing::debug!("reset: batch_size={}", batch_size);
        match self.exchange_reset(request, batch_size).await {
            Ok(states) => {
                self.batch_size = Some(batch_size);
                self.transition(SessionEvent::ResetReceived)?;
                Ok(states)
            }
            Err(e) => Err(self.fault(e)),
        }
    }

    /// Send one action per slot and read back the step results.
    ///
    /// `actions` is slot-major, `batch_size * action_size` floats. The length
    /// is checked before anything is written. `render` is only transmitted
    /// when the protocol variant carries the render flag.
    pub async fn step(&mut self, actions: &[f32], render: bool) -> Result<StepResponse> {
        self.ensure_usable()?;
        let batch_size = self.batch_size.ok_or(GymwireError::NotReady)?;

        let expected = batch_size * self.dims.action_size;
        if actions.len() != expected {
            return Err(GymwireError::ActionLength {
                expected,
                actual: actions.len(),
            });
        }

        let render = if self.options.render_flag {
            Some(render)
        } else {
            if render {
                tracing::trace!("render requested but protocol variant has no render flag");
            }
            None
        };
        let request = encode_step_request(render, actions);
        self.transition(SessionEvent::StepSent)?;

        tracing::debug!("step: batch_size={}", batch_size);
        match self.exchange_step(request, batch_size).await {
            Ok(response) => {
                self.transition(SessionEvent::StepReceived)?;
                Ok(response)
            }
            Err(e) => Err(self.fault(e)),
        }
    }

    /// Close the write half so the peer sees EOF, consuming the session.
    pub async fn close(mut self) -> Result<()> {
        self.transport.shutdown().await
    }

    async fn exchange_reset(&mut self, request: Bytes, batch_size: usize) -> Result<Vec<f32>> {
        self.transport.send(&request).await?;

        let count = batch_size * self.dims.state_size;
        let mut payload = self
            .transport
            .recv(reset_response_len(batch_size, self.dims.state_size))
            .await?;

        let mut states = Vec::new();
        ScalarCodec::get_f32_into(&mut payload, count, &mut states);
        tracing::trace!("read {} state floats", count);

        let token = ScalarCodec::get_i32(&mut payload);
        if let Err(e) = verify_sync_token(token) {
            tracing::error!(
                "sync error after reset: token={} bytes={:?}",
                token,
                ScalarCodec::encode_i32(token)
            );
            return Err(e);
        }

        Ok(states)
    }

    async fn exchange_step(&mut self, request: Bytes, batch_size: usize) -> Result<StepResponse> {
        // Half-duplex: the whole action batch goes out before any result is read.
        self.transport.send(&request).await?;

        let state_size = self.dims.state_size;
        let mut payload = self
            .transport
            .recv(step_response_len(batch_size, state_size))
            .await?;

        let mut response = StepResponse {
            states: Vec::with_capacity(batch_size * state_size),
            rewards: Vec::with_capacity(batch_size),
            dones: Vec::with_capacity(batch_size),
        };
        for slot in 0..batch_size {
            ScalarCodec::get_f32_into(&mut payload, state_size, &mut response.states);
            response.rewards.push(ScalarCodec::get_f32(&mut payload));
            let done = ScalarCodec::get_i32(&mut payload);
            response.dones.push(decode_done(slot, done)?);
        }

        Ok(response)
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            SessionState::Ready => Ok(()),
            // An awaiting state here means a previous round was abandoned mid-flight.
            _ => Err(GymwireError::SessionFaulted),
        }
    }

    fn transition(&mut self, event: SessionEvent) -> Result<()> {
        match self.state.on(event) {
            Some(next) => {
                self.state = next;
                Ok(())
            }
            None => {
                tracing::warn!("illegal {:?} in state {}", event, self.state.as_str());
                if self.state.is_awaiting_data() {
                    self.enter_faulted();
                }
                Err(GymwireError::SessionFaulted)
            }
        }
    }

    fn fault(&mut self, err: GymwireError) -> GymwireError {
        tracing::error!("session faulted in state {}: {}", self.state.as_str(), err);
        self.enter_faulted();
        err
    }

    fn enter_faulted(&mut self) {
        self.state = self
            .state
            .on(SessionEvent::Fault)
            .unwrap_or(SessionState::Faulted);
    }
}
