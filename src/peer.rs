//! Environment side of the protocol.
//!
//! An [`EnvironmentPeer`] owns one connection to a trainer and answers its
//! requests with an [`Environment`]. The peer speaks first (the handshake),
//! then serves opcodes until the trainer closes the stream.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::batch::{ActionMatrix, Matrix, StateMatrix, StepBatch};
use crate::codec::{ScalarCodec, SCALAR_SIZE};
use crate::error::{GymwireError, Result};
use crate::protocol::{
    encode_reset_response, encode_step_response, Dimensions, Opcode, ProtocolOptions,
};
use crate::transport::Transport;

/// A batch of environments that can be reset and stepped together.
pub trait Environment {
    /// Floats per action vector.
    fn action_size(&self) -> usize;

    /// Floats per state vector.
    fn state_size(&self) -> usize;

    /// Start `batch_size` fresh environments; one state row per slot.
    fn reset(&mut self, batch_size: usize) -> Result<StateMatrix>;

    /// Advance every slot by its action row.
    fn step(&mut self, actions: &ActionMatrix, render: bool) -> Result<StepBatch>;
}

/// Serves one trainer connection.
pub struct EnvironmentPeer<S, E> {
    transport: Transport<S>,
    env: E,
    options: ProtocolOptions,
    dims: Dimensions,
    batch_size: Option<usize>,
}

impl<S, E> EnvironmentPeer<S, E>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
{
    /// Wrap a connected stream. Nothing is sent until [`handshake`](Self::handshake).
    pub fn new(stream: S, env: E, options: ProtocolOptions) -> Self {
        Self::with_transport(Transport::new(stream), env, options)
    }

    /// Wrap an existing transport, e.g. one with an I/O timeout.
    pub fn with_transport(transport: Transport<S>, env: E, options: ProtocolOptions) -> Self {
        let dims = Dimensions::new(env.action_size(), env.state_size());
        Self {
            transport,
            env,
            options,
            dims,
            batch_size: None,
        }
    }

    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Batch size from the last reset.
    #[inline]
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Announce `action_size` and `state_size` to the trainer.
    pub async fn handshake(&mut self) -> Result<()> {
        let hello = self.dims.encode()?;
        self.transport.send(&hello).await?;
        tracing::info!(
            "handshake sent: action_size={}, state_size={}",
            self.dims.action_size,
            self.dims.state_size
        );
        Ok(())
    }

    /// Answer requests until the trainer closes the connection.
    ///
    /// EOF where an opcode would start is a clean shutdown.
    pub async fn serve(&mut self) -> Result<()> {
        loop {
            let opcode = match self.transport.recv_i32().await {
                Ok(value) => value,
                Err(GymwireError::ConnectionClosed) => {
                    tracing::info!("trainer closed the connection");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            self.handle(Opcode::from_i32(opcode)?).await?;
        }
    }

    /// Read and answer the body of one request.
    pub async fn handle(&mut self, opcode: Opcode) -> Result<()> {
        match opcode {
            Opcode::Reset => self.handle_reset().await,
            Opcode::Step => self.handle_step().await,
        }
    }

    async fn handle_reset(&mut self) -> Result<()> {
        let raw = self.transport.recv_i32().await?;
        let batch_size = match usize::try_from(raw) {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(GymwireError::Protocol(format!(
                    "Invalid batch size {} in reset request",
                    raw
                )))
            }
        };
        tracing::debug!("reset: batch_size={}", batch_size);

        let states = self.env.reset(batch_size)?;
        states.expect_shape(batch_size, self.dims.state_size)?;

        self.transport
            .send(&encode_reset_response(states.as_slice()))
            .await?;
        self.batch_size = Some(batch_size);
        Ok(())
    }

    async fn handle_step(&mut self) -> Result<()> {
        let render = if self.options.render_flag {
            self.transport.recv_i32().await? != 0
        } else {
            false
        };
        let batch_size = self.batch_size.ok_or_else(|| {
            GymwireError::Protocol("Step request before any reset".to_string())
        })?;
        tracing::debug!("step: batch_size={}, render={}", batch_size, render);

        let count = batch_size * self.dims.action_size;
        let mut payload = self.transport.recv(count * SCALAR_SIZE).await?;
        let mut flat = Vec::with_capacity(count);
        ScalarCodec::get_f32_into(&mut payload, count, &mut flat);
        let actions = Matrix::from_flat(batch_size, self.dims.action_size, flat)?;

        let result = self.env.step(&actions, render)?;
        result.states.expect_shape(batch_size, self.dims.state_size)?;
        if result.rewards.len() != batch_size || result.dones.len() != batch_size {
            return Err(GymwireError::ShapeMismatch {
                expected_rows: batch_size,
                expected_cols: 1,
                rows: result.rewards.len().min(result.dones.len()),
                cols: 1,
            });
        }

        let response = encode_step_response(
            self.dims.state_size,
            result.states.as_slice(),
            &result.rewards,
            &result.dones,
        );
        self.transport.send(&response).await
    }

    /// Close the write half and hand back the environment.
    pub async fn close(mut self) -> Result<E> {
        self.transport.shutdown().await?;
        Ok(self.env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{step_response_len, SYNC_TOKEN};
    use crate::testing::{Script, ScriptedStream};
    use bytes::Buf;

    /// Each state component is `slot * 10 + step count`; reward echoes the
    /// first action; slot 0 finishes after two steps.
    struct Counter {
        steps: usize,
        batch: usize,
    }

    impl Environment for Counter {
        fn action_size(&self) -> usize {
            1
        }

        fn state_size(&self) -> usize {
            2
        }

        fn reset(&mut self, batch_size: usize) -> Result<StateMatrix> {
            self.steps = 0;
            self.batch = batch_size;
            Ok(Matrix::from_fn(batch_size, 2, |r, _| (r * 10) as f32))
        }

        fn step(&mut self, actions: &ActionMatrix, _render: bool) -> Result<StepBatch> {
            self.steps += 1;
            let steps = self.steps;
            Ok(StepBatch {
                states: Matrix::from_fn(self.batch, 2, |r, _| (r * 10 + steps) as f32),
                rewards: actions.iter_rows().map(|row| row[0]).collect(),
                dones: (0..self.batch).map(|r| r == 0 && steps >= 2).collect(),
            })
        }
    }

    fn counter() -> Counter {
        Counter { steps: 0, batch: 0 }
    }

    #[tokio::test]
    async fn test_handshake_sends_action_then_state() {
        let (stream, log) = ScriptedStream::new(Vec::new());
        let mut peer = EnvironmentPeer::new(stream, counter(), ProtocolOptions::default());
        peer.handshake().await.unwrap();
        assert_eq!(log.bytes(), Script::new().i32(1).i32(2).build());
    }

    #[tokio::test]
    async fn test_serve_reset_then_step_until_eof() {
        let script = Script::new()
            .i32(1)
            .i32(2)
            .i32(0)
            .f32s(&[0.5, 0.25])
            .build();
        let (stream, log) = ScriptedStream::new(script);
        let mut peer = EnvironmentPeer::new(stream, counter(), ProtocolOptions::default());

        peer.serve().await.unwrap();
        assert_eq!(peer.batch_size(), Some(2));

        let mut written = bytes::Bytes::from(log.bytes());
        let reset: Vec<f32> = (0..4).map(|_| written.get_f32_le()).collect();
        assert_eq!(reset, vec![0.0, 0.0, 10.0, 10.0]);
        assert_eq!(written.get_i32_le(), SYNC_TOKEN);

        assert_eq!(written.len(), step_response_len(2, 2));
        assert_eq!(written.get_f32_le(), 1.0);
        assert_eq!(written.get_f32_le(), 1.0);
        assert_eq!(written.get_f32_le(), 0.5);
        assert_eq!(written.get_i32_le(), 0);
        assert_eq!(written.get_f32_le(), 11.0);
        assert_eq!(written.get_f32_le(), 11.0);
        assert_eq!(written.get_f32_le(), 0.25);
        assert_eq!(written.get_i32_le(), 0);
    }

    #[tokio::test]
    async fn test_render_flag_is_consumed() {
        let script = Script::new()
            .i32(1)
            .i32(1)
            .i32(0)
            .i32(1)
            .f32s(&[2.0])
            .build();
        let (stream, log) = ScriptedStream::new(script);
        let options = ProtocolOptions { render_flag: true };
        let mut peer = EnvironmentPeer::new(stream, counter(), options);

        peer.serve().await.unwrap();
        let mut written = bytes::Bytes::from(log.bytes());
        written.advance(3 * SCALAR_SIZE);
        written.advance(2 * SCALAR_SIZE);
        assert_eq!(written.get_f32_le(), 2.0);
    }

    #[tokio::test]
    async fn test_unknown_opcode_is_protocol_error() {
        let (stream, _) = ScriptedStream::new(Script::new().i32(7).build());
        let mut peer = EnvironmentPeer::new(stream, counter(), ProtocolOptions::default());
        assert!(matches!(
            peer.serve().await,
            Err(GymwireError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_step_before_reset_is_protocol_error() {
        let script = Script::new().i32(0).f32s(&[1.0]).build();
        let (stream, log) = ScriptedStream::new(script);
        let mut peer = EnvironmentPeer::new(stream, counter(), ProtocolOptions::default());
        assert!(matches!(
            peer.serve().await,
            Err(GymwireError::Protocol(_))
        ));
        assert!(log.bytes().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_batch_is_protocol_error() {
        let (stream, _) = ScriptedStream::new(Script::new().i32(1).i32(0).build());
        let mut peer = EnvironmentPeer::new(stream, counter(), ProtocolOptions::default());
        assert!(matches!(
            peer.serve().await,
            Err(GymwireError::Protocol(_))
        ));
    }

    struct WrongWidth;

    impl Environment for WrongWidth {
        fn action_size(&self) -> usize {
            1
        }

        fn state_size(&self) -> usize {
            3
        }

        fn reset(&mut self, batch_size: usize) -> Result<StateMatrix> {
            Ok(Matrix::zeros(batch_size, 2))
        }

        fn step(&mut self, _actions: &ActionMatrix, _render: bool) -> Result<StepBatch> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_wrong_state_width_writes_nothing() {
        let (stream, log) = ScriptedStream::new(Script::new().i32(1).i32(2).build());
        let mut peer = EnvironmentPeer::new(stream, WrongWidth, ProtocolOptions::default());
        assert!(matches!(
            peer.serve().await,
            Err(GymwireError::ShapeMismatch { cols: 2, .. })
        ));
        assert_eq!(log.write_calls(), 0);
    }
}
