//! Wire format encoding and decoding.
//!
//! Every message is a raw concatenation of 4-byte little-endian scalars:
//! ```text
//! Handshake       peer → trainer   action_size:i32  state_size:i32
//! Reset request   trainer → peer   opcode=1:i32     batch_size:i32
//! Reset response  peer → trainer   f32 × batch·state  sync_token:i32
//! Step request    trainer → peer   opcode=0:i32  [render:i32]  f32 × batch·action
//! Step response   peer → trainer   per slot: f32 × state  reward:f32  done:i32
//! ```
//!
//! All vectors are slot-major: every component of slot 0, then slot 1, ...

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::codec::{ScalarCodec, SCALAR_SIZE};
use crate::error::{GymwireError, Result};

/// Opcode value for a step request.
pub const OPCODE_STEP: i32 = 0;

/// Opcode value for a reset request.
pub const OPCODE_RESET: i32 = 1;

/// Sentinel the peer appends after every reset payload.
pub const SYNC_TOKEN: i32 = 99999;

/// Largest `action_size` / `state_size` a peer may announce.
pub const MAX_VECTOR_LEN: usize = 1 << 20;

/// Handshake size in bytes (two `i32`s).
pub const HANDSHAKE_SIZE: usize = 2 * SCALAR_SIZE;

/// Command selected by the leading `i32` of every trainer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Step,
    Reset,
}

impl Opcode {
    /// Wire value of this opcode.
    #[inline]
    pub fn as_i32(self) -> i32 {
        match self {
            Opcode::Step => OPCODE_STEP,
            Opcode::Reset => OPCODE_RESET,
        }
    }

    /// Parse a wire value.
    pub fn from_i32(value: i32) -> Result<Self> {
        match value {
            OPCODE_STEP => Ok(Opcode::Step),
            OPCODE_RESET => Ok(Opcode::Reset),
            other => Err(GymwireError::Protocol(format!("Unknown opcode {}", other))),
        }
    }
}

/// Per-slot vector sizes announced by a peer during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Floats per action vector.
    pub action_size: usize,
    /// Floats per state vector.
    pub state_size: usize,
}

impl Dimensions {
    pub fn new(action_size: usize, state_size: usize) -> Self {
        Self {
            action_size,
            state_size,
        }
    }

    /// Encode as the handshake message: `action_size` then `state_size`.
    pub fn encode(&self) -> Result<[u8; HANDSHAKE_SIZE]> {
        let mut buf = [0u8; HANDSHAKE_SIZE];
        buf[0..4].copy_from_slice(&ScalarCodec::encode_i32(to_wire_len(
            self.action_size,
            "action_size",
        )?));
        buf[4..8].copy_from_slice(&ScalarCodec::encode_i32(to_wire_len(
            self.state_size,
            "state_size",
        )?));
        Ok(buf)
    }

    /// Build from the two raw handshake integers.
    ///
    /// Negative sizes and sizes above [`MAX_VECTOR_LEN`] are rejected.
    pub fn from_wire(action_size: i32, state_size: i32) -> Result<Self> {
        Ok(Self::new(
            from_wire_len(action_size, "action_size")?,
            from_wire_len(state_size, "state_size")?,
        ))
    }

    /// Component-wise sum, used when several peers form one logical space.
    pub fn combine(self, other: Dimensions) -> Dimensions {
        Dimensions::new(
            self.action_size + other.action_size,
            self.state_size + other.state_size,
        )
    }
}

/// Protocol variant switches agreed out of band by both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOptions {
    /// Whether a step request carries the render-flag `i32` after the opcode.
    pub render_flag: bool,
}

fn from_wire_len(value: i32, what: &str) -> Result<usize> {
    let len = usize::try_from(value).map_err(|_| {
        GymwireError::Protocol(format!("Negative {} {} in handshake", what, value))
    })?;
    if len > MAX_VECTOR_LEN {
        return Err(GymwireError::Protocol(format!(
            "{} {} exceeds limit {}",
            what, len, MAX_VECTOR_LEN
        )));
    }
    Ok(len)
}

/// Convert a length to its `i32` wire value.
fn to_wire_len(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| GymwireError::Protocol(format!("{} {} does not fit in i32", what, value)))
}

/// Validate a batch size for the wire: positive and `i32`-representable.
pub fn validate_batch_size(batch_size: usize) -> Result<i32> {
    match i32::try_from(batch_size) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(GymwireError::InvalidBatchSize(batch_size)),
    }
}

/// Encode a reset request.
pub fn encode_reset_request(batch_size: usize) -> Result<Bytes> {
    let batch = validate_batch_size(batch_size)?;
    let mut buf = BytesMut::with_capacity(2 * SCALAR_SIZE);
    ScalarCodec::put_i32(&mut buf, Opcode::Reset.as_i32());
    ScalarCodec::put_i32(&mut buf, batch);
    Ok(buf.freeze())
}

/// Encode a full step request: opcode, optional render flag, then every action.
///
/// `render` is `None` for the protocol variant without the flag.
pub fn encode_step_request(render: Option<bool>, actions: &[f32]) -> Bytes {
    let header_words = if render.is_some() { 2 } else { 1 };
    let mut buf = BytesMut::with_capacity((header_words + actions.len()) * SCALAR_SIZE);
    ScalarCodec::put_i32(&mut buf, Opcode::Step.as_i32());
    if let Some(render) = render {
        ScalarCodec::put_i32(&mut buf, i32::from(render));
    }
    ScalarCodec::put_f32_slice(&mut buf, actions);
    buf.freeze()
}

/// Encode a reset response: all states, then the sync token.
pub fn encode_reset_response(states: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity((states.len() + 1) * SCALAR_SIZE);
    ScalarCodec::put_f32_slice(&mut buf, states);
    ScalarCodec::put_i32(&mut buf, SYNC_TOKEN);
    buf.freeze()
}

/// Encode a step response: per slot, the state, the reward and the done flag.
///
/// `states` is slot-major with `state_size` floats per slot and must hold
/// exactly `rewards.len()` slots; `rewards` and `dones` have equal length.
pub fn encode_step_response(
    state_size: usize,
    states: &[f32],
    rewards: &[f32],
    dones: &[bool],
) -> Bytes {
    debug_assert_eq!(states.len(), rewards.len() * state_size);
    debug_assert_eq!(rewards.len(), dones.len());

    let mut buf = BytesMut::with_capacity(step_response_len(rewards.len(), state_size));
    for (slot, (&reward, &done)) in rewards.iter().zip(dones).enumerate() {
        let start = slot * state_size;
        ScalarCodec::put_f32_slice(&mut buf, &states[start..start + state_size]);
        ScalarCodec::put_f32(&mut buf, reward);
        ScalarCodec::put_i32(&mut buf, i32::from(done));
    }
    buf.freeze()
}

/// Bytes in a reset response payload, sync token included.
#[inline]
pub fn reset_response_len(batch_size: usize, state_size: usize) -> usize {
    (batch_size * state_size + 1) * SCALAR_SIZE
}

/// Bytes in a step response payload.
#[inline]
pub fn step_response_len(batch_size: usize, state_size: usize) -> usize {
    batch_size * (state_size + 2) * SCALAR_SIZE
}

/// Decode a done flag; only 0 and 1 are legal.
#[inline]
pub fn decode_done(slot: usize, value: i32) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(GymwireError::InvalidDoneFlag { slot, value }),
    }
}

/// Check the trailing sync token of a reset response.
#[inline]
pub fn verify_sync_token(value: i32) -> Result<()> {
    if value == SYNC_TOKEN {
        Ok(())
    } else {
        Err(GymwireError::Desync {
            expected: SYNC_TOKEN,
            actual: value,
        })
    }
}
