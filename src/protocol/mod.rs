//! Protocol module - wire layout, session state machine and engine.
//!
//! This module implements the reset/step protocol:
//! - Fixed scalar layouts for every message (no framing, no length prefix)
//! - Session state machine (`Unconfigured → Ready ⇄ Awaiting* → Faulted`)
//! - [`ProtocolEngine`] driving one peer from the trainer side

mod engine;
mod state;
mod wire_format;

pub use engine::{ProtocolEngine, StepResponse};
pub use state::{SessionEvent, SessionState};
pub use wire_format::{
    decode_done, encode_reset_request, encode_reset_response, encode_step_request,
    encode_step_response, reset_response_len, step_response_len, validate_batch_size,
    verify_sync_token, Dimensions, Opcode, ProtocolOptions, HANDSHAKE_SIZE, MAX_VECTOR_LEN,
    OPCODE_RESET, OPCODE_STEP, SYNC_TOKEN,
};
