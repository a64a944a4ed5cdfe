//! Multi-peer aggregation.
//!
//! Several environment processes can each contribute a block of the state
//! and action vectors. The [`Aggregator`] keeps their sessions in
//! registration order and presents one logical session whose sizes are the
//! sums of the peers' sizes:
//!
//! ```text
//! peer 0: state [s0 s1 s2]  action [a0 a1]
//! peer 1: state [t0]        action [b0]
//! slot row:     [s0 s1 s2 t0]      [a0 a1 b0]
//! ```
//!
//! Rewards of a slot are summed across peers; a slot is done when any peer
//! reports it done.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{GymwireError, Result};
use crate::protocol::{Dimensions, ProtocolEngine, StepResponse};

/// Ordered collection of peer sessions forming one logical session.
pub struct Aggregator<S> {
    peers: Vec<ProtocolEngine<S>>,
    dims: Dimensions,
    batch_size: Option<usize>,
    faulted: bool,
}

impl<S> Aggregator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Combine sessions in the given (registration) order.
    pub fn new(peers: Vec<ProtocolEngine<S>>) -> Result<Self> {
        if peers.is_empty() {
            return Err(GymwireError::Config(
                "aggregator needs at least one peer".to_string(),
            ));
        }

        let dims = peers
            .iter()
            .map(ProtocolEngine::dimensions)
            .fold(Dimensions::new(0, 0), Dimensions::combine);

        tracing::info!(
            "aggregating {} peer(s): action_size={}, state_size={}",
            peers.len(),
            dims.action_size,
            dims.state_size
        );

        Ok(Self {
            peers,
            dims,
            batch_size: None,
            faulted: false,
        })
    }

    /// Combined dimensions.
    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Number of peers.
    #[inline]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Per-peer dimensions in registration order.
    pub fn peer_dimensions(&self) -> Vec<Dimensions> {
        self.peers.iter().map(ProtocolEngine::dimensions).collect()
    }

    /// Current batch size, `None` before the first reset.
    #[inline]
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    /// Whether any peer session has faulted.
    #[inline]
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Reset every peer with the same batch size and join their states.
    ///
    /// Returns `batch_size * state_size` floats, slot-major, each row the
    /// concatenation of the peers' rows.
    pub async fn reset(&mut self, batch_size: usize) -> Result<Vec<f32>> {
        self.ensure_usable()?;

        let mut per_peer = Vec::with_capacity(self.peers.len());
        let mut failure = None;
        for (index, peer) in self.peers.iter_mut().enumerate() {
            match peer.reset(batch_size).await {
                Ok(states) => per_peer.push(states),
                Err(e) => {
                    failure = Some((index, e));
                    break;
                }
            }
        }
        if let Some((index, e)) = failure {
            return Err(self.record(index, e));
        }

        let widths: Vec<usize> = self.peers.iter().map(|p| p.state_size()).collect();
        self.batch_size = Some(batch_size);
        Ok(interleave(batch_size, &widths, &per_peer))
    }

    /// Split each action row across peers, step every peer, and join results.
    ///
    /// `actions` is slot-major with the combined `action_size` per slot.
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

        let action_widths: Vec<usize> = self.peers.iter().map(|p| p.action_size()).collect();
        let peer_actions = split(batch_size, self.dims.action_size, &action_widths, actions);

        let mut per_peer = Vec::with_capacity(self.peers.len());
        let mut failure = None;
        for (index, (peer, peer_actions)) in self.peers.iter_mut().zip(&peer_actions).enumerate() {
            match peer.step(peer_actions, render).await {
                Ok(response) => per_peer.push(response),
                Err(e) => {
                    failure = Some((index, e));
                    break;
                }
            }
        }
        if let Some((index, e)) = failure {
            return Err(self.record(index, e));
        }

        let mut rewards = vec![0.0f32; batch_size];
        let mut dones = vec![false; batch_size];
        for response in &per_peer {
            for slot in 0..batch_size {
                rewards[slot] += response.rewards[slot];
                dones[slot] |= response.dones[slot];
            }
        }

        let state_widths: Vec<usize> = self.peers.iter().map(|p| p.state_size()).collect();
        let peer_states: Vec<Vec<f32>> = per_peer.into_iter().map(|r| r.states).collect();
        let states = interleave(batch_size, &state_widths, &peer_states);

        Ok(StepResponse {
            states,
            rewards,
            dones,
        })
    }

    /// Close every peer's write half, in registration order.
    pub async fn close(self) -> Result<()> {
        for peer in self.peers {
            peer.close().await?;
        }
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.faulted {
            Err(GymwireError::SessionFaulted)
        } else {
            Ok(())
        }
    }

    fn record(&mut self, index: usize, err: GymwireError) -> GymwireError {
        if err.is_fatal() {
            tracing::error!("peer {} faulted: {}", index, err);
            self.faulted = true;
        }
        err
    }
}

/// Join per-peer slot-major blocks into combined rows.
fn interleave(batch_size: usize, widths: &[usize], blocks: &[Vec<f32>]) -> Vec<f32> {
    let total: usize = widths.iter().sum();
    let mut out = Vec::with_capacity(batch_size * total);
    for slot in 0..batch_size {
        for (block, &width) in blocks.iter().zip(widths) {
            out.extend_from_slice(&block[slot * width..(slot + 1) * width]);
        }
    }
    out
}

/// Split combined rows into per-peer slot-major blocks.
fn split(batch_size: usize, total: usize, widths: &[usize], combined: &[f32]) -> Vec<Vec<f32>> {
    let mut blocks: Vec<Vec<f32>> = widths
        .iter()
        .map(|w| Vec::with_capacity(batch_size * w))
        .collect();
    for slot in 0..batch_size {
        let row = &combined[slot * total..(slot + 1) * total];
        let mut offset = 0;
        for (block, &width) in blocks.iter_mut().zip(widths) {
            block.extend_from_slice(&row[offset..offset + width]);
            offset += width;
        }
    }
    blocks
}
