//! Agreement on a public {0,1} vector across privacy peers.

use crate::error::Result;
use crate::operations::{OpState, Operation};
use crate::scheduler::Primitives;
use crate::sharing::MISSING_SHARE;

/// Synchronizes an array of {0,1} values: each peer broadcasts its local
/// vector and the logical AND over all received vectors is computed per
/// position. Used, for instance, to agree on the set of responsive input
/// peers. A vector that never arrived (crashed peer) does not veto any
/// position.
pub struct Synchronization {
    state: OpState,
}

impl Synchronization {
    /// Creates a synchronization of the given {0,1} vector.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
        }
    }
}

impl Operation for Synchronization {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // send the local vector to all privacy peers; these values are
            // not shares of a secret, every peer gets the same plain copy
            1 => {
                let data = self.state.initial().to_vec();
                let width = data.len();
                let peers = primitives.num_privacy_peers();
                let mut outbound = Vec::with_capacity(peers * width);
                for _ in 0..peers {
                    outbound.extend_from_slice(&data);
                }
                self.state.set_outbound(outbound, width);
                self.state.copy_own_shares(primitives.my_index());
                self.state.advance();
            }
            // AND the received vectors position by position
            2 => {
                let width = self.state.initial().len();
                let mut aggregate = vec![1u64; width];
                for peer in 0..primitives.num_privacy_peers() {
                    let row = self.state.inbound_row(peer);
                    for (acc, &value) in aggregate.iter_mut().zip(row) {
                        if value != MISSING_SHARE {
                            *acc &= value;
                        }
                    }
                }
                self.state.set_result(aggregate);
                self.state.advance();
            }
            _ => {}
        }
        Ok(())
    }
}
