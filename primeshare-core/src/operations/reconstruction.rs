//! Reconstruction of a shared secret.

use crate::error::Result;
use crate::operations::{OpState, Operation};
use crate::scheduler::Primitives;

/// Reconstructs a shared secret: every peer sends its share to everyone and
/// interpolates what it received.
pub struct Reconstruction {
    state: OpState,
}

impl Reconstruction {
    /// Creates a reconstruction of the share in `data`.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
        }
    }
}

impl Operation for Reconstruction {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // copy my share of the secret for everyone
            1 => {
                let share = self.state.initial()[0];
                let peers = primitives.num_privacy_peers();
                self.state.set_outbound(vec![share; peers], 1);
                self.state.copy_own_shares(primitives.my_index());
                self.state.advance();
            }
            // interpolate the secret from the received shares
            2 => {
                let result = primitives
                    .sharing()
                    .interpolate(self.state.inbound(), false)?;
                self.state.set_result(vec![result]);
                self.state.advance();
            }
            _ => {}
        }
        Ok(())
    }
}
