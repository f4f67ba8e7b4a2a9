//! Jointly generated shared random numbers.

use crate::error::Result;
use crate::operations::{OpState, Operation};
use crate::scheduler::Primitives;
use crate::sharing::MISSING_SHARE;

/// Generates a share of a uniform random field element no peer knows.
///
/// Every privacy peer samples a random value, shares it to everyone, and
/// sums the shares it receives; the result is a share of the sum of all
/// sampled values.
pub struct GenerateRandomNumber {
    state: OpState,
}

impl GenerateRandomNumber {
    /// Creates a random number generation operation. It takes no input.
    pub fn new() -> Self {
        Self {
            state: OpState::new(Vec::new()),
        }
    }
}

impl Default for GenerateRandomNumber {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for GenerateRandomNumber {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // sample a random value and share it
            1 => {
                let value = primitives.random_field_element();
                let shares = primitives.generate_share(value);
                self.state.set_outbound(shares, 1);
                self.state.copy_own_shares(primitives.my_index());
                self.state.advance();
            }
            // sum up the received shares; contributions of crashed peers are
            // left out on every live peer alike
            2 => {
                let field = primitives.field();
                let mut sum = 0;
                for &share in self.state.inbound() {
                    if share != MISSING_SHARE {
                        sum = field.add(sum, share);
                    }
                }
                self.state.set_result(vec![sum]);
                self.state.advance();
            }
            _ => {}
        }
        Ok(())
    }
}
