//! Equality test via Fermat's little theorem.

use crate::error::Result;
use crate::operations::{OpState, Operation, Power};
use crate::scheduler::Primitives;

/// Tests two shared secrets for equality.
///
/// In GF(p) with prime p, a^(p-1) is 1 for a != 0 and 0 for a == 0, so the
/// operation computes 1 - (a-b)^(p-1): a share of one if the inputs are
/// equal and a share of zero otherwise. Only works for prime field sizes.
pub struct Equal {
    state: OpState,
}

impl Equal {
    /// Creates an equality test of the two shares in `data`.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
        }
    }
}

impl Operation for Equal {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // raise the difference of the shares to the (p-1)-th power
            1 => {
                let field = primitives.field();
                let difference = field.sub(self.state.initial()[0], self.state.initial()[1]);
                let mut op: Box<dyn Operation> =
                    Box::new(Power::new(vec![difference, field.modulus() - 1]));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
            }
            // finish the power and flip the result
            2 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let power = self.state.child(0).final_result().unwrap()[0];
                    let result = primitives.field().sub(1, power);
                    self.state.set_result(vec![result]);
                    self.state.advance();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
