//! Linear prefix-OR over bit shares.

use crate::error::Result;
use crate::operations::{Multiplication, OpState, Operation};
use crate::scheduler::Primitives;

/// Computes the prefix-OR of a bitwise-shared value in a linear fashion:
/// z₀ = x₀ and z_i = z_{i-1} + x_i − z_{i-1}·x_i, one sub-multiplication per
/// bit, sequentially.
pub struct LinearPrefixOr {
    state: OpState,
}

impl LinearPrefixOr {
    /// Creates a prefix-OR of the bit shares in `data`.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
        }
    }
}

impl Operation for LinearPrefixOr {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let len = self.state.initial().len();
        let step = self.state.step();

        // the first prefix bit is the first input bit; start the first OR
        if step == 1 {
            let first = self.state.initial()[0];
            let mut prefix = vec![0; len];
            prefix[0] = first;
            self.state.set_intermediate(prefix);
            if len > 1 {
                let second = self.state.initial()[1];
                let mut op: Box<dyn Operation> =
                    Box::new(Multiplication::new(vec![first, second]));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
            } else {
                let prefix = self.state.take_intermediate();
                self.state.set_result(prefix);
            }
            self.state.advance();
            return Ok(());
        }

        // finish the previous OR and start the next one if necessary
        if step <= len {
            self.state.child_mut(0).do_step(primitives)?;
            if self.state.child(0).is_complete() {
                let product = self.state.child(0).final_result().unwrap()[0];
                let field = primitives.field();
                let previous = self.state.intermediate().unwrap()[step - 2];
                let bit = self.state.initial()[step - 1];
                let or = field.sub(field.add(previous, bit), product);
                self.state.intermediate_mut()[step - 1] = or;
                if step < len {
                    let next_bit = self.state.initial()[step];
                    let mut op: Box<dyn Operation> =
                        Box::new(Multiplication::new(vec![or, next_bit]));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                } else {
                    let prefix = self.state.take_intermediate();
                    self.state.set_result(prefix);
                }
                self.state.advance();
            }
        }
        Ok(())
    }
}
