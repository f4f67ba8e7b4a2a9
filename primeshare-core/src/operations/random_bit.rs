//! Jointly generated shared random bits, after Nishide and Ohta
//! (Multiparty computation for interval, equality, and comparison without
//! bit-decomposition protocol, PKC 2007).

use crate::error::Result;
use crate::operations::{
    GenerateRandomNumber, Multiplication, OpState, Operation, Reconstruction, FAILURE_SENTINEL,
};
use crate::scheduler::Primitives;

/// Generates a share of a uniform random bit.
///
/// A random number r is generated, r² is revealed, and the bit is computed
/// as ½·(√(r²)⁻¹·r + 1). The operation fails when r² = 0 (probability 1/p)
/// and then sets its result to the failure sentinel. Note that the share of
/// the bit can be any field element; only the shared bit is 0 or 1.
pub struct GenerateRandomBit {
    state: OpState,
}

impl GenerateRandomBit {
    /// Creates a random bit generation operation. It takes no input.
    pub fn new() -> Self {
        Self {
            state: OpState::new(Vec::new()),
        }
    }
}

impl Default for GenerateRandomBit {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for GenerateRandomBit {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // start generating the initial random number
            1 => {
                let mut op: Box<dyn Operation> = Box::new(GenerateRandomNumber::new());
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
            }
            // finish the random number and start squaring it
            2 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let r = self.state.child(0).final_result().unwrap()[0];
                    self.state.set_intermediate(vec![r]);
                    let mut op: Box<dyn Operation> = Box::new(Multiplication::new(vec![r, r]));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                }
            }
            // finish squaring and start reconstructing r²
            3 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let r_squared = self.state.child(0).final_result().unwrap()[0];
                    let mut op: Box<dyn Operation> =
                        Box::new(Reconstruction::new(vec![r_squared]));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                }
            }
            // finish the reconstruction and compute the bit share
            4 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let r_squared = self.state.child(0).final_result().unwrap()[0];
                    let result = if r_squared != 0 {
                        let field = primitives.field();
                        let mut root = field.sqrt(r_squared);
                        // take the root from the lower half of the field
                        if root > field.modulus() / 2 {
                            root = field.modulus() - root;
                        }
                        let r = self.state.intermediate().unwrap()[0];
                        field.mul(
                            field.inverse(2),
                            field.add(field.mul(field.inverse(root), r), 1),
                        )
                    } else {
                        // no bit can be derived from this random number
                        FAILURE_SENTINEL
                    };
                    self.state.set_result(vec![result]);
                    self.state.advance();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
