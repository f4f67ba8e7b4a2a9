//! Exponentiation of a share by a public exponent.

use crate::error::Result;
use crate::operations::{Multiplication, OpState, Operation};
use crate::scheduler::Primitives;

/// Computes x^n for a shared x and a public exponent n >= 1 using
/// square-and-multiply.
///
/// Per exponent bit, a multiply sub-multiplication (bit 1, except the first
/// set bit which is absorbed directly) and a square sub-multiplication
/// (except for the final bit) run concurrently within the same rounds. The
/// intermediary result holds the pair (multiply accumulator, squared base).
pub struct Power {
    state: OpState,
}

impl Power {
    /// Creates a power operation; `data` holds `[x, n]`.
    pub fn new(data: Vec<u64>) -> Self {
        let mut state = OpState::new(data);
        let x = state.initial()[0];
        state.set_intermediate(vec![1, x]);
        Self { state }
    }
}

impl Operation for Power {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let exponent = self.state.initial()[1];
        let bit_len = (64 - exponent.leading_zeros()) as usize;
        // the lowest set bit is absorbed without a multiplication
        let first_one = exponent.trailing_zeros() as usize + 1;

        let step = self.state.step();
        if step > bit_len {
            return Ok(());
        }

        if self.state.child_count() == 0 {
            // begin the sub-multiplications of exponent bit `step`
            // (counted from the least significant bit)
            let bit_is_one = (exponent >> (step - 1)) & 1 == 1;
            let mut multiply: Option<Box<dyn Operation>> = None;
            let mut square: Option<Box<dyn Operation>> = None;

            if step == first_one {
                // the first set bit makes the accumulator the squared base
                let squared_base = self.state.intermediate().unwrap()[1];
                self.state.set_intermediate(vec![squared_base, squared_base]);
                if first_one == bit_len {
                    // the exponent has a single set bit; nothing left to do
                    self.state.set_result(vec![squared_base]);
                    self.state.advance();
                    return Ok(());
                }
            } else if bit_is_one {
                let acc = self.state.intermediate().unwrap()[0];
                let base = self.state.intermediate().unwrap()[1];
                let mut op: Box<dyn Operation> = Box::new(Multiplication::new(vec![acc, base]));
                op.do_step(primitives)?;
                multiply = Some(op);
            }
            if step < bit_len {
                let base = self.state.intermediate().unwrap()[1];
                let mut op: Box<dyn Operation> = Box::new(Multiplication::new(vec![base, base]));
                op.do_step(primitives)?;
                square = Some(op);
            }
            self.state.set_child_slots(vec![multiply, square]);
            return Ok(());
        }

        // sub-multiplications are running
        let mut multiply_running = false;
        let mut multiply_completed = false;
        let mut square_running = false;
        let mut square_completed = false;
        if self.state.has_child(0) {
            if self.state.child(0).is_complete() {
                multiply_completed = true;
            } else {
                multiply_running = true;
            }
        }
        if self.state.has_child(1) {
            if self.state.child(1).is_complete() {
                square_completed = true;
            } else {
                square_running = true;
            }
        }

        if multiply_running {
            self.state.child_mut(0).do_step(primitives)?;
            if self.state.child(0).is_complete() {
                multiply_completed = true;
                multiply_running = false;
            }
        }
        if square_running {
            self.state.child_mut(1).do_step(primitives)?;
            if self.state.child(1).is_complete() {
                square_completed = true;
                square_running = false;
            }
        }

        let mut non_last_step_completed = false;
        let mut last_step_completed = false;
        let mut acc = self.state.intermediate().unwrap()[0];
        let mut base = self.state.intermediate().unwrap()[1];
        if !multiply_completed && !multiply_running && square_completed {
            // bit 0 (or the absorbed first set bit): only the square ran
            base = self.state.child(1).final_result().unwrap()[0];
            non_last_step_completed = true;
        }
        if multiply_completed && square_completed {
            acc = self.state.child(0).final_result().unwrap()[0];
            base = self.state.child(1).final_result().unwrap()[0];
            non_last_step_completed = true;
        }
        if multiply_completed && !square_completed && !square_running {
            // the final bit squares nothing
            acc = self.state.child(0).final_result().unwrap()[0];
            last_step_completed = true;
        }

        if non_last_step_completed || last_step_completed {
            self.state.set_intermediate(vec![acc, base]);
            self.state.clear_children();
        }
        if non_last_step_completed {
            self.state.advance();
            // directly schedule the next bit's multiplications in this round
            self.do_step(primitives)?;
        }
        if last_step_completed {
            self.state.set_result(vec![acc]);
            self.state.advance();
        }
        Ok(())
    }
}
