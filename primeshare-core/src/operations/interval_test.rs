//! Interval membership test for small public intervals.

use crate::error::Result;
use crate::operations::{Equal, OpState, Operation, Product};
use crate::scheduler::Primitives;

/// Tests whether a shared x lies in the public interval [l, u].
///
/// Builds the polynomial y(x) = (x-l)·(x-(l+1))·...·(x-u) as a [Product]
/// and tests y(x) = 0 with [Equal]; a share of one iff x is in the
/// interval. The number of multiplications is linear in the interval size,
/// so this is only suitable for small intervals.
pub struct SmallIntervalTest {
    state: OpState,
}

impl SmallIntervalTest {
    /// Creates an interval test; `data` holds `[x, l, u]`.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
        }
    }
}

impl Operation for SmallIntervalTest {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let field = primitives.field();
        match self.state.step() {
            // build the (x - v) factors and start the product
            1 => {
                let share = self.state.initial()[0];
                let lower = self.state.initial()[1];
                let upper = self.state.initial()[2];
                if lower == upper {
                    // a single-point interval is a plain equality test
                    let mut op: Box<dyn Operation> = Box::new(Equal::new(vec![lower, share]));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                    self.state.advance();
                    return Ok(());
                }
                let factors = (lower..=upper).map(|v| field.sub(share, v)).collect();
                let mut op: Box<dyn Operation> = Box::new(Product::new(factors));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
            }
            // finish the product and start the zero test
            2 => {
                if !self.state.child(0).is_complete() {
                    self.state.child_mut(0).do_step(primitives)?;
                }
                if self.state.child(0).is_complete() {
                    let product = self.state.child(0).final_result().unwrap()[0];
                    let mut op: Box<dyn Operation> = Box::new(Equal::new(vec![0, product]));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                }
            }
            // finish the zero test
            3 => {
                if !self.state.child(0).is_complete() {
                    self.state.child_mut(0).do_step(primitives)?;
                }
                if self.state.child(0).is_complete() {
                    let result = self.state.child(0).final_result().unwrap().to_vec();
                    self.state.set_result(result);
                    self.state.advance();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
