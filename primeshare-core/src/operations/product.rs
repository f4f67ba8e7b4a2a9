//! Product of several shared factors.

use crate::error::Result;
use crate::operations::{Multiplication, OpState, Operation};
use crate::scheduler::Primitives;

/// Multiplies a list of shared factors as a balanced tree: in every round
/// the factors with even and odd index are paired, so ⌈log₂ k⌉ rounds are
/// needed. An odd factor is carried over to the next round.
pub struct Product {
    state: OpState,
}

impl Product {
    /// Creates a product of the factor shares in `data`.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
        }
    }
}

impl Operation for Product {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // multiply the first batch of factor pairs
            1 => {
                let factors = self.state.initial().to_vec();
                let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(factors.len() / 2);
                for pair in factors.chunks(2) {
                    if let [a, b] = *pair {
                        let mut op: Box<dyn Operation> =
                            Box::new(Multiplication::new(vec![a, b]));
                        op.do_step(primitives)?;
                        children.push(op);
                    } else {
                        // leftover odd factor joins the next round
                        self.state.set_intermediate(vec![pair[0]]);
                    }
                }
                self.state.set_children(children);
                self.state.advance();
            }
            // finish the running multiplications and pair up their results
            2 => {
                let count = self.state.child_count();
                let mut finished = true;
                for i in 0..count {
                    self.state.child_mut(i).do_step(primitives)?;
                    finished &= self.state.child(i).is_complete();
                }
                if !finished {
                    // another message exchange is needed
                    return Ok(());
                }

                let mut factors: Vec<u64> = (0..count)
                    .map(|i| self.state.child(i).final_result().unwrap()[0])
                    .collect();
                if self.state.intermediate().is_some() {
                    factors.push(self.state.take_intermediate()[0]);
                }
                if factors.len() == 1 {
                    self.state.set_result(factors);
                    self.state.advance();
                    return Ok(());
                }

                let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(factors.len() / 2);
                for pair in factors.chunks(2) {
                    if let [a, b] = *pair {
                        let mut op: Box<dyn Operation> =
                            Box::new(Multiplication::new(vec![a, b]));
                        op.do_step(primitives)?;
                        children.push(op);
                    } else {
                        self.state.set_intermediate(vec![pair[0]]);
                    }
                }
                self.state.set_children(children);
            }
            _ => {}
        }
        Ok(())
    }
}
