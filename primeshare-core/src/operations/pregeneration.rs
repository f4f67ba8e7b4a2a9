//! Pre-generation of bitwise-shared random numbers for composite
//! operations.

use crate::error::Result;
use crate::operations::{BatchGenerateBitwiseRandomNumbers, OpState, Operation};
use crate::scheduler::Primitives;

/// Helper for operations whose sub-operations consume bitwise-shared random
/// numbers (minimum, Bloom-filter thresholds).
///
/// Random number generation has a high per-batch overhead, so the bits for
/// all sub-operations should be produced in one batch at the highest
/// possible level, either handed in from outside (the driver's batch
/// pre-generation) or generated here before the operation's first real
/// step:
///
/// ```text
/// if self.pregen.generate(&mut self.state, needed, primitives)? {
///     // randomness is available, do the actual step
/// }
/// ```
#[derive(Default)]
pub(crate) struct RandBitsPregeneration {
    /// 0 = not started, 1 = batch running.
    generation_state: u8,
    randomness: Option<Vec<u64>>,
    bit_index: usize,
}

impl RandBitsPregeneration {
    /// Whether the randomness has already been provided or generated.
    pub(crate) fn randomness_set(&self) -> bool {
        self.randomness.is_some()
    }

    /// Stores externally provided random number bit shares.
    pub(crate) fn set_bits(&mut self, bits: Vec<u64>) {
        self.randomness = Some(bits);
    }

    /// Hands out the next `bits_needed` random bits for a sub-operation.
    pub(crate) fn take_bits(&mut self, bits_needed: usize) -> Vec<u64> {
        let randomness = self.randomness.as_ref().expect("randomness not generated");
        let bits = randomness[self.bit_index..self.bit_index + bits_needed].to_vec();
        self.bit_index += bits_needed;
        bits
    }

    /// Drives the generation of `numbers_needed` bitwise-shared random
    /// numbers, using the operation's child slot for the batch operation.
    /// Returns true once the randomness is available.
    pub(crate) fn generate(
        &mut self,
        state: &mut OpState,
        numbers_needed: usize,
        primitives: &Primitives,
    ) -> Result<bool> {
        if self.randomness.is_some() {
            return Ok(true);
        }
        match self.generation_state {
            0 => {
                let mut op: Box<dyn Operation> =
                    Box::new(BatchGenerateBitwiseRandomNumbers::new(numbers_needed as u64));
                op.do_step(primitives)?;
                state.set_children(vec![op]);
                self.generation_state = 1;
                Ok(false)
            }
            _ => {
                state.child_mut(0).do_step(primitives)?;
                if state.child(0).is_complete() {
                    self.randomness = Some(state.child(0).final_result().unwrap().to_vec());
                    state.clear_children();
                    self.generation_state = 0;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}
