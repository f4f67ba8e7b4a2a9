//! Bitwise-shared random numbers.

use crate::error::Result;
use crate::operations::{
    BitwiseLessThan, BitwiseOperands, GenerateRandomBit, OpState, Operation, Reconstruction,
    FAILURE_SENTINEL,
};
use crate::scheduler::Primitives;

/// Generates a random number shared bit by bit.
///
/// First ⌈log₂ p⌉ shared random bits are generated (or taken from the
/// supplied bit shares); then a bitwise less-than against p checks that the
/// constructed number is a valid field element. On success the final result
/// holds the bit shares; the share of the number itself follows from
/// [crate::field::Gf::number_from_bits].
///
/// The operation fails (sentinel result) when any bit generation fails or
/// when the constructed number is not below p.
pub struct GenerateBitwiseRandomNumber {
    state: OpState,
    supplied_bits: Option<Vec<u64>>,
}

impl GenerateBitwiseRandomNumber {
    /// Creates the operation; `bits` optionally supplies random bit shares
    /// to build the number from.
    pub fn new(bits: Option<Vec<u64>>) -> Self {
        Self {
            state: OpState::new(Vec::new()),
            supplied_bits: bits,
        }
    }
}

impl Operation for GenerateBitwiseRandomNumber {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let bits_count = primitives.bits_count();

        // start generating the random bits, or adopt the supplied ones
        if self.state.step() == 1 {
            match self.supplied_bits.take() {
                None => {
                    let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(bits_count);
                    for _ in 0..bits_count {
                        let mut op: Box<dyn Operation> = Box::new(GenerateRandomBit::new());
                        op.do_step(primitives)?;
                        children.push(op);
                    }
                    self.state.set_children(children);
                    self.state.advance();
                    return Ok(());
                }
                Some(bits) => {
                    self.state.set_intermediate(bits);
                    self.state.advance();
                    // immediately go on to the next step
                }
            }
        }

        // finish the bit generation and start the bitwise less-than
        if self.state.step() == 2 {
            if self.state.child_count() > 0 {
                for i in 0..bits_count {
                    self.state.child_mut(i).do_step(primitives)?;
                }
                if self.state.child(0).is_complete() {
                    let mut bits = Vec::with_capacity(bits_count);
                    for i in 0..bits_count {
                        let bit = self.state.child(i).final_result().unwrap()[0];
                        if bit == FAILURE_SENTINEL {
                            self.state.set_result(vec![FAILURE_SENTINEL]);
                            return Ok(());
                        }
                        bits.push(bit);
                    }
                    self.state.set_intermediate(bits);
                }
            }
            if let Some(bits) = self.state.intermediate() {
                let field_bits = primitives.bits(primitives.field_size());
                let mut op: Box<dyn Operation> = Box::new(BitwiseLessThan::new(
                    BitwiseOperands::PublicRight,
                    bits.clone(),
                    field_bits,
                ));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
            }
            return Ok(());
        }

        match self.state.step() {
            // finish the less-than and start reconstructing its result
            3 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let lt_share = self.state.child(0).final_result().unwrap()[0];
                    let mut op: Box<dyn Operation> = Box::new(Reconstruction::new(vec![lt_share]));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                }
            }
            // set the bit shares as result if the number is a field element
            4 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    if self.state.child(0).final_result().unwrap()[0] == 1 {
                        let bits = self.state.take_intermediate();
                        self.state.set_result(bits);
                        self.state.advance();
                    } else {
                        self.state.set_result(vec![FAILURE_SENTINEL]);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Generates at least the requested amount of bitwise-shared random numbers.
///
/// The operation estimates how many generation attempts are needed to meet
/// the request, launches them in parallel, assembles successful bits into
/// bitwise random number attempts, and recurses for any shortfall. It does
/// not terminate before the requested amount has been produced, so its
/// running time varies.
pub struct BatchGenerateBitwiseRandomNumbers {
    state: OpState,
}

impl BatchGenerateBitwiseRandomNumbers {
    /// Creates a batch producing at least `count` numbers.
    pub fn new(count: u64) -> Self {
        Self {
            state: OpState::new(vec![count]),
        }
    }
}

impl Operation for BatchGenerateBitwiseRandomNumbers {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let bits_count = primitives.bits_count();
        match self.state.step() {
            // estimate the number of attempts needed and start generating
            // random bits
            1 => {
                let requested = self.state.initial()[0] as f64;
                let field_size = primitives.field_size() as f64;
                let next_power_of_two = (1u128 << bits_count) as f64;
                // a generated number survives the less-than against p with
                // probability p/2^bits, a bit generation with (p-2)/p
                let number_attempts = (requested / (field_size / next_power_of_two)) as u64 + 2;
                let bit_attempts =
                    (number_attempts as f64 * bits_count as f64 / ((field_size - 2.0) / field_size))
                        as usize;

                let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(bit_attempts);
                for _ in 0..bit_attempts {
                    let mut op: Box<dyn Operation> = Box::new(GenerateRandomBit::new());
                    op.do_step(primitives)?;
                    children.push(op);
                }
                self.state.set_children(children);
                self.state.advance();
            }
            // finish the bits and start assembling numbers from them
            2 => {
                let attempts = self.state.child_count();
                let mut generated_bits = Vec::with_capacity(attempts);
                let mut completed = 0;
                for i in 0..attempts {
                    self.state.child_mut(i).do_step(primitives)?;
                    if self.state.child(i).is_complete() {
                        completed += 1;
                        let bit = self.state.child(i).final_result().unwrap()[0];
                        if bit != FAILURE_SENTINEL {
                            generated_bits.push(bit);
                        }
                    }
                }
                if completed == attempts {
                    let numbers = generated_bits.len() / bits_count;
                    let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(numbers);
                    for chunk in generated_bits.chunks_exact(bits_count).take(numbers) {
                        let mut op: Box<dyn Operation> =
                            Box::new(GenerateBitwiseRandomNumber::new(Some(chunk.to_vec())));
                        op.do_step(primitives)?;
                        children.push(op);
                    }
                    self.state.set_children(children);
                    self.state.advance();
                }
            }
            // finish the numbers; recurse for any shortfall
            3 => {
                let attempts = self.state.child_count();
                let mut successful = 0;
                let mut completed = 0;
                for i in 0..attempts {
                    self.state.child_mut(i).do_step(primitives)?;
                    if self.state.child(i).is_complete() {
                        completed += 1;
                        if self.state.child(i).final_result().unwrap()[0] != FAILURE_SENTINEL {
                            successful += 1;
                        }
                    }
                }
                if completed == attempts {
                    let mut bits = Vec::with_capacity(successful * bits_count);
                    for i in 0..attempts {
                        let result = self.state.child(i).final_result().unwrap();
                        if result[0] != FAILURE_SENTINEL {
                            bits.extend_from_slice(result);
                        }
                    }
                    let requested = self.state.initial()[0];
                    if (successful as u64) < requested {
                        tracing::debug!(
                            "successfully generated {successful} bitwise shared random numbers, \
                             but need {requested}"
                        );
                        self.state.set_intermediate(bits);
                        let mut op: Box<dyn Operation> = Box::new(
                            BatchGenerateBitwiseRandomNumbers::new(requested - successful as u64),
                        );
                        op.do_step(primitives)?;
                        self.state.set_children(vec![op]);
                        self.state.advance();
                    } else {
                        self.state.clear_children();
                        self.state.set_result(bits);
                        self.state.advance();
                        self.state.advance();
                    }
                }
            }
            // complete the recursive batch for the remainder
            4 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let mut bits = self.state.take_intermediate();
                    bits.extend_from_slice(self.state.child(0).final_result().unwrap());
                    self.state.clear_children();
                    self.state.set_result(bits);
                    self.state.advance();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
