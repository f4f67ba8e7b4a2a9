//! Least-significant bit of a shared secret, after Nishide and Ohta.

use crate::error::Result;
use crate::operations::{
    BitwiseLessThan, BitwiseOperands, GenerateBitwiseRandomNumber, Multiplication, OpState,
    Operation, Reconstruction, FAILURE_SENTINEL,
};
use crate::scheduler::Primitives;

/// Computes the least significant bit of a shared number x.
///
/// A bitwise-shared random number r masks the secret: c = x + r is revealed,
/// then LSB(x) is recovered from c₀, r₀ and a bitwise less-than of the
/// public c against r. If no random bits are supplied the operation
/// generates its own bitwise random number and then may fail (sentinel
/// result) like [GenerateBitwiseRandomNumber] does.
///
/// The intermediary result holds the bits of r followed by the share of
/// c₀ ⊕ r₀ and the share of the bitwise less-than result.
pub struct LeastSignificantBit {
    state: OpState,
}

impl LeastSignificantBit {
    /// Creates an LSB operation; `data` holds the share of the number and
    /// optionally the bit shares of the random number to use.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
        }
    }
}

impl Operation for LeastSignificantBit {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let bits_count = primitives.bits_count();
        let field = primitives.field();

        // start generating the bitwise shared random number, or adopt the
        // supplied bits
        if self.state.step() == 1 {
            if self.state.initial().len() != 1 + bits_count {
                let mut op: Box<dyn Operation> = Box::new(GenerateBitwiseRandomNumber::new(None));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
                return Ok(());
            }
            let mut intermediate = vec![0; bits_count + 2];
            intermediate[..bits_count].copy_from_slice(&self.state.initial()[1..1 + bits_count]);
            self.state.set_intermediate(intermediate);
            self.state.advance();
            // immediately go on to the next step
        }

        // finish the random number, compute c = x + r and start revealing it
        if self.state.step() == 2 {
            if self.state.child_count() > 0 {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let bits = self.state.child(0).final_result().unwrap();
                    if bits[0] == FAILURE_SENTINEL {
                        self.state.set_result(vec![FAILURE_SENTINEL]);
                        return Ok(());
                    }
                    let mut intermediate = vec![0; bits_count + 2];
                    intermediate[..bits_count].copy_from_slice(bits);
                    self.state.set_intermediate(intermediate);
                }
            }
            if let Some(intermediate) = self.state.intermediate() {
                // number_from_bits only reads the first bits_count entries
                let c = field.add(
                    self.state.initial()[0],
                    primitives.number_from_bits(intermediate),
                );
                let mut op: Box<dyn Operation> = Box::new(Reconstruction::new(vec![c]));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
            }
            return Ok(());
        }

        match self.state.step() {
            // finish the reconstruction and start the bitwise less-than of
            // the public c against r
            3 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let c = self.state.child(0).final_result().unwrap()[0];
                    let c_bits = primitives.bits(c);
                    let r_zero = self.state.intermediate().unwrap()[bits_count - 1];
                    // c₀ XOR r₀; c₀ is public
                    let xor = if c_bits[bits_count - 1] == 0 {
                        r_zero
                    } else {
                        field.sub(1, r_zero)
                    };
                    self.state.intermediate_mut()[bits_count] = xor;

                    let r_bits = self.state.intermediate().unwrap()[..bits_count].to_vec();
                    let mut op: Box<dyn Operation> = Box::new(BitwiseLessThan::new(
                        BitwiseOperands::PublicLeft,
                        c_bits,
                        r_bits,
                    ));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                }
            }
            // finish the less-than and start combining it with the XOR
            4 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let bit_lt = self.state.child(0).final_result().unwrap()[0];
                    self.state.intermediate_mut()[bits_count + 1] = bit_lt;
                    let xor = self.state.intermediate().unwrap()[bits_count];
                    let mut op: Box<dyn Operation> =
                        Box::new(Multiplication::new(vec![field.mul(2, bit_lt), xor]));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                }
            }
            // the LSB is bitlt ⊕ xor₀ = bitlt + xor₀ - 2·bitlt·xor₀
            5 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let product = self.state.child(0).final_result().unwrap()[0];
                    let bit_lt = self.state.intermediate().unwrap()[bits_count + 1];
                    let xor = self.state.intermediate().unwrap()[bits_count];
                    let result = field.sub(field.add(bit_lt, xor), product);
                    self.state.set_result(vec![result]);
                    self.state.advance();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
