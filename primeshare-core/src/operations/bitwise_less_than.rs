//! Bitwise less-than comparison, after Nishide and Ohta.

use crate::error::Result;
use crate::operations::{LinearPrefixOr, Multiplication, OpState, Operation};
use crate::scheduler::Primitives;

/// Which of the two bitwise operands are public values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOperands {
    /// Both values are bitwise shared.
    BothShared,
    /// a is a publicly known value, b is bitwise shared.
    PublicLeft,
    /// a is bitwise shared, b is a publicly known value.
    PublicRight,
}

/// Computes a < b over two bitwise-represented numbers.
///
/// The operation XORs the operands bit by bit (via 2·a·b multiplications, or
/// locally if one side is public), runs a linear prefix-OR over the XOR
/// bits, derives the first-difference mask from it, multiplies that mask
/// elementwise with the bits of b, and sums: a share of one iff a < b.
///
/// Bits are big-endian and both operands use exactly ⌈log₂ p⌉ bits.
pub struct BitwiseLessThan {
    state: OpState,
    operands: BitwiseOperands,
    a_bits: Vec<u64>,
    b_bits: Vec<u64>,
}

impl BitwiseLessThan {
    /// Creates a bitwise less-than of the two bit vectors.
    pub fn new(operands: BitwiseOperands, a_bits: Vec<u64>, b_bits: Vec<u64>) -> Self {
        Self {
            state: OpState::new(Vec::new()),
            operands,
            a_bits,
            b_bits,
        }
    }
}

impl Operation for BitwiseLessThan {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let bits_count = primitives.bits_count();
        let field = primitives.field();

        // start the XOR computations
        if self.state.step() == 1 {
            if self.operands == BitwiseOperands::BothShared {
                let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(bits_count);
                for i in 0..bits_count {
                    let doubled = field.mul(2, self.a_bits[i]);
                    let mut op: Box<dyn Operation> =
                        Box::new(Multiplication::new(vec![doubled, self.b_bits[i]]));
                    op.do_step(primitives)?;
                    children.push(op);
                }
                self.state.set_children(children);
                self.state.advance();
                return Ok(());
            }
            // one of the values is public, so a_i + b_i - 2·a_i·b_i is local
            let xor = (0..bits_count)
                .map(|i| {
                    field.sub(
                        field.add(self.a_bits[i], self.b_bits[i]),
                        field.mul(field.mul(2, self.a_bits[i]), self.b_bits[i]),
                    )
                })
                .collect();
            self.state.set_intermediate(xor);
            self.state.advance();
            // immediately go on to the next step
        }

        // finish the XORs and start the prefix-OR
        if self.state.step() == 2 {
            if self.state.child_count() > 0 {
                let mut all_completed = true;
                let mut xor = vec![0; bits_count];
                for i in 0..bits_count {
                    self.state.child_mut(i).do_step(primitives)?;
                    if self.state.child(i).is_complete() {
                        let product = self.state.child(i).final_result().unwrap()[0];
                        xor[i] = field.sub(field.add(self.a_bits[i], self.b_bits[i]), product);
                    } else {
                        all_completed = false;
                    }
                }
                if !all_completed {
                    return Ok(());
                }
                self.state.set_intermediate(xor);
            }
            let xor = self.state.intermediate().unwrap().clone();
            let mut op: Box<dyn Operation> = Box::new(LinearPrefixOr::new(xor));
            op.do_step(primitives)?;
            self.state.set_children(vec![op]);
            self.state.advance();
            return Ok(());
        }

        // finish the prefix-OR, compute the first-difference mask, and start
        // the mask-times-b multiplications
        if self.state.step() == 3 {
            if !self.state.child(0).is_complete() {
                self.state.child_mut(0).do_step(primitives)?;
            }
            if !self.state.child(0).is_complete() {
                return Ok(());
            }
            let prefix_or = self.state.child(0).final_result().unwrap().to_vec();
            let mut mask = vec![0; bits_count];
            mask[0] = prefix_or[0];
            for i in 1..bits_count {
                mask[i] = field.sub(prefix_or[i], prefix_or[i - 1]);
            }
            if self.operands != BitwiseOperands::PublicRight {
                let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(bits_count);
                for i in 0..bits_count {
                    let mut op: Box<dyn Operation> =
                        Box::new(Multiplication::new(vec![mask[i], self.b_bits[i]]));
                    op.do_step(primitives)?;
                    children.push(op);
                }
                self.state.set_children(children);
                self.state.advance();
                return Ok(());
            }
            // b is public, the multiplications are local
            let products = (0..bits_count)
                .map(|i| field.mul(mask[i], self.b_bits[i]))
                .collect();
            self.state.set_intermediate(products);
            self.state.clear_children();
            self.state.advance();
            // immediately go on to the next step
        }

        // finish the multiplications and sum up
        if self.state.step() == 4 {
            if self.state.child_count() > 0 {
                let mut all_completed = true;
                let mut products = vec![0; bits_count];
                for i in 0..bits_count {
                    self.state.child_mut(i).do_step(primitives)?;
                    if self.state.child(i).is_complete() {
                        products[i] = self.state.child(i).final_result().unwrap()[0];
                    } else {
                        all_completed = false;
                    }
                }
                if !all_completed {
                    return Ok(());
                }
                self.state.set_intermediate(products);
            }
            let sum = self
                .state
                .intermediate()
                .unwrap()
                .iter()
                .fold(0, |acc, &x| field.add(acc, x));
            self.state.set_result(vec![sum]);
            self.state.advance();
        }
        Ok(())
    }
}
