//! Elementwise array variants of multiplication, product, power and
//! equality.

use crate::error::Result;
use crate::operations::{OpState, Operation};
use crate::scheduler::Primitives;

/// Multiplies two arrays of shares position by position: for
/// A = [a₁,...,aₙ] and B = [b₁,...,bₙ] the result is [a₁·b₁, ..., aₙ·bₙ].
/// One exchange carries all n sub-sharings at once.
pub struct ArrayMultiplication {
    state: OpState,
    factor2: Vec<u64>,
}

impl ArrayMultiplication {
    /// Creates an elementwise multiplication of two equally long arrays.
    pub fn new(factor1: Vec<u64>, factor2: Vec<u64>) -> Self {
        Self {
            state: OpState::new(factor1),
            factor2,
        }
    }
}

impl Operation for ArrayMultiplication {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // multiply the local shares and share every product at degree t
            1 => {
                let field = primitives.field();
                let width = self.state.initial().len();
                let peers = primitives.num_privacy_peers();
                let mut outbound = vec![0u64; peers * width];
                for i in 0..width {
                    let product = field.mul(self.state.initial()[i], self.factor2[i]);
                    let shares = primitives.generate_share(product);
                    for (peer, share) in shares.into_iter().enumerate() {
                        outbound[peer * width + i] = share;
                    }
                }
                self.state.set_outbound(outbound, width);
                self.state.copy_own_shares(primitives.my_index());
                self.state.advance();
            }
            // interpolate the new share of every position
            2 => {
                let width = self.state.initial().len();
                let mut result = Vec::with_capacity(width);
                for i in 0..width {
                    let column = self.state.inbound_column(i);
                    result.push(primitives.sharing().interpolate(&column, true)?);
                }
                self.state.set_result(result);
                self.state.advance();
            }
            _ => {}
        }
        Ok(())
    }
}

/// Reduces a list of share arrays to their elementwise product.
///
/// In the round-optimised mode the arrays with even and odd index are
/// multiplied pairwise, taking ⌈log₂ k⌉ rounds; the sequential mode folds
/// one array per round, which needs the same number of multiplications but
/// uses memory more evenly and tends to win for large arrays.
pub struct ArrayProduct {
    state: OpState,
    arrays: Vec<Vec<u64>>,
    carry: Option<Vec<u64>>,
    few_rounds: bool,
    next_array: usize,
}

impl ArrayProduct {
    /// Creates an elementwise product of the given arrays.
    pub fn new(arrays: Vec<Vec<u64>>, few_rounds: bool) -> Self {
        Self {
            state: OpState::new(Vec::new()),
            arrays,
            carry: None,
            few_rounds,
            next_array: 2,
        }
    }

    fn start_pair_round(&mut self, arrays: Vec<Vec<u64>>, primitives: &Primitives) -> Result<()> {
        let pairs = arrays.len() / 2;
        let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(pairs);
        let mut iter = arrays.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => {
                    let mut op: Box<dyn Operation> =
                        Box::new(ArrayMultiplication::new(first, second));
                    op.do_step(primitives)?;
                    children.push(op);
                }
                None => self.carry = Some(first),
            }
        }
        self.state.set_children(children);
        Ok(())
    }
}

impl Operation for ArrayProduct {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // start the first multiplication batch
            1 => {
                if self.few_rounds {
                    let arrays = std::mem::take(&mut self.arrays);
                    self.start_pair_round(arrays, primitives)?;
                } else {
                    let first = self.arrays[0].clone();
                    let second = self.arrays[1].clone();
                    let mut op: Box<dyn Operation> =
                        Box::new(ArrayMultiplication::new(first, second));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                }
                self.state.advance();
            }
            // finish the running multiplications and start the next batch
            2 => {
                let mut all_complete = true;
                for i in 0..self.state.child_count() {
                    if !self.state.child(i).is_complete() {
                        self.state.child_mut(i).do_step(primitives)?;
                        all_complete &= self.state.child(i).is_complete();
                    }
                }
                if !all_complete {
                    return Ok(());
                }

                if self.few_rounds {
                    let mut arrays: Vec<Vec<u64>> = (0..self.state.child_count())
                        .map(|i| self.state.child(i).final_result().unwrap().to_vec())
                        .collect();
                    if let Some(carry) = self.carry.take() {
                        arrays.push(carry);
                    }
                    if arrays.len() == 1 {
                        self.state.set_result(arrays.pop().unwrap());
                        self.state.advance();
                        return Ok(());
                    }
                    self.start_pair_round(arrays, primitives)?;
                } else {
                    let accumulated = self.state.child(0).final_result().unwrap().to_vec();
                    if self.next_array >= self.arrays.len() {
                        self.state.set_result(accumulated);
                        self.state.advance();
                        return Ok(());
                    }
                    let next = self.arrays[self.next_array].clone();
                    let mut op: Box<dyn Operation> =
                        Box::new(ArrayMultiplication::new(accumulated, next));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.next_array += 1;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Raises every element of a share array to a public exponent using
/// square-and-multiply; the square and multiply array-multiplications of a
/// bit run concurrently.
pub struct ArrayPower {
    state: OpState,
    /// The remaining exponent bits, shifted away as they are processed.
    exponent: u64,
    /// The running squared base; starts as the input array.
    square: Vec<u64>,
    /// The multiply accumulator, absorbed from the first set exponent bit.
    accumulator: Vec<u64>,
    first_mult: bool,
}

impl ArrayPower {
    /// Creates an elementwise power operation.
    pub fn new(data: Vec<u64>, exponent: u64) -> Self {
        Self {
            state: OpState::new(Vec::new()),
            exponent,
            square: data,
            accumulator: Vec::new(),
            first_mult: true,
        }
    }

    /// Steps the square child (slot 0) and the multiply child (slot 1, if
    /// any); on completion moves their results into place. Returns false
    /// while any child is still running.
    fn finish_children(&mut self, primitives: &Primitives) -> Result<bool> {
        for i in 0..self.state.child_count() {
            if self.state.has_child(i) && !self.state.child(i).is_complete() {
                self.state.child_mut(i).do_step(primitives)?;
                if !self.state.child(i).is_complete() {
                    return Ok(false);
                }
            }
        }
        self.square = self.state.child(0).final_result().unwrap().to_vec();
        if self.state.child_count() == 2 {
            self.accumulator = self.state.child(1).final_result().unwrap().to_vec();
        }
        Ok(true)
    }

    fn schedule_square(&mut self, primitives: &Primitives) -> Result<Box<dyn Operation>> {
        let mut op: Box<dyn Operation> =
            Box::new(ArrayMultiplication::new(self.square.clone(), self.square.clone()));
        op.do_step(primitives)?;
        Ok(op)
    }
}

impl Operation for ArrayPower {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // consume the lowest exponent bit and start squaring
            1 => {
                if self.exponent & 1 == 1 {
                    self.accumulator = self.square.clone();
                    self.first_mult = false;
                    if self.exponent == 1 {
                        let result = std::mem::take(&mut self.square);
                        self.state.set_result(result);
                        self.state.set_step(99);
                        return Ok(());
                    }
                }
                let square = self.schedule_square(primitives)?;
                self.state.set_children(vec![square]);
                self.exponent >>= 1;
                if self.exponent == 1 {
                    self.state.set_step(3);
                } else {
                    self.state.advance();
                }
            }
            // finish the running squares/multiplies and schedule the next
            2 => {
                if !self.finish_children(primitives)? {
                    return Ok(());
                }
                let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(2);
                let square = self.schedule_square(primitives)?;
                children.push(square);
                if self.exponent & 1 == 1 {
                    if self.first_mult {
                        self.first_mult = false;
                        self.accumulator = self.square.clone();
                    } else {
                        let mut op: Box<dyn Operation> = Box::new(ArrayMultiplication::new(
                            self.accumulator.clone(),
                            self.square.clone(),
                        ));
                        op.do_step(primitives)?;
                        children.push(op);
                    }
                }
                self.state.set_children(children);
                self.exponent >>= 1;
                if self.exponent == 1 {
                    self.state.advance();
                }
            }
            // the most significant bit squares nothing, only multiplies
            3 => {
                if !self.finish_children(primitives)? {
                    return Ok(());
                }
                if self.first_mult {
                    let result = std::mem::take(&mut self.square);
                    self.state.clear_children();
                    self.state.set_result(result);
                    self.state.set_step(99);
                    return Ok(());
                }
                let mut op: Box<dyn Operation> = Box::new(ArrayMultiplication::new(
                    self.accumulator.clone(),
                    self.square.clone(),
                ));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
            }
            // finish the last multiplication
            4 => {
                for i in 0..self.state.child_count() {
                    if !self.state.child(i).is_complete() {
                        self.state.child_mut(i).do_step(primitives)?;
                    }
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

/// Tests two share arrays for equality position by position, via
/// [ArrayPower] to the (p-1)-th power and Fermat's little theorem, like
/// [crate::operations::Equal] does for scalars.
pub struct ArrayEqual {
    state: OpState,
    other: Vec<u64>,
}

impl ArrayEqual {
    /// Creates an elementwise equality test of two equally long arrays.
    pub fn new(data1: Vec<u64>, data2: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data1),
            other: data2,
        }
    }
}

impl Operation for ArrayEqual {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let field = primitives.field();
        match self.state.step() {
            // data1 - data2 should be zero wherever the arrays agree
            1 => {
                let differences: Vec<u64> = self
                    .state
                    .initial()
                    .iter()
                    .zip(&self.other)
                    .map(|(&a, &b)| field.sub(a, b))
                    .collect();
                let exponent = field.modulus() - 1;
                let mut op: Box<dyn Operation> = Box::new(ArrayPower::new(differences, exponent));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
            }
            // equal = 1 - (a-b)^(p-1)
            2 => {
                self.state.child_mut(0).do_step(primitives)?;
                if self.state.child(0).is_complete() {
                    let result = self
                        .state
                        .child(0)
                        .final_result()
                        .unwrap()
                        .iter()
                        .map(|&x| field.sub(1, x))
                        .collect();
                    self.state.set_result(result);
                    self.state.advance();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
