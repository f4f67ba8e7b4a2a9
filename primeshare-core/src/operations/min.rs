//! Minimum of several shared values.

use crate::error::Result;
use crate::operations::pregeneration::RandBitsPregeneration;
use crate::operations::{Knowledge, LessThan, Multiplication, OpState, Operation};
use crate::scheduler::Primitives;

/// Computes min(x₁, ..., xₙ) of n shared values.
///
/// Two scheduling modes exist: the round-optimised mode pairs even and odd
/// indices and reduces in ⌈log₂ n⌉ comparison rounds; the sequential mode
/// folds one value at a time in n-1 rounds, which uses memory more evenly
/// and tends to win for large inputs.
///
/// Each pairwise minimum is lt·a + (1-lt)·b with lt = [a < b], so the
/// operation needs up to three bitwise-shared random numbers per comparison.
/// It declares that demand via [Operation::random_numbers_needed]; without
/// pre-generated bits it batches the generation itself before the first
/// comparison. The `knowledge` argument must hold for every input value;
/// pass [Knowledge::Unknown] when the inputs straddle p/2.
pub struct Min {
    state: OpState,
    pregen: RandBitsPregeneration,
    comparison_results: Vec<u64>,
    knowledge: Knowledge,
    unknown_attributes: usize,
    few_rounds: bool,
    /// Next input index in the sequential mode.
    position: usize,
}

impl Min {
    /// Creates a minimum of the value shares in `data`.
    pub fn new(data: Vec<u64>, knowledge: Knowledge, few_rounds: bool) -> Self {
        let unknown_attributes = if knowledge == Knowledge::Unknown { 3 } else { 1 };
        Self {
            state: OpState::new(data),
            pregen: RandBitsPregeneration::default(),
            comparison_results: Vec::new(),
            knowledge,
            unknown_attributes,
            few_rounds,
            position: 1,
        }
    }

    /// Builds one pairwise comparison, feeding it pre-generated bits.
    fn comparison(
        pregen: &mut RandBitsPregeneration,
        knowledge: Knowledge,
        a: u64,
        b: u64,
        primitives: &Primitives,
    ) -> Result<Box<dyn Operation>> {
        let mut lt = LessThan::new(a, b, knowledge, knowledge, Knowledge::Unknown, None);
        let bits_needed = lt.random_numbers_needed(primitives) * primitives.bits_count();
        lt.set_random_number_bit_shares(pregen.take_bits(bits_needed));
        let mut op: Box<dyn Operation> = Box::new(lt);
        op.do_step(primitives)?;
        Ok(op)
    }

    /// Starts the comparisons of one round-optimised reduction round over
    /// the values currently in the initial data.
    fn start_comparison_round(&mut self, primitives: &Primitives) -> Result<()> {
        let values = self.state.initial().to_vec();
        let pairs = values.len() / 2;
        let survivors = values.len().div_ceil(2);

        let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(pairs);
        for i in 0..pairs {
            children.push(Self::comparison(
                &mut self.pregen,
                self.knowledge,
                values[2 * i],
                values[2 * i + 1],
                primitives,
            )?);
        }
        self.comparison_results = vec![0; pairs];

        let mut minimums = vec![0; survivors];
        if pairs < survivors {
            // odd input count: the last value goes through unchallenged
            minimums[survivors - 1] = values[2 * survivors - 2];
        }
        self.state.set_intermediate(minimums);
        self.state.set_children(children);
        Ok(())
    }

    /// Starts the next comparison of the sequential fold.
    fn start_sequential_comparison(&mut self, primitives: &Primitives) -> Result<()> {
        if self.position == 1 {
            let first = self.state.initial()[0];
            self.state.set_intermediate(vec![first]);
        }
        let current_min = self.state.intermediate().unwrap()[0];
        let next = self.state.initial()[self.position];
        let child = Self::comparison(
            &mut self.pregen,
            self.knowledge,
            current_min,
            next,
            primitives,
        )?;
        self.state.set_children(vec![child]);
        Ok(())
    }
}

impl Operation for Min {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn random_numbers_needed(&self, _primitives: &Primitives) -> usize {
        if self.pregen.randomness_set() {
            0
        } else {
            (self.state.initial().len() - 1) * self.unknown_attributes
        }
    }

    fn set_random_number_bit_shares(&mut self, bits: Vec<u64>) {
        self.pregen.set_bits(bits);
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let field = primitives.field();
        match self.state.step() {
            // make sure all randomness is available, then start comparing
            1 => {
                let needed = self.random_numbers_needed(primitives);
                let ready = {
                    let Min { pregen, state, .. } = &mut *self;
                    pregen.generate(state, needed, primitives)?
                };
                if ready {
                    if self.few_rounds {
                        self.start_comparison_round(primitives)?;
                    } else {
                        self.start_sequential_comparison(primitives)?;
                    }
                    self.state.advance();
                }
            }
            // drive the less-than comparisons to completion, then schedule
            // the two selection multiplications per comparison
            2 => {
                if self.few_rounds {
                    let mut all_complete = true;
                    for i in 0..self.state.child_count() {
                        if !self.state.child(i).is_complete() {
                            self.state.child_mut(i).do_step(primitives)?;
                            if self.state.child(i).is_complete() {
                                self.comparison_results[i] =
                                    self.state.child(i).final_result().unwrap()[0];
                            } else {
                                all_complete = false;
                            }
                        }
                    }
                    if !all_complete {
                        return Ok(());
                    }
                    // minimum = lt·a + (1-lt)·b
                    let values = self.state.initial().to_vec();
                    let mut children: Vec<Box<dyn Operation>> =
                        Vec::with_capacity(2 * self.comparison_results.len());
                    for (i, &lt) in self.comparison_results.iter().enumerate() {
                        let mut keep_a: Box<dyn Operation> =
                            Box::new(Multiplication::new(vec![values[2 * i], lt]));
                        keep_a.do_step(primitives)?;
                        children.push(keep_a);
                        let mut keep_b: Box<dyn Operation> = Box::new(Multiplication::new(vec![
                            values[2 * i + 1],
                            field.sub(1, lt),
                        ]));
                        keep_b.do_step(primitives)?;
                        children.push(keep_b);
                    }
                    self.state.set_children(children);
                    self.state.advance();
                } else {
                    self.state.child_mut(0).do_step(primitives)?;
                    if self.state.child(0).is_complete() {
                        let lt = self.state.child(0).final_result().unwrap()[0];
                        let current_min = self.state.intermediate().unwrap()[0];
                        let next = self.state.initial()[self.position];
                        let mut keep_a: Box<dyn Operation> =
                            Box::new(Multiplication::new(vec![current_min, lt]));
                        keep_a.do_step(primitives)?;
                        let mut keep_b: Box<dyn Operation> =
                            Box::new(Multiplication::new(vec![next, field.sub(1, lt)]));
                        keep_b.do_step(primitives)?;
                        self.state.set_children(vec![keep_a, keep_b]);
                        self.state.advance();
                    }
                }
            }
            // finish the multiplications and start the next reduction round
            3 => {
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
                    for i in 0..self.comparison_results.len() {
                        let kept_a = self.state.child(2 * i).final_result().unwrap()[0];
                        let kept_b = self.state.child(2 * i + 1).final_result().unwrap()[0];
                        self.state.intermediate_mut()[i] = field.add(kept_a, kept_b);
                    }
                    let minimums = self.state.intermediate().unwrap().clone();
                    if minimums.len() == 1 {
                        self.state.set_result(minimums);
                        self.state.advance();
                    } else {
                        self.state.set_initial(minimums);
                        self.state.set_step(2);
                        self.start_comparison_round(primitives)?;
                    }
                } else {
                    let kept_a = self.state.child(0).final_result().unwrap()[0];
                    let kept_b = self.state.child(1).final_result().unwrap()[0];
                    self.state.intermediate_mut()[0] = field.add(kept_a, kept_b);
                    self.position += 1;
                    if self.position < self.state.initial().len() {
                        self.state.set_step(2);
                        self.start_sequential_comparison(primitives)?;
                    } else {
                        let minimum = self.state.take_intermediate();
                        self.state.set_result(minimum);
                        self.state.advance();
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
