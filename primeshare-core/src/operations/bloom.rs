//! Private set operations on shares of Bloom filter positions.
//!
//! All of these reduce to combinations of the array operations, minimum,
//! less-than and plain additions. The non-counting variants collapse
//! counters to {0,1}; the counting variants keep them.

use crate::error::Result;
use crate::operations::pregeneration::RandBitsPregeneration;
use crate::operations::{
    ArrayEqual, ArrayMultiplication, ArrayProduct, Knowledge, LessThan, Min, OpState, Operation,
};
use crate::scheduler::Primitives;

/// Whether the bitwise AND/OR of `k` filters is cheaper via the Fermat
/// equality trick than via multiplications.
fn equality_trick_pays_off(primitives: &Primitives, filter_count: usize) -> bool {
    2.0 * (primitives.field_size() as f64).log2() <= (filter_count - 1) as f64
}

/// Intersection of Bloom-filter sets: the bitwise AND of all filters per
/// position for non-counting filters, the minimum of the counters for
/// counting ones.
///
/// Counting intersections assume every counter is <= p/2.
pub struct BloomFilterIntersection {
    state: OpState,
    pregen: RandBitsPregeneration,
    filters: Vec<Vec<u64>>,
    counting: bool,
}

impl BloomFilterIntersection {
    /// Creates an intersection of the filter shares, `filters[x][i]` being
    /// filter x's share of position i.
    pub fn new(filters: Vec<Vec<u64>>, counting: bool) -> Self {
        Self {
            state: OpState::new(Vec::new()),
            pregen: RandBitsPregeneration::default(),
            filters,
            counting,
        }
    }
}

impl Operation for BloomFilterIntersection {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn random_numbers_needed(&self, _primitives: &Primitives) -> usize {
        if self.counting && !self.pregen.randomness_set() {
            // one Min per position, each over k counters known to be
            // below p/2
            (self.filters.len() - 1) * self.filters[0].len()
        } else {
            0
        }
    }

    fn set_random_number_bit_shares(&mut self, bits: Vec<u64>) {
        self.pregen.set_bits(bits);
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let field = primitives.field();
        match self.state.step() {
            1 => {
                if !self.counting {
                    if equality_trick_pays_off(primitives, self.filters.len()) {
                        // bitwise AND as equal(sum of negated inputs, 0)
                        let positions = self.filters[0].len();
                        let mut sums = vec![0u64; positions];
                        for filter in &self.filters {
                            for (sum, &value) in sums.iter_mut().zip(filter) {
                                *sum = field.add(*sum, field.sub(1, value));
                            }
                        }
                        let mut op: Box<dyn Operation> =
                            Box::new(ArrayEqual::new(sums, vec![0; positions]));
                        op.do_step(primitives)?;
                        self.state.set_children(vec![op]);
                    } else {
                        // bitwise AND as the product of all filters
                        let filters = std::mem::take(&mut self.filters);
                        let mut op: Box<dyn Operation> =
                            Box::new(ArrayProduct::new(filters, false));
                        op.do_step(primitives)?;
                        self.state.set_children(vec![op]);
                    }
                    self.state.advance();
                    return Ok(());
                }

                // counting: one minimum per filter position
                let needed = self.random_numbers_needed(primitives);
                let ready = {
                    let BloomFilterIntersection { pregen, state, .. } = &mut *self;
                    pregen.generate(state, needed, primitives)?
                };
                if ready {
                    let positions = self.filters[0].len();
                    let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(positions);
                    for i in 0..positions {
                        let counters: Vec<u64> =
                            self.filters.iter().map(|filter| filter[i]).collect();
                        let mut min = Min::new(counters, Knowledge::BelowHalf, false);
                        let bits_needed =
                            min.random_numbers_needed(primitives) * primitives.bits_count();
                        min.set_random_number_bit_shares(self.pregen.take_bits(bits_needed));
                        let mut op: Box<dyn Operation> = Box::new(min);
                        op.do_step(primitives)?;
                        children.push(op);
                    }
                    self.state.set_children(children);
                    self.state.advance();
                }
            }
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
                let result = if self.counting {
                    (0..self.state.child_count())
                        .map(|i| self.state.child(i).final_result().unwrap()[0])
                        .collect()
                } else {
                    self.state.child(0).final_result().unwrap().to_vec()
                };
                self.state.set_result(result);
                self.state.advance();
            }
            _ => {}
        }
        Ok(())
    }
}

/// Union of Bloom-filter sets: the bitwise OR of all filters per position
/// for non-counting filters, the sum of the counters for counting ones.
/// The counting union is a purely local computation.
pub struct BloomFilterUnion {
    state: OpState,
    filters: Vec<Vec<u64>>,
    counting: bool,
    /// Next filter index in the sequential OR chain.
    position: usize,
}

impl BloomFilterUnion {
    /// Creates a union of the filter shares, `filters[x][i]` being filter
    /// x's share of position i.
    pub fn new(filters: Vec<Vec<u64>>, counting: bool) -> Self {
        Self {
            state: OpState::new(Vec::new()),
            filters,
            counting,
            position: 2,
        }
    }
}

impl Operation for BloomFilterUnion {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let field = primitives.field();
        let positions = self.filters[0].len();
        match self.state.step() {
            1 => {
                if self.counting {
                    // the sum of all counters, computed locally
                    let mut result = vec![0u64; positions];
                    for filter in &self.filters {
                        for (sum, &value) in result.iter_mut().zip(filter) {
                            *sum = field.add(*sum, value);
                        }
                    }
                    self.state.set_result(result);
                    self.state.advance();
                    self.state.advance();
                    return Ok(());
                }
                if equality_trick_pays_off(primitives, self.filters.len()) {
                    // bitwise OR as 1 - equal(sum of inputs, 0)
                    let mut sums = vec![0u64; positions];
                    for filter in &self.filters {
                        for (sum, &value) in sums.iter_mut().zip(filter) {
                            *sum = field.add(*sum, value);
                        }
                    }
                    let mut op: Box<dyn Operation> =
                        Box::new(ArrayEqual::new(sums, vec![0; positions]));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.set_step(10);
                    return Ok(());
                }
                // chain a OR b = a + b - a·b across the filters
                let mut op: Box<dyn Operation> = Box::new(ArrayMultiplication::new(
                    self.filters[0].clone(),
                    self.filters[1].clone(),
                ));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                let pair_sums = self
                    .filters[0]
                    .iter()
                    .zip(&self.filters[1])
                    .map(|(&a, &b)| field.add(a, b))
                    .collect();
                self.state.set_intermediate(pair_sums);
                self.position = 2;
                self.state.advance();
            }
            2 => {
                self.state.child_mut(0).do_step(primitives)?;
                if !self.state.child(0).is_complete() {
                    return Ok(());
                }
                let products = self.state.child(0).final_result().unwrap().to_vec();
                if self.position < self.filters.len() {
                    let next = &self.filters[self.position];
                    let mut or_so_far = vec![0u64; positions];
                    for i in 0..positions {
                        // a + b - a·b
                        or_so_far[i] =
                            field.sub(self.state.intermediate().unwrap()[i], products[i]);
                        self.state.intermediate_mut()[i] = field.add(or_so_far[i], next[i]);
                    }
                    let mut op: Box<dyn Operation> =
                        Box::new(ArrayMultiplication::new(or_so_far, next.clone()));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.position += 1;
                } else {
                    let mut result = vec![0u64; positions];
                    for i in 0..positions {
                        result[i] = field.sub(self.state.intermediate().unwrap()[i], products[i]);
                    }
                    self.state.set_result(result);
                    self.state.advance();
                }
            }
            10 => {
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

/// The sum of all positions or counters of a Bloom filter. The cardinality
/// estimate itself is then derived locally by the application from the
/// revealed sum.
pub struct BloomFilterCardinality {
    state: OpState,
}

impl BloomFilterCardinality {
    /// Creates a cardinality operation over the position shares in `data`.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
        }
    }
}

impl Operation for BloomFilterCardinality {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        if self.state.step() == 1 {
            let field = primitives.field();
            let sum = self
                .state
                .initial()
                .iter()
                .fold(0, |acc, &x| field.add(acc, x));
            self.state.set_result(vec![sum]);
            self.state.advance();
        }
        Ok(())
    }
}

/// Threshold union of Bloom-filter sets: reveals the positions whose summed
/// counters reach the public threshold. With `learn_count` the counters
/// survive into the result, otherwise it is a non-counting filter.
pub struct BloomFilterThresholdUnion {
    state: OpState,
    pregen: RandBitsPregeneration,
    filters: Vec<Vec<u64>>,
    threshold: u64,
    learn_count: bool,
    mask: Vec<u64>,
}

impl BloomFilterThresholdUnion {
    /// Creates a threshold union; only positions with a summed counter of
    /// at least `threshold` remain.
    pub fn new(filters: Vec<Vec<u64>>, threshold: u64, learn_count: bool) -> Self {
        Self {
            state: OpState::new(Vec::new()),
            pregen: RandBitsPregeneration::default(),
            filters,
            threshold,
            learn_count,
            mask: Vec::new(),
        }
    }
}

impl Operation for BloomFilterThresholdUnion {
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
            // one less-than per position, with both operands below p/2
            self.filters[0].len()
        }
    }

    fn set_random_number_bit_shares(&mut self, bits: Vec<u64>) {
        self.pregen.set_bits(bits);
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let field = primitives.field();
        match self.state.step() {
            // sum the counters (local) and compare every position against
            // the threshold: kept iff 1 - [count < threshold]
            1 => {
                let needed = self.random_numbers_needed(primitives);
                let ready = {
                    let BloomFilterThresholdUnion { pregen, state, .. } = &mut *self;
                    pregen.generate(state, needed, primitives)?
                };
                if !ready {
                    return Ok(());
                }
                let mut union: Box<dyn Operation> =
                    Box::new(BloomFilterUnion::new(self.filters.clone(), true));
                union.do_step(primitives)?;
                // the counting union is local computation only
                let counts = union.final_result().expect("counting union is local").to_vec();

                let mut children: Vec<Box<dyn Operation>> = Vec::with_capacity(counts.len());
                for &count in &counts {
                    // counters and threshold are assumed to be <= p/2
                    let mut lt = LessThan::new(
                        count,
                        self.threshold,
                        Knowledge::BelowHalf,
                        Knowledge::BelowHalf,
                        Knowledge::Unknown,
                        None,
                    );
                    let bits_needed =
                        lt.random_numbers_needed(primitives) * primitives.bits_count();
                    lt.set_random_number_bit_shares(self.pregen.take_bits(bits_needed));
                    let mut op: Box<dyn Operation> = Box::new(lt);
                    op.do_step(primitives)?;
                    children.push(op);
                }
                self.state.set_intermediate(counts);
                self.state.set_children(children);
                self.state.advance();
            }
            // collect the comparison mask
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
                self.mask = (0..self.state.child_count())
                    .map(|i| field.sub(1, self.state.child(i).final_result().unwrap()[0]))
                    .collect();
                if self.learn_count {
                    let counts = self.state.intermediate().unwrap().clone();
                    let mut op: Box<dyn Operation> =
                        Box::new(ArrayMultiplication::new(self.mask.clone(), counts));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                } else {
                    let mask = std::mem::take(&mut self.mask);
                    self.state.set_result(mask);
                    self.state.set_step(99);
                }
            }
            // counting output: mask times counters
            3 => {
                self.state.child_mut(0).do_step(primitives)?;
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

/// Weighted set intersection over two Bloom-filter families: positions must
/// be present in at least `t_k` key filters and carry an accumulated weight
/// of at least `t_w`. With `learn_weights` the accumulated weights are
/// revealed, otherwise they are hidden behind a non-counting filter.
pub struct BloomFilterWeightedIntersection {
    state: OpState,
    pregen: RandBitsPregeneration,
    keys: Vec<Vec<u64>>,
    weights: Vec<Vec<u64>>,
    threshold_keys: u64,
    threshold_weights: u64,
    learn_weights: bool,
}

impl BloomFilterWeightedIntersection {
    /// Creates a weighted intersection from key and weight filter shares.
    pub fn new(
        keys: Vec<Vec<u64>>,
        weights: Vec<Vec<u64>>,
        threshold_keys: u64,
        threshold_weights: u64,
        learn_weights: bool,
    ) -> Self {
        Self {
            state: OpState::new(Vec::new()),
            pregen: RandBitsPregeneration::default(),
            keys,
            weights,
            threshold_keys,
            threshold_weights,
            learn_weights,
        }
    }
}

impl Operation for BloomFilterWeightedIntersection {
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
            // two threshold unions, each one less-than per position
            2 * self.keys[0].len()
        }
    }

    fn set_random_number_bit_shares(&mut self, bits: Vec<u64>) {
        self.pregen.set_bits(bits);
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let field = primitives.field();
        match self.state.step() {
            // run the two threshold unions with shared pre-generated bits
            1 => {
                let needed = self.random_numbers_needed(primitives);
                let ready = {
                    let BloomFilterWeightedIntersection { pregen, state, .. } = &mut *self;
                    pregen.generate(state, needed, primitives)?
                };
                if !ready {
                    return Ok(());
                }
                let mut key_union =
                    BloomFilterThresholdUnion::new(self.keys.clone(), self.threshold_keys, false);
                let mut weight_union = BloomFilterThresholdUnion::new(
                    self.weights.clone(),
                    self.threshold_weights,
                    true,
                );
                let bits_needed =
                    key_union.random_numbers_needed(primitives) * primitives.bits_count();
                key_union.set_random_number_bit_shares(self.pregen.take_bits(bits_needed));
                weight_union.set_random_number_bit_shares(self.pregen.take_bits(bits_needed));
                let mut children: Vec<Box<dyn Operation>> =
                    vec![Box::new(key_union), Box::new(weight_union)];
                for child in children.iter_mut() {
                    child.do_step(primitives)?;
                }
                self.state.set_children(children);
                self.state.advance();
            }
            // multiply the two resulting filters
            2 => {
                let mut finished = true;
                for i in 0..self.state.child_count() {
                    if !self.state.child(i).is_complete() {
                        self.state.child_mut(i).do_step(primitives)?;
                        finished &= self.state.child(i).is_complete();
                    }
                }
                if !finished {
                    return Ok(());
                }
                let keys = self.state.child(0).final_result().unwrap().to_vec();
                let weights = self.state.child(1).final_result().unwrap().to_vec();
                let mut op: Box<dyn Operation> = Box::new(ArrayMultiplication::new(keys, weights));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
            }
            // either reveal the weights or hide them behind 1 - equal(x, 0)
            3 => {
                self.state.child_mut(0).do_step(primitives)?;
                if !self.state.child(0).is_complete() {
                    return Ok(());
                }
                let product = self.state.child(0).final_result().unwrap().to_vec();
                if self.learn_weights {
                    self.state.set_result(product);
                    self.state.set_step(99);
                } else {
                    let zeros = vec![0; product.len()];
                    let mut op: Box<dyn Operation> = Box::new(ArrayEqual::new(product, zeros));
                    op.do_step(primitives)?;
                    self.state.set_children(vec![op]);
                    self.state.advance();
                }
            }
            4 => {
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
