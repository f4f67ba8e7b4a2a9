//! Comparison of two shared secrets, after Nishide and Ohta.

use crate::error::Result;
use crate::operations::{
    Knowledge, LeastSignificantBit, Multiplication, OpState, Operation, FAILURE_SENTINEL,
};
use crate::scheduler::Primitives;

/// Computes a < b for two secrets which may each be shared or public.
///
/// With w = [a < p/2], x = [b < p/2] and y = [a-b < p/2], the result is
/// w·(x+y-2·x·y) + 1 - x - y + x·y. Each unknown predicate is computed as
/// 1 - LSB(2·value) and consumes one bitwise-shared random number; known
/// predicates ([Knowledge]) and predicate-cache hits skip the LSB entirely.
///
/// The operation reports its outstanding random-number demand via
/// [Operation::random_numbers_needed] so the driver can pre-generate the
/// bits for many comparisons in one batch. Without pre-generated bits it
/// generates them itself and then may fail with the sentinel result.
pub struct LessThan {
    state: OpState,
    knowledge: [Knowledge; 3],
    predicate_keys: [Option<String>; 3],
    supplied_bits: Vec<u64>,
    random_data_was_set: bool,
}

impl LessThan {
    /// Creates a comparison of the shares `a` and `b` with the given
    /// advance knowledge about a, b and a-b. `bits` optionally supplies the
    /// bit shares of the random numbers to use, one number per unknown
    /// predicate.
    pub fn new(
        a: u64,
        b: u64,
        knowledge_a: Knowledge,
        knowledge_b: Knowledge,
        knowledge_diff: Knowledge,
        bits: Option<Vec<u64>>,
    ) -> Self {
        Self {
            state: OpState::new(vec![a, b]),
            knowledge: [knowledge_a, knowledge_b, knowledge_diff],
            predicate_keys: [None, None, None],
            supplied_bits: bits.unwrap_or_default(),
            random_data_was_set: false,
        }
    }

    /// Enables predicate caching: the shares of [a < p/2], [b < p/2] and
    /// [a-b < p/2] are cached under the given keys across subsequent
    /// less-than operations on the same secrets.
    pub fn set_predicate_keys(
        &mut self,
        key_a: Option<String>,
        key_b: Option<String>,
        key_diff: Option<String>,
    ) {
        self.predicate_keys = [key_a, key_b, key_diff];
    }

    /// The share a predicate computation feeds its LSB with: 2·value.
    fn doubled_input(&self, index: usize, primitives: &Primitives) -> u64 {
        let field = primitives.field();
        let a = self.state.initial()[0];
        let b = self.state.initial()[1];
        match index {
            0 => field.mul(2, a),
            1 => field.mul(2, b),
            _ => field.mul(2, field.sub(a, b)),
        }
    }
}

impl Operation for LessThan {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn random_numbers_needed(&self, primitives: &Primitives) -> usize {
        if self.random_data_was_set {
            return 0;
        }
        let mut count = 0;
        for (knowledge, key) in self.knowledge.iter().zip(&self.predicate_keys) {
            if *knowledge == Knowledge::Unknown {
                let cached = key
                    .as_deref()
                    .and_then(|k| primitives.predicate_cache_get(k));
                if cached.is_none() {
                    count += 1;
                }
            }
        }
        if self.supplied_bits.len() >= count * primitives.bits_count() {
            0
        } else {
            count
        }
    }

    fn set_random_number_bit_shares(&mut self, bits: Vec<u64>) {
        self.supplied_bits = bits;
        self.random_data_was_set = true;
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        let field = primitives.field();
        let bits_count = primitives.bits_count();

        // start the LSB computations for the unknown predicates
        if self.state.step() == 1 {
            let mut children: Vec<Option<Box<dyn Operation>>> = vec![None, None, None];
            let mut intermediate = vec![0; 5];
            let mut bitwise_numbers_used = 0;
            for index in 0..3 {
                if self.knowledge[index] != Knowledge::Unknown {
                    intermediate[index] = self.knowledge[index].predicate_value();
                    continue;
                }
                if let Some(cached) = self.predicate_keys[index]
                    .as_deref()
                    .and_then(|k| primitives.predicate_cache_get(k))
                {
                    intermediate[index] = cached;
                    continue;
                }
                let mut data = vec![self.doubled_input(index, primitives)];
                let offset = bitwise_numbers_used * bits_count;
                if self.supplied_bits.len() >= offset + bits_count {
                    data.extend_from_slice(&self.supplied_bits[offset..offset + bits_count]);
                    bitwise_numbers_used += 1;
                }
                let mut op: Box<dyn Operation> = Box::new(LeastSignificantBit::new(data));
                op.do_step(primitives)?;
                children[index] = Some(op);
            }
            let any_running = children.iter().any(Option::is_some);
            self.state.set_child_slots(children);
            self.state.set_intermediate(intermediate);
            self.state.advance();
            if any_running {
                return Ok(());
            }
            // all predicates were known; go on directly
        }

        // finish the LSB computations and start the x·y multiplication
        if self.state.step() == 2 {
            let mut lsb_computed = 0;
            for index in 0..3 {
                if !self.state.has_child(index) {
                    lsb_computed += 1;
                    continue;
                }
                self.state.child_mut(index).do_step(primitives)?;
                if self.state.child(index).is_complete() {
                    let lsb = self.state.child(index).final_result().unwrap()[0];
                    if lsb == FAILURE_SENTINEL {
                        self.state.set_result(vec![FAILURE_SENTINEL]);
                        return Ok(());
                    }
                    let predicate = field.sub(1, lsb);
                    self.state.intermediate_mut()[index] = predicate;
                    if let Some(key) = self.predicate_keys[index].as_deref() {
                        primitives.predicate_cache_put(key, predicate);
                    }
                    lsb_computed += 1;
                }
            }
            if lsb_computed < 3 {
                return Ok(());
            }
            let x = self.state.intermediate().unwrap()[1];
            let y = self.state.intermediate().unwrap()[2];
            if self.knowledge[1] != Knowledge::Unknown || self.knowledge[2] != Knowledge::Unknown {
                // one of x, y is a public constant, multiply locally
                self.state.intermediate_mut()[3] = field.mul(x, y);
                self.state.clear_children();
                self.state.advance();
            } else {
                let mut op: Box<dyn Operation> = Box::new(Multiplication::new(vec![x, y]));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
                return Ok(());
            }
        }

        // finish x·y and start the w·(x+y-2·x·y) multiplication
        if self.state.step() == 3 {
            if self.state.child_count() > 0 {
                self.state.child_mut(0).do_step(primitives)?;
                if !self.state.child(0).is_complete() {
                    return Ok(());
                }
                let product = self.state.child(0).final_result().unwrap()[0];
                self.state.intermediate_mut()[3] = product;
            }
            let w = self.state.intermediate().unwrap()[0];
            let x = self.state.intermediate().unwrap()[1];
            let y = self.state.intermediate().unwrap()[2];
            let xy = self.state.intermediate().unwrap()[3];
            let factor = field.sub(field.add(x, y), field.mul(2, xy));
            if self.knowledge[0] != Knowledge::Unknown
                || (self.knowledge[1] != Knowledge::Unknown
                    && self.knowledge[2] != Knowledge::Unknown)
            {
                self.state.intermediate_mut()[4] = field.mul(w, factor);
                self.state.clear_children();
                self.state.advance();
            } else {
                let mut op: Box<dyn Operation> = Box::new(Multiplication::new(vec![w, factor]));
                op.do_step(primitives)?;
                self.state.set_children(vec![op]);
                self.state.advance();
                return Ok(());
            }
        }

        // finish w·(...) and combine into the final result
        if self.state.step() == 4 {
            if self.state.child_count() > 0 {
                self.state.child_mut(0).do_step(primitives)?;
                if !self.state.child(0).is_complete() {
                    return Ok(());
                }
                let product = self.state.child(0).final_result().unwrap()[0];
                self.state.intermediate_mut()[4] = product;
            }
            let x = self.state.intermediate().unwrap()[1];
            let y = self.state.intermediate().unwrap()[2];
            let xy = self.state.intermediate().unwrap()[3];
            let w_factor = self.state.intermediate().unwrap()[4];
            let result = field.add(
                field.sub(field.sub(field.add(w_factor, 1), y), x),
                xy,
            );
            self.state.set_result(vec![result]);
            self.state.advance();
        }
        Ok(())
    }
}
