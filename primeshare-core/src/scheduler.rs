//! The primitives scheduler: a batch of operations with IDs, processed
//! round-synchronously by a pool of worker threads.
//!
//! An operation set holds up to `parallel_count` running operations; the
//! overflow waits in a queue and is started as slots free up. All worker
//! threads of a privacy peer call [Primitives::process_received_data] once
//! per round; a barrier synchronises them and the running operations are
//! partitioned among the threads by arrival order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Barrier;

use parking_lot::{Mutex, RwLock};
use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::config::EngineConfig;
use crate::error::{PrimitivesError, Result};
use crate::field::Gf;
use crate::operations::{
    ArrayEqual, ArrayMultiplication, ArrayPower, ArrayProduct,
    BatchGenerateBitwiseRandomNumbers, BitwiseLessThan, BitwiseOperands, BloomFilterCardinality,
    BloomFilterIntersection, BloomFilterThresholdUnion, BloomFilterUnion,
    BloomFilterWeightedIntersection, Equal, GenerateBitwiseRandomNumber, GenerateRandomBit,
    GenerateRandomNumber, Knowledge, LeastSignificantBit, LessThan, LinearPrefixOr, Min,
    Multiplication, Operation, Power, Product, Reconstruction, SmallIntervalTest, Synchronization,
};
use crate::sharing::ShamirSharing;
use crate::RngType;

struct Slot {
    id: usize,
    op: Box<dyn Operation>,
}

/// One batch of scheduled operations.
#[derive(Default)]
struct OperationSet {
    /// The running operations; a slot goes vacant when its operation
    /// completes and the queue is exhausted.
    slots: Vec<Mutex<Option<Slot>>>,
    /// Pending operations, indexed by `id - parallel_count`.
    queue: Mutex<Vec<Option<Box<dyn Operation>>>>,
    /// Final results, indexed by operation id.
    results: Mutex<Vec<Option<Vec<u64>>>>,
    completed: AtomicUsize,
    parallel_count: usize,
    total_count: usize,
    set_number: u64,
}

/// The per-peer engine offering basic operations for MPC protocols over
/// Shamir shares.
///
/// Schedule operations with the `reconstruct`, `multiply`, ... family of
/// methods after an [initialize](Primitives::initialize), then drive the set
/// with [process_received_data](Primitives::process_received_data),
/// synchronising intermediate shares between rounds via
/// [get_data_to_send](Primitives::get_data_to_send) and
/// [set_received_data](Primitives::set_received_data) (the protocol driver
/// does all of this). Results are picked up by operation id.
pub struct Primitives {
    sharing: ShamirSharing,
    field: Gf,
    bits_count: usize,
    num_privacy_peers: usize,
    my_privacy_peer_index: usize,
    synchronize_shares: bool,
    worker_count: usize,
    rng: Mutex<Box<dyn RngCore + Send>>,
    predicate_cache: Mutex<HashMap<String, u64>>,
    set: RwLock<OperationSet>,
    snapshots: Mutex<Vec<OperationSet>>,
    next_set_number: AtomicU64,
    barrier: Barrier,
    arrival: AtomicUsize,
}

impl Primitives {
    /// Creates a primitives engine from the configuration, for
    /// `worker_count` protocol threads stepping it.
    pub fn new(config: &EngineConfig, worker_count: usize) -> Result<Self> {
        config.validate()?;
        let field = Gf::new(config.prime_field_size);
        if config.synchronize_shares && field.bit_len() <= config.num_privacy_peers {
            // the delivery mask of a multiplication is encoded in its share
            // slot, which holds one bit per peer
            tracing::warn!(
                "share synchronisation needs log2(p) > m (p={}, m={})",
                config.prime_field_size,
                config.num_privacy_peers
            );
        }
        let sharing = ShamirSharing::new(field, config.num_privacy_peers, config.degree_t())?;
        let rng: Box<dyn RngCore + Send> = match config.random_algorithm.as_str() {
            "os" => Box::new(OsRng),
            _ => Box::new(RngType::from_entropy()),
        };
        Ok(Self {
            bits_count: field.bit_len(),
            field,
            sharing,
            num_privacy_peers: config.num_privacy_peers,
            my_privacy_peer_index: config.my_index(),
            synchronize_shares: config.synchronize_shares,
            worker_count,
            rng: Mutex::new(rng),
            predicate_cache: Mutex::new(HashMap::new()),
            set: RwLock::new(OperationSet::default()),
            snapshots: Mutex::new(Vec::new()),
            next_set_number: AtomicU64::new(0),
            barrier: Barrier::new(worker_count),
            arrival: AtomicUsize::new(0),
        })
    }

    /// Initializes a new operation set of `total_count` operations of which
    /// `parallel_count` run concurrently; the rest is queued.
    /// `parallel_count` 0 (or >= total) runs everything in parallel.
    pub fn initialize(&self, parallel_count: usize, total_count: usize) {
        let parallel = if parallel_count == 0 || parallel_count >= total_count {
            total_count
        } else {
            parallel_count
        };
        let mut set = self.set.write();
        *set = OperationSet {
            slots: Vec::with_capacity(parallel),
            queue: Mutex::new((0..total_count - parallel).map(|_| None).collect()),
            results: Mutex::new(vec![None; total_count]),
            completed: AtomicUsize::new(0),
            parallel_count: parallel,
            total_count,
            set_number: self.next_set_number.fetch_add(1, Ordering::SeqCst) + 1,
        };
    }

    /// The number of the currently open operation set; set numbers strictly
    /// increase over the lifetime of the engine.
    pub fn current_set_number(&self) -> u64 {
        self.set.read().set_number
    }

    fn schedule(&self, id: usize, op: Box<dyn Operation>) -> Result<()> {
        let mut set = self.set.write();
        if id >= set.total_count {
            return Err(PrimitivesError::protocol(format!(
                "operation id {id} exceeds the operation set size {}",
                set.total_count
            )));
        }
        if set.slots.len() < set.parallel_count {
            set.slots.push(Mutex::new(Some(Slot { id, op })));
        } else {
            let index = id - set.parallel_count;
            set.queue.lock()[index] = Some(op);
        }
        Ok(())
    }

    /// Processes the received data for the running operations. Each worker
    /// thread calls this once per round and picks its own part of the work;
    /// the threads synchronise on a barrier at entry and exit.
    pub fn process_received_data(&self) -> Result<()> {
        if self.are_operations_completed() {
            tracing::debug!("process_received_data: operations already completed");
            return Ok(());
        }
        let rank = self.arrival.fetch_add(1, Ordering::SeqCst) % self.worker_count;
        self.barrier.wait();

        let set = self.set.read();
        let scheduled = set.slots.len() + set.queue.lock().iter().filter(|o| o.is_some()).count();
        if scheduled < set.total_count && set.completed.load(Ordering::SeqCst) == 0 {
            tracing::warn!(
                "not all operations of the set submitted yet (scheduled: {scheduled}, \
                 expected total: {})",
                set.total_count
            );
        }

        // divide the running operations over the worker threads; the first
        // arriver also takes the remainder
        let count = set.slots.len();
        let chunk = count / self.worker_count;
        let (start, end) = if rank == 0 {
            (0, count - (self.worker_count - 1) * chunk)
        } else {
            let end = count - (self.worker_count - 1 - rank) * chunk;
            (end - chunk, end)
        };

        let mut completed_here = 0;
        let mut failure = None;
        'slots: for slot in &set.slots[start..end] {
            let mut guard = slot.lock();
            let Some(running) = guard.as_mut() else {
                continue;
            };
            if let Err(e) = running.op.do_step(self) {
                failure = Some(e);
                break 'slots;
            }
            if running.op.is_complete() {
                let result = running.op.final_result().expect("complete").to_vec();
                set.results.lock()[running.id] = Some(result);
                completed_here += 1;
                let next_id = running.id + set.parallel_count;
                if next_id < set.total_count {
                    // dequeue the successor and do its first step right away
                    let mut op = set.queue.lock()[next_id - set.parallel_count]
                        .take()
                        .expect("queued operation missing");
                    if let Err(e) = op.do_step(self) {
                        failure = Some(e);
                        break 'slots;
                    }
                    *guard = Some(Slot { id: next_id, op });
                } else {
                    *guard = None;
                }
            }
        }
        set.completed.fetch_add(completed_here, Ordering::SeqCst);
        drop(set);

        // finish the barrier cycle even on failure, the other workers are
        // already committed to it
        self.barrier.wait();
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether all operations of the current set have completed.
    pub fn are_operations_completed(&self) -> bool {
        let set = self.set.read();
        set.completed.load(Ordering::SeqCst) >= set.total_count
    }

    /// The final result of the given operation, or `None` while it is still
    /// running. Reads after completion succeed idempotently.
    pub fn result(&self, id: usize) -> Option<Vec<u64>> {
        self.set.read().results.lock()[id].clone()
    }

    /// All results of the completed set in id order; operations that never
    /// completed yield empty vectors.
    pub(crate) fn collect_results(&self) -> (bool, Vec<Vec<u64>>) {
        let set = self.set.read();
        let results = set.results.lock();
        let ok = results.iter().all(Option::is_some);
        let per_operation = results
            .iter()
            .map(|r| r.clone().unwrap_or_default())
            .collect();
        (ok, per_operation)
    }

    /// The data to send to the given privacy peer: the concatenated
    /// outbound slices of every running operation in id order,
    /// sub-operations in pre-order.
    pub fn get_data_to_send(&self, privacy_peer_index: usize) -> Vec<u64> {
        let set = self.set.read();
        let mut total = 0;
        for slot in &set.slots {
            if let Some(running) = &*slot.lock() {
                total += running.op.outbound_count();
            }
        }
        let mut data = vec![0u64; total];
        let mut pos = 0;
        for slot in &set.slots {
            if let Some(running) = &*slot.lock() {
                pos = running.op.copy_outbound(privacy_peer_index, &mut data, pos);
            }
        }
        tracing::debug!("sending {pos} shares to privacy peer {privacy_peer_index}");
        data
    }

    /// Sets the data received from the given privacy peer. `None` stands
    /// for a dummy message from a crashed peer: every expected share is
    /// recorded as missing.
    pub fn set_received_data(&self, privacy_peer_index: usize, data: Option<&[u64]>) {
        let set = self.set.read();
        let mut pos = 0;
        let mut running_count = 0;
        for slot in &set.slots {
            if let Some(running) = &mut *slot.lock() {
                pos = running.op.copy_inbound(privacy_peer_index, data, pos);
                running_count += 1;
            }
        }
        match data {
            Some(data) => tracing::debug!(
                "set {} received shares for {running_count} operations",
                data.len()
            ),
            None => tracing::debug!("set DUMMY shares for {running_count} operations"),
        }
    }

    /// Pushes the current operation set on the snapshot stack, leaving a
    /// fresh empty set behind. Used to run a nested batch (random number
    /// pre-generation) without disturbing the outer set.
    pub fn push_operations(&self) {
        let mut set = self.set.write();
        let saved = std::mem::take(&mut *set);
        self.snapshots.lock().push(saved);
    }

    /// Pops the most recent snapshot, discarding whatever was scheduled in
    /// the meantime.
    pub fn pop_operations(&self) {
        if let Some(saved) = self.snapshots.lock().pop() {
            *self.set.write() = saved;
        }
    }

    /// The total number of bitwise-shared random numbers the running
    /// operations still need pre-generated.
    pub fn pending_random_numbers(&self) -> usize {
        let set = self.set.read();
        let mut needed = 0;
        for slot in &set.slots {
            if let Some(running) = &*slot.lock() {
                needed += running.op.random_numbers_needed(self);
            }
        }
        needed
    }

    /// Slices pre-generated random-number bits into the running operations,
    /// in scheduling order.
    pub fn distribute_random_bits(&self, bits: &[u64]) {
        let set = self.set.read();
        let mut index = 0;
        for slot in &set.slots {
            if let Some(running) = &mut *slot.lock() {
                let bits_needed = running.op.random_numbers_needed(self) * self.bits_count;
                if bits_needed > 0 {
                    running
                        .op
                        .set_random_number_bit_shares(bits[index..index + bits_needed].to_vec());
                    index += bits_needed;
                }
            }
        }
    }

    // accessors used by the operation state machines

    /// The Shamir sharing instance.
    pub fn sharing(&self) -> &ShamirSharing {
        &self.sharing
    }

    /// The finite field.
    pub fn field(&self) -> Gf {
        self.field
    }

    /// The field size p.
    pub fn field_size(&self) -> u64 {
        self.field.modulus()
    }

    /// The number of bits used for bitwise-shared numbers, ⌈log₂ p⌉.
    pub fn bits_count(&self) -> usize {
        self.bits_count
    }

    /// The number of privacy peers m.
    pub fn num_privacy_peers(&self) -> usize {
        self.num_privacy_peers
    }

    /// Our 0-based privacy peer index.
    pub fn my_index(&self) -> usize {
        self.my_privacy_peer_index
    }

    /// Whether multiplications run the mask-intersection safeguard.
    pub fn synchronize_shares(&self) -> bool {
        self.synchronize_shares
    }

    /// A uniform random field element from the configured source.
    pub fn random_field_element(&self) -> u64 {
        let mut rng = self.rng.lock();
        (&mut *rng).gen_range(0..self.field.modulus())
    }

    /// Shares a secret to all privacy peers with the configured source.
    pub fn generate_share(&self, secret: u64) -> Vec<u64> {
        let mut rng = self.rng.lock();
        self.sharing.generate_share(&mut *rng, secret)
    }

    /// The big-endian bits of a public value.
    pub fn bits(&self, value: u64) -> Vec<u64> {
        self.field.bits(value)
    }

    /// Folds bit (shares) back into a number (share).
    pub fn number_from_bits(&self, bits: &[u64]) -> u64 {
        self.field.number_from_bits(bits)
    }

    /// Looks up a memoized [x < p/2] predicate share.
    pub fn predicate_cache_get(&self, key: &str) -> Option<u64> {
        self.predicate_cache.lock().get(key).copied()
    }

    /// Memoizes a [x < p/2] predicate share under a caller-chosen key.
    pub fn predicate_cache_put(&self, key: &str, share: u64) {
        self.predicate_cache.lock().insert(key.to_owned(), share);
    }

    /// The number of memoized predicates.
    pub fn predicate_cache_len(&self) -> usize {
        self.predicate_cache.lock().len()
    }

    // operation scheduling

    /// Schedules the reconstruction of a shared secret; `data` holds the
    /// share. The result is the secret itself.
    pub fn reconstruct(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.len() != 1 {
            return Err(PrimitivesError::protocol(
                "reconstruction takes exactly one share",
            ));
        }
        self.schedule(id, Box::new(Reconstruction::new(data.to_vec())))
    }

    /// Schedules the multiplication of two shared secrets; `data` holds the
    /// two shares.
    pub fn multiply(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.len() != 2 {
            return Err(PrimitivesError::protocol(
                "multiplication takes exactly two shares",
            ));
        }
        self.schedule(id, Box::new(Multiplication::new(data.to_vec())))
    }

    /// Schedules the synchronization of a public {0,1} vector; the result
    /// is the elementwise logical AND over all peers.
    pub fn synchronize(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.is_empty() {
            return Err(PrimitivesError::protocol(
                "synchronization takes at least one value",
            ));
        }
        self.schedule(id, Box::new(Synchronization::new(data.to_vec())))
    }

    /// Schedules x^n for a shared x and public n >= 1; `data` holds [x, n].
    pub fn power(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.len() != 2 {
            return Err(PrimitivesError::protocol("power takes [share, exponent]"));
        }
        if data[1] < 1 {
            return Err(PrimitivesError::protocol("the exponent must be at least 1"));
        }
        self.schedule(id, Box::new(Power::new(data.to_vec())))
    }

    /// Schedules an equality test of two shared secrets; the result is a
    /// share of 1 if they are equal and of 0 otherwise. Only works for
    /// prime field sizes.
    pub fn equal(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.len() != 2 {
            return Err(PrimitivesError::protocol("equal takes exactly two shares"));
        }
        self.schedule(id, Box::new(Equal::new(data.to_vec())))
    }

    /// Schedules the product of several shared factors; rounds are
    /// logarithmic in the factor count.
    pub fn product(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.len() < 2 {
            return Err(PrimitivesError::protocol(
                "product takes at least two factors",
            ));
        }
        self.schedule(id, Box::new(Product::new(data.to_vec())))
    }

    /// Schedules a test whether a shared x lies in the public interval
    /// [l, u]; `data` holds [x, l, u]. Only suitable for small intervals.
    pub fn small_interval_test(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.len() != 3 {
            return Err(PrimitivesError::protocol(
                "small interval test takes [share, lower, upper]",
            ));
        }
        if !(data[1] <= data[2] && data[2] < self.field.modulus()) {
            return Err(PrimitivesError::protocol(
                "interval bounds must be field elements with lower <= upper",
            ));
        }
        self.schedule(id, Box::new(SmallIntervalTest::new(data.to_vec())))
    }

    /// Schedules the generation of a shared random number.
    pub fn generate_random_number(&self, id: usize) -> Result<()> {
        self.schedule(id, Box::new(GenerateRandomNumber::new()))
    }

    /// Schedules the generation of a shared random bit. May fail with
    /// probability 1/p, setting the result to the failure sentinel.
    pub fn generate_random_bit(&self, id: usize) -> Result<()> {
        self.schedule(id, Box::new(GenerateRandomBit::new()))
    }

    /// Schedules the prefix-OR over the given bit shares.
    pub fn linear_prefix_or(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.is_empty() {
            return Err(PrimitivesError::protocol(
                "prefix-or takes at least one bit share",
            ));
        }
        self.schedule(id, Box::new(LinearPrefixOr::new(data.to_vec())))
    }

    /// Schedules a bitwise less-than; both operands are big-endian and
    /// ⌈log₂ p⌉ bits long. Use [Primitives::bits] for a public operand.
    pub fn bitwise_less_than(
        &self,
        id: usize,
        operands: BitwiseOperands,
        a_bits: &[u64],
        b_bits: &[u64],
    ) -> Result<()> {
        if a_bits.len() != self.bits_count || b_bits.len() != self.bits_count {
            return Err(PrimitivesError::protocol(format!(
                "bitwise less-than operands must be {} bits long",
                self.bits_count
            )));
        }
        self.schedule(
            id,
            Box::new(BitwiseLessThan::new(
                operands,
                a_bits.to_vec(),
                b_bits.to_vec(),
            )),
        )
    }

    /// Schedules the generation of a bitwise-shared random number,
    /// optionally from already generated random bit shares. May fail,
    /// setting the result to the failure sentinel.
    pub fn generate_bitwise_random_number(&self, id: usize, bits: Option<&[u64]>) -> Result<()> {
        if let Some(bits) = bits {
            if bits.len() != self.bits_count {
                return Err(PrimitivesError::protocol(format!(
                    "bitwise random number generation takes none or {} bit shares",
                    self.bits_count
                )));
            }
        }
        self.schedule(
            id,
            Box::new(GenerateBitwiseRandomNumber::new(bits.map(<[u64]>::to_vec))),
        )
    }

    /// Schedules the generation of at least `count` bitwise-shared random
    /// numbers; retries internally until the demand is met.
    pub fn batch_generate_bitwise_random_numbers(&self, id: usize, count: u64) -> Result<()> {
        if count < 1 || count.saturating_mul(self.bits_count as u64) > i32::MAX as u64 {
            return Err(PrimitivesError::protocol(format!(
                "requested amount of bitwise shared random numbers must be between 1 and {}",
                i32::MAX as u64 / self.bits_count as u64
            )));
        }
        self.schedule(id, Box::new(BatchGenerateBitwiseRandomNumbers::new(count)))
    }

    /// Schedules the least-significant-bit computation of a shared number;
    /// `data` holds the share, optionally followed by the bit shares of the
    /// random number to use. May fail like the bitwise random generation.
    pub fn least_significant_bit(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.len() != 1 && data.len() != 1 + self.bits_count {
            return Err(PrimitivesError::protocol(format!(
                "least significant bit takes one share or 1+{} values",
                self.bits_count
            )));
        }
        self.schedule(id, Box::new(LeastSignificantBit::new(data.to_vec())))
    }

    /// Schedules a < b for two shared (or public) values with the given
    /// advance knowledge, optionally supplying the bitwise-shared random
    /// numbers to use (one per unknown predicate).
    pub fn less_than(
        &self,
        id: usize,
        a: u64,
        b: u64,
        knowledge_a: Knowledge,
        knowledge_b: Knowledge,
        knowledge_diff: Knowledge,
        bits: Option<&[u64]>,
    ) -> Result<()> {
        self.less_than_cached(
            id,
            a,
            b,
            knowledge_a,
            knowledge_b,
            knowledge_diff,
            bits,
            None,
            None,
            None,
        )
    }

    /// The same as [Primitives::less_than], but with predicate caching: the
    /// shares of [a < p/2], [b < p/2] and [a-b < p/2] are memoized under
    /// the given keys across less-than operations on the same secrets.
    #[allow(clippy::too_many_arguments)]
    pub fn less_than_cached(
        &self,
        id: usize,
        a: u64,
        b: u64,
        knowledge_a: Knowledge,
        knowledge_b: Knowledge,
        knowledge_diff: Knowledge,
        bits: Option<&[u64]>,
        key_a: Option<String>,
        key_b: Option<String>,
        key_diff: Option<String>,
    ) -> Result<()> {
        if let Some(bits) = bits {
            if bits.len() % self.bits_count != 0 || bits.len() / self.bits_count > 3 {
                return Err(PrimitivesError::protocol(format!(
                    "less-than takes 0 to 3 bitwise random numbers of {} bits each",
                    self.bits_count
                )));
            }
        }
        let mut op = LessThan::new(
            a,
            b,
            knowledge_a,
            knowledge_b,
            knowledge_diff,
            bits.map(<[u64]>::to_vec),
        );
        op.set_predicate_keys(key_a, key_b, key_diff);
        self.schedule(id, Box::new(op))
    }

    /// Schedules the elementwise product of several equally long share
    /// arrays. `few_rounds` chooses the round-optimised pair reduction over
    /// the memory-friendlier sequential fold.
    pub fn array_product(&self, id: usize, data: Vec<Vec<u64>>, few_rounds: bool) -> Result<()> {
        if data.len() < 2 {
            return Err(PrimitivesError::protocol(
                "array product takes at least two arrays",
            ));
        }
        if data.iter().any(|a| a.len() != data[0].len()) {
            return Err(PrimitivesError::protocol(
                "array product takes arrays of equal length",
            ));
        }
        self.schedule(id, Box::new(ArrayProduct::new(data, few_rounds)))
    }

    /// Schedules the elementwise power of a share array to a public
    /// exponent >= 1.
    pub fn array_power(&self, id: usize, data: &[u64], exponent: u64) -> Result<()> {
        if data.is_empty() {
            return Err(PrimitivesError::protocol(
                "array power takes at least one share",
            ));
        }
        if exponent < 1 {
            return Err(PrimitivesError::protocol("the exponent must be at least 1"));
        }
        self.schedule(id, Box::new(ArrayPower::new(data.to_vec(), exponent)))
    }

    /// Schedules the elementwise multiplication of two equally long share
    /// arrays.
    pub fn array_mult(&self, id: usize, factor1: &[u64], factor2: &[u64]) -> Result<()> {
        if factor1.len() != factor2.len() {
            return Err(PrimitivesError::protocol(
                "array multiplication takes arrays of equal length",
            ));
        }
        self.schedule(
            id,
            Box::new(ArrayMultiplication::new(
                factor1.to_vec(),
                factor2.to_vec(),
            )),
        )
    }

    /// Schedules the elementwise equality test of two equally long share
    /// arrays.
    pub fn array_equal(&self, id: usize, data1: &[u64], data2: &[u64]) -> Result<()> {
        if data1.len() != data2.len() {
            return Err(PrimitivesError::protocol(
                "array equal takes arrays of equal length",
            ));
        }
        self.schedule(
            id,
            Box::new(ArrayEqual::new(data1.to_vec(), data2.to_vec())),
        )
    }

    /// Schedules the minimum of the given value shares. `knowledge` must
    /// hold for every value; `few_rounds` chooses the pairwise reduction
    /// over the sequential fold.
    pub fn min(
        &self,
        id: usize,
        data: &[u64],
        knowledge: Knowledge,
        few_rounds: bool,
    ) -> Result<()> {
        if data.len() < 2 {
            return Err(PrimitivesError::protocol("min takes at least two values"));
        }
        self.schedule(id, Box::new(Min::new(data.to_vec(), knowledge, few_rounds)))
    }

    /// Schedules the intersection of Bloom-filter sets,
    /// `data[filter][position]`. Counting filters assume all counters are
    /// <= p/2.
    pub fn bf_intersection(&self, id: usize, data: Vec<Vec<u64>>, counting: bool) -> Result<()> {
        if data.len() < 2 {
            return Err(PrimitivesError::protocol(
                "Bloom filter intersection takes at least two filters",
            ));
        }
        self.schedule(id, Box::new(BloomFilterIntersection::new(data, counting)))
    }

    /// Schedules the union of Bloom-filter sets, `data[filter][position]`.
    pub fn bf_union(&self, id: usize, data: Vec<Vec<u64>>, counting: bool) -> Result<()> {
        if data.len() < 2 {
            return Err(PrimitivesError::protocol(
                "Bloom filter union takes at least two filters",
            ));
        }
        self.schedule(id, Box::new(BloomFilterUnion::new(data, counting)))
    }

    /// Schedules the cardinality (position sum) of a Bloom filter.
    pub fn bf_cardinality(&self, id: usize, data: &[u64]) -> Result<()> {
        if data.is_empty() {
            return Err(PrimitivesError::protocol(
                "Bloom filter cardinality takes at least one share",
            ));
        }
        self.schedule(id, Box::new(BloomFilterCardinality::new(data.to_vec())))
    }

    /// Schedules the threshold union of Bloom-filter sets: positions whose
    /// summed counters reach `threshold` remain, as counters if
    /// `learn_count` is set and as {0,1} otherwise.
    pub fn bf_threshold_union(
        &self,
        id: usize,
        data: Vec<Vec<u64>>,
        threshold: u64,
        learn_count: bool,
    ) -> Result<()> {
        if data.len() < 2 {
            return Err(PrimitivesError::protocol(
                "Bloom filter threshold union takes at least two filters",
            ));
        }
        self.schedule(
            id,
            Box::new(BloomFilterThresholdUnion::new(data, threshold, learn_count)),
        )
    }

    /// Schedules the weighted intersection of key and weight Bloom-filter
    /// families with the two public thresholds.
    pub fn bf_weighted_intersection(
        &self,
        id: usize,
        keys: Vec<Vec<u64>>,
        weights: Vec<Vec<u64>>,
        threshold_keys: u64,
        threshold_weights: u64,
        learn_weights: bool,
    ) -> Result<()> {
        if keys.len() < 2 || weights.len() < 2 {
            return Err(PrimitivesError::protocol(
                "weighted intersection takes at least two key and two weight filters",
            ));
        }
        if keys[0].len() != weights[0].len() {
            return Err(PrimitivesError::protocol(
                "key and weight filters must have the same length",
            ));
        }
        self.schedule(
            id,
            Box::new(BloomFilterWeightedIntersection::new(
                keys,
                weights,
                threshold_keys,
                threshold_weights,
                learn_weights,
            )),
        )
    }
}
