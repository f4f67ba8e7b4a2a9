//! The catalogue of sharable operations.
//!
//! Every operation is a round-based state machine with the same external
//! contract: the scheduler calls [Operation::do_step] once per round, and
//! between rounds the protocol driver moves the outbound share slices to the
//! other privacy peers and fills the inbound slices with what arrived.
//! Composite operations drive their sub-operations recursively through the
//! same traversal; a completed sub-operation no longer takes part in share
//! copying.

use crate::error::Result;
use crate::scheduler::Primitives;
use crate::sharing::MISSING_SHARE;

mod array;
mod bitwise_less_than;
mod bitwise_random;
mod bloom;
mod equal;
mod interval_test;
mod least_significant_bit;
mod less_than;
mod min;
mod multiplication;
mod power;
mod prefix_or;
mod pregeneration;
mod product;
mod random_bit;
mod random_number;
mod reconstruction;
mod synchronization;

pub use array::{ArrayEqual, ArrayMultiplication, ArrayPower, ArrayProduct};
pub use bitwise_less_than::{BitwiseLessThan, BitwiseOperands};
pub use bitwise_random::{BatchGenerateBitwiseRandomNumbers, GenerateBitwiseRandomNumber};
pub use bloom::{
    BloomFilterCardinality, BloomFilterIntersection, BloomFilterThresholdUnion, BloomFilterUnion,
    BloomFilterWeightedIntersection,
};
pub use equal::Equal;
pub use interval_test::SmallIntervalTest;
pub use least_significant_bit::LeastSignificantBit;
pub use less_than::LessThan;
pub use min::Min;
pub use multiplication::Multiplication;
pub use power::Power;
pub use prefix_or::LinearPrefixOr;
pub use product::Product;
pub use random_bit::GenerateRandomBit;
pub use random_number::GenerateRandomNumber;
pub use reconstruction::Reconstruction;
pub use synchronization::Synchronization;

/// Randomized sub-protocols with inherent failure probability report failure
/// by setting their result to this sentinel instead of raising an error.
pub const FAILURE_SENTINEL: u64 = u64::MAX;

/// What a peer knows in advance about a secret's position relative to p/2.
///
/// Supplying [Knowledge::BelowHalf] or [Knowledge::AboveHalf] lets a
/// less-than skip the corresponding LSB sub-computation entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knowledge {
    /// The secret is known to be <= p/2.
    BelowHalf,
    /// The secret is known to be > p/2.
    AboveHalf,
    /// Nothing is known; the predicate must be computed.
    Unknown,
}

impl Knowledge {
    /// The in-field value of the known predicate. Must not be called on
    /// [Knowledge::Unknown].
    pub(crate) fn predicate_value(self) -> u64 {
        match self {
            Knowledge::BelowHalf => 1,
            Knowledge::AboveHalf => 0,
            Knowledge::Unknown => unreachable!("unknown predicate has no value"),
        }
    }
}

/// A round-based state machine participating in the share-synchronisation
/// protocol.
pub trait Operation: Send {
    /// The shared state of the operation.
    fn state(&self) -> &OpState;

    /// The shared state of the operation, mutably.
    fn state_mut(&mut self) -> &mut OpState;

    /// Executes the next step of the operation. All shares from the other
    /// privacy peers must have been set before this is called.
    fn do_step(&mut self, primitives: &Primitives) -> Result<()>;

    /// Copies the shares destined for the given privacy peer into `buf`
    /// starting at `pos`; returns the next free position. Sub-operations
    /// follow their parent in pre-order, completed ones are skipped.
    fn copy_outbound(&self, peer: usize, buf: &mut [u64], pos: usize) -> usize {
        self.state().copy_outbound(peer, buf, pos)
    }

    /// Sets the shares received from the given privacy peer, reading from
    /// `data` starting at `pos`; returns the next unread position. `None`
    /// marks a crashed peer: every inbound slot is set to the missing-share
    /// sentinel.
    fn copy_inbound(&mut self, peer: usize, data: Option<&[u64]>, pos: usize) -> usize {
        self.state_mut().copy_inbound(peer, data, pos)
    }

    /// The number of shares this operation (and its unfinished
    /// sub-operations) sends to each privacy peer in the next exchange.
    fn outbound_count(&self) -> usize {
        self.state().outbound_count()
    }

    /// Whether the final result has been set.
    fn is_complete(&self) -> bool {
        self.state().result.is_some()
    }

    /// The final result, once complete.
    fn final_result(&self) -> Option<&[u64]> {
        self.state().result.as_deref()
    }

    /// How many bitwise-shared random numbers this operation wants
    /// pre-generated by the driver before its first step. Zero by default.
    fn random_numbers_needed(&self, _primitives: &Primitives) -> usize {
        0
    }

    /// Hands pre-generated random-number bit shares to the operation.
    fn set_random_number_bit_shares(&mut self, _bits: Vec<u64>) {}
}

/// State shared by all operations: a step counter, the initial arguments, an
/// intermediary result buffer, the outbound/inbound share slices (laid out
/// one slice per privacy peer) and the owned sub-operations.
#[derive(Default)]
pub struct OpState {
    step: usize,
    initial: Vec<u64>,
    intermediate: Option<Vec<u64>>,
    /// Flattened `[peer][share]`, `width` shares per peer.
    outbound: Vec<u64>,
    inbound: Vec<u64>,
    width: usize,
    result: Option<Vec<u64>>,
    children: Vec<Option<Box<dyn Operation>>>,
}

impl OpState {
    /// Creates a fresh state at step 1 with the given initial data.
    pub fn new(initial: Vec<u64>) -> Self {
        Self {
            step: 1,
            initial,
            ..Self::default()
        }
    }

    pub(crate) fn step(&self) -> usize {
        self.step
    }

    pub(crate) fn set_step(&mut self, step: usize) {
        self.step = step;
    }

    pub(crate) fn advance(&mut self) {
        self.step += 1;
    }

    pub(crate) fn initial(&self) -> &[u64] {
        &self.initial
    }

    pub(crate) fn set_initial(&mut self, initial: Vec<u64>) {
        self.initial = initial;
    }

    pub(crate) fn intermediate(&self) -> Option<&Vec<u64>> {
        self.intermediate.as_ref()
    }

    pub(crate) fn intermediate_mut(&mut self) -> &mut Vec<u64> {
        self.intermediate.as_mut().expect("intermediary result not set")
    }

    pub(crate) fn set_intermediate(&mut self, intermediate: Vec<u64>) {
        self.intermediate = Some(intermediate);
    }

    pub(crate) fn take_intermediate(&mut self) -> Vec<u64> {
        self.intermediate.take().expect("intermediary result not set")
    }

    /// Sets the per-peer outbound shares (`shares.len()` must be
    /// peers * width) and sizes the inbound buffer identically, as exactly
    /// as much data will be received as is sent.
    pub(crate) fn set_outbound(&mut self, shares: Vec<u64>, width: usize) {
        debug_assert_eq!(shares.len() % width.max(1), 0);
        self.inbound = vec![0; shares.len()];
        self.outbound = shares;
        self.width = width;
    }

    /// The own shares are not sent over the network; they are copied over
    /// directly.
    pub(crate) fn copy_own_shares(&mut self, my_index: usize) {
        let w = self.width;
        self.inbound[my_index * w..(my_index + 1) * w]
            .copy_from_slice(&self.outbound[my_index * w..(my_index + 1) * w]);
    }

    /// The inbound share slice of the given peer.
    pub(crate) fn inbound_row(&self, peer: usize) -> &[u64] {
        &self.inbound[peer * self.width..(peer + 1) * self.width]
    }

    /// All inbound shares of one secret, across peers: `[peer]`.
    pub(crate) fn inbound_column(&self, share_index: usize) -> Vec<u64> {
        (0..self.inbound.len() / self.width)
            .map(|peer| self.inbound[peer * self.width + share_index])
            .collect()
    }

    pub(crate) fn inbound(&self) -> &[u64] {
        &self.inbound
    }

    pub(crate) fn set_result(&mut self, result: Vec<u64>) {
        self.result = Some(result);
    }

    pub(crate) fn set_children(&mut self, children: Vec<Box<dyn Operation>>) {
        self.children = children.into_iter().map(Some).collect();
    }

    /// Replaces the child vector with possibly vacant slots.
    pub(crate) fn set_child_slots(&mut self, children: Vec<Option<Box<dyn Operation>>>) {
        self.children = children;
    }

    pub(crate) fn clear_children(&mut self) {
        self.children.clear();
    }

    pub(crate) fn child(&self, index: usize) -> &dyn Operation {
        self.children[index].as_deref().expect("vacant child slot")
    }

    pub(crate) fn child_mut(&mut self, index: usize) -> &mut Box<dyn Operation> {
        self.children[index].as_mut().expect("vacant child slot")
    }

    pub(crate) fn has_child(&self, index: usize) -> bool {
        self.children.get(index).map(Option::is_some).unwrap_or(false)
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    fn outbound_count(&self) -> usize {
        let mut count = self.width;
        for child in self.children.iter().flatten() {
            if !child.is_complete() {
                count += child.outbound_count();
            }
        }
        count
    }

    fn copy_outbound(&self, peer: usize, buf: &mut [u64], mut pos: usize) -> usize {
        let w = self.width;
        if w > 0 {
            buf[pos..pos + w].copy_from_slice(&self.outbound[peer * w..(peer + 1) * w]);
            pos += w;
        }
        for child in self.children.iter().flatten() {
            if !child.is_complete() {
                pos = child.copy_outbound(peer, buf, pos);
            }
        }
        pos
    }

    fn copy_inbound(&mut self, peer: usize, data: Option<&[u64]>, mut pos: usize) -> usize {
        let w = self.width;
        if w > 0 {
            match data {
                Some(data) => {
                    self.inbound[peer * w..(peer + 1) * w]
                        .copy_from_slice(&data[pos..pos + w]);
                }
                None => self.inbound[peer * w..(peer + 1) * w].fill(MISSING_SHARE),
            }
            pos += w;
        }
        for child in self.children.iter_mut().flatten() {
            if !child.is_complete() {
                pos = child.copy_inbound(peer, data, pos);
            }
        }
        pos
    }
}
