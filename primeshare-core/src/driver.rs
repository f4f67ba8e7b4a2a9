//! The protocol driver: barrier-synchronised send/receive of one pooled
//! primitives message per privacy-peer pair and round.
//!
//! A privacy peer runs one driver (and worker thread) per other privacy
//! peer; all drivers of a peer share the scheduler and a [DriverShared]
//! rendezvous. Per round the drivers let the scheduler process locally,
//! then each exchanges the pooled message with its partner peer.
//!
//! Errors on a single link never strand the sibling threads: a failed
//! receive or a malformed message degrades into the same dummy-message path
//! as a crashed peer, the round's barrier cycle is finished, and the fault
//! is surfaced once the operation set has run its course.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use primeshare_net::Network;

use crate::error::{PrimitivesError, Result};
use crate::message::PrimitivesMessage;
use crate::scheduler::Primitives;
use crate::stopper::Stopper;

/// The outcome of one completed operation set, surfaced to the application.
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// Whether every scheduled operation deposited a result.
    pub ok: bool,
    /// The final result vectors, indexed by operation id. Randomized
    /// operations that failed hold the failure sentinel.
    pub per_operation: Vec<Vec<u64>>,
}

/// Running time statistics over the finished rounds, kept by the timer
/// thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundStatistics {
    /// Total time spent in local computation.
    pub computation: Duration,
    /// Total time spent sending and receiving.
    pub communication: Duration,
    /// The number of finished processing rounds.
    pub rounds: u64,
}

/// State shared by all protocol drivers of one privacy peer.
pub struct DriverShared {
    barrier: Barrier,
    arrival: AtomicUsize,
    worker_count: usize,
    down_peers: Mutex<HashSet<usize>>,
    /// The agreed stop verdict of the current round boundary, sampled by
    /// the first arriver at [DriverShared::stop_checkpoint].
    stop_requested: AtomicBool,
    /// A scheduling fault during random number pre-generation, published to
    /// every driver thread so all of them abort the set together.
    fault: Mutex<Option<String>>,
    stats: Mutex<RoundStatistics>,
}

impl DriverShared {
    /// Creates the rendezvous state for `worker_count` driver threads.
    pub fn new(worker_count: usize) -> Self {
        Self {
            barrier: Barrier::new(worker_count),
            arrival: AtomicUsize::new(0),
            worker_count,
            down_peers: Mutex::new(HashSet::new()),
            stop_requested: AtomicBool::new(false),
            fault: Mutex::new(None),
            stats: Mutex::new(RoundStatistics::default()),
        }
    }

    /// Meets all driver threads at the barrier; returns this thread's
    /// arrival rank, 0 for the first arriver.
    fn checkpoint(&self) -> usize {
        let rank = self.arrival.fetch_add(1, Ordering::SeqCst) % self.worker_count;
        self.barrier.wait();
        rank
    }

    /// Meets all driver threads at the barrier and agrees whether the
    /// computation should stop. The first arriver samples the stopper
    /// before the barrier opens, so every thread reaches the same verdict
    /// and none is left behind at a later barrier.
    fn stop_checkpoint(&self, stopper: &Stopper) -> bool {
        let rank = self.arrival.fetch_add(1, Ordering::SeqCst) % self.worker_count;
        if rank == 0 {
            self.stop_requested
                .store(stopper.is_stopped(), Ordering::SeqCst);
        }
        self.barrier.wait();
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// The peers that have stopped delivering messages.
    pub fn down_peers(&self) -> HashSet<usize> {
        self.down_peers.lock().clone()
    }

    /// The accumulated timing statistics.
    pub fn statistics(&self) -> RoundStatistics {
        *self.stats.lock()
    }
}

/// Drives the scheduled operations of one privacy peer towards one partner
/// peer, including the batched pre-generation of bitwise-shared random
/// numbers for scheduled comparisons.
pub struct ProtocolDriver<N> {
    primitives: Arc<Primitives>,
    shared: Arc<DriverShared>,
    net: Arc<N>,
    my_peer_id: String,
    other_peer_id: String,
    other_peer_index: usize,
    stopper: Stopper,
}

/// The lexicographically smaller peer id sends first when data is
/// exchanged; the deterministic order avoids cross-deadlock when both sides
/// would otherwise try to send before reading.
pub fn sending_first(my_id: &str, other_id: &str) -> bool {
    my_id < other_id
}

impl<N: Network> ProtocolDriver<N> {
    /// Creates a driver for the link to `other_peer_id`.
    pub fn new(
        primitives: Arc<Primitives>,
        shared: Arc<DriverShared>,
        net: Arc<N>,
        my_peer_id: impl Into<String>,
        other_peer_id: impl Into<String>,
        other_peer_index: usize,
        stopper: Stopper,
    ) -> Self {
        Self {
            primitives,
            shared,
            net,
            my_peer_id: my_peer_id.into(),
            other_peer_id: other_peer_id.into(),
            other_peer_index,
            stopper,
        }
    }

    /// Executes the scheduled operations to completion, synchronising the
    /// intermediate shares with the partner peer round by round. Every
    /// driver thread of the peer must call this together.
    ///
    /// The stopper is checked between rounds; a trip unwinds all driver
    /// threads of the peer together with [PrimitivesError::Stopped]. Link
    /// failures degrade into missing shares and fail the set only after it
    /// has run its course.
    pub fn do_operations(&self) -> Result<()> {
        if self.shared.stop_checkpoint(&self.stopper) {
            return Err(PrimitivesError::Stopped);
        }
        // a link fault must not skip any barrier, so it is carried to the
        // end of the set instead of unwinding mid-round
        let mut deferred: Option<PrimitivesError> = None;
        self.generate_random_numbers_if_needed(&mut deferred)?;

        let set_number = self.primitives.current_set_number();
        // one thread keeps the time for all; the loads are roughly equal
        let timing = self.shared.checkpoint() == 0;

        let mut watch = Instant::now();
        self.primitives.process_received_data()?;
        if timing {
            self.record_computation(watch.elapsed());
        }

        let mut round = 1;
        while !self.primitives.are_operations_completed() {
            if self.shared.stop_checkpoint(&self.stopper) {
                return Err(PrimitivesError::Stopped);
            }
            tracing::debug!(
                "round {round} of operation set {set_number} towards peer {}",
                self.other_peer_id
            );
            watch = Instant::now();
            self.send_receive_operation_data(&mut deferred)?;
            if timing {
                self.record_communication(watch.elapsed());
            }

            watch = Instant::now();
            self.primitives.process_received_data()?;
            if timing {
                self.record_computation(watch.elapsed());
            }
            round += 1;
        }

        // wait until all local threads completed the set
        self.shared.checkpoint();
        if timing {
            self.shared.stats.lock().rounds += 1;
        }
        tracing::debug!("completed operation set {set_number} after {round} rounds");

        // the down set is settled now, every thread reaches the same verdict
        let live = self.primitives.num_privacy_peers() - self.shared.down_peers.lock().len();
        let minimum = self.primitives.sharing().degree_t() + 1;
        if live < minimum {
            return Err(PrimitivesError::PrivacyViolation(format!(
                "only {live} privacy peers left, need at least {minimum}"
            )));
        }
        if let Some(fault) = deferred {
            return Err(fault);
        }
        Ok(())
    }

    /// The results of the completed set, in operation-id order.
    pub fn round_result(&self) -> RoundResult {
        let (ok, per_operation) = self.primitives.collect_results();
        RoundResult { ok, per_operation }
    }

    /// Checks whether the scheduled operations need bitwise-shared random
    /// numbers and generates them all in one nested batch if so.
    fn generate_random_numbers_if_needed(
        &self,
        deferred: &mut Option<PrimitivesError>,
    ) -> Result<()> {
        let needed = self.primitives.pending_random_numbers();
        if needed == 0 {
            return Ok(());
        }

        if self.shared.checkpoint() == 0 {
            tracing::debug!("batch-generating {needed} bitwise-shared random numbers");
            // back up the scheduled operations and nest a generation set
            let mut fault = self.shared.fault.lock();
            *fault = None;
            self.primitives.push_operations();
            self.primitives.initialize(1, 1);
            if let Err(e) = self
                .primitives
                .batch_generate_bitwise_random_numbers(0, needed as u64)
            {
                // put the outer set back and fail on every thread alike
                self.primitives.pop_operations();
                *fault = Some(e.to_string());
            }
        }
        self.shared.checkpoint();
        if let Some(message) = self.shared.fault.lock().clone() {
            return Err(PrimitivesError::primitives(message));
        }

        let outcome = self.do_operations();

        if self.shared.checkpoint() == 0 {
            let bits = self.primitives.result(0);
            // restore the outer set and hand out the random numbers
            self.primitives.pop_operations();
            if let Some(bits) = bits {
                self.primitives.distribute_random_bits(&bits);
            }
        }
        self.shared.checkpoint();
        if let Err(e) = outcome {
            // the nested set has run its course on every thread; carry the
            // fault into the outer set instead of skipping its barriers
            deferred.get_or_insert(e);
        }
        Ok(())
    }

    /// Sends the pooled shares of the running operations to the partner and
    /// feeds the partner's message (or a dummy) into the scheduler.
    fn send_receive_operation_data(
        &self,
        deferred: &mut Option<PrimitivesError>,
    ) -> Result<()> {
        let data = self.primitives.get_data_to_send(self.other_peer_index);
        if data.is_empty() {
            // identical on every driver thread of this peer, so all of them
            // abort the set together
            return Err(PrimitivesError::primitives(format!(
                "no operations data to send for privacy peer {}",
                self.other_peer_index
            )));
        }
        let message = PrimitivesMessage::new(&self.my_peer_id, self.primitives.my_index(), data);
        let frame = match message.encode() {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("failed to encode the message for {}: {e}", self.other_peer_id);
                deferred.get_or_insert(e);
                None
            }
        };

        if sending_first(&self.my_peer_id, &self.other_peer_id) {
            if let Some(frame) = &frame {
                self.send_operation_data(frame);
            }
            self.receive_operation_data(deferred);
        } else {
            self.receive_operation_data(deferred);
            if let Some(frame) = &frame {
                self.send_operation_data(frame);
            }
        }
        Ok(())
    }

    fn send_operation_data(&self, frame: &[u8]) {
        if let Err(e) = self.net.send(self.other_peer_index, frame) {
            // an unreachable peer surfaces as a dummy on the receive side
            tracing::warn!(
                "failed to send to privacy peer {}: {e}",
                self.other_peer_id
            );
        }
    }

    fn receive_operation_data(&self, deferred: &mut Option<PrimitivesError>) {
        let frame = match self.net.recv(self.other_peer_index) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                // the peer is down; a dummy keeps the protocol stepping with
                // missing shares
                tracing::warn!(
                    "received nothing from {}, using a DUMMY message instead",
                    self.other_peer_id
                );
                self.degrade_to_dummy();
                return;
            }
            Err(e) => {
                tracing::warn!("receiving from {} failed: {e}", self.other_peer_id);
                self.degrade_to_dummy();
                deferred.get_or_insert(PrimitivesError::Network(e));
                return;
            }
        };
        match PrimitivesMessage::decode(&frame) {
            Ok(message) => {
                if message.sender_index != self.other_peer_index {
                    tracing::warn!(
                        "message from peer {} claims sender index {}",
                        self.other_peer_index,
                        message.sender_index
                    );
                }
                self.primitives
                    .set_received_data(self.other_peer_index, Some(&message.operations_data));
            }
            Err(e) => {
                tracing::warn!("discarding a malformed message from {}: {e}", self.other_peer_id);
                self.degrade_to_dummy();
                deferred.get_or_insert(e);
            }
        }
    }

    /// Records the partner peer as down and feeds a dummy message into the
    /// scheduler, so that this round's barrier cycle still completes on
    /// every thread of the peer.
    fn degrade_to_dummy(&self) {
        self.shared.down_peers.lock().insert(self.other_peer_index);
        self.primitives
            .set_received_data(self.other_peer_index, None);
    }

    fn record_computation(&self, elapsed: Duration) {
        self.shared.stats.lock().computation += elapsed;
    }

    fn record_communication(&self, elapsed: Duration) {
        self.shared.stats.lock().communication += elapsed;
    }
}
