//! A minimal networking seam for MPC privacy peers.
//!
//! The engine talks to its peers exclusively through the [`Network`] trait.
//! Deployments wire it to their own transport (sockets, TLS, ...); tests and
//! examples use the in-process [`LocalNetwork`].
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use eyre::ContextCompat;

/// Default timeout when waiting for a message from a peer.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// A connection to all other privacy peers in the mesh.
///
/// Parties are addressed by their 0-based index in the ordered peer list.
/// Implementations must be usable from multiple worker threads at once, with
/// at most one thread sending to / receiving from a given peer at a time.
pub trait Network: Send + Sync {
    /// The id of our party.
    fn id(&self) -> usize;

    /// Sends a frame to the given party.
    ///
    /// A send to a peer that is no longer reachable is an error; callers that
    /// tolerate crashed peers should treat it as such rather than abort.
    fn send(&self, to: usize, data: &[u8]) -> eyre::Result<()>;

    /// Receives the next frame from the given party.
    ///
    /// Returns `Ok(None)` when the peer has gone away (crashed or shut down).
    /// This is not an error: the caller decides how to degrade.
    fn recv(&self, from: usize) -> eyre::Result<Option<Vec<u8>>>;

    /// Returns the number of bytes sent to and received from each peer.
    fn connection_stats(&self) -> ConnectionStats;
}

/// Bytes sent/received per peer, for logging and tests.
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// Our party id.
    pub my_id: usize,
    /// Maps peer id to (sent, received) byte counts.
    pub stats: BTreeMap<usize, (usize, usize)>,
}

/// An in-process MPC network using channels. Used for testing.
#[derive(Debug)]
pub struct LocalNetwork {
    id: usize,
    timeout: Duration,
    send: BTreeMap<usize, (Sender<Vec<u8>>, AtomicUsize)>,
    recv: BTreeMap<usize, (Receiver<Vec<u8>>, AtomicUsize)>,
}

impl LocalNetwork {
    /// Create new [LocalNetwork]s for `num_parties`.
    pub fn new(num_parties: usize) -> Vec<Self> {
        Self::new_with_timeout(num_parties, DEFAULT_CONNECTION_TIMEOUT)
    }

    /// Create new [LocalNetwork]s for `num_parties`, setting a timeout.
    pub fn new_with_timeout(num_parties: usize, timeout: Duration) -> Vec<Self> {
        let mut senders = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..num_parties {
            senders.push(BTreeMap::new());
            receivers.push(BTreeMap::new());
        }

        #[allow(clippy::needless_range_loop)]
        for i in 0..num_parties {
            for j in 0..num_parties {
                if i != j {
                    let (tx, rx) = crossbeam_channel::unbounded();
                    senders[i].insert(j, (tx, AtomicUsize::default()));
                    receivers[j].insert(i, (rx, AtomicUsize::default()));
                }
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(id, (send, recv))| LocalNetwork {
                id,
                timeout,
                send,
                recv,
            })
            .collect()
    }
}

impl Network for LocalNetwork {
    fn id(&self) -> usize {
        self.id
    }

    fn send(&self, to: usize, data: &[u8]) -> eyre::Result<()> {
        let (sender, sent_bytes) = self.send.get(&to).context("party id out-of-bounds")?;
        sent_bytes.fetch_add(data.len(), Ordering::Relaxed);
        sender.send(data.to_owned())?;
        Ok(())
    }

    fn recv(&self, from: usize) -> eyre::Result<Option<Vec<u8>>> {
        let (receiver, recv_bytes) = self.recv.get(&from).context("party id out-of-bounds")?;
        match receiver.recv_timeout(self.timeout) {
            Ok(data) => {
                recv_bytes.fetch_add(data.len(), Ordering::Relaxed);
                Ok(Some(data))
            }
            // Sender dropped: the peer is gone. Buffered frames were drained
            // above, so this only fires once the backlog is empty.
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => {
                eyre::bail!("timed out waiting for a message from party {from}")
            }
        }
    }

    fn connection_stats(&self) -> ConnectionStats {
        let mut stats = BTreeMap::new();
        for (id, (_, sent_bytes)) in self.send.iter() {
            let recv_bytes = &self.recv.get(id).expect("was in send so must be in recv").1;
            stats.insert(
                *id,
                (
                    sent_bytes.load(Ordering::Relaxed),
                    recv_bytes.load(Ordering::Relaxed),
                ),
            );
        }
        ConnectionStats {
            my_id: self.id,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_recv_roundtrip() {
        let nets = LocalNetwork::new(3);
        nets[0].send(1, b"hello").unwrap();
        nets[2].send(1, b"world").unwrap();
        assert_eq!(nets[1].recv(0).unwrap().unwrap(), b"hello");
        assert_eq!(nets[1].recv(2).unwrap().unwrap(), b"world");
    }

    #[test]
    fn dropped_peer_reads_as_none() {
        let mut nets = LocalNetwork::new(2);
        let n1 = nets.pop().unwrap();
        let n0 = nets.pop().unwrap();
        n1.send(0, b"last words").unwrap();
        drop(n1);
        // the backlog is still delivered, then the peer reads as gone
        assert_eq!(n0.recv(1).unwrap().unwrap(), b"last words");
        assert_eq!(n0.recv(1).unwrap(), None);
    }

    #[test]
    fn stats_count_bytes() {
        let nets = LocalNetwork::new(2);
        nets[0].send(1, b"12345").unwrap();
        nets[1].recv(0).unwrap();
        assert_eq!(nets[0].connection_stats().stats[&1], (5, 0));
        assert_eq!(nets[1].connection_stats().stats[&0], (0, 5));
    }
}
