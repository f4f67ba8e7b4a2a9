//! Shared harness for the multi-peer integration tests: a deterministic
//! in-process mesh of privacy peers, driven round by round the same way the
//! protocol driver does it.
#![allow(dead_code)]

use primeshare_core::{EngineConfig, Gf, Primitives, ShamirSharing};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// The peer id scheme used throughout the tests.
pub fn peer_id(index: usize) -> String {
    format!("pp{index:02}")
}

/// Installs a fmt subscriber so `RUST_LOG=debug` shows the engine's shape
/// and round logs during a test run.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn config(p: u64, m: usize, t: i64, index: usize, synchronize_shares: bool) -> EngineConfig {
    EngineConfig {
        prime_field_size: p,
        polynomial_degree_t: t,
        num_privacy_peers: m,
        my_privacy_peer_index: index + 1,
        parallel_operations_count: 0,
        synchronize_shares,
        random_algorithm: "chacha".to_owned(),
    }
}

/// Creates the engines of an m-peer mesh, each stepped by a single worker.
pub fn make_peers(p: u64, m: usize, t: i64) -> Vec<Primitives> {
    (0..m)
        .map(|i| Primitives::new(&config(p, m, t, i, false), 1).unwrap())
        .collect()
}

/// An input peer: deals shares of its secrets to the privacy peers.
pub struct Dealer {
    pub sharing: ShamirSharing,
    rng: ChaCha12Rng,
}

impl Dealer {
    pub fn new(p: u64, m: usize, t: usize, seed: u64) -> Self {
        Self {
            sharing: ShamirSharing::new(Gf::new(p), m, Some(t)).unwrap(),
            rng: ChaCha12Rng::seed_from_u64(seed),
        }
    }

    /// Shares a secret; `result[peer]` is that privacy peer's share.
    pub fn share(&mut self, secret: u64) -> Vec<u64> {
        self.sharing.generate_share(&mut self.rng, secret)
    }

    /// Recovers a secret from the privacy peers' result shares.
    pub fn reconstruct(&self, shares: &[u64]) -> u64 {
        self.sharing.interpolate(shares, false).unwrap()
    }
}

/// One full message round: every ordered peer pair exchanges its pooled
/// share vector.
pub fn exchange(peers: &[Primitives]) {
    for i in 0..peers.len() {
        for j in 0..peers.len() {
            if i != j {
                let data = peers[i].get_data_to_send(j);
                peers[j].set_received_data(i, Some(&data));
            }
        }
    }
}

fn run_rounds(peers: &[Primitives]) {
    for peer in peers {
        peer.process_received_data().unwrap();
    }
    while peers.iter().any(|p| !p.are_operations_completed()) {
        exchange(peers);
        for peer in peers {
            peer.process_received_data().unwrap();
        }
    }
}

/// Runs the scheduled operation set to completion on all peers, including
/// the nested batch pre-generation of bitwise-shared random numbers that
/// the protocol driver would perform for scheduled comparisons.
pub fn run_until_complete(peers: &[Primitives]) {
    let needed = peers[0].pending_random_numbers();
    assert!(
        peers.iter().all(|p| p.pending_random_numbers() == needed),
        "peers disagree on the random number demand"
    );
    if needed > 0 {
        for peer in peers {
            peer.push_operations();
            peer.initialize(1, 1);
            peer.batch_generate_bitwise_random_numbers(0, needed as u64)
                .unwrap();
        }
        run_rounds(peers);
        for peer in peers {
            let bits = peer.result(0).unwrap();
            peer.pop_operations();
            peer.distribute_random_bits(&bits);
        }
    }
    run_rounds(peers);
}

/// The result shares of one operation across all peers.
pub fn result_shares(peers: &[Primitives], id: usize) -> Vec<u64> {
    peers
        .iter()
        .map(|p| {
            let result = p.result(id).expect("operation not completed");
            assert_eq!(result.len(), 1, "expected a scalar result");
            result[0]
        })
        .collect()
}

/// The element `index` of one operation's result vector, across all peers.
pub fn result_shares_at(peers: &[Primitives], id: usize, index: usize) -> Vec<u64> {
    peers
        .iter()
        .map(|p| p.result(id).expect("operation not completed")[index])
        .collect()
}
