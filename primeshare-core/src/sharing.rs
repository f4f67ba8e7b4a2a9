//! Shamir secret sharing over GF(p).
//!
//! All computations are done within the finite field, i.e. in `[0, p)`.
//! Shares are produced by evaluating a random degree-t polynomial (with the
//! secret as constant term) at each privacy peer's fixed alpha; secrets are
//! recovered by Lagrange interpolation over whichever shares actually
//! arrived.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::Rng;

use crate::error::{PrimitivesError, Result};
use crate::field::Gf;

/// Marks a share that was not delivered, e.g. because the privacy peer that
/// should have sent it crashed. Never a valid field element since p <= 2^63.
pub const MISSING_SHARE: u64 = u64::MAX;

/// Shamir sharing and reconstruction for one mesh of privacy peers.
pub struct ShamirSharing {
    field: Gf,
    num_privacy_peers: usize,
    degree_t: usize,
    alphas: Vec<u64>,
    /// Vandermonde matrix `matrix[i][j] = alpha_i^j` over all m peers, so
    /// that degree-2t products can be shared with the same precomputation.
    sharing_matrix: Vec<Vec<u64>>,
    /// For a given set of available privacy peers, the precomputed Lagrange
    /// weights. If the set of peers changes, the weights are recomputed.
    lagrange_cache: Mutex<HashMap<Vec<bool>, Vec<u64>>>,
}

impl ShamirSharing {
    /// Creates a sharing instance for `num_privacy_peers` peers.
    ///
    /// `degree_t = None` selects the default t = (m-1)/2. For
    /// multiplications to work m >= 2t+1 must hold; a larger t is reported
    /// as a warning.
    pub fn new(field: Gf, num_privacy_peers: usize, degree_t: Option<usize>) -> Result<Self> {
        if num_privacy_peers < 2 {
            return Err(PrimitivesError::protocol(
                "Shamir sharing needs at least 2 privacy peers",
            ));
        }
        let default_t = (num_privacy_peers - 1) / 2;
        let degree_t = degree_t.unwrap_or(default_t);
        if degree_t < 1 && num_privacy_peers > 2 {
            tracing::warn!("degree t={degree_t} tolerates no colluding peers");
        }
        if degree_t > default_t {
            tracing::warn!(
                "degree of polynomials is too big for multiplications, m>=2t+1 must hold \
                 (m={num_privacy_peers}, t={degree_t})"
            );
        }
        tracing::info!(
            "{} out of {} privacy peers must be available to reconstruct secrets (m={}, t={})",
            degree_t + 1,
            num_privacy_peers,
            num_privacy_peers,
            degree_t
        );

        // alpha = 1 is excluded since 1^q = 1; all peers must use the same
        // assignment
        let alphas: Vec<u64> = (0..num_privacy_peers).map(|i| i as u64 + 2).collect();
        let sharing_matrix = alphas
            .iter()
            .map(|&alpha| {
                (0..num_privacy_peers)
                    .map(|j| field.pow(alpha, j as u64))
                    .collect()
            })
            .collect();

        Ok(Self {
            field,
            num_privacy_peers,
            degree_t,
            alphas,
            sharing_matrix,
            lagrange_cache: Mutex::new(HashMap::new()),
        })
    }

    /// The field this instance shares over.
    pub fn field(&self) -> &Gf {
        &self.field
    }

    /// The number of peers among which secrets are shared.
    pub fn num_privacy_peers(&self) -> usize {
        self.num_privacy_peers
    }

    /// The degree t of the sharing polynomials.
    pub fn degree_t(&self) -> usize {
        self.degree_t
    }

    /// Generates one share per privacy peer for the given secret.
    ///
    /// Coefficients a_1..a_t are picked uniformly from `[0, p)`; a_0 is the
    /// secret.
    pub fn generate_share<R: Rng>(&self, rng: &mut R, secret: u64) -> Vec<u64> {
        let mut shares = vec![0u64; self.num_privacy_peers];
        for degree in 0..=self.degree_t {
            let coefficient = if degree == 0 {
                self.field.reduce(secret)
            } else {
                rng.gen_range(0..self.field.modulus())
            };
            for (share, row) in shares.iter_mut().zip(&self.sharing_matrix) {
                *share = self.field.add(*share, self.field.mul(row[degree], coefficient));
            }
        }
        shares
    }

    /// Generates shares for a vector of secrets; result layout is
    /// `[privacy_peer][secret]`. This is the input-peer entry point.
    pub fn generate_shares<R: Rng>(&self, rng: &mut R, secrets: &[u64]) -> Vec<Vec<u64>> {
        let mut shares = vec![vec![0u64; secrets.len()]; self.num_privacy_peers];
        for (secret_index, &secret) in secrets.iter().enumerate() {
            let one = self.generate_share(rng, secret);
            for (peer, share) in one.into_iter().enumerate() {
                shares[peer][secret_index] = share;
            }
        }
        shares
    }

    /// Interpolates the secret from the given shares.
    ///
    /// Entries equal to [MISSING_SHARE] are ignored. At least t+1 shares must
    /// be present, and 2t+1 when `is_multiplication` is set (the intermediate
    /// polynomial of a multiplication has degree 2t).
    pub fn interpolate(&self, shares: &[u64], is_multiplication: bool) -> Result<u64> {
        let available: Vec<bool> = shares.iter().map(|&s| s != MISSING_SHARE).collect();
        let available_count = available.iter().filter(|&&a| a).count();

        if available_count <= self.degree_t {
            return Err(PrimitivesError::primitives(format!(
                "not enough shares for interpolation, need at least t+1 \
                 (m={}, t={}, shares={available_count})",
                self.num_privacy_peers, self.degree_t
            )));
        }
        if is_multiplication && available_count < 2 * self.degree_t + 1 {
            return Err(PrimitivesError::primitives(format!(
                "not enough shares to interpolate a multiplication, need 2t+1 \
                 (m={available_count}, t={})",
                self.degree_t
            )));
        }

        let weights = self.lagrange_weights(&available);
        let mut result = 0;
        for (peer, &share) in shares.iter().enumerate() {
            if available[peer] {
                result = self.field.add(result, self.field.mul(weights[peer], share));
            }
        }
        Ok(result)
    }

    /// Returns the Lagrange weights for the set of available privacy peers,
    /// computing and caching them on first use.
    fn lagrange_weights(&self, available: &[bool]) -> Vec<u64> {
        let mut cache = self.lagrange_cache.lock();
        if let Some(weights) = cache.get(available) {
            return weights.clone();
        }
        let weights = self.compute_lagrange_weights(available);
        cache.insert(available.to_vec(), weights.clone());
        weights
    }

    fn compute_lagrange_weights(&self, available: &[bool]) -> Vec<u64> {
        let mut weights = vec![0u64; self.num_privacy_peers];
        for peer in 0..self.num_privacy_peers {
            if !available[peer] {
                continue;
            }
            let mut numerator = 1;
            let mut denominator = 1;
            let alpha_p = self.alphas[peer];
            for (other, &alpha) in self.alphas.iter().enumerate() {
                if other != peer && available[other] {
                    numerator = self.field.mul(numerator, alpha);
                    denominator = self.field.mul(denominator, self.field.sub(alpha, alpha_p));
                }
            }
            weights[peer] = self.field.mul(numerator, self.field.inverse(denominator));
        }
        weights
    }

    /// Adds two share vectors elementwise.
    pub fn vector_add(&self, v1: &[u64], v2: &[u64]) -> Vec<u64> {
        assert_eq!(v1.len(), v2.len(), "vector lengths do not match");
        v1.iter()
            .zip(v2)
            .map(|(&a, &b)| self.field.add(a, b))
            .collect()
    }
}
