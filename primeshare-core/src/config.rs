//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PrimitivesError, Result};

fn default_degree() -> i64 {
    -1
}

fn default_random_algorithm() -> String {
    "chacha".to_owned()
}

/// The configuration options consumed by the primitives engine.
///
/// How the values get here (file, flags, environment) is up to the
/// surrounding application; the engine only validates and consumes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// The prime p used for the Shamir sharing. Must be <= 2^63.
    pub prime_field_size: u64,
    /// The degree of the sharing polynomials; -1 selects the default
    /// t = (m-1)/2.
    #[serde(default = "default_degree")]
    pub polynomial_degree_t: i64,
    /// The number of privacy peers m.
    pub num_privacy_peers: usize,
    /// Our 1-based index into the ordered privacy-peer list.
    pub my_privacy_peer_index: usize,
    /// How many operations of a set run concurrently; 0 selects "all in
    /// parallel".
    #[serde(default)]
    pub parallel_operations_count: usize,
    /// Enables the mask-intersection safeguard in multiplications, so that
    /// all peers interpolate the same support set after a crash.
    #[serde(default)]
    pub synchronize_shares: bool,
    /// Selects the random source: "chacha" (seeded ChaCha12) or "os".
    #[serde(default = "default_random_algorithm")]
    pub random_algorithm: String,
}

impl EngineConfig {
    /// Checks the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.prime_field_size < 2 || self.prime_field_size > 1u64 << 63 {
            return Err(PrimitivesError::protocol(format!(
                "prime_field_size {} out of range",
                self.prime_field_size
            )));
        }
        if self.num_privacy_peers < 2 {
            return Err(PrimitivesError::protocol(
                "num_privacy_peers must be at least 2",
            ));
        }
        if self.my_privacy_peer_index < 1 || self.my_privacy_peer_index > self.num_privacy_peers {
            return Err(PrimitivesError::protocol(format!(
                "my_privacy_peer_index {} not in [1, {}]",
                self.my_privacy_peer_index, self.num_privacy_peers
            )));
        }
        let max_t = (self.num_privacy_peers as i64 - 1) / 2;
        if self.polynomial_degree_t < -1 || self.polynomial_degree_t > max_t {
            return Err(PrimitivesError::protocol(format!(
                "polynomial_degree_t {} not in [-1, {max_t}]",
                self.polynomial_degree_t
            )));
        }
        match self.random_algorithm.as_str() {
            "chacha" | "os" => {}
            other => {
                return Err(PrimitivesError::protocol(format!(
                    "unknown random_algorithm {other:?}"
                )))
            }
        }
        Ok(())
    }

    /// The polynomial degree, with -1 resolved to `None` (use the default).
    pub fn degree_t(&self) -> Option<usize> {
        if self.polynomial_degree_t < 0 {
            None
        } else {
            Some(self.polynomial_degree_t as usize)
        }
    }

    /// Our 0-based peer index.
    pub fn my_index(&self) -> usize {
        self.my_privacy_peer_index - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EngineConfig {
        EngineConfig {
            prime_field_size: 1401085391,
            polynomial_degree_t: -1,
            num_privacy_peers: 3,
            my_privacy_peer_index: 1,
            parallel_operations_count: 0,
            synchronize_shares: false,
            random_algorithm: "chacha".to_owned(),
        }
    }

    #[test]
    fn valid_config_passes() {
        base().validate().unwrap();
    }

    #[test]
    fn rejects_bad_index() {
        let mut c = base();
        c.my_privacy_peer_index = 0;
        assert!(c.validate().is_err());
        c.my_privacy_peer_index = 4;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_oversized_degree() {
        let mut c = base();
        c.polynomial_degree_t = 2; // (3-1)/2 = 1 is the max
        assert!(c.validate().is_err());
    }

    #[test]
    fn degree_default_resolves_to_none() {
        assert_eq!(base().degree_t(), None);
        let mut c = base();
        c.polynomial_degree_t = 1;
        assert_eq!(c.degree_t(), Some(1));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "prime_field_size": 41,
            "num_privacy_peers": 3,
            "my_privacy_peer_index": 2
        }"#;
        let c: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.polynomial_degree_t, -1);
        assert_eq!(c.random_algorithm, "chacha");
        assert!(!c.synchronize_shares);
    }
}
