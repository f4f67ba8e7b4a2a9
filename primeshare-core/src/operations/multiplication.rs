//! Multiplication of two Shamir shares, after Gennaro, Rabin and Rabin
//! (Simplified VSS and fast-track multiparty computations, PODC 1998).

use crate::error::Result;
use crate::operations::{OpState, Operation};
use crate::scheduler::Primitives;
use crate::sharing::MISSING_SHARE;

/// Multiplies two shared secrets.
///
/// Each peer multiplies its two input shares locally, freshly shares the
/// product at degree t, and interpolates the received sub-shares as a
/// degree-2t polynomial.
///
/// When the evaluation points are interpolated in step 2, it is important
/// that all privacy peers use the same set of shares, otherwise they don't
/// arrive at the same polynomial representing the secret product: after a
/// crash during the exchange, one peer may hold a share another one is
/// missing. With share synchronisation enabled the peers agree on the
/// intersection of delivered shares before interpolating. A further failure
/// during the synchronisation itself can still leave the peers inconsistent;
/// that residual risk is accepted, solving it would need asynchronous MPC.
pub struct Multiplication {
    state: OpState,
    synchronization_done: bool,
    backup_shares: Vec<u64>,
}

impl Multiplication {
    /// Creates a multiplication of the two shares in `data`.
    pub fn new(data: Vec<u64>) -> Self {
        Self {
            state: OpState::new(data),
            synchronization_done: false,
            backup_shares: Vec::new(),
        }
    }
}

impl Operation for Multiplication {
    fn state(&self) -> &OpState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OpState {
        &mut self.state
    }

    fn do_step(&mut self, primitives: &Primitives) -> Result<()> {
        match self.state.step() {
            // multiply the local shares and share the product at degree t
            1 => {
                let data = self.state.initial();
                let product = primitives.field().mul(data[0], data[1]);
                let shares = primitives.generate_share(product);
                self.state.set_outbound(shares, 1);
                self.state.copy_own_shares(primitives.my_index());
                self.state.advance();
            }
            // synchronize missing shares if required, then interpolate
            2 => {
                if primitives.synchronize_shares() && !self.synchronization_done {
                    self.backup_shares = self.state.inbound().to_vec();

                    // The information about missing shares is encoded in an
                    // integer: bit i set means the share of peer i arrived.
                    // For this to work, log2(p) > m must hold.
                    let mut inventory = 0u64;
                    for (peer, &share) in self.backup_shares.iter().enumerate() {
                        if share != MISSING_SHARE {
                            inventory |= 1 << peer;
                        }
                    }

                    // the same inventory goes to every privacy peer
                    let peers = primitives.num_privacy_peers();
                    self.state.set_outbound(vec![inventory; peers], 1);
                    self.state.copy_own_shares(primitives.my_index());
                    self.synchronization_done = true;
                } else {
                    let shares = if primitives.synchronize_shares() {
                        // From a disconnected privacy peer the inventory
                        // itself is a missing share; it does not restrict the
                        // intersection.
                        let mut aggregate = None;
                        for &inventory in self.state.inbound() {
                            if inventory != MISSING_SHARE {
                                aggregate =
                                    Some(aggregate.map_or(inventory, |a: u64| a & inventory));
                            }
                        }
                        let aggregate = aggregate.unwrap_or(0);

                        let mut shares = std::mem::take(&mut self.backup_shares);
                        for (peer, share) in shares.iter_mut().enumerate() {
                            if aggregate & (1 << peer) == 0 {
                                *share = MISSING_SHARE;
                            }
                        }
                        shares
                    } else {
                        self.state.inbound().to_vec()
                    };

                    let result = primitives.sharing().interpolate(&shares, true)?;
                    self.state.set_result(vec![result]);
                    self.state.advance();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
