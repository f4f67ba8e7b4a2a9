//! # primeshare-core
//!
//! A cryptographic runtime for secure multi-party computation over Shamir
//! secret shares in a prime field. Input peers contribute secret vectors as
//! shares; a quorum of privacy peers jointly evaluates arithmetic circuits
//! over those secrets, round by round, and reveals only the final result.
//! No privacy peer learns individual inputs as long as fewer than t+1 of
//! them collude; crashed peers degrade into missing shares instead of
//! aborting the computation.
//!
//! The crate provides the primitives engine only: field and sharing
//! arithmetic, the operation state machines, the round-synchronous
//! scheduler and the protocol driver. Transport is abstracted behind
//! [`primeshare_net::Network`]; launchers, key material and application
//! protocols live outside.
#![warn(missing_docs)]

pub mod barrier;
pub mod config;
pub mod driver;
pub mod error;
pub mod field;
pub mod message;
pub mod operations;
pub mod scheduler;
pub mod sharing;
pub mod stopper;

pub use config::EngineConfig;
pub use driver::{DriverShared, ProtocolDriver, RoundResult};
pub use error::{PrimitivesError, Result};
pub use field::Gf;
pub use operations::{BitwiseOperands, Knowledge, FAILURE_SENTINEL};
pub use scheduler::Primitives;
pub use sharing::{ShamirSharing, MISSING_SHARE};
pub use stopper::Stopper;

pub(crate) type RngType = rand_chacha::ChaCha12Rng;
