//! # MPC Wallet Core
//!
//! Threshold ECDSA wallet core over secp256k1, in the DKLs23 protocol
//! family. A group of n mutually suspicious parties generates a single
//! public key whose private counterpart never exists anywhere, and any t of
//! them can produce ordinary ECDSA signatures that external verifiers accept
//! unchanged.
//!
//! The crate provides:
//! - Distributed key generation, four rounds, one [`Keyshare`] per party
//! - Share rotation that refreshes every share under an unchanged key
//! - Distributed signing: a three-round pre-signature plus a strictly
//!   one-shot online round
//! - Recovery id resolution for the `v` byte
//! - Field and point arithmetic for the secp256k1 boundary encodings
//! - An opaque frame codec and router for transport integration
//!
//! The core is transport-agnostic and synchronous: the embedder moves
//! [`Frame`] batches between parties however it likes, and each call either
//! advances a round or fails. Nothing here waits on I/O.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mpc_wallet_core::{Party, Router};
//!
//! // One party per participant; frames move through the embedder.
//! let mut party = Party::new_keygen(3, 2, 0)?;
//! let round1 = party.first_message()?;
//! // ... route frames, run rounds 2..4 ...
//! let keyshare = party.take_keyshare()?;
//! ```
//!
//! Sessions are single-use resources. A signing session refuses to emit a
//! second online message for the lifetime of the process, which is what
//! stands between a stolen pre-signature and the private key.

pub mod curve;
pub mod error;
pub mod keygen;
mod ledger;
pub mod party;
pub mod recover;
pub mod sign;
pub mod types;
pub mod wire;

pub use error::{Error, Result};
pub use keygen::{ChainCodeCommitment, KeygenSession, RoundCommitments};
pub use party::Party;
pub use recover::{resolve_recovery_id, verify_signature};
pub use sign::SignSession;
pub use types::{Keyshare, PartyId, PublicKey, SessionId, Signature, ThresholdConfig};
pub use wire::{Frame, Router};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default threshold for a 3-party setup
pub const DEFAULT_THRESHOLD: usize = 2;

/// Default number of parties
pub const DEFAULT_PARTIES: usize = 3;
