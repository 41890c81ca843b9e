//! secp256k1 field and group arithmetic for the wallet boundaries
//!
//! The keygen and signing engines do their secret-dependent group math on
//! `k256`; this module owns the encodings exchanged with the outside world
//! and the public-input arithmetic behind recovery-id resolution.

mod field;
mod point;

pub use field::FieldElement;
pub use point::CurvePoint;

pub(crate) use field::MODULUS;
