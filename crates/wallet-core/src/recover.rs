//! Public-key recovery id resolution
//!
//! Given a signature `(r, s)`, the signed digest and the expected public
//! key, determine the recovery id `v` such that standard ECDSA public-key
//! recovery yields that key. The candidate instance point has x-coordinate
//! `r` with y-parity equal to `v`; the `r + n` lift is also tried for the
//! wraparound case where the instance x-coordinate exceeded the group
//! order. Consumers needing Ethereum's legacy form add 27 themselves.

use k256::{
    elliptic_curve::{
        bigint::{Encoding, Limb, U256},
        ops::Reduce,
        PrimeField,
    },
    Scalar,
};

use crate::curve::{CurvePoint, MODULUS};
use crate::{Error, Result};

/// The secp256k1 group order n
const ORDER: U256 =
    U256::from_be_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141");

/// Resolve the recovery id for a signature produced under `public_key`
///
/// Returns `v` in {0, 1}. Fails with [`Error::RecoveryFailed`] when neither
/// candidate point recovers the expected key.
pub fn resolve_recovery_id(
    r: &[u8; 32],
    s: &[u8; 32],
    digest: &[u8; 32],
    public_key: &[u8],
) -> Result<u8> {
    let expected = CurvePoint::decode(public_key)?.compress()?;
    let r_scalar = strict_scalar(r)?;
    let s_scalar = strict_scalar(s)?;
    let r_inv = Option::<Scalar>::from(r_scalar.invert()).ok_or(Error::ScalarOutOfRange)?;

    let m = <Scalar as Reduce<U256>>::reduce_bytes(&(*digest).into());
    // Q = r^-1 * (s*R - m*G)
    let u_point: [u8; 32] = (s_scalar * r_inv).to_bytes().into();
    let u_gen: [u8; 32] = (-(m * r_inv)).to_bytes().into();

    let mut candidates: Vec<[u8; 32]> = vec![*r];
    let r_uint = U256::from_be_slice(r);
    let (lifted, carry) = r_uint.adc(&ORDER, Limb::ZERO);
    if carry.0 == 0 && lifted < MODULUS {
        candidates.push(lifted.to_be_bytes());
    }

    for v in 0u8..=1 {
        for x_bytes in &candidates {
            let instance = match CurvePoint::decompress_with_parity(x_bytes, v == 1) {
                Ok(point) => point,
                Err(Error::PointInvalid) => continue,
                Err(other) => return Err(other),
            };
            let recovered = instance
                .mul(&u_point)
                .add(&CurvePoint::GENERATOR.mul(&u_gen));
            if recovered.is_identity() {
                continue;
            }
            if recovered.compress()? == expected {
                return Ok(v);
            }
        }
    }
    Err(Error::RecoveryFailed)
}

/// Verify an ECDSA signature over a 32-byte digest
///
/// Convenience check used by the signing engine before it releases a
/// combined signature; embedders may use it the same way.
pub fn verify_signature(
    r: &[u8; 32],
    s: &[u8; 32],
    digest: &[u8; 32],
    public_key: &[u8],
) -> Result<bool> {
    let q = CurvePoint::decode(public_key)?;
    let r_scalar = strict_scalar(r)?;
    let s_scalar = strict_scalar(s)?;
    let s_inv = Option::<Scalar>::from(s_scalar.invert()).ok_or(Error::ScalarOutOfRange)?;

    let m = <Scalar as Reduce<U256>>::reduce_bytes(&(*digest).into());
    let u1: [u8; 32] = (m * s_inv).to_bytes().into();
    let u2: [u8; 32] = (r_scalar * s_inv).to_bytes().into();

    let instance = CurvePoint::GENERATOR.mul(&u1).add(&q.mul(&u2));
    let Some((x, _)) = instance.coordinates() else {
        return Ok(false);
    };
    let x_mod_n = <Scalar as Reduce<U256>>::reduce_bytes(&x.to_bytes().into());
    Ok(x_mod_n == r_scalar)
}

/// Parse a canonical nonzero scalar
fn strict_scalar(bytes: &[u8; 32]) -> Result<Scalar> {
    let scalar =
        Option::<Scalar>::from(Scalar::from_repr((*bytes).into())).ok_or(Error::ScalarOutOfRange)?;
    if scalar == Scalar::ZERO {
        return Err(Error::ScalarOutOfRange);
    }
    Ok(scalar)
}
