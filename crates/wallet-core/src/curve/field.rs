//! Arithmetic in the secp256k1 base field
//!
//! Elements live in [0, p) with p = 2^256 - 2^32 - 977. Values are held as
//! `U256` and reduced eagerly, so every public operation takes and returns
//! canonical representatives. The wide-product reduction uses the identity
//! 2^256 = 2^32 + 977 (mod p).

use k256::elliptic_curve::{
    bigint::{Encoding, Limb, U256},
    subtle::{Choice, ConditionallySelectable, ConstantTimeEq},
};

use crate::{Error, Result};

/// The field modulus p
pub const MODULUS: U256 =
    U256::from_be_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F");

/// 2^256 mod p, the fold constant 2^32 + 977
const WRAP: U256 =
    U256::from_be_hex("00000000000000000000000000000000000000000000000000000001000003D1");

/// p - 2, the Fermat inversion exponent
const EXP_INVERT: U256 =
    U256::from_be_hex("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2D");

/// (p + 1) / 4, the square-root exponent (p = 3 mod 4)
const EXP_SQRT: U256 =
    U256::from_be_hex("3FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFBFFFFF0C");

/// An element of the secp256k1 base field
#[derive(Clone, Copy, Debug)]
pub struct FieldElement(U256);

impl FieldElement {
    /// The additive identity
    pub const ZERO: Self = Self(U256::ZERO);

    /// The multiplicative identity
    pub const ONE: Self = Self(U256::ONE);

    /// The curve equation constant b = 7
    pub const SEVEN: Self = Self(U256::from_u64(7));

    /// Parse 32 big-endian bytes; values >= p are rejected
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let value = U256::from_be_slice(bytes);
        if value >= MODULUS {
            return Err(Error::FieldInvalid);
        }
        Ok(Self(value))
    }

    /// Construct from a small integer
    pub fn from_u64(value: u64) -> Self {
        Self(U256::from_u64(value))
    }

    /// Serialise as 32 big-endian bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes()
    }

    /// Wrap a value known at compile time to be canonical
    pub(crate) const fn from_uint_unchecked(value: U256) -> Self {
        Self(value)
    }

    /// Whether the element is zero
    pub fn is_zero(&self) -> bool {
        self.0.ct_eq(&U256::ZERO).into()
    }

    /// Parity of the canonical representative
    pub fn is_odd(&self) -> bool {
        self.to_bytes()[31] & 1 == 1
    }

    /// Field addition
    pub fn add(&self, rhs: &Self) -> Self {
        Self(self.0.add_mod(&rhs.0, &MODULUS))
    }

    /// Field subtraction
    pub fn sub(&self, rhs: &Self) -> Self {
        Self(self.0.sub_mod(&rhs.0, &MODULUS))
    }

    /// Additive inverse
    pub fn negate(&self) -> Self {
        Self(self.0.neg_mod(&MODULUS))
    }

    /// Field multiplication
    pub fn mul(&self, rhs: &Self) -> Self {
        let (lo, hi) = self.0.mul_wide(&rhs.0);
        Self(reduce_wide(lo, hi))
    }

    /// Squaring
    pub fn square(&self) -> Self {
        self.mul(self)
    }

    /// Multiplicative inverse via Fermat's little theorem
    ///
    /// The exponent is public and fixed, so the square-and-multiply chain
    /// does not branch on the element itself.
    pub fn invert(&self) -> Result<Self> {
        if self.is_zero() {
            return Err(Error::FieldInvalid);
        }
        Ok(self.pow_vartime_exp(&EXP_INVERT))
    }

    /// Square root via the p = 3 (mod 4) shortcut
    ///
    /// Returns `None` when the element is a non-residue.
    pub fn sqrt(&self) -> Option<Self> {
        let root = self.pow_vartime_exp(&EXP_SQRT);
        if root.square() == *self {
            Some(root)
        } else {
            None
        }
    }

    /// Exponentiation with a public exponent
    fn pow_vartime_exp(&self, exp: &U256) -> Self {
        let mut acc = Self::ONE;
        for i in (0..256).rev() {
            acc = acc.square();
            if exp.bit_vartime(i) {
                acc = acc.mul(self);
            }
        }
        acc
    }
}

impl PartialEq for FieldElement {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for FieldElement {}

/// Reduce a 512-bit product (lo, hi) modulo p
fn reduce_wide(lo: U256, hi: U256) -> U256 {
    // Fold the high half: hi * 2^256 = hi * WRAP (mod p).
    let (c_lo, c_hi) = hi.mul_wide(&WRAP);
    let (acc, carry) = lo.adc(&c_lo, Limb::ZERO);

    // c_hi and the carry are below 2^34; a second fold flattens them.
    let spill = c_hi.wrapping_add(&U256::from_u64(carry.0 as u64));
    let (f_lo, _) = spill.mul_wide(&WRAP);
    let (acc, carry) = acc.adc(&f_lo, Limb::ZERO);

    // A final carry means the sum wrapped past 2^256 once more.
    let fold = U256::conditional_select(&U256::ZERO, &WRAP, Choice::from(carry.0 as u8));
    normalize(acc.wrapping_add(&fold))
}

/// Conditionally subtract p to bring a value below the modulus
fn normalize(value: U256) -> U256 {
    let (reduced, borrow) = value.sbb(&MODULUS, Limb::ZERO);
    U256::conditional_select(&reduced, &value, Choice::from((borrow.0 & 1) as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(v: u64) -> FieldElement {
        FieldElement::from_u64(v)
    }

    #[test]
    fn add_sub_round_trip() {
        let a = fe(1234567);
        let b = fe(89);
        assert_eq!(a.add(&b).sub(&b), a);
        assert_eq!(a.sub(&a), FieldElement::ZERO);
    }

    #[test]
    fn negate_cancels() {
        let a = fe(42);
        assert_eq!(a.add(&a.negate()), FieldElement::ZERO);
        assert_eq!(FieldElement::ZERO.negate(), FieldElement::ZERO);
    }

    #[test]
    fn mul_matches_small_products() {
        assert_eq!(fe(12).mul(&fe(34)), fe(408));
        assert_eq!(fe(1 << 32).mul(&fe(1 << 32)), fe(1 << 63).add(&fe(1 << 63)));
    }

    #[test]
    fn wide_reduction_wraps_correctly() {
        // (p - 1)^2 = 1 (mod p)
        let p_minus_1 = FieldElement::ZERO.sub(&FieldElement::ONE);
        assert_eq!(p_minus_1.square(), FieldElement::ONE);
        // (p - 1) * 2 = p - 2
        let two = fe(2);
        assert_eq!(p_minus_1.mul(&two), p_minus_1.sub(&FieldElement::ONE));
    }

    #[test]
    fn invert_small_values() {
        for v in [1u64, 2, 3, 977, 0xFFFF_FFFF] {
            let a = fe(v);
            assert_eq!(a.mul(&a.invert().unwrap()), FieldElement::ONE);
        }
        assert!(FieldElement::ZERO.invert().is_err());
    }

    #[test]
    fn sqrt_of_squares() {
        for v in [2u64, 5, 9, 1234567] {
            let a = fe(v);
            let root = a.square().sqrt().expect("square must have a root");
            assert!(root == a || root == a.negate());
        }
    }

    #[test]
    fn rejects_out_of_range_bytes() {
        let bytes = MODULUS.to_be_bytes();
        assert!(FieldElement::from_bytes(&bytes).is_err());
        assert!(FieldElement::from_bytes(&[0xFF; 32]).is_err());
    }

    #[test]
    fn byte_round_trip() {
        let a = fe(0xDEAD_BEEF_0042);
        assert_eq!(FieldElement::from_bytes(&a.to_bytes()).unwrap(), a);
    }
}
