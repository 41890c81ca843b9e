//! Affine secp256k1 points and their SEC1 encodings
//!
//! This is the boundary representation of the wallet: compressed 33-byte
//! keys toward address derivation, 64-byte x||y toward consumers that want
//! raw coordinates, and the decompression needed by public-key recovery.
//! The group arithmetic here runs on public inputs only; the MPC engines
//! keep their secret-dependent arithmetic on `k256`.

use k256::elliptic_curve::bigint::U256;

use super::field::FieldElement;
use crate::{Error, Result};

/// SEC1 prefix for an even y coordinate
const PREFIX_EVEN: u8 = 0x02;
/// SEC1 prefix for an odd y coordinate
const PREFIX_ODD: u8 = 0x03;
/// SEC1 prefix for an uncompressed point
const PREFIX_UNCOMPRESSED: u8 = 0x04;

/// An affine secp256k1 point or the point at infinity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurvePoint {
    x: FieldElement,
    y: FieldElement,
    infinity: bool,
}

impl CurvePoint {
    /// The point at infinity
    pub const IDENTITY: Self = Self {
        x: FieldElement::ZERO,
        y: FieldElement::ZERO,
        infinity: true,
    };

    /// The base point G
    pub const GENERATOR: Self = Self {
        x: FieldElement::from_uint_unchecked(U256::from_be_hex(
            "79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798",
        )),
        y: FieldElement::from_uint_unchecked(U256::from_be_hex(
            "483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8",
        )),
        infinity: false,
    };

    /// Whether this is the point at infinity
    pub fn is_identity(&self) -> bool {
        self.infinity
    }

    /// The affine coordinates, if not infinity
    pub fn coordinates(&self) -> Option<(FieldElement, FieldElement)> {
        if self.infinity {
            None
        } else {
            Some((self.x, self.y))
        }
    }

    /// Construct from coordinates, verifying y^2 = x^3 + 7
    pub fn from_coordinates(x: FieldElement, y: FieldElement) -> Result<Self> {
        let lhs = y.square();
        let rhs = x.square().mul(&x).add(&FieldElement::SEVEN);
        if lhs != rhs {
            return Err(Error::PointInvalid);
        }
        Ok(Self {
            x,
            y,
            infinity: false,
        })
    }

    /// Point negation
    pub fn negate(&self) -> Self {
        if self.infinity {
            return *self;
        }
        Self {
            x: self.x,
            y: self.y.negate(),
            infinity: false,
        }
    }

    /// Point addition
    pub fn add(&self, other: &Self) -> Self {
        if self.infinity {
            return *other;
        }
        if other.infinity {
            return *self;
        }
        if self.x == other.x {
            if self.y == other.y {
                return self.double();
            }
            // x1 = x2 with y1 = -y2
            return Self::IDENTITY;
        }
        let Ok(inv) = other.x.sub(&self.x).invert() else {
            return Self::IDENTITY;
        };
        let lambda = other.y.sub(&self.y).mul(&inv);
        self.chord(other, &lambda)
    }

    /// Point doubling
    pub fn double(&self) -> Self {
        if self.infinity || self.y.is_zero() {
            return Self::IDENTITY;
        }
        let Ok(inv) = self.y.add(&self.y).invert() else {
            return Self::IDENTITY;
        };
        let x_sq = self.x.square();
        let lambda = x_sq.add(&x_sq).add(&x_sq).mul(&inv);
        self.chord(self, &lambda)
    }

    fn chord(&self, other: &Self, lambda: &FieldElement) -> Self {
        let x3 = lambda.square().sub(&self.x).sub(&other.x);
        let y3 = self.x.sub(&x3).mul(lambda).sub(&self.y);
        Self {
            x: x3,
            y: y3,
            infinity: false,
        }
    }

    /// Scalar multiplication by 32 big-endian bytes, MSB-first double-and-add
    pub fn mul(&self, scalar: &[u8; 32]) -> Self {
        let mut acc = Self::IDENTITY;
        for byte in scalar {
            for bit in (0..8).rev() {
                acc = acc.double();
                if (byte >> bit) & 1 == 1 {
                    acc = acc.add(self);
                }
            }
        }
        acc
    }

    /// Compress to the 33-byte SEC1 form
    pub fn compress(&self) -> Result<[u8; 33]> {
        if self.infinity {
            return Err(Error::PointInvalid);
        }
        let mut out = [0u8; 33];
        out[0] = if self.y.is_odd() {
            PREFIX_ODD
        } else {
            PREFIX_EVEN
        };
        out[1..].copy_from_slice(&self.x.to_bytes());
        Ok(out)
    }

    /// Flatten to 64 bytes x || y, no framing byte
    pub fn to_uncompressed(&self) -> Result<[u8; 64]> {
        if self.infinity {
            return Err(Error::PointInvalid);
        }
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.x.to_bytes());
        out[32..].copy_from_slice(&self.y.to_bytes());
        Ok(out)
    }

    /// Decode a point from any of the accepted encodings
    ///
    /// 33 bytes: compressed. 65 bytes: 0x04-prefixed uncompressed. 64 bytes:
    /// bare x || y. The uncompressed forms are checked against the curve
    /// equation.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            33 => {
                let x: [u8; 32] = bytes[1..].try_into().map_err(|_| Error::PointInvalid)?;
                Self::decompress(&x, bytes[0] == PREFIX_ODD, bytes[0])
            }
            65 => {
                if bytes[0] != PREFIX_UNCOMPRESSED {
                    return Err(Error::PointInvalid);
                }
                Self::decode_coordinates(&bytes[1..])
            }
            64 => Self::decode_coordinates(bytes),
            _ => Err(Error::PointInvalid),
        }
    }

    /// Recover the y coordinate of a compressed point
    pub fn decompress_with_parity(x_bytes: &[u8; 32], want_odd: bool) -> Result<Self> {
        let prefix = if want_odd { PREFIX_ODD } else { PREFIX_EVEN };
        Self::decompress(x_bytes, want_odd, prefix)
    }

    fn decompress(x_bytes: &[u8; 32], want_odd: bool, prefix: u8) -> Result<Self> {
        if prefix != PREFIX_EVEN && prefix != PREFIX_ODD {
            return Err(Error::PointInvalid);
        }
        let x = FieldElement::from_bytes(x_bytes).map_err(|_| Error::PointInvalid)?;
        let alpha = x.square().mul(&x).add(&FieldElement::SEVEN);
        let beta = alpha.sqrt().ok_or(Error::PointInvalid)?;
        let y = if beta.is_odd() == want_odd {
            beta
        } else {
            beta.negate()
        };
        Ok(Self {
            x,
            y,
            infinity: false,
        })
    }

    fn decode_coordinates(bytes: &[u8]) -> Result<Self> {
        let x_bytes: [u8; 32] = bytes[..32].try_into().map_err(|_| Error::PointInvalid)?;
        let y_bytes: [u8; 32] = bytes[32..].try_into().map_err(|_| Error::PointInvalid)?;
        let x = FieldElement::from_bytes(&x_bytes).map_err(|_| Error::PointInvalid)?;
        let y = FieldElement::from_bytes(&y_bytes).map_err(|_| Error::PointInvalid)?;
        Self::from_coordinates(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use k256::elliptic_curve::Field;
    use k256::{ProjectivePoint, Scalar};
    use rand::rngs::OsRng;

    #[test]
    fn generator_is_on_curve() {
        let g = CurvePoint::GENERATOR;
        let (x, y) = g.coordinates().unwrap();
        assert_eq!(
            y.square(),
            x.square().mul(&x).add(&FieldElement::SEVEN)
        );
    }

    #[test]
    fn doubling_matches_known_2g() {
        let two_g = CurvePoint::GENERATOR.double();
        let expected = CurvePoint::decode(
            &hex::decode("02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(two_g, expected);
    }

    #[test]
    fn addition_inverse_gives_identity() {
        let g = CurvePoint::GENERATOR;
        assert!(g.add(&g.negate()).is_identity());
        assert_eq!(g.add(&CurvePoint::IDENTITY), g);
    }

    #[test]
    fn scalar_mul_agrees_with_k256() {
        for _ in 0..8 {
            let scalar = Scalar::random(&mut OsRng);
            let reference = ProjectivePoint::GENERATOR * scalar;
            let encoded = reference.to_affine().to_encoded_point(true);

            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(scalar.to_bytes().as_slice());
            let ours = CurvePoint::GENERATOR.mul(&bytes);

            assert_eq!(ours.compress().unwrap().as_slice(), encoded.as_bytes());
        }
    }

    #[test]
    fn compress_decompress_round_trip() {
        let mut point = CurvePoint::GENERATOR;
        for _ in 0..16 {
            let compressed = point.compress().unwrap();
            let back = CurvePoint::decode(&compressed).unwrap();
            assert_eq!(back, point);
            let flat = point.to_uncompressed().unwrap();
            assert_eq!(CurvePoint::decode(&flat).unwrap(), point);
            point = point.add(&CurvePoint::GENERATOR);
        }
    }

    #[test]
    fn decompressed_parity_follows_prefix() {
        let mut rejected = 0;
        let mut accepted = 0;
        for v in 1u64..=24 {
            let mut x = [0u8; 32];
            x[24..].copy_from_slice(&v.to_be_bytes());
            match CurvePoint::decompress_with_parity(&x, false) {
                Ok(point) => {
                    accepted += 1;
                    let (_, y) = point.coordinates().unwrap();
                    assert!(!y.is_odd());
                    let odd = CurvePoint::decompress_with_parity(&x, true).unwrap();
                    assert!(odd.coordinates().unwrap().1.is_odd());
                }
                Err(Error::PointInvalid) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(accepted > 0, "some x in range must be on the curve");
        assert!(rejected > 0, "some x in range must be a non-residue");
    }

    #[test]
    fn rejects_off_curve_coordinates() {
        let mut flat = CurvePoint::GENERATOR.to_uncompressed().unwrap();
        flat[63] ^= 1;
        assert!(matches!(
            CurvePoint::decode(&flat),
            Err(Error::PointInvalid)
        ));
    }

    #[test]
    fn rejects_bad_lengths_and_prefixes() {
        assert!(CurvePoint::decode(&[0u8; 10]).is_err());
        let mut compressed = CurvePoint::GENERATOR.compress().unwrap();
        compressed[0] = 0x05;
        assert!(CurvePoint::decode(&compressed).is_err());
    }
}
