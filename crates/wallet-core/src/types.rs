//! Core types shared by the keygen and signing engines

use std::collections::BTreeMap;

use k256::{
    ecdsa,
    elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint},
    AffinePoint, ProjectivePoint, Scalar,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// Unique identifier for a party in the MPC network
pub type PartyId = usize;

/// Unique identifier for a protocol session
pub type SessionId = [u8; 32];

/// Compressed public key bytes
pub type PublicKey = [u8; 33];

/// ECDSA signature (r, s) with its recovery id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// R component
    pub r: [u8; 32],
    /// S component
    pub s: [u8; 32],
    /// Recovery id (0 or 1)
    pub v: u8,
}

impl Signature {
    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Convert to DER format
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let sig = ecdsa::Signature::from_scalars(
            *k256::FieldBytes::from_slice(&self.r),
            *k256::FieldBytes::from_slice(&self.s),
        )
        .map_err(|_| Error::ScalarOutOfRange)?;
        Ok(sig.to_der().as_bytes().to_vec())
    }

    /// Convert to bytes (r || s)
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }
}

/// Threshold parameters and the id set of the keyshare holders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Total number of parties
    pub n_parties: usize,
    /// Threshold (t-of-n)
    pub threshold: usize,
    /// Distinct ids of all keyshare holders
    pub party_ids: Vec<PartyId>,
}

impl ThresholdConfig {
    /// Create a new configuration, validating the threshold bounds and id set
    pub fn new(n_parties: usize, threshold: usize, party_ids: Vec<PartyId>) -> Result<Self> {
        validate_threshold(n_parties, threshold)?;
        if party_ids.len() != n_parties {
            return Err(Error::ConfigInvalid(format!(
                "expected {} party ids, got {}",
                n_parties,
                party_ids.len()
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for &id in &party_ids {
            if !seen.insert(id) {
                return Err(Error::PartyIdDuplicate(id));
            }
        }
        Ok(Self {
            n_parties,
            threshold,
            party_ids,
        })
    }

    /// Whether the given id belongs to this configuration
    pub fn contains(&self, id: PartyId) -> bool {
        self.party_ids.contains(&id)
    }
}

/// Validate threshold bounds common to sessions and configurations
pub(crate) fn validate_threshold(n_parties: usize, threshold: usize) -> Result<()> {
    if n_parties < 2 {
        return Err(Error::ConfigInvalid(
            "At least two parties are required".into(),
        ));
    }
    if threshold < 2 {
        return Err(Error::ConfigInvalid("Threshold must be at least 2".into()));
    }
    if threshold > n_parties {
        return Err(Error::ConfigInvalid(
            "Threshold cannot exceed number of parties".into(),
        ));
    }
    Ok(())
}

/// Key share held by a party after keygen
///
/// All shares produced by one keygen run carry the same public key, chain
/// code and key id. The secret share and the pairwise OT seeds are this
/// party's private material.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Keyshare {
    /// This party's id
    #[zeroize(skip)]
    pub party_id: PartyId,

    /// Threshold parameters and holder ids
    #[zeroize(skip)]
    pub config: ThresholdConfig,

    /// This party's secret share (x_i)
    #[zeroize(skip)]
    #[serde(with = "scalar_serde")]
    pub(crate) secret_share: Scalar,

    /// Shared public key (compressed)
    #[zeroize(skip)]
    pub public_key: Vec<u8>,

    /// Public key shares of all parties, keyed by party id
    #[zeroize(skip)]
    pub public_shares: BTreeMap<PartyId, Vec<u8>>,

    /// Chain code produced alongside the share
    pub chain_code: [u8; 32],

    /// Identifier binding all shares of one keygen run together
    pub key_id: [u8; 32],

    /// Pairwise seeds for the signing OT, keyed by peer id
    #[zeroize(skip)]
    pub(crate) ot_seeds: BTreeMap<PartyId, [u8; 32]>,

    /// Key id of the generation this share replaced, if any
    #[zeroize(skip)]
    pub rotated_from: Option<[u8; 32]>,
}

pub(crate) mod scalar_serde {
    use k256::{
        elliptic_curve::{bigint::U256, ops::Reduce},
        Scalar,
    };
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(scalar: &Scalar, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes = scalar.to_bytes();
        serializer.serialize_bytes(bytes.as_slice())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Scalar, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid scalar length"))?;
        Ok(<Scalar as Reduce<U256>>::reduce_bytes(&array.into()))
    }
}

impl Keyshare {
    /// Get the shared public key as a `ProjectivePoint`
    pub fn public_key_point(&self) -> Result<ProjectivePoint> {
        decode_point(&self.public_key)
    }

    /// Serialise the share to opaque bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::ConfigInvalid(e.to_string()))
    }

    /// Restore a share from bytes produced by [`Keyshare::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::ConfigInvalid(e.to_string()))
    }

    /// SHA-256 commitment to the serialised share
    pub fn commitment(&self) -> Result<[u8; 32]> {
        let bytes = self.to_bytes()?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Bind this share to the generation it rotated out
    ///
    /// Verifies that the old share carries the same public key and is the
    /// generation this share was produced from. The old share is consumed
    /// and dropped.
    pub fn finish_rotation(&mut self, old: Keyshare) -> Result<()> {
        if old.public_key != self.public_key || old.party_id != self.party_id {
            return Err(Error::RotationMismatch);
        }
        if self.rotated_from != Some(old.key_id) {
            return Err(Error::RotationMismatch);
        }
        drop(old);
        Ok(())
    }
}

impl std::fmt::Debug for Keyshare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyshare")
            .field("party_id", &self.party_id)
            .field("config", &self.config)
            .field("public_key", &hex::encode(&self.public_key))
            .field("key_id", &hex::encode(self.key_id))
            .finish_non_exhaustive()
    }
}

/// Shamir x-coordinate for a party id
///
/// Ids are shifted by one so the shared secret sits at zero. Ids need not be
/// contiguous; the coordinate is derived from the id itself, never from a
/// position in some ordering.
pub(crate) fn share_coordinate(id: PartyId) -> u64 {
    id as u64 + 1
}

/// Decode a SEC1-encoded point into a `ProjectivePoint`
pub(crate) fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    let encoded = k256::EncodedPoint::from_bytes(bytes).map_err(|_| Error::PointInvalid)?;
    let affine: AffinePoint = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or(Error::PointInvalid)?;
    Ok(ProjectivePoint::from(affine))
}

/// Encode a `ProjectivePoint` in compressed SEC1 form
pub(crate) fn encode_point(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_config_rejects_bad_bounds() {
        assert!(ThresholdConfig::new(1, 1, vec![0]).is_err());
        assert!(ThresholdConfig::new(3, 1, vec![0, 1, 2]).is_err());
        assert!(ThresholdConfig::new(3, 4, vec![0, 1, 2]).is_err());
        assert!(ThresholdConfig::new(3, 2, vec![0, 1, 2]).is_ok());
    }

    #[test]
    fn threshold_config_rejects_duplicate_ids() {
        let err = ThresholdConfig::new(3, 2, vec![0, 1, 1]).unwrap_err();
        assert!(matches!(err, Error::PartyIdDuplicate(1)));
    }

    #[test]
    fn threshold_config_accepts_sparse_ids() {
        let cfg = ThresholdConfig::new(3, 2, vec![0, 2, 5]).unwrap();
        assert!(cfg.contains(5));
        assert!(!cfg.contains(1));
    }

    #[test]
    fn point_codec_round_trips_generator() {
        let g = ProjectivePoint::GENERATOR;
        let bytes = encode_point(&g);
        assert_eq!(bytes.len(), 33);
        assert_eq!(decode_point(&bytes).unwrap(), g);
    }
}
