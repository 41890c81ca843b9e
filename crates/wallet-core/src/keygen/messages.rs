//! Keygen message types

use serde::{Deserialize, Serialize};

use crate::types::PartyId;

/// All keygen wire messages, tagged by round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeygenMessage {
    /// Round 1 broadcast
    Round1(KeygenMsg1),
    /// Round 2 point-to-point
    Round2(KeygenMsg2),
    /// Round 3 point-to-point
    Round3(KeygenMsg3),
    /// Round 4 broadcast
    Round4(KeygenMsg4),
}

impl KeygenMessage {
    /// The round this message belongs to
    pub fn round(&self) -> u8 {
        match self {
            KeygenMessage::Round1(_) => 1,
            KeygenMessage::Round2(_) => 2,
            KeygenMessage::Round3(_) => 3,
            KeygenMessage::Round4(_) => 4,
        }
    }
}

/// Round 1: session id contribution and commitment to the Feldman vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenMsg1 {
    /// Sender party id
    pub party_id: PartyId,
    /// Contribution to the shared session id
    pub sid_contrib: [u8; 32],
    /// Hash commitment to the polynomial coefficient commitments
    pub vss_commitment: [u8; 32],
}

/// Round 2: Feldman reveal and the receiver's secret share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenMsg2 {
    /// Sender party id
    pub from: PartyId,
    /// Recipient party id
    pub to: PartyId,
    /// Commitments to polynomial coefficients (compressed points)
    pub vss_points: Vec<Vec<u8>>,
    /// Blinding factor of the round 1 commitment
    pub rho: [u8; 32],
    /// Secret share evaluated at the recipient's coordinate
    pub share: Vec<u8>,
    /// Sender's half of the pairwise OT seed
    pub pair_seed: [u8; 32],
}

/// Round 3: chain code reveal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenMsg3 {
    /// Sender party id
    pub party_id: PartyId,
    /// Chain code contribution
    pub chain_code: [u8; 32],
    /// Blinding factor of the chain code commitment
    pub salt: [u8; 32],
}

/// Round 4: result agreement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenMsg4 {
    /// Sender party id
    pub party_id: PartyId,
    /// The shared public key this party computed (compressed)
    pub public_key: Vec<u8>,
    /// Digest of the chain code this party computed
    pub chain_code_digest: [u8; 32],
}
