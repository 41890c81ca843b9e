//! Signing message types

use serde::{Deserialize, Serialize};

use super::mta::MaskedPad;
use crate::types::PartyId;

/// All signing wire messages, tagged by round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SignMessage {
    /// Pre-signature round 1 broadcast
    Round1(SignMsg1),
    /// Pre-signature round 2 point-to-point
    Round2(SignMsg2),
    /// Pre-signature round 3 point-to-point
    Round3(SignMsg3),
    /// Online round broadcast
    Online(OnlineMsg),
}

impl SignMessage {
    /// The round this message belongs to
    pub fn round(&self) -> u8 {
        match self {
            SignMessage::Round1(_) => 1,
            SignMessage::Round2(_) => 2,
            SignMessage::Round3(_) => 3,
            SignMessage::Online(_) => 4,
        }
    }
}

/// Round 1: instance commitment and base OT setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignMsg1 {
    /// Sender party id
    pub party_id: PartyId,
    /// Contribution to the shared session id
    pub sid_contrib: [u8; 32],
    /// Key generation this signer's share belongs to
    pub key_id: [u8; 32],
    /// Hash commitment to the instance point
    pub commitment: [u8; 32],
    /// Base OT setup point (compressed)
    pub ot_setup: Vec<u8>,
}

/// Round 2: instance reveal and the receiver legs of both MtAs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignMsg2 {
    /// Sender party id
    pub from: PartyId,
    /// Recipient party id
    pub to: PartyId,
    /// Shared session id derived after round 1
    pub final_sid: [u8; 32],
    /// Instance point R_i (compressed)
    pub big_r: Vec<u8>,
    /// Blinding factor of the round 1 commitment
    pub blind: [u8; 32],
    /// OT points blinding the bits of the instance key
    pub ot_points_k: Vec<Vec<u8>>,
    /// OT points blinding the bits of the additive key share
    pub ot_points_w: Vec<Vec<u8>>,
}

/// Round 3: the sender legs of both MtAs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignMsg3 {
    /// Sender party id
    pub from: PartyId,
    /// Recipient party id
    pub to: PartyId,
    /// Shared session id
    pub final_sid: [u8; 32],
    /// Masked pads for the instance key product
    pub pads_k: Vec<MaskedPad>,
    /// Masked pads for the key share product
    pub pads_w: Vec<MaskedPad>,
}

/// Online round: masked signature shares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineMsg {
    /// Sender party id
    pub party_id: PartyId,
    /// Shared session id
    pub final_sid: [u8; 32],
    /// Share of the masked nonce
    pub u: [u8; 32],
    /// Share of the masked signature numerator
    pub v: [u8; 32],
}
