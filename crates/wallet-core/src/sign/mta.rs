//! Oblivious-transfer-based multiplicative-to-additive conversion
//!
//! The signing rounds need additive shares of pairwise products without
//! either factor leaving its party. This runs one bitwise OT multiplication
//! per product: the receiver blinds one OT instance per bit of its factor,
//! the sender answers with masked pads carrying `z_l` and `z_l + a*2^l`, and
//! the two ends keep `-sum(z_l)` and `sum(t_l)` as shares of `a*b`. Base OT
//! keys come from Diffie-Hellman on the signing curve itself, domain
//! separated by session id, pairwise seed and transcript position.

use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce, Field},
    ProjectivePoint, Scalar,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{decode_point, encode_point, PartyId};
use crate::{Error, Result};

/// One OT instance per scalar bit
pub(crate) const OT_BATCH: usize = 256;

const DOM_OT_KEY: &[u8] = b"wallet-core/sign/ot-key/v1";

/// Masked pad pair for one OT instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskedPad {
    /// Pad selected by a zero choice bit
    pub c0: [u8; 32],
    /// Pad selected by a one choice bit
    pub c1: [u8; 32],
}

/// Transcript position of one MtA execution
pub(crate) struct MtaContext {
    pub final_sid: [u8; 32],
    pub pair_seed: [u8; 32],
    pub sender: PartyId,
    pub receiver: PartyId,
    pub label: &'static [u8],
}

impl MtaContext {
    fn derive_key(&self, index: usize, bit: u8, point: &ProjectivePoint) -> Scalar {
        let mut hasher = Sha256::new();
        hasher.update(DOM_OT_KEY);
        hasher.update(self.final_sid);
        hasher.update(self.pair_seed);
        hasher.update(self.label);
        hasher.update(self.sender.to_be_bytes());
        hasher.update(self.receiver.to_be_bytes());
        hasher.update((index as u32).to_be_bytes());
        hasher.update([bit]);
        hasher.update(encode_point(point));
        let digest: [u8; 32] = hasher.finalize().into();
        <Scalar as Reduce<U256>>::reduce_bytes(&digest.into())
    }
}

/// Base OT sender state, one per signing session
pub(crate) struct OtSender {
    secret: Scalar,
    setup: ProjectivePoint,
}

impl OtSender {
    pub fn new() -> Self {
        let secret = Scalar::random(&mut OsRng);
        Self {
            secret,
            setup: ProjectivePoint::GENERATOR * secret,
        }
    }

    pub fn setup_bytes(&self) -> Vec<u8> {
        encode_point(&self.setup)
    }

    pub fn wipe(&mut self) {
        self.secret = Scalar::ZERO;
    }
}

/// Receiver half of one MtA toward a single sender
pub(crate) struct MtaReceiver {
    bits: Vec<bool>,
    blind: Vec<Scalar>,
    sender_setup: ProjectivePoint,
}

impl MtaReceiver {
    /// Blind the choice bits of `b`; returns the points to send back
    pub fn new(b: &Scalar, sender_setup: &[u8]) -> Result<(Self, Vec<Vec<u8>>)> {
        let setup = decode_point(sender_setup)?;
        let bits = scalar_bits(b);
        let mut rng = OsRng;
        let mut blind = Vec::with_capacity(OT_BATCH);
        let mut points = Vec::with_capacity(OT_BATCH);
        for &bit in &bits {
            let x = Scalar::random(&mut rng);
            let mut point = ProjectivePoint::GENERATOR * x;
            if bit {
                point += setup;
            }
            blind.push(x);
            points.push(encode_point(&point));
        }
        Ok((
            Self {
                bits,
                blind,
                sender_setup: setup,
            },
            points,
        ))
    }

    /// Unmask the sender's pads into this side's additive share
    pub fn receive(&self, pads: &[MaskedPad], ctx: &MtaContext) -> Result<Scalar> {
        if pads.len() != OT_BATCH {
            return Err(Error::ProtocolAbort(format!(
                "expected {} masked pads, got {}",
                OT_BATCH,
                pads.len()
            )));
        }
        let mut share = Scalar::ZERO;
        for (l, pad) in pads.iter().enumerate() {
            let key_point = self.sender_setup * self.blind[l];
            let bit = self.bits[l];
            let key = ctx.derive_key(l, bit as u8, &key_point);
            let masked = if bit { &pad.c1 } else { &pad.c0 };
            share += reduce_bytes(masked) - key;
        }
        Ok(share)
    }

    pub fn wipe(&mut self) {
        for x in &mut self.blind {
            *x = Scalar::ZERO;
        }
        self.bits.clear();
    }
}

/// Sender half: mask the correlated pads and keep the sender share
pub(crate) fn mta_send(
    a: &Scalar,
    ot: &OtSender,
    receiver_points: &[Vec<u8>],
    ctx: &MtaContext,
) -> Result<(Vec<MaskedPad>, Scalar)> {
    if receiver_points.len() != OT_BATCH {
        return Err(Error::ProtocolAbort(format!(
            "expected {} OT points, got {}",
            OT_BATCH,
            receiver_points.len()
        )));
    }
    let mut rng = OsRng;
    let mut pads = Vec::with_capacity(OT_BATCH);
    let mut alpha = Scalar::ZERO;
    let mut weighted = *a;
    for (l, bytes) in receiver_points.iter().enumerate() {
        let point = decode_point(bytes)?;
        let k0 = ctx.derive_key(l, 0, &(point * ot.secret));
        let k1 = ctx.derive_key(l, 1, &((point - ot.setup) * ot.secret));
        let z = Scalar::random(&mut rng);
        pads.push(MaskedPad {
            c0: (z + k0).to_bytes().into(),
            c1: (z + weighted + k1).to_bytes().into(),
        });
        alpha -= z;
        weighted = weighted + weighted;
    }
    Ok((pads, alpha))
}

/// Little-endian choice bits of a scalar's canonical representative
fn scalar_bits(scalar: &Scalar) -> Vec<bool> {
    let bytes = scalar.to_bytes();
    (0..OT_BATCH)
        .map(|l| (bytes[31 - l / 8] >> (l % 8)) & 1 == 1)
        .collect()
}

fn reduce_bytes(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&(*bytes).into())
}
