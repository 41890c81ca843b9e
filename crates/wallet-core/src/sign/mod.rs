//! Distributed signature generation
//!
//! Three pre-signature rounds followed by a strictly one-shot online round.
//! Round 1 fixes the signing cohort, commits to each party's instance point
//! and sets up base OT. Rounds 2 and 3 run two OT multiplications per
//! ordered pair, giving every signer additive shares of `phi*k` and of
//! `phi*x` for a random mask `phi = sum(phi_i)` and nonce `k = sum(k_i)`.
//! The online message reveals `u_i` and `v_i = m*phi_i + r*(phi*x)_i`;
//! combining yields `s = sum(v)/sum(u) = (m + r*x)/k` with `r` taken from
//! `R = k*G` during the pre-signature.
//!
//! Signing the same pre-signature for two digests leaks the key, so the
//! session enforces single use itself: a spent flag on the instance plus a
//! process-wide ledger keyed by the session's random id.

mod messages;
pub(crate) mod mta;

pub use messages::*;
pub use mta::MaskedPad;

use std::collections::{BTreeMap, BTreeSet};

use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce, sec1::ToEncodedPoint, Field},
    ProjectivePoint, Scalar,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::recover::verify_signature;
use crate::types::{decode_point, encode_point, share_coordinate, Keyshare, PartyId};
use crate::wire::Frame;
use crate::{ledger, Error, Result};

const DOM_SIGN_SID: &[u8] = b"wallet-core/sign/session-id/v1";
const DOM_R_COMMIT: &[u8] = b"wallet-core/sign/instance-commit/v1";
const LABEL_MTA_K: &[u8] = b"wallet-core/sign/mta-k";
const LABEL_MTA_W: &[u8] = b"wallet-core/sign/mta-w";

/// The identity derivation path, the only one the engine accepts
pub const IDENTITY_PATH: &str = "m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Round1,
    Round2,
    Round3,
    Ready,
    Online,
    Spent,
    Poisoned,
}

/// One party's view of one in-progress signature
///
/// Consumes a [`Keyshare`] at construction and is destroyed by use: after
/// the online message and the combine step the instance only answers with
/// [`Error::SessionSpent`].
pub struct SignSession {
    my_id: PartyId,
    threshold: usize,
    holder_ids: Vec<PartyId>,
    key_id: [u8; 32],
    public_key: Vec<u8>,
    secret_share: Scalar,
    ot_seeds: BTreeMap<PartyId, [u8; 32]>,
    uuid: Uuid,

    stage: Stage,
    first_sent: bool,
    sid_contrib: [u8; 32],
    k_i: Scalar,
    phi_i: Scalar,
    big_r_mine: Vec<u8>,
    blind: [u8; 32],
    ot_sender: mta::OtSender,

    receivers: BTreeMap<PartyId, (mta::MtaReceiver, mta::MtaReceiver)>,
    alpha_u: Scalar,
    alpha_v: Scalar,

    r1: BTreeMap<PartyId, SignMsg1>,
    r2: BTreeMap<PartyId, SignMsg2>,
    r3: BTreeMap<PartyId, SignMsg3>,
    online: BTreeMap<PartyId, OnlineMsg>,

    cohort: BTreeSet<PartyId>,
    final_sid: [u8; 32],
    w_i: Scalar,
    r_scalar: Scalar,
    u_share: Scalar,
    x_share: Scalar,
    digest: [u8; 32],
    my_online: Option<OnlineMsg>,
}

impl SignSession {
    /// Create a signing session from a keyshare
    ///
    /// Only the identity derivation path `"m"` is supported; the underlying
    /// protocol has no share derivation yet and anything else fails fast.
    pub fn new(keyshare: Keyshare, derivation_path: &str) -> Result<Self> {
        if derivation_path != IDENTITY_PATH {
            return Err(Error::DerivationUnsupported(derivation_path.to_string()));
        }
        let mut rng = OsRng;
        let k_i = Scalar::random(&mut rng);
        let phi_i = Scalar::random(&mut rng);
        let big_r_mine = encode_point(&(ProjectivePoint::GENERATOR * k_i));

        Ok(Self {
            my_id: keyshare.party_id,
            threshold: keyshare.config.threshold,
            holder_ids: keyshare.config.party_ids.clone(),
            key_id: keyshare.key_id,
            public_key: keyshare.public_key.clone(),
            secret_share: keyshare.secret_share,
            ot_seeds: keyshare.ot_seeds.clone(),
            uuid: Uuid::new_v4(),
            stage: Stage::Round1,
            first_sent: false,
            sid_contrib: rand::random(),
            k_i,
            phi_i,
            big_r_mine,
            blind: rand::random(),
            ot_sender: mta::OtSender::new(),
            receivers: BTreeMap::new(),
            alpha_u: Scalar::ZERO,
            alpha_v: Scalar::ZERO,
            r1: BTreeMap::new(),
            r2: BTreeMap::new(),
            r3: BTreeMap::new(),
            online: BTreeMap::new(),
            cohort: BTreeSet::new(),
            final_sid: [0u8; 32],
            w_i: Scalar::ZERO,
            r_scalar: Scalar::ZERO,
            u_share: Scalar::ZERO,
            x_share: Scalar::ZERO,
            digest: [0u8; 32],
            my_online: None,
        })
    }

    /// This party's id
    pub fn party_id(&self) -> PartyId {
        self.my_id
    }

    /// The shared public key this session signs under (compressed)
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// The ephemeral session identifier used by the spent ledger
    pub fn session_uuid(&self) -> Uuid {
        self.uuid
    }

    /// Whether the one-shot output has been produced
    pub fn is_spent(&self) -> bool {
        self.stage == Stage::Spent
    }

    /// Emit the pre-signature round 1 broadcast
    pub fn first_message(&mut self) -> Result<Frame> {
        self.check_alive()?;
        if self.stage != Stage::Round1 || self.first_sent {
            return Err(match self.stage {
                Stage::Online | Stage::Spent => Error::SessionSpent,
                _ => Error::SessionNotReady("round 1 message already emitted".into()),
            });
        }
        // A resurrected copy of an already-spent session must not restart.
        if ledger::is_spent(&self.uuid) {
            return Err(Error::SessionSpent);
        }
        self.first_sent = true;
        let msg = SignMsg1 {
            party_id: self.my_id,
            sid_contrib: self.sid_contrib,
            key_id: self.key_id,
            commitment: instance_commitment(self.my_id, &self.big_r_mine, &self.blind),
            ot_setup: self.ot_sender.setup_bytes(),
        };
        debug!(party_id = self.my_id, "sign round 1 broadcast");
        Ok(Frame::broadcast(
            self.my_id,
            serde_json::to_vec(&SignMessage::Round1(msg))?,
        ))
    }

    /// Consume inbound frames for the current pre-signature round
    ///
    /// Returns an empty batch while a round is incomplete, and after the
    /// third round closes. The online round goes through
    /// [`Self::last_message`] and [`Self::combine`].
    pub fn handle(&mut self, frames: &[Frame]) -> Result<Vec<Frame>> {
        self.check_alive()?;
        let result = self.handle_inner(frames);
        if let Err(err) = &result {
            if err.is_fatal() {
                self.poison();
            }
        }
        result
    }

    /// Emit the online message for a 32-byte digest; legal exactly once
    pub fn last_message(&mut self, digest: &[u8]) -> Result<Frame> {
        self.check_alive()?;
        match self.stage {
            Stage::Ready => {}
            Stage::Online | Stage::Spent => return Err(Error::SessionSpent),
            _ => {
                return Err(Error::SessionNotReady(
                    "pre-signature rounds have not completed".into(),
                ))
            }
        }
        let digest: [u8; 32] = digest
            .try_into()
            .map_err(|_| Error::DigestLengthInvalid(digest.len()))?;
        if !ledger::mark_spent(self.uuid) {
            return Err(Error::SessionSpent);
        }

        let m = reduce_bytes(&digest);
        let u = self.u_share;
        let v = m * self.phi_i + self.r_scalar * self.x_share;
        let msg = OnlineMsg {
            party_id: self.my_id,
            final_sid: self.final_sid,
            u: u.to_bytes().into(),
            v: v.to_bytes().into(),
        };
        self.digest = digest;
        self.my_online = Some(msg.clone());
        self.stage = Stage::Online;
        self.wipe_presignature();
        debug!(party_id = self.my_id, "sign online message emitted");
        Ok(Frame::broadcast(
            self.my_id,
            serde_json::to_vec(&SignMessage::Online(msg))?,
        ))
    }

    /// Combine the peers' online messages into the signature scalars
    ///
    /// Legal exactly once, after [`Self::last_message`]. Every honest party
    /// obtains the same `(r, s)`; the engine verifies the pair against the
    /// shared public key before releasing it.
    pub fn combine(&mut self, frames: &[Frame]) -> Result<([u8; 32], [u8; 32])> {
        self.check_alive()?;
        match self.stage {
            Stage::Online => {}
            Stage::Spent => return Err(Error::SessionSpent),
            _ => {
                return Err(Error::SessionNotReady(
                    "combine requires the online message to have been emitted".into(),
                ))
            }
        }
        let result = self.combine_inner(frames);
        if let Err(err) = &result {
            if err.is_fatal() {
                self.poison();
            }
        }
        result
    }

    fn combine_inner(&mut self, frames: &[Frame]) -> Result<([u8; 32], [u8; 32])> {
        for frame in frames {
            self.ingest_online(frame)?;
        }
        if self.online.len() < self.threshold - 1 {
            return Err(Error::SessionNotReady(
                "online round is missing peer messages".into(),
            ));
        }
        let my_online = self
            .my_online
            .as_ref()
            .ok_or_else(|| Error::SessionNotReady("own online message missing".into()))?;

        let mut u_sum = reduce_bytes(&my_online.u);
        let mut v_sum = reduce_bytes(&my_online.v);
        for msg in self.online.values() {
            u_sum += reduce_bytes(&msg.u);
            v_sum += reduce_bytes(&msg.v);
        }
        let u_inv = Option::<Scalar>::from(u_sum.invert())
            .ok_or_else(|| Error::ProtocolAbort("masked nonce sums to zero".into()))?;
        let s = v_sum * u_inv;
        if bool::from(s.is_zero()) {
            return Err(Error::ProtocolAbort("signature scalar is zero".into()));
        }

        let r_bytes: [u8; 32] = self.r_scalar.to_bytes().into();
        let s_bytes: [u8; 32] = s.to_bytes().into();
        if !verify_signature(&r_bytes, &s_bytes, &self.digest, &self.public_key)? {
            return Err(Error::ProtocolAbort(
                "combined signature does not verify against the shared key".into(),
            ));
        }

        info!(
            party_id = self.my_id,
            r = hex::encode(r_bytes),
            s = hex::encode(s_bytes),
            "signature combined"
        );
        self.stage = Stage::Spent;
        self.wipe_all();
        Ok((r_bytes, s_bytes))
    }

    fn check_alive(&self) -> Result<()> {
        if self.stage == Stage::Poisoned {
            return Err(Error::ProtocolAbort("session is poisoned".into()));
        }
        Ok(())
    }

    fn poison(&mut self) {
        self.stage = Stage::Poisoned;
        self.wipe_all();
    }

    fn wipe_presignature(&mut self) {
        self.k_i = Scalar::ZERO;
        self.w_i = Scalar::ZERO;
        self.u_share = Scalar::ZERO;
        self.secret_share = Scalar::ZERO;
        self.alpha_u = Scalar::ZERO;
        self.alpha_v = Scalar::ZERO;
        self.ot_sender.wipe();
        for (recv_k, recv_w) in self.receivers.values_mut() {
            recv_k.wipe();
            recv_w.wipe();
        }
        self.receivers.clear();
    }

    fn wipe_all(&mut self) {
        self.wipe_presignature();
        self.phi_i = Scalar::ZERO;
        self.x_share = Scalar::ZERO;
    }

    fn handle_inner(&mut self, frames: &[Frame]) -> Result<Vec<Frame>> {
        match self.stage {
            Stage::Round1 => {
                if !self.first_sent {
                    return Err(Error::SessionNotReady(
                        "first_message must be emitted before handling round 1".into(),
                    ));
                }
                for frame in frames {
                    self.ingest_round1(frame)?;
                }
                if self.r1.len() < self.threshold - 1 {
                    return Ok(Vec::new());
                }
                self.close_round1()
            }
            Stage::Round2 => {
                for frame in frames {
                    self.ingest_round2(frame)?;
                }
                if self.r2.len() < self.threshold - 1 {
                    return Ok(Vec::new());
                }
                self.close_round2()
            }
            Stage::Round3 => {
                for frame in frames {
                    self.ingest_round3(frame)?;
                }
                if self.r3.len() < self.threshold - 1 {
                    return Ok(Vec::new());
                }
                self.close_round3()
            }
            Stage::Ready | Stage::Online => Err(Error::SessionNotReady(
                "pre-signature complete; use last_message and combine".into(),
            )),
            Stage::Spent => Err(Error::SessionSpent),
            Stage::Poisoned => Err(Error::ProtocolAbort("session is poisoned".into())),
        }
    }

    fn ingest_round1(&mut self, frame: &Frame) -> Result<()> {
        if frame.from == self.my_id {
            return Err(Error::FrameMalformed("frame from self".into()));
        }
        if !self.holder_ids.contains(&frame.from) {
            return Err(Error::FrameFromUnknownParty(frame.from));
        }
        let msg = match decode_message(&frame.payload)? {
            SignMessage::Round1(m) => m,
            other => {
                return Err(Error::FrameForWrongRound {
                    expected: 1,
                    got: other.round(),
                })
            }
        };
        if !frame.is_broadcast() {
            return Err(Error::FrameMalformed("round 1 expects broadcasts".into()));
        }
        if msg.party_id != frame.from {
            return Err(Error::FrameMalformed("sender id mismatch".into()));
        }
        if msg.key_id != self.key_id {
            // A signer wired up with a share from a different keygen
            // generation, typically an old share after rotation.
            return Err(Error::RotationMismatch);
        }
        if self.r1.contains_key(&frame.from) {
            return Err(Error::FrameDuplicate(frame.from));
        }
        if self.r1.len() >= self.threshold - 1 {
            return Err(Error::ProtocolAbort(
                "more signers than the threshold allows".into(),
            ));
        }
        self.r1.insert(frame.from, msg);
        Ok(())
    }

    fn close_round1(&mut self) -> Result<Vec<Frame>> {
        let mut cohort: BTreeSet<PartyId> = self.r1.keys().copied().collect();
        cohort.insert(self.my_id);
        debug!(party_id = self.my_id, cohort = ?cohort, "sign round 1 closed");

        let mut hasher = Sha256::new();
        hasher.update(DOM_SIGN_SID);
        hasher.update(self.key_id);
        for &id in &cohort {
            hasher.update(id.to_be_bytes());
            let contrib = if id == self.my_id {
                &self.sid_contrib
            } else {
                &self.r1[&id].sid_contrib
            };
            hasher.update(contrib);
        }
        self.final_sid = hasher.finalize().into();
        self.w_i = self.secret_share * lagrange_at_zero(self.my_id, &cohort);
        self.cohort = cohort;

        let peers: Vec<(PartyId, Vec<u8>)> = self
            .r1
            .iter()
            .map(|(&id, msg)| (id, msg.ot_setup.clone()))
            .collect();
        let mut out = Vec::with_capacity(peers.len());
        for (peer, ot_setup) in peers {
            let (recv_k, points_k) = mta::MtaReceiver::new(&self.k_i, &ot_setup)?;
            let (recv_w, points_w) = mta::MtaReceiver::new(&self.w_i, &ot_setup)?;
            self.receivers.insert(peer, (recv_k, recv_w));
            let msg = SignMsg2 {
                from: self.my_id,
                to: peer,
                final_sid: self.final_sid,
                big_r: self.big_r_mine.clone(),
                blind: self.blind,
                ot_points_k: points_k,
                ot_points_w: points_w,
            };
            out.push(Frame::direct(
                self.my_id,
                peer,
                serde_json::to_vec(&SignMessage::Round2(msg))?,
            ));
        }
        self.stage = Stage::Round2;
        Ok(out)
    }

    fn ingest_round2(&mut self, frame: &Frame) -> Result<()> {
        self.expect_direct(frame)?;
        let msg = match decode_message(&frame.payload)? {
            SignMessage::Round2(m) => m,
            other => {
                return Err(Error::FrameForWrongRound {
                    expected: 2,
                    got: other.round(),
                })
            }
        };
        if msg.from != frame.from || msg.to != self.my_id {
            return Err(Error::FrameMalformed("round 2 addressing mismatch".into()));
        }
        if msg.final_sid != self.final_sid {
            return Err(Error::ProtocolAbort("session id mismatch".into()));
        }
        if self.r2.contains_key(&frame.from) {
            return Err(Error::FrameDuplicate(frame.from));
        }
        self.r2.insert(frame.from, msg);
        Ok(())
    }

    fn close_round2(&mut self) -> Result<Vec<Frame>> {
        // Commitment reveals first: the nonce must be fixed before any
        // instance point is trusted.
        let mut r_point = decode_point(&self.big_r_mine)?;
        for (&peer, msg) in &self.r2 {
            let expected = self.r1[&peer].commitment;
            if instance_commitment(peer, &msg.big_r, &msg.blind) != expected {
                return Err(Error::CommitmentMismatch(peer));
            }
            r_point += decode_point(&msg.big_r)?;
        }
        if r_point == ProjectivePoint::IDENTITY {
            return Err(Error::ProtocolAbort("instance point is the identity".into()));
        }
        let r_affine = r_point.to_affine().to_encoded_point(false);
        let x_coord: [u8; 32] = r_affine.as_bytes()[1..33]
            .try_into()
            .map_err(|_| Error::ProtocolAbort("invalid instance point".into()))?;
        self.r_scalar = reduce_bytes(&x_coord);
        if bool::from(self.r_scalar.is_zero()) {
            return Err(Error::ProtocolAbort("instance x-coordinate is zero".into()));
        }
        debug!(party_id = self.my_id, "sign round 2 closed");

        let peers: Vec<(PartyId, Vec<Vec<u8>>, Vec<Vec<u8>>)> = self
            .r2
            .iter()
            .map(|(&id, msg)| (id, msg.ot_points_k.clone(), msg.ot_points_w.clone()))
            .collect();
        let mut out = Vec::with_capacity(peers.len());
        for (peer, points_k, points_w) in peers {
            let seed = self.pair_seed(peer)?;
            let ctx_k = mta::MtaContext {
                final_sid: self.final_sid,
                pair_seed: seed,
                sender: self.my_id,
                receiver: peer,
                label: LABEL_MTA_K,
            };
            let (pads_k, alpha_k) = mta::mta_send(&self.phi_i, &self.ot_sender, &points_k, &ctx_k)?;
            let ctx_w = mta::MtaContext {
                final_sid: self.final_sid,
                pair_seed: seed,
                sender: self.my_id,
                receiver: peer,
                label: LABEL_MTA_W,
            };
            let (pads_w, alpha_w) = mta::mta_send(&self.phi_i, &self.ot_sender, &points_w, &ctx_w)?;
            self.alpha_u += alpha_k;
            self.alpha_v += alpha_w;
            let msg = SignMsg3 {
                from: self.my_id,
                to: peer,
                final_sid: self.final_sid,
                pads_k,
                pads_w,
            };
            out.push(Frame::direct(
                self.my_id,
                peer,
                serde_json::to_vec(&SignMessage::Round3(msg))?,
            ));
        }
        self.stage = Stage::Round3;
        Ok(out)
    }

    fn ingest_round3(&mut self, frame: &Frame) -> Result<()> {
        self.expect_direct(frame)?;
        let msg = match decode_message(&frame.payload)? {
            SignMessage::Round3(m) => m,
            other => {
                return Err(Error::FrameForWrongRound {
                    expected: 3,
                    got: other.round(),
                })
            }
        };
        if msg.from != frame.from || msg.to != self.my_id {
            return Err(Error::FrameMalformed("round 3 addressing mismatch".into()));
        }
        if msg.final_sid != self.final_sid {
            return Err(Error::ProtocolAbort("session id mismatch".into()));
        }
        if self.r3.contains_key(&frame.from) {
            return Err(Error::FrameDuplicate(frame.from));
        }
        self.r3.insert(frame.from, msg);
        Ok(())
    }

    fn close_round3(&mut self) -> Result<Vec<Frame>> {
        let mut beta_u = Scalar::ZERO;
        let mut beta_v = Scalar::ZERO;
        for (&peer, msg) in &self.r3 {
            let seed = self.pair_seed(peer)?;
            let (recv_k, recv_w) = self
                .receivers
                .get(&peer)
                .ok_or_else(|| Error::ProtocolAbort("missing OT receiver state".into()))?;
            let ctx_k = mta::MtaContext {
                final_sid: self.final_sid,
                pair_seed: seed,
                sender: peer,
                receiver: self.my_id,
                label: LABEL_MTA_K,
            };
            beta_u += recv_k.receive(&msg.pads_k, &ctx_k)?;
            let ctx_w = mta::MtaContext {
                final_sid: self.final_sid,
                pair_seed: seed,
                sender: peer,
                receiver: self.my_id,
                label: LABEL_MTA_W,
            };
            beta_v += recv_w.receive(&msg.pads_w, &ctx_w)?;
        }
        self.u_share = self.phi_i * self.k_i + self.alpha_u + beta_u;
        self.x_share = self.phi_i * self.w_i + self.alpha_v + beta_v;
        self.stage = Stage::Ready;
        debug!(party_id = self.my_id, "pre-signature complete");
        Ok(Vec::new())
    }

    fn ingest_online(&mut self, frame: &Frame) -> Result<()> {
        if frame.from == self.my_id {
            return Err(Error::FrameMalformed("frame from self".into()));
        }
        if !self.cohort.contains(&frame.from) {
            return Err(Error::FrameFromUnknownParty(frame.from));
        }
        let msg = match decode_message(&frame.payload)? {
            SignMessage::Online(m) => m,
            other => {
                return Err(Error::FrameForWrongRound {
                    expected: 4,
                    got: other.round(),
                })
            }
        };
        if !frame.is_broadcast() {
            return Err(Error::FrameMalformed(
                "online round expects broadcasts".into(),
            ));
        }
        if msg.party_id != frame.from {
            return Err(Error::FrameMalformed("sender id mismatch".into()));
        }
        if msg.final_sid != self.final_sid {
            return Err(Error::ProtocolAbort("session id mismatch".into()));
        }
        if self.online.contains_key(&frame.from) {
            return Err(Error::FrameDuplicate(frame.from));
        }
        self.online.insert(frame.from, msg);
        Ok(())
    }

    fn expect_direct(&self, frame: &Frame) -> Result<()> {
        if frame.from == self.my_id {
            return Err(Error::FrameMalformed("frame from self".into()));
        }
        if !self.cohort.contains(&frame.from) {
            return Err(Error::FrameFromUnknownParty(frame.from));
        }
        if frame.to != Some(self.my_id) {
            return Err(Error::FrameMalformed(
                "expected a point-to-point frame addressed to this party".into(),
            ));
        }
        Ok(())
    }

    fn pair_seed(&self, peer: PartyId) -> Result<[u8; 32]> {
        self.ot_seeds
            .get(&peer)
            .copied()
            .ok_or_else(|| Error::ProtocolAbort(format!("no pairwise seed for party {peer}")))
    }
}

impl Drop for SignSession {
    fn drop(&mut self) {
        self.wipe_all();
    }
}

fn decode_message(payload: &[u8]) -> Result<SignMessage> {
    serde_json::from_slice(payload).map_err(|e| Error::FrameMalformed(e.to_string()))
}

fn instance_commitment(party_id: PartyId, big_r: &[u8], blind: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DOM_R_COMMIT);
    hasher.update(party_id.to_be_bytes());
    hasher.update(big_r);
    hasher.update(blind);
    hasher.finalize().into()
}

fn reduce_bytes(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&(*bytes).into())
}

/// Lagrange coefficient at zero for one party over the signing cohort
fn lagrange_at_zero(id: PartyId, cohort: &BTreeSet<PartyId>) -> Scalar {
    let xi = Scalar::from(share_coordinate(id));
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for &j in cohort {
        if j == id {
            continue;
        }
        let xj = Scalar::from(share_coordinate(j));
        numerator *= xj;
        denominator *= xj - xi;
    }
    numerator * denominator.invert().unwrap_or(Scalar::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lagrange_reconstructs_a_line() {
        // f(x) = 3 + 4x over parties {0, 2}: shares f(1), f(3)
        let f = |x: u64| Scalar::from(3u64) + Scalar::from(4u64) * Scalar::from(x);
        let cohort: BTreeSet<PartyId> = [0, 2].into_iter().collect();
        let secret = lagrange_at_zero(0, &cohort) * f(1) + lagrange_at_zero(2, &cohort) * f(3);
        assert_eq!(secret, Scalar::from(3u64));
    }

    #[test]
    fn lagrange_handles_sparse_ids() {
        let f = |x: u64| Scalar::from(7u64) + Scalar::from(11u64) * Scalar::from(x);
        let cohort: BTreeSet<PartyId> = [2, 5].into_iter().collect();
        let secret = lagrange_at_zero(2, &cohort) * f(3) + lagrange_at_zero(5, &cohort) * f(6);
        assert_eq!(secret, Scalar::from(7u64));
    }

    #[test]
    fn instance_commitment_binds_sender_and_point() {
        let blind = [3u8; 32];
        let a = instance_commitment(0, &[2u8; 33], &blind);
        let b = instance_commitment(1, &[2u8; 33], &blind);
        let c = instance_commitment(0, &[3u8; 33], &blind);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
