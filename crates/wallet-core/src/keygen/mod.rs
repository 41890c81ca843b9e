//! Distributed key generation
//!
//! Four-round commit-reveal keygen producing one [`Keyshare`] per party.
//! Round 1 broadcasts a session id contribution and a hash commitment to the
//! party's Feldman coefficient vector. Round 2 reveals the vector and deals
//! Shamir shares point-to-point, together with pairwise OT seed halves.
//! Chain code commitments are produced between rounds 2 and 3 and fed back
//! as an explicit [`RoundCommitments`] argument, so they cannot be supplied
//! in any other round. Round 3 reveals the chain codes, round 4 confirms
//! that everyone derived the same public key.
//!
//! A rotation session runs the same four rounds with zero-constant
//! polynomials: shares change, the public key and chain code do not.

mod messages;

pub use messages::*;

use std::collections::{BTreeMap, BTreeSet};

use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce, Field},
    ProjectivePoint, Scalar,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::types::{
    decode_point, encode_point, share_coordinate, validate_threshold, Keyshare, ThresholdConfig,
};
use crate::wire::Frame;
use crate::{Error, PartyId, Result};

const DOM_SID: &[u8] = b"wallet-core/keygen/session-id/v1";
const DOM_VSS: &[u8] = b"wallet-core/keygen/vss-commit/v1";
const DOM_CC_COMMIT: &[u8] = b"wallet-core/keygen/chain-code-commit/v1";
const DOM_CC: &[u8] = b"wallet-core/keygen/chain-code/v1";
const DOM_OT_SEED: &[u8] = b"wallet-core/keygen/ot-seed/v1";
const DOM_KEY_ID: &[u8] = b"wallet-core/keygen/key-id/v1";

/// One party's hash commitment to its chain code contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCodeCommitment {
    /// Committing party
    pub party_id: PartyId,
    /// SHA-256 over the contribution and its salt
    pub hash: [u8; 32],
}

/// The collected round 2 chain code commitments, keyed by party id
///
/// Ids are not assumed contiguous; lookups go through the id, never a
/// position.
#[derive(Debug, Clone)]
pub struct RoundCommitments {
    by_id: BTreeMap<PartyId, [u8; 32]>,
}

impl RoundCommitments {
    /// Collect commitments, rejecting duplicate ids
    pub fn new(items: impl IntoIterator<Item = ChainCodeCommitment>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for item in items {
            if by_id.insert(item.party_id, item.hash).is_some() {
                return Err(Error::PartyIdDuplicate(item.party_id));
            }
        }
        Ok(Self { by_id })
    }

    /// Look up one party's commitment
    pub fn get(&self, id: PartyId) -> Option<&[u8; 32]> {
        self.by_id.get(&id)
    }

    /// The committing party ids
    pub fn ids(&self) -> impl Iterator<Item = PartyId> + '_ {
        self.by_id.keys().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Round1,
    Round2,
    Round3,
    Round4,
    Complete,
    Poisoned,
}

/// Base material a rotation session refreshes
struct RotationBase {
    secret_share: Scalar,
    public_key: Vec<u8>,
    public_shares: BTreeMap<PartyId, Vec<u8>>,
    chain_code: [u8; 32],
    key_id: [u8; 32],
    ids: Vec<PartyId>,
}

/// One party's view of one in-progress keygen
pub struct KeygenSession {
    n: usize,
    t: usize,
    my_id: PartyId,
    stage: Stage,
    first_sent: bool,

    sid_contrib: [u8; 32],
    poly: Vec<Scalar>,
    vss_points: Vec<Vec<u8>>,
    rho: [u8; 32],
    chain_code_mine: [u8; 32],
    cc_salt: [u8; 32],
    cc_commitment_taken: bool,

    pair_seeds_sent: BTreeMap<PartyId, [u8; 32]>,
    r1: BTreeMap<PartyId, KeygenMsg1>,
    r2: BTreeMap<PartyId, KeygenMsg2>,
    r3: BTreeMap<PartyId, KeygenMsg3>,
    r4: BTreeMap<PartyId, KeygenMsg4>,
    commitments: Option<RoundCommitments>,

    cohort: BTreeSet<PartyId>,
    final_sid: [u8; 32],
    secret_share: Scalar,
    public_key: Vec<u8>,
    public_shares: BTreeMap<PartyId, Vec<u8>>,
    chain_code_final: [u8; 32],

    rotation: Option<RotationBase>,
}

impl KeygenSession {
    /// Construct a fresh keygen session
    pub fn new(n_parties: usize, threshold: usize, my_id: PartyId) -> Result<Self> {
        validate_threshold(n_parties, threshold)?;
        Ok(Self::sample(n_parties, threshold, my_id, None))
    }

    /// Construct a rotation session bound to an existing keyshare
    ///
    /// The dealt polynomial has a zero constant term, so the refreshed
    /// shares reconstruct the same secret and the public key is unchanged.
    pub fn new_rotation(share: &Keyshare) -> Result<Self> {
        let config = &share.config;
        let base = RotationBase {
            secret_share: share.secret_share,
            public_key: share.public_key.clone(),
            public_shares: share.public_shares.clone(),
            chain_code: share.chain_code,
            key_id: share.key_id,
            ids: config.party_ids.clone(),
        };
        Ok(Self::sample(
            config.n_parties,
            config.threshold,
            share.party_id,
            Some(base),
        ))
    }

    fn sample(n: usize, t: usize, my_id: PartyId, rotation: Option<RotationBase>) -> Self {
        let mut rng = OsRng;
        let mut poly = Vec::with_capacity(t);
        for k in 0..t {
            if k == 0 && rotation.is_some() {
                poly.push(Scalar::ZERO);
            } else {
                poly.push(Scalar::random(&mut rng));
            }
        }
        let vss_points: Vec<Vec<u8>> = poly
            .iter()
            .map(|coef| encode_point(&(ProjectivePoint::GENERATOR * coef)))
            .collect();
        let rho: [u8; 32] = rand::random();
        let sid_contrib: [u8; 32] = rand::random();
        let chain_code_mine: [u8; 32] = rand::random();
        let cc_salt: [u8; 32] = rand::random();

        Self {
            n,
            t,
            my_id,
            stage: Stage::Round1,
            first_sent: false,
            sid_contrib,
            poly,
            vss_points,
            rho,
            chain_code_mine,
            cc_salt,
            cc_commitment_taken: false,
            pair_seeds_sent: BTreeMap::new(),
            r1: BTreeMap::new(),
            r2: BTreeMap::new(),
            r3: BTreeMap::new(),
            r4: BTreeMap::new(),
            commitments: None,
            cohort: BTreeSet::new(),
            final_sid: [0u8; 32],
            secret_share: Scalar::ZERO,
            public_key: Vec::new(),
            public_shares: BTreeMap::new(),
            chain_code_final: [0u8; 32],
            rotation,
        }
    }

    /// This party's id
    pub fn party_id(&self) -> PartyId {
        self.my_id
    }

    /// The round currently being collected, 1 through 4
    pub fn round(&self) -> u8 {
        match self.stage {
            Stage::Round1 => 1,
            Stage::Round2 => 2,
            Stage::Round3 => 3,
            Stage::Round4 => 4,
            Stage::Complete | Stage::Poisoned => 5,
        }
    }

    /// Whether all four rounds have closed
    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    /// Emit the round 1 broadcast
    pub fn first_message(&mut self) -> Result<Frame> {
        self.check_alive()?;
        if self.first_sent {
            return Err(Error::SessionNotReady(
                "round 1 message already emitted".into(),
            ));
        }
        self.first_sent = true;
        let msg = KeygenMsg1 {
            party_id: self.my_id,
            sid_contrib: self.sid_contrib,
            vss_commitment: vss_commitment(self.my_id, &self.vss_points, &self.rho),
        };
        debug!(party_id = self.my_id, "keygen round 1 broadcast");
        Ok(Frame::broadcast(
            self.my_id,
            serde_json::to_vec(&KeygenMessage::Round1(msg))?,
        ))
    }

    /// The chain code commitment, produced between rounds 2 and 3
    ///
    /// Callable exactly once, after round 1 has closed.
    pub fn chain_code_commitment(&mut self) -> Result<ChainCodeCommitment> {
        self.check_alive()?;
        if self.cohort.is_empty() {
            return Err(Error::SessionNotReady(
                "chain code commitment requires round 1 to close".into(),
            ));
        }
        if self.cc_commitment_taken {
            return Err(Error::SessionNotReady(
                "chain code commitment already produced".into(),
            ));
        }
        self.cc_commitment_taken = true;
        Ok(ChainCodeCommitment {
            party_id: self.my_id,
            hash: cc_commitment(self.my_id, &self.chain_code_mine, &self.cc_salt),
        })
    }

    /// Consume inbound frames for the current round and emit the next batch
    ///
    /// Returns an empty batch while the round's expected set is incomplete.
    /// The round 2 transition requires [`Self::handle_with_commitments`].
    pub fn handle(&mut self, frames: &[Frame]) -> Result<Vec<Frame>> {
        self.check_alive()?;
        let result = self.handle_inner(frames);
        self.poison_on_fatal(&result);
        result
    }

    /// Consume the round 2 frames together with the chain code commitments
    pub fn handle_with_commitments(
        &mut self,
        frames: &[Frame],
        commitments: RoundCommitments,
    ) -> Result<Vec<Frame>> {
        self.check_alive()?;
        if self.stage != Stage::Round2 {
            return Err(Error::SessionNotReady(
                "commitments are consumed only at the round 2 transition".into(),
            ));
        }
        let result = self
            .accept_commitments(commitments)
            .and_then(|_| self.handle_inner(frames));
        self.poison_on_fatal(&result);
        result
    }

    /// Produce the keyshare after round 4, destroying the session
    pub fn finalize(self) -> Result<Keyshare> {
        if self.stage != Stage::Complete {
            return Err(Error::SessionNotReady(
                "finalize requires all four rounds to close".into(),
            ));
        }
        let ids: Vec<PartyId> = self.cohort.iter().copied().collect();
        let config = ThresholdConfig::new(self.n, self.t, ids)?;

        let mut ot_seeds = BTreeMap::new();
        for (&peer, msg) in &self.r2 {
            let mine = self
                .pair_seeds_sent
                .get(&peer)
                .ok_or_else(|| Error::ProtocolAbort("missing pairwise seed".into()))?;
            let (low, high) = if self.my_id < peer {
                (mine, &msg.pair_seed)
            } else {
                (&msg.pair_seed, mine)
            };
            let mut hasher = Sha256::new();
            hasher.update(DOM_OT_SEED);
            hasher.update(self.final_sid);
            hasher.update(low);
            hasher.update(high);
            ot_seeds.insert(peer, hasher.finalize().into());
        }

        let mut hasher = Sha256::new();
        hasher.update(DOM_KEY_ID);
        hasher.update(&self.public_key);
        hasher.update(self.chain_code_final);
        hasher.update(self.final_sid);
        let key_id: [u8; 32] = hasher.finalize().into();

        info!(
            party_id = self.my_id,
            public_key = hex::encode(&self.public_key),
            key_id = hex::encode(key_id),
            rotation = self.rotation.is_some(),
            "keygen complete"
        );

        Ok(Keyshare {
            party_id: self.my_id,
            config,
            secret_share: self.secret_share,
            public_key: self.public_key.clone(),
            public_shares: self.public_shares.clone(),
            chain_code: self.chain_code_final,
            key_id,
            ot_seeds,
            rotated_from: self.rotation.as_ref().map(|base| base.key_id),
        })
    }

    fn check_alive(&self) -> Result<()> {
        if self.stage == Stage::Poisoned {
            return Err(Error::ProtocolAbort("session is poisoned".into()));
        }
        Ok(())
    }

    fn poison_on_fatal(&mut self, result: &Result<Vec<Frame>>) {
        if let Err(err) = result {
            if err.is_fatal() {
                self.stage = Stage::Poisoned;
                self.wipe();
            }
        }
    }

    fn wipe(&mut self) {
        for coef in &mut self.poly {
            *coef = Scalar::ZERO;
        }
        self.secret_share = Scalar::ZERO;
        if let Some(base) = &mut self.rotation {
            base.secret_share = Scalar::ZERO;
        }
        self.r2.clear();
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
                if self.r1.len() < self.n - 1 {
                    return Ok(Vec::new());
                }
                self.close_round1()
            }
            Stage::Round2 => {
                for frame in frames {
                    self.ingest_round2(frame)?;
                }
                if self.r2.len() < self.n - 1 {
                    return Ok(Vec::new());
                }
                if self.commitments.is_none() {
                    // Frames stay buffered; closing this round needs the
                    // chain code commitments argument.
                    return Err(Error::SessionNotReady(
                        "round 3 requires the chain code commitments".into(),
                    ));
                }
                self.close_round2()
            }
            Stage::Round3 => {
                for frame in frames {
                    self.ingest_round3(frame)?;
                }
                if self.r3.len() < self.n - 1 {
                    return Ok(Vec::new());
                }
                self.close_round3()
            }
            Stage::Round4 => {
                for frame in frames {
                    self.ingest_round4(frame)?;
                }
                if self.r4.len() < self.n - 1 {
                    return Ok(Vec::new());
                }
                self.close_round4()
            }
            Stage::Complete => Err(Error::SessionNotReady(
                "all rounds already closed; call finalize".into(),
            )),
            Stage::Poisoned => Err(Error::ProtocolAbort("session is poisoned".into())),
        }
    }

    fn ingest_round1(&mut self, frame: &Frame) -> Result<()> {
        if frame.from == self.my_id {
            return Err(Error::FrameMalformed("frame from self".into()));
        }
        let msg = match decode_message(&frame.payload)? {
            KeygenMessage::Round1(m) => m,
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
        if let Some(base) = &self.rotation {
            if !base.ids.contains(&frame.from) {
                return Err(Error::FrameFromUnknownParty(frame.from));
            }
        }
        if self.r1.contains_key(&frame.from) {
            return Err(Error::FrameDuplicate(frame.from));
        }
        if self.r1.len() >= self.n - 1 {
            return Err(Error::ProtocolAbort(
                "more round 1 senders than configured parties".into(),
            ));
        }
        self.r1.insert(frame.from, msg);
        Ok(())
    }

    fn close_round1(&mut self) -> Result<Vec<Frame>> {
        let mut cohort: BTreeSet<PartyId> = self.r1.keys().copied().collect();
        cohort.insert(self.my_id);
        debug!(party_id = self.my_id, cohort = ?cohort, "keygen round 1 closed");

        let mut hasher = Sha256::new();
        hasher.update(DOM_SID);
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
        self.cohort = cohort;

        let mut out = Vec::with_capacity(self.n - 1);
        let peers: Vec<PartyId> = self
            .cohort
            .iter()
            .copied()
            .filter(|&id| id != self.my_id)
            .collect();
        for peer in peers {
            let share = eval_poly(&self.poly, share_coordinate(peer));
            let pair_seed: [u8; 32] = rand::random();
            self.pair_seeds_sent.insert(peer, pair_seed);
            let msg = KeygenMsg2 {
                from: self.my_id,
                to: peer,
                vss_points: self.vss_points.clone(),
                rho: self.rho,
                share: share.to_bytes().to_vec(),
                pair_seed,
            };
            out.push(Frame::direct(
                self.my_id,
                peer,
                serde_json::to_vec(&KeygenMessage::Round2(msg))?,
            ));
        }
        self.stage = Stage::Round2;
        Ok(out)
    }

    fn accept_commitments(&mut self, commitments: RoundCommitments) -> Result<()> {
        if self.commitments.is_some() {
            return Err(Error::SessionNotReady(
                "chain code commitments already supplied".into(),
            ));
        }
        if !self.cc_commitment_taken {
            return Err(Error::SessionNotReady(
                "own chain code commitment has not been produced".into(),
            ));
        }
        for id in commitments.ids() {
            if !self.cohort.contains(&id) {
                return Err(Error::PartyIdUnknown(id));
            }
        }
        for &id in &self.cohort {
            let Some(hash) = commitments.get(id) else {
                return Err(Error::ConfigInvalid(format!(
                    "missing chain code commitment for party {id}"
                )));
            };
            if id == self.my_id
                && *hash != cc_commitment(self.my_id, &self.chain_code_mine, &self.cc_salt)
            {
                return Err(Error::CommitmentMismatch(self.my_id));
            }
        }
        self.commitments = Some(commitments);
        Ok(())
    }

    fn ingest_round2(&mut self, frame: &Frame) -> Result<()> {
        self.expect_direct(frame)?;
        let msg = match decode_message(&frame.payload)? {
            KeygenMessage::Round2(m) => m,
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
        if self.r2.contains_key(&frame.from) {
            return Err(Error::FrameDuplicate(frame.from));
        }
        self.r2.insert(frame.from, msg);
        Ok(())
    }

    fn close_round2(&mut self) -> Result<Vec<Frame>> {
        let my_x = share_coordinate(self.my_id);
        let mut secret = eval_poly(&self.poly, my_x);
        let mut vss_by_id: BTreeMap<PartyId, Vec<ProjectivePoint>> = BTreeMap::new();

        let my_points = decode_vss_points(&self.vss_points)?;
        vss_by_id.insert(self.my_id, my_points);

        for (&peer, msg) in &self.r2 {
            let expected = self.r1[&peer].vss_commitment;
            if vss_commitment(peer, &msg.vss_points, &msg.rho) != expected {
                return Err(Error::CommitmentMismatch(peer));
            }
            if msg.vss_points.len() != self.t {
                return Err(Error::ProtocolAbort(format!(
                    "party {peer} dealt a polynomial of the wrong degree"
                )));
            }
            let points = decode_vss_points(&msg.vss_points)?;
            if self.rotation.is_some() && points[0] != ProjectivePoint::IDENTITY {
                return Err(Error::ProtocolAbort(format!(
                    "party {peer} dealt a non-zero constant during rotation"
                )));
            }
            let share = scalar_from_bytes(&msg.share)?;
            if ProjectivePoint::GENERATOR * share != eval_commitments(&points, my_x) {
                return Err(Error::ProtocolAbort(format!(
                    "share from party {peer} does not match its commitments"
                )));
            }
            secret += share;
            vss_by_id.insert(peer, points);
        }

        // Shared public key: sum of the dealt constant terms. For rotation
        // the constants sum to the identity and the key carries over.
        let mut dealt_constant = ProjectivePoint::IDENTITY;
        for points in vss_by_id.values() {
            dealt_constant += points[0];
        }
        let (public_key, base_shares) = match &self.rotation {
            Some(base) => {
                if dealt_constant != ProjectivePoint::IDENTITY {
                    return Err(Error::ProtocolAbort(
                        "rotation constants do not cancel".into(),
                    ));
                }
                secret += base.secret_share;
                (base.public_key.clone(), Some(&base.public_shares))
            }
            None => (encode_point(&dealt_constant), None),
        };

        let mut public_shares = BTreeMap::new();
        for &id in &self.cohort {
            let x = share_coordinate(id);
            let mut acc = match base_shares {
                Some(shares) => {
                    let bytes = shares
                        .get(&id)
                        .ok_or_else(|| Error::ProtocolAbort("missing base public share".into()))?;
                    decode_point(bytes)?
                }
                None => ProjectivePoint::IDENTITY,
            };
            for points in vss_by_id.values() {
                acc += eval_commitments(points, x);
            }
            public_shares.insert(id, encode_point(&acc));
        }

        self.secret_share = secret;
        self.public_key = public_key;
        self.public_shares = public_shares;
        debug!(party_id = self.my_id, "keygen round 2 closed");

        let mut out = Vec::with_capacity(self.n - 1);
        for &peer in self.cohort.iter().filter(|&&id| id != self.my_id) {
            let msg = KeygenMsg3 {
                party_id: self.my_id,
                chain_code: self.chain_code_mine,
                salt: self.cc_salt,
            };
            out.push(Frame::direct(
                self.my_id,
                peer,
                serde_json::to_vec(&KeygenMessage::Round3(msg))?,
            ));
        }
        self.stage = Stage::Round3;
        Ok(out)
    }

    fn ingest_round3(&mut self, frame: &Frame) -> Result<()> {
        self.expect_direct(frame)?;
        let msg = match decode_message(&frame.payload)? {
            KeygenMessage::Round3(m) => m,
            other => {
                return Err(Error::FrameForWrongRound {
                    expected: 3,
                    got: other.round(),
                })
            }
        };
        if msg.party_id != frame.from {
            return Err(Error::FrameMalformed("sender id mismatch".into()));
        }
        if self.r3.contains_key(&frame.from) {
            return Err(Error::FrameDuplicate(frame.from));
        }
        self.r3.insert(frame.from, msg);
        Ok(())
    }

    fn close_round3(&mut self) -> Result<Vec<Frame>> {
        let commitments = self
            .commitments
            .as_ref()
            .ok_or_else(|| Error::SessionNotReady("commitments missing".into()))?;
        for (&peer, msg) in &self.r3 {
            let Some(expected) = commitments.get(peer) else {
                return Err(Error::PartyIdUnknown(peer));
            };
            if cc_commitment(peer, &msg.chain_code, &msg.salt) != *expected {
                return Err(Error::CommitmentMismatch(peer));
            }
        }

        self.chain_code_final = match &self.rotation {
            Some(base) => base.chain_code,
            None => {
                let mut hasher = Sha256::new();
                hasher.update(DOM_CC);
                hasher.update(self.final_sid);
                for &id in &self.cohort {
                    let cc = if id == self.my_id {
                        &self.chain_code_mine
                    } else {
                        &self.r3[&id].chain_code
                    };
                    hasher.update(cc);
                }
                hasher.finalize().into()
            }
        };
        debug!(party_id = self.my_id, "keygen round 3 closed");

        let msg = KeygenMsg4 {
            party_id: self.my_id,
            public_key: self.public_key.clone(),
            chain_code_digest: Sha256::digest(self.chain_code_final).into(),
        };
        self.stage = Stage::Round4;
        Ok(vec![Frame::broadcast(
            self.my_id,
            serde_json::to_vec(&KeygenMessage::Round4(msg))?,
        )])
    }

    fn ingest_round4(&mut self, frame: &Frame) -> Result<()> {
        if frame.from == self.my_id {
            return Err(Error::FrameMalformed("frame from self".into()));
        }
        if !self.cohort.contains(&frame.from) {
            return Err(Error::FrameFromUnknownParty(frame.from));
        }
        let msg = match decode_message(&frame.payload)? {
            KeygenMessage::Round4(m) => m,
            other => {
                return Err(Error::FrameForWrongRound {
                    expected: 4,
                    got: other.round(),
                })
            }
        };
        if !frame.is_broadcast() {
            return Err(Error::FrameMalformed("round 4 expects broadcasts".into()));
        }
        if msg.party_id != frame.from {
            return Err(Error::FrameMalformed("sender id mismatch".into()));
        }
        if self.r4.contains_key(&frame.from) {
            return Err(Error::FrameDuplicate(frame.from));
        }
        self.r4.insert(frame.from, msg);
        Ok(())
    }

    fn close_round4(&mut self) -> Result<Vec<Frame>> {
        let my_digest: [u8; 32] = Sha256::digest(self.chain_code_final).into();
        for (&peer, msg) in &self.r4 {
            if msg.public_key != self.public_key || msg.chain_code_digest != my_digest {
                return Err(Error::ProtocolAbort(format!(
                    "party {peer} derived a different keygen result"
                )));
            }
        }
        debug!(party_id = self.my_id, "keygen round 4 closed");
        self.stage = Stage::Complete;
        Ok(Vec::new())
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
}

impl Drop for KeygenSession {
    fn drop(&mut self) {
        self.wipe();
    }
}

fn decode_message(payload: &[u8]) -> Result<KeygenMessage> {
    serde_json::from_slice(payload).map_err(|e| Error::FrameMalformed(e.to_string()))
}

fn vss_commitment(party_id: PartyId, points: &[Vec<u8>], rho: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DOM_VSS);
    hasher.update(party_id.to_be_bytes());
    for point in points {
        hasher.update(point);
    }
    hasher.update(rho);
    hasher.finalize().into()
}

fn cc_commitment(party_id: PartyId, chain_code: &[u8; 32], salt: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DOM_CC_COMMIT);
    hasher.update(party_id.to_be_bytes());
    hasher.update(chain_code);
    hasher.update(salt);
    hasher.finalize().into()
}

fn decode_vss_points(points: &[Vec<u8>]) -> Result<Vec<ProjectivePoint>> {
    points.iter().map(|bytes| decode_point(bytes)).collect()
}

fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::FrameMalformed("invalid scalar length".into()))?;
    Ok(<Scalar as Reduce<U256>>::reduce_bytes(&array.into()))
}

/// Evaluate a polynomial at a point
fn eval_poly(coefficients: &[Scalar], x: u64) -> Scalar {
    let x_scalar = Scalar::from(x);
    let mut result = Scalar::ZERO;
    let mut x_power = Scalar::ONE;
    for coef in coefficients {
        result += *coef * x_power;
        x_power *= x_scalar;
    }
    result
}

/// Evaluate Feldman commitments at a point
fn eval_commitments(points: &[ProjectivePoint], x: u64) -> ProjectivePoint {
    let x_scalar = Scalar::from(x);
    let mut result = ProjectivePoint::IDENTITY;
    let mut x_power = Scalar::ONE;
    for point in points {
        result += *point * x_power;
        x_power *= x_scalar;
    }
    result
}
