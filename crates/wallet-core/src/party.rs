//! Party façade over the keygen and signing sessions
//!
//! An embedder constructs one `Party` per logical participant. A party owns
//! either a keygen session or a signing session at a time; per round it is
//! handed the frames inbound to it and returns the frames it must send out.
//! After the terminal round it produces either a [`Keyshare`] or a
//! [`Signature`], the latter with its recovery id already resolved.

use tracing::instrument;

use crate::keygen::{ChainCodeCommitment, KeygenSession, RoundCommitments};
use crate::recover::resolve_recovery_id;
use crate::sign::SignSession;
use crate::types::{Keyshare, PartyId, Signature};
use crate::wire::Frame;
use crate::{Error, Result};

enum Engine {
    Idle,
    Keygen(KeygenSession),
    Sign(SignSession),
}

/// One logical participant, owning at most one session at a time
pub struct Party {
    id: PartyId,
    engine: Engine,
    pending_digest: Option<[u8; 32]>,
}

impl Party {
    /// Start a fresh keygen
    #[instrument(name = "party_keygen")]
    pub fn new_keygen(n_parties: usize, threshold: usize, my_id: PartyId) -> Result<Self> {
        Ok(Self {
            id: my_id,
            engine: Engine::Keygen(KeygenSession::new(n_parties, threshold, my_id)?),
            pending_digest: None,
        })
    }

    /// Start a rotation keygen bound to an existing keyshare
    #[instrument(name = "party_rotation", skip(share))]
    pub fn new_rotation(share: &Keyshare) -> Result<Self> {
        Ok(Self {
            id: share.party_id,
            engine: Engine::Keygen(KeygenSession::new_rotation(share)?),
            pending_digest: None,
        })
    }

    /// Start a signing session, consuming the keyshare
    #[instrument(name = "party_sign", skip(share))]
    pub fn new_sign(share: Keyshare, derivation_path: &str) -> Result<Self> {
        let id = share.party_id;
        Ok(Self {
            id,
            engine: Engine::Sign(SignSession::new(share, derivation_path)?),
            pending_digest: None,
        })
    }

    /// This party's id
    pub fn id(&self) -> PartyId {
        self.id
    }

    /// Emit the session's round 1 broadcast
    pub fn first_message(&mut self) -> Result<Frame> {
        match &mut self.engine {
            Engine::Keygen(session) => session.first_message(),
            Engine::Sign(session) => session.first_message(),
            Engine::Idle => Err(Error::SessionNotReady("no active session".into())),
        }
    }

    /// Feed inbound frames and collect the next outbound batch
    pub fn handle(&mut self, frames: &[Frame]) -> Result<Vec<Frame>> {
        match &mut self.engine {
            Engine::Keygen(session) => session.handle(frames),
            Engine::Sign(session) => session.handle(frames),
            Engine::Idle => Err(Error::SessionNotReady("no active session".into())),
        }
    }

    /// The keygen chain code commitment, between rounds 2 and 3
    pub fn chain_code_commitment(&mut self) -> Result<ChainCodeCommitment> {
        match &mut self.engine {
            Engine::Keygen(session) => session.chain_code_commitment(),
            _ => Err(Error::SessionNotReady("not a keygen session".into())),
        }
    }

    /// Feed the keygen round 2 frames with the collected commitments
    pub fn handle_with_commitments(
        &mut self,
        frames: &[Frame],
        commitments: RoundCommitments,
    ) -> Result<Vec<Frame>> {
        match &mut self.engine {
            Engine::Keygen(session) => session.handle_with_commitments(frames, commitments),
            _ => Err(Error::SessionNotReady("not a keygen session".into())),
        }
    }

    /// Take the finished keyshare, ending the keygen session
    pub fn take_keyshare(&mut self) -> Result<Keyshare> {
        match &self.engine {
            Engine::Keygen(session) if session.is_complete() => {}
            Engine::Keygen(_) => {
                return Err(Error::SessionNotReady(
                    "keygen rounds have not completed".into(),
                ))
            }
            _ => return Err(Error::SessionNotReady("not a keygen session".into())),
        }
        let Engine::Keygen(session) = std::mem::replace(&mut self.engine, Engine::Idle) else {
            unreachable!("engine kind checked above");
        };
        session.finalize()
    }

    /// Emit the signing online message for a 32-byte digest
    pub fn last_message(&mut self, digest: &[u8]) -> Result<Frame> {
        match &mut self.engine {
            Engine::Sign(session) => {
                let frame = session.last_message(digest)?;
                // Length was validated by the session
                self.pending_digest = digest.try_into().ok();
                Ok(frame)
            }
            _ => Err(Error::SessionNotReady("not a signing session".into())),
        }
    }

    /// Combine the peers' online messages into the raw scalar pair
    pub fn combine(&mut self, frames: &[Frame]) -> Result<([u8; 32], [u8; 32])> {
        match &mut self.engine {
            Engine::Sign(session) => session.combine(frames),
            _ => Err(Error::SessionNotReady("not a signing session".into())),
        }
    }

    /// Combine and resolve the recovery id in one step
    pub fn combine_signature(&mut self, frames: &[Frame]) -> Result<Signature> {
        let Engine::Sign(session) = &mut self.engine else {
            return Err(Error::SessionNotReady("not a signing session".into()));
        };
        let public_key = session.public_key().to_vec();
        let (r, s) = session.combine(frames)?;
        let digest = self
            .pending_digest
            .ok_or_else(|| Error::SessionNotReady("no digest recorded".into()))?;
        let v = resolve_recovery_id(&r, &s, &digest, &public_key)?;
        Ok(Signature::new(r, s, v))
    }
}

impl std::fmt::Debug for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let engine = match &self.engine {
            Engine::Idle => "idle",
            Engine::Keygen(_) => "keygen",
            Engine::Sign(_) => "sign",
        };
        f.debug_struct("Party")
            .field("id", &self.id)
            .field("engine", &engine)
            .finish()
    }
}
