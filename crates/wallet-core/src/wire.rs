//! Wire frames and routing between parties
//!
//! A frame is an opaque envelope: sender id, optional recipient id and the
//! payload bytes of one protocol message. The codec fixes only the transport
//! framing; payload bytes pass through untouched. Routing follows the pull
//! rules the engines assume: a party sees broadcasts from everyone else and
//! the point-to-point frames addressed to it, never its own frames.

use std::collections::{BTreeMap, BTreeSet};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::PartyId;
use crate::{Error, Result};

/// One message on the protocol wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Sender party id
    pub from: PartyId,
    /// Recipient party id; `None` means broadcast to all other parties
    pub to: Option<PartyId>,
    /// Opaque protocol payload
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a broadcast frame
    pub fn broadcast(from: PartyId, payload: Vec<u8>) -> Self {
        Self {
            from,
            to: None,
            payload,
        }
    }

    /// Create a point-to-point frame
    pub fn direct(from: PartyId, to: PartyId, payload: Vec<u8>) -> Self {
        Self {
            from,
            to: Some(to),
            payload,
        }
    }

    /// Whether this frame is a broadcast
    pub fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }

    /// Encode for a binary transport
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from a binary transport
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode for a string transport
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    /// Decode from a string transport
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| Error::FrameMalformed(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

/// Frame router for one session's party set
///
/// The router mirrors the selection rules the engines enforce internally,
/// so an embedder can fan a round's outbound batch back out to recipients.
#[derive(Debug, Clone)]
pub struct Router {
    parties: BTreeSet<PartyId>,
}

impl Router {
    /// Create a router over a distinct set of party ids
    pub fn new(parties: impl IntoIterator<Item = PartyId>) -> Result<Self> {
        let mut set = BTreeSet::new();
        for id in parties {
            if !set.insert(id) {
                return Err(Error::PartyIdDuplicate(id));
            }
        }
        if set.len() < 2 {
            return Err(Error::ConfigInvalid(
                "Router needs at least two parties".into(),
            ));
        }
        Ok(Self { parties: set })
    }

    /// The party ids this router serves
    pub fn parties(&self) -> impl Iterator<Item = PartyId> + '_ {
        self.parties.iter().copied()
    }

    /// Validate a frame's addressing against the party set
    pub fn validate(&self, frame: &Frame) -> Result<()> {
        if !self.parties.contains(&frame.from) {
            return Err(Error::FrameFromUnknownParty(frame.from));
        }
        if let Some(to) = frame.to {
            if to == frame.from {
                return Err(Error::FrameMalformed(
                    "frame addressed to its own sender".into(),
                ));
            }
            if !self.parties.contains(&to) {
                return Err(Error::PartyIdUnknown(to));
            }
        }
        Ok(())
    }

    /// Inbound frames for one party: broadcasts from others plus P2P frames
    /// addressed to it. Frames are cloned so each recipient owns its copy.
    pub fn inbound_for(&self, party: PartyId, frames: &[Frame]) -> Vec<Frame> {
        frames
            .iter()
            .filter(|f| f.from != party)
            .filter(|f| match f.to {
                None => true,
                Some(to) => to == party,
            })
            .cloned()
            .collect()
    }

    /// Dispatch one round's batch to every recipient
    ///
    /// Rejects duplicates (same sender, same payload) within the batch and
    /// validates addressing. Each recipient receives its own clones.
    pub fn dispatch(&self, frames: &[Frame]) -> Result<BTreeMap<PartyId, Vec<Frame>>> {
        let mut seen = BTreeSet::new();
        for frame in frames {
            self.validate(frame)?;
            if !seen.insert((frame.from, frame.to, payload_digest(frame))) {
                return Err(Error::FrameDuplicate(frame.from));
            }
        }
        let mut out = BTreeMap::new();
        for &party in &self.parties {
            out.insert(party, self.inbound_for(party, frames));
        }
        Ok(out)
    }
}

fn payload_digest(frame: &Frame) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(frame.from.to_be_bytes());
    hasher.update(&frame.payload);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trips() {
        let frame = Frame::direct(0, 2, vec![1, 2, 3]);
        assert_eq!(Frame::from_bytes(&frame.to_bytes().unwrap()).unwrap(), frame);
        assert_eq!(
            Frame::from_base64(&frame.to_base64().unwrap()).unwrap(),
            frame
        );
    }

    #[test]
    fn broadcast_selection_excludes_self() {
        let router = Router::new([0, 1, 2]).unwrap();
        let frames = vec![
            Frame::broadcast(0, vec![0xA0]),
            Frame::broadcast(1, vec![0xA1]),
        ];
        let inbound = router.inbound_for(0, &frames);
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].from, 1);
    }

    #[test]
    fn p2p_selection_matches_recipient() {
        let router = Router::new([0, 1, 2]).unwrap();
        let frames = vec![
            Frame::direct(0, 1, vec![1]),
            Frame::direct(0, 2, vec![2]),
            Frame::direct(1, 2, vec![3]),
        ];
        let to_two = router.inbound_for(2, &frames);
        assert_eq!(to_two.len(), 2);
        assert!(to_two.iter().all(|f| f.to == Some(2)));
    }

    #[test]
    fn dispatch_rejects_duplicates() {
        let router = Router::new([0, 1]).unwrap();
        let frames = vec![Frame::broadcast(0, vec![7]), Frame::broadcast(0, vec![7])];
        assert!(matches!(
            router.dispatch(&frames),
            Err(Error::FrameDuplicate(0))
        ));
    }

    #[test]
    fn validate_rejects_unknown_and_self_addressed() {
        let router = Router::new([0, 1]).unwrap();
        assert!(matches!(
            router.validate(&Frame::broadcast(9, vec![])),
            Err(Error::FrameFromUnknownParty(9))
        ));
        assert!(router.validate(&Frame::direct(0, 0, vec![])).is_err());
        assert!(matches!(
            router.validate(&Frame::direct(0, 9, vec![])),
            Err(Error::PartyIdUnknown(9))
        ));
    }

    #[test]
    fn router_rejects_duplicate_ids() {
        assert!(matches!(
            Router::new([0, 1, 1]),
            Err(Error::PartyIdDuplicate(1))
        ));
    }
}
