//! Error types for wallet core operations

use crate::types::PartyId;
use thiserror::Error;

/// Result type alias for wallet core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during keygen, signing and recovery
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid threshold configuration
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A party id appears more than once
    #[error("Duplicate party id: {0}")]
    PartyIdDuplicate(PartyId),

    /// A party id is not part of the session
    #[error("Unknown party id: {0}")]
    PartyIdUnknown(PartyId),

    /// A frame could not be decoded
    #[error("Malformed frame: {0}")]
    FrameMalformed(String),

    /// A frame arrived from a sender outside the session
    #[error("Frame from unknown party: {0}")]
    FrameFromUnknownParty(PartyId),

    /// A frame carries a message for a different round
    #[error("Frame for wrong round: expected {expected}, got {got}")]
    FrameForWrongRound { expected: u8, got: u8 },

    /// A second frame from the same sender within one round
    #[error("Duplicate frame from party {0}")]
    FrameDuplicate(PartyId),

    /// Bytes do not encode a point on secp256k1
    #[error("Invalid curve point encoding")]
    PointInvalid,

    /// A field operation received an out-of-domain input
    #[error("Invalid field element")]
    FieldInvalid,

    /// Bytes do not encode a canonical scalar
    #[error("Scalar out of range")]
    ScalarOutOfRange,

    /// A revealed value does not match its commitment
    #[error("Commitment mismatch for party {0}")]
    CommitmentMismatch(PartyId),

    /// A protocol integrity check failed; the session is dead
    #[error("Protocol abort: {0}")]
    ProtocolAbort(String),

    /// The session already produced its one-shot output
    #[error("Session already spent")]
    SessionSpent,

    /// The session has not reached the required round
    #[error("Session not ready: {0}")]
    SessionNotReady(String),

    /// Signing digests must be exactly 32 bytes
    #[error("Invalid digest length: {0}")]
    DigestLengthInvalid(usize),

    /// Only the identity derivation path is supported
    #[error("Unsupported derivation path: {0}")]
    DerivationUnsupported(String),

    /// Old and new keyshares do not belong to the same rotation
    #[error("Rotation mismatch between keyshares")]
    RotationMismatch,

    /// Neither recovery id candidate matches the expected public key
    #[error("Recovery id resolution failed")]
    RecoveryFailed,
}

impl Error {
    /// Whether this error poisons the session it was raised in
    ///
    /// Frame, crypto and protocol failures kill the session; lifecycle and
    /// configuration mistakes leave it usable so the caller can correct the
    /// call.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::FrameMalformed(_)
                | Error::FrameFromUnknownParty(_)
                | Error::FrameForWrongRound { .. }
                | Error::FrameDuplicate(_)
                | Error::PointInvalid
                | Error::FieldInvalid
                | Error::ScalarOutOfRange
                | Error::CommitmentMismatch(_)
                | Error::ProtocolAbort(_)
                | Error::RotationMismatch
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::FrameMalformed(e.to_string())
    }
}
