//! Error types for the RLN engine and its proving backends.

use thiserror::Error;

use crate::types::MembershipIndex;

/// Failure inside a proving backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The circuit could not be laid out or keys could not be derived.
    #[error("circuit synthesis failed: {0}")]
    Synthesis(String),

    /// Proof creation failed.
    #[error("prover error: {0}")]
    Prover(String),

    /// The verifier could not run (as opposed to rejecting a proof).
    #[error("verifier error: {0}")]
    Verifier(String),

    /// The backend section of the parameter blob is unusable.
    #[error("invalid backend parameters: {0}")]
    Parameters(String),
}

/// Errors surfaced by tree mutation, key generation, proof generation and
/// engine construction.
///
/// Proof *verification* never produces one of these: an invalid proof is
/// reported as `false`.
#[derive(Error, Debug)]
pub enum RlnError {
    #[error("membership tree is full (capacity {capacity})")]
    CapacityExceeded { capacity: u64 },

    #[error("membership index {index} is out of range (capacity {capacity})")]
    IndexOutOfRange {
        index: MembershipIndex,
        capacity: u64,
    },

    #[error("identity commitment equals the empty leaf value")]
    EmptyCommitment,

    #[error("leaf at index {index} does not match the supplied identity commitment")]
    MembershipMismatch { index: MembershipIndex },

    #[error("proving backend error: {0}")]
    ProvingBackend(#[from] BackendError),

    #[error("engine construction failed: {0}")]
    Construction(String),

    #[error("random source failure: {0}")]
    RandomSource(String),

    #[error("proof generation was cancelled")]
    Cancelled,

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

pub type Result<T> = std::result::Result<T, RlnError>;
