//! Proving backend interface.
//!
//! The engine never touches constraint systems directly. It assembles a
//! [`Witness`], hands it to a [`ProvingBackend`] and later checks the
//! resulting [`ProofBlob`] against [`PublicInputs`]. Implementations must be
//! usable from many threads at once.

use pasta_curves::pallas;

use crate::epoch::Epoch;
use crate::error::BackendError;
use crate::merkle::AuthPath;
use crate::types::{IdKey, Proof, ProofBlob, Share};

/// Instance rows, in circuit order.
pub const ROOT_ROW: usize = 0;
pub const EPOCH_ROW: usize = 1;
pub const SHARE_X_ROW: usize = 2;
pub const SHARE_Y_ROW: usize = 3;
pub const NULLIFIER_ROW: usize = 4;
pub const PUBLIC_INPUT_COUNT: usize = 5;

/// Values a proof is checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicInputs {
    pub root: pallas::Base,
    pub epoch: Epoch,
    pub share_x: pallas::Base,
    pub share_y: pallas::Base,
    pub nullifier: pallas::Base,
}

impl PublicInputs {
    /// Instance column contents.
    #[must_use]
    pub fn to_vec(&self) -> Vec<pallas::Base> {
        let mut instance = vec![pallas::Base::zero(); PUBLIC_INPUT_COUNT];
        instance[ROOT_ROW] = self.root;
        instance[EPOCH_ROW] = self.epoch.to_field();
        instance[SHARE_X_ROW] = self.share_x;
        instance[SHARE_Y_ROW] = self.share_y;
        instance[NULLIFIER_ROW] = self.nullifier;
        instance
    }
}

impl From<&Proof> for PublicInputs {
    fn from(proof: &Proof) -> Self {
        Self {
            root: proof.merkle_root,
            epoch: proof.epoch,
            share_x: proof.share_x,
            share_y: proof.share_y,
            nullifier: proof.nullifier,
        }
    }
}

/// Everything the prover knows.
#[derive(Clone, Debug)]
pub struct Witness {
    pub id_key: IdKey,
    pub path: AuthPath,
    pub root: pallas::Base,
    pub epoch: Epoch,
    pub share: Share,
    pub nullifier: pallas::Base,
    /// Hash of the signed message; equal to `share.x` for honest witnesses.
    pub message_hash: pallas::Base,
}

impl Witness {
    #[must_use]
    pub fn public_inputs(&self) -> PublicInputs {
        PublicInputs {
            root: self.root,
            epoch: self.epoch,
            share_x: self.share.x,
            share_y: self.share.y,
            nullifier: self.nullifier,
        }
    }
}

/// A zero-knowledge proving system for the RLN relation.
///
/// The relation: the prover knows `id_key` and a path such that
/// `Poseidon(id_key)` with that path hashes to `root`,
/// `share_y == id_key + epoch * share_x`, and
/// `nullifier == Poseidon(id_key, epoch)`.
pub trait ProvingBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Tree depth the backend's circuit was built for.
    fn depth(&self) -> usize;

    /// Produces a proof for `witness`.
    fn prove(&self, witness: &Witness) -> Result<ProofBlob, BackendError>;

    /// Checks `blob` against `inputs`.
    ///
    /// `Ok(false)` means the proof is invalid; `Err` is reserved for the
    /// verifier itself being unable to run.
    fn verify(&self, blob: &ProofBlob, inputs: &PublicInputs) -> Result<bool, BackendError>;
}

/// Which [`ProvingBackend`] a parameter blob instantiates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BackendKind {
    Mock = 0,
    Halo2 = 1,
}

impl BackendKind {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Mock),
            1 => Some(Self::Halo2),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Halo2 => "halo2",
        }
    }
}
