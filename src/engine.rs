//! The RLN proof engine.
//!
//! [`RlnEngine`] owns the membership tree, assembles witnesses for a proving
//! backend and checks proofs. The tree sits behind a reader/writer lock:
//! membership changes take the write side, while proof generation and
//! verification read the root and path under a single read guard, so a proof
//! is always built against a root that actually existed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use pasta_curves::pallas;

use crate::backend::{ProvingBackend, PublicInputs, Witness};
use crate::config::Config;
use crate::epoch::{diff, Epoch};
use crate::error::{Result, RlnError};
use crate::hash::hash_bytes;
use crate::keygen::generate_membership_key;
use crate::merkle::{AuthPath, MembershipTree};
use crate::params::Parameters;
use crate::share::{compute_nullifier, compute_share};
use crate::types::{IdCommitment, MembershipIndex, MembershipKeyPair, Proof};
use crate::utils::field_to_hex;

#[derive(Debug)]
struct TreeState {
    tree: MembershipTree,
    /// Roots replaced by recent mutations, newest first.
    previous_roots: VecDeque<pallas::Base>,
    history: usize,
}

impl TreeState {
    fn mutate<T>(&mut self, op: impl FnOnce(&mut MembershipTree) -> Result<T>) -> Result<T> {
        let before = self.tree.root();
        let out = op(&mut self.tree)?;
        if self.tree.root() != before && self.history > 1 {
            self.previous_roots.push_front(before);
            self.previous_roots.truncate(self.history - 1);
        }
        Ok(out)
    }

    fn accepts_root(&self, root: pallas::Base) -> bool {
        root == self.tree.root() || self.previous_roots.contains(&root)
    }
}

pub struct RlnEngine {
    config: Config,
    backend: Arc<dyn ProvingBackend>,
    state: RwLock<TreeState>,
}

impl std::fmt::Debug for RlnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RlnEngine")
            .field("depth", &self.config.tree.depth)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl RlnEngine {
    /// Creates an engine for a tree of `depth` from a serialized parameter blob.
    ///
    /// # Errors
    /// `Construction` if `depth` is zero, the blob is malformed, or the blob
    /// was generated for a different depth.
    pub fn new(depth: usize, parameters: &[u8]) -> Result<Self> {
        if depth == 0 {
            return Err(RlnError::Construction(
                "tree depth must be at least 1".to_string(),
            ));
        }
        Self::with_config(parameters, Config::with_depth(depth))
    }

    /// Creates an engine from a parameter blob and a full configuration.
    pub fn with_config(parameters: &[u8], config: Config) -> Result<Self> {
        let parameters = Parameters::from_bytes(parameters)?;
        if parameters.depth() != config.tree.depth {
            return Err(RlnError::Construction(format!(
                "parameters were generated for depth {}, engine depth is {}",
                parameters.depth(),
                config.tree.depth
            )));
        }
        let backend = parameters.backend()?;
        Self::with_backend(config, backend)
    }

    /// Creates an engine around an already constructed backend.
    pub fn with_backend(config: Config, backend: Arc<dyn ProvingBackend>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RlnError::Construction(format!("{e:#}")))?;
        if backend.depth() != config.tree.depth {
            return Err(RlnError::Construction(format!(
                "{} backend has depth {}, engine depth is {}",
                backend.name(),
                backend.depth(),
                config.tree.depth
            )));
        }

        let tree = MembershipTree::new(config.tree.depth)?;
        info!(
            "RLN engine ready: depth {}, {} backend, root history {}",
            config.tree.depth,
            backend.name(),
            config.tree.root_history
        );

        Ok(Self {
            state: RwLock::new(TreeState {
                tree,
                previous_roots: VecDeque::new(),
                history: config.tree.root_history,
            }),
            config,
            backend,
        })
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.config.tree.depth
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Adds a member at the next free index.
    ///
    /// # Arguments
    /// * `commitment` - The member's identity commitment
    ///
    /// # Returns
    /// The index the member was stored at. Fails with `EmptyCommitment` for
    /// the empty leaf value and `CapacityExceeded` when the tree is full.
    pub fn insert_member(&self, commitment: IdCommitment) -> Result<MembershipIndex> {
        self.state.write().mutate(|tree| tree.insert(commitment))
    }

    /// Stores a member at a caller-chosen index, replacing whatever was there.
    ///
    /// # Arguments
    /// * `index` - Leaf index, below `2^depth`
    /// * `commitment` - The member's identity commitment
    pub fn insert_member_at(&self, index: MembershipIndex, commitment: IdCommitment) -> Result<()> {
        self.state.write().mutate(|tree| tree.set(index, commitment))
    }

    /// Clears the leaf at `index`. Clearing an empty leaf changes nothing.
    ///
    /// # Arguments
    /// * `index` - Leaf index, below `2^depth`
    pub fn delete_member(&self, index: MembershipIndex) -> Result<()> {
        self.state.write().mutate(|tree| tree.delete(index))
    }

    /// Current root of the membership tree.
    #[must_use]
    pub fn merkle_root(&self) -> pallas::Base {
        self.state.read().tree.root()
    }

    /// Authentication path for the leaf at `index`.
    ///
    /// # Returns
    /// The sibling hashes from the leaf up to the current root, or
    /// `IndexOutOfRange` for an index beyond capacity.
    pub fn authentication_path(&self, index: MembershipIndex) -> Result<AuthPath> {
        self.state.read().tree.authentication_path(index)
    }

    /// Number of occupied leaves.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.state.read().tree.occupied_leaves()
    }

    /// Proves that `key_pair` is a member at `index` and signals `message`
    /// in `epoch`.
    ///
    /// # Errors
    /// `IndexOutOfRange` for an index beyond capacity, `MembershipMismatch`
    /// when membership checking is on and the leaf is not the caller's
    /// commitment, `ProvingBackend` if the backend fails.
    pub fn generate_proof(
        &self,
        message: &[u8],
        key_pair: &MembershipKeyPair,
        index: MembershipIndex,
        epoch: Epoch,
    ) -> Result<Proof> {
        self.prove(message, key_pair, index, epoch, None)
    }

    /// Like [`generate_proof`](Self::generate_proof), but gives up with
    /// `Cancelled` if `cancel` is set before the backend starts proving.
    pub fn generate_proof_cancellable(
        &self,
        message: &[u8],
        key_pair: &MembershipKeyPair,
        index: MembershipIndex,
        epoch: Epoch,
        cancel: &AtomicBool,
    ) -> Result<Proof> {
        self.prove(message, key_pair, index, epoch, Some(cancel))
    }

    fn prove(
        &self,
        message: &[u8],
        key_pair: &MembershipKeyPair,
        index: MembershipIndex,
        epoch: Epoch,
        cancel: Option<&AtomicBool>,
    ) -> Result<Proof> {
        let (root, path, leaf) = {
            let state = self.state.read();
            (
                state.tree.root(),
                state.tree.authentication_path(index)?,
                state.tree.leaf(index)?,
            )
        };

        if self.config.prover.check_membership && leaf != key_pair.id_commitment.to_field() {
            return Err(RlnError::MembershipMismatch { index });
        }

        let share = compute_share(&key_pair.id_key, epoch, message);
        let nullifier = compute_nullifier(&key_pair.id_key, epoch);
        let witness = Witness {
            id_key: key_pair.id_key,
            path,
            root,
            epoch,
            share,
            nullifier,
            message_hash: share.x,
        };

        if cancel.is_some_and(|flag| flag.load(Ordering::Acquire)) {
            info!("Proof generation for index {index} cancelled");
            return Err(RlnError::Cancelled);
        }

        let proof = self.backend.prove(&witness)?;
        debug!(
            "Generated {} proof for index {index} in epoch {epoch}, root {}",
            self.backend.name(),
            field_to_hex(root)
        );

        Ok(Proof {
            proof,
            merkle_root: root,
            epoch,
            share_x: share.x,
            share_y: share.y,
            nullifier,
            message_hash: share.x,
        })
    }

    /// Checks `proof` for `message` against the engine's recent roots.
    ///
    /// Never fails: anything wrong with the proof, including a backend
    /// error, yields `false`.
    pub fn verify(&self, message: &[u8], proof: &Proof) -> bool {
        if !self.matches_message(message, proof) {
            return false;
        }
        if !self.state.read().accepts_root(proof.merkle_root) {
            debug!(
                "Proof root {} is not among the accepted roots",
                field_to_hex(proof.merkle_root)
            );
            return false;
        }
        self.backend_accepts(proof)
    }

    /// Checks `proof` for `message` against a root supplied by the caller.
    pub fn verify_with_root(&self, message: &[u8], proof: &Proof, root: pallas::Base) -> bool {
        if !self.matches_message(message, proof) {
            return false;
        }
        if proof.merkle_root != root {
            debug!("Proof root does not match the supplied root");
            return false;
        }
        self.backend_accepts(proof)
    }

    /// [`verify`](Self::verify), additionally requiring the proof's epoch to
    /// lie within `max_epoch_gap` of `current`.
    pub fn verify_in_epoch(&self, message: &[u8], proof: &Proof, current: Epoch) -> bool {
        let gap = diff(current, proof.epoch).unsigned_abs();
        if gap > self.config.epoch.max_epoch_gap {
            debug!(
                "Proof epoch {} is {gap} epochs away from {current}",
                proof.epoch
            );
            return false;
        }
        self.verify(message, proof)
    }

    fn matches_message(&self, message: &[u8], proof: &Proof) -> bool {
        if proof.proof.len() > self.config.verifier.max_proof_size {
            debug!("Proof of {} bytes exceeds the size limit", proof.proof.len());
            return false;
        }
        let hash = hash_bytes(message);
        if hash != proof.message_hash || hash != proof.share_x {
            debug!("Proof is not bound to this message");
            return false;
        }
        true
    }

    fn backend_accepts(&self, proof: &Proof) -> bool {
        match self.backend.verify(&proof.proof, &PublicInputs::from(proof)) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("{} backend failed during verification: {e}", self.backend.name());
                false
            }
        }
    }

    /// Generates `size` fresh members and the root of a tree holding them at
    /// indices `0..size`.
    pub fn build_membership_list(
        size: usize,
        parameters: &[u8],
    ) -> Result<(Vec<MembershipKeyPair>, pallas::Base)> {
        let parameters = Parameters::from_bytes(parameters)?;
        let mut tree = MembershipTree::new(parameters.depth())?;

        let mut members = Vec::with_capacity(size);
        for _ in 0..size {
            let key_pair = generate_membership_key()?;
            tree.insert(key_pair.id_commitment)?;
            members.push(key_pair);
        }

        info!(
            "Built static group of {size} members, root {}",
            field_to_hex(tree.root())
        );
        Ok((members, tree.root()))
    }

    /// Root of a tree holding `commitments` at indices `0..len`.
    pub fn compute_root_from_commitments(
        commitments: &[IdCommitment],
        parameters: &[u8],
    ) -> Result<pallas::Base> {
        let parameters = Parameters::from_bytes(parameters)?;
        Ok(MembershipTree::from_commitments(parameters.depth(), commitments)?.root())
    }
}
