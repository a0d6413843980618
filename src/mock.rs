//! Transparent stand-in for a zero-knowledge backend.
//!
//! `MockBackend` checks the RLN relation directly on the witness and emits a
//! 33-byte blob: a satisfaction flag followed by a SHA3-256 digest binding the
//! flag to the public inputs. It offers no privacy and no soundness against a
//! malicious prover; it exists so the engine, the tree and the share logic can
//! be exercised without paying for key generation and proving.

use log::debug;
use sha3::{Digest, Sha3_256};

use crate::backend::{ProvingBackend, PublicInputs, Witness};
use crate::error::BackendError;
use crate::hash::hash_field;
use crate::share::compute_nullifier;
use crate::types::ProofBlob;
use crate::utils::field_to_bytes;

const DOMAIN_TAG: &[u8] = b"rln-mock-proof-v1";
const DIGEST_SIZE: usize = 32;
/// Flag byte plus digest.
pub const MOCK_PROOF_SIZE: usize = 1 + DIGEST_SIZE;

#[derive(Debug, Clone)]
pub struct MockBackend {
    depth: usize,
}

impl MockBackend {
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }

    fn digest(flag: u8, inputs: &PublicInputs) -> [u8; DIGEST_SIZE] {
        let mut hasher = Sha3_256::new();
        hasher.update(DOMAIN_TAG);
        hasher.update([flag]);
        for value in inputs.to_vec() {
            hasher.update(field_to_bytes(value));
        }
        hasher.finalize().into()
    }

    /// Whether `witness` satisfies every relation the circuit enforces.
    fn is_satisfied(&self, witness: &Witness) -> bool {
        let id_key = witness.id_key.to_field();
        let leaf = hash_field(id_key);

        witness.path.depth() == self.depth
            && witness.message_hash == witness.share.x
            && witness.path.compute_root(leaf) == witness.root
            && witness.share.y == id_key + witness.epoch.to_field() * witness.share.x
            && witness.nullifier == compute_nullifier(&witness.id_key, witness.epoch)
    }
}

impl ProvingBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn prove(&self, witness: &Witness) -> Result<ProofBlob, BackendError> {
        let flag = u8::from(self.is_satisfied(witness));
        if flag == 0 {
            debug!(
                "Mock witness for index {} does not satisfy the relation",
                witness.path.index
            );
        }

        let mut bytes = Vec::with_capacity(MOCK_PROOF_SIZE);
        bytes.push(flag);
        bytes.extend_from_slice(&Self::digest(flag, &witness.public_inputs()));
        Ok(ProofBlob(bytes))
    }

    fn verify(&self, blob: &ProofBlob, inputs: &PublicInputs) -> Result<bool, BackendError> {
        let bytes = blob.as_bytes();
        if bytes.len() != MOCK_PROOF_SIZE || bytes[0] != 1 {
            return Ok(false);
        }
        Ok(bytes[1..] == Self::digest(1, inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::Epoch;
    use crate::merkle::MembershipTree;
    use crate::share::compute_share;
    use crate::types::IdKey;
    use pasta_curves::pallas;

    fn witness_at(tree: &mut MembershipTree, id_key: IdKey) -> Witness {
        let index = tree.insert(id_key.commitment()).unwrap();
        let epoch = Epoch::from_u64(11);
        let share = compute_share(&id_key, epoch, b"mock");
        Witness {
            id_key,
            path: tree.authentication_path(index).unwrap(),
            root: tree.root(),
            epoch,
            share,
            nullifier: compute_nullifier(&id_key, epoch),
            message_hash: share.x,
        }
    }

    #[test]
    fn test_valid_witness_verifies() {
        let mut tree = MembershipTree::new(4).unwrap();
        let witness = witness_at(&mut tree, IdKey::from_field(pallas::Base::from(7)));
        let backend = MockBackend::new(4);

        let blob = backend.prove(&witness).unwrap();
        assert_eq!(blob.len(), MOCK_PROOF_SIZE);
        assert!(backend.verify(&blob, &witness.public_inputs()).unwrap());
    }

    #[test]
    fn test_unsatisfied_witness_never_verifies() {
        let mut tree = MembershipTree::new(4).unwrap();
        let mut witness = witness_at(&mut tree, IdKey::from_field(pallas::Base::from(7)));
        witness.id_key = IdKey::from_field(pallas::Base::from(8));
        let backend = MockBackend::new(4);

        let blob = backend.prove(&witness).unwrap();
        assert_eq!(blob.as_bytes()[0], 0);
        assert!(!backend.verify(&blob, &witness.public_inputs()).unwrap());
    }

    #[test]
    fn test_public_inputs_are_bound() {
        let mut tree = MembershipTree::new(4).unwrap();
        let witness = witness_at(&mut tree, IdKey::from_field(pallas::Base::from(7)));
        let backend = MockBackend::new(4);
        let blob = backend.prove(&witness).unwrap();

        let mut inputs = witness.public_inputs();
        inputs.share_y += pallas::Base::one();
        assert!(!backend.verify(&blob, &inputs).unwrap());

        let mut inputs = witness.public_inputs();
        inputs.epoch = Epoch::from_u64(12);
        assert!(!backend.verify(&blob, &inputs).unwrap());
    }

    #[test]
    fn test_malformed_blob_is_rejected() {
        let backend = MockBackend::new(4);
        let mut tree = MembershipTree::new(4).unwrap();
        let witness = witness_at(&mut tree, IdKey::from_field(pallas::Base::from(7)));

        assert!(!backend
            .verify(&ProofBlob::default(), &witness.public_inputs())
            .unwrap());
        assert!(!backend
            .verify(&ProofBlob(vec![1; 10]), &witness.public_inputs())
            .unwrap());
    }
}
