//! Type definitions for the RLN protocol.

use std::fmt;

use pasta_curves::pallas;
use serde::{Deserialize, Serialize};

use crate::epoch::Epoch;
use crate::error::{Result, RlnError};
use crate::hash::hash_field;
use crate::utils::{bytes_to_field, field_hex, field_to_bytes, field_to_hex, FIELD_SIZE};

/// Element of the Pallas base field, the scalar field of every value the
/// protocol hashes, shares or proves.
pub type FieldElement = pallas::Base;

/// Position of a leaf in the membership tree.
pub type MembershipIndex = u64;

fn decode_field(bytes: &[u8; FIELD_SIZE], what: &str) -> Result<FieldElement> {
    bytes_to_field(bytes)
        .ok_or_else(|| RlnError::InvalidEncoding(format!("{what} is not a canonical field element")))
}

/// A member's secret. `Debug` output never shows the value.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdKey(pub(crate) FieldElement);

impl IdKey {
    /// Wraps a raw secret. Callers are responsible for its entropy.
    #[must_use]
    pub fn from_field(value: FieldElement) -> Self {
        Self(value)
    }

    pub fn from_bytes(bytes: &[u8; FIELD_SIZE]) -> Result<Self> {
        decode_field(bytes, "identity key").map(Self)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; FIELD_SIZE] {
        field_to_bytes(self.0)
    }

    #[must_use]
    pub fn to_field(&self) -> FieldElement {
        self.0
    }

    /// The public commitment registered in the membership tree.
    #[must_use]
    pub fn commitment(&self) -> IdCommitment {
        IdCommitment(hash_field(self.0))
    }
}

impl fmt::Debug for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdKey(<redacted>)")
    }
}

/// Public commitment to an [`IdKey`]; the value stored as a tree leaf.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCommitment(#[serde(with = "field_hex")] pub(crate) FieldElement);

impl IdCommitment {
    #[must_use]
    pub fn from_field(value: FieldElement) -> Self {
        Self(value)
    }

    pub fn from_bytes(bytes: &[u8; FIELD_SIZE]) -> Result<Self> {
        decode_field(bytes, "identity commitment").map(Self)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; FIELD_SIZE] {
        field_to_bytes(self.0)
    }

    #[must_use]
    pub fn to_field(&self) -> FieldElement {
        self.0
    }
}

impl fmt::Debug for IdCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdCommitment({})", field_to_hex(self.0))
    }
}

/// A member's key pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MembershipKeyPair {
    pub id_key: IdKey,
    pub id_commitment: IdCommitment,
}

impl MembershipKeyPair {
    #[must_use]
    pub fn from_id_key(id_key: IdKey) -> Self {
        Self {
            id_commitment: id_key.commitment(),
            id_key,
        }
    }
}

/// A point `(x, y)` on a member's per-epoch line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    #[serde(with = "field_hex")]
    pub x: FieldElement,
    #[serde(with = "field_hex")]
    pub y: FieldElement,
}

/// Opaque proof bytes produced by a proving backend.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProofBlob(#[serde(with = "hex::serde")] pub Vec<u8>);

impl ProofBlob {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ProofBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofBlob({} bytes)", self.0.len())
    }
}

/// A rate-limit proof together with its public inputs.
///
/// `message_hash` and `share_x` carry the same value; both are checked
/// against the message during verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub proof: ProofBlob,
    #[serde(with = "field_hex")]
    pub merkle_root: FieldElement,
    pub epoch: Epoch,
    #[serde(with = "field_hex")]
    pub share_x: FieldElement,
    #[serde(with = "field_hex")]
    pub share_y: FieldElement,
    #[serde(with = "field_hex")]
    pub nullifier: FieldElement,
    #[serde(with = "field_hex")]
    pub message_hash: FieldElement,
}

impl Proof {
    #[must_use]
    pub fn share(&self) -> Share {
        Share {
            x: self.share_x,
            y: self.share_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_key_debug_is_redacted() {
        let key = IdKey::from_field(pallas::Base::from(1234));
        assert_eq!(format!("{key:?}"), "IdKey(<redacted>)");
    }

    #[test]
    fn test_commitment_from_key() {
        let key = IdKey::from_field(pallas::Base::from(5));
        let pair = MembershipKeyPair::from_id_key(key);
        assert_eq!(pair.id_commitment, key.commitment());
        assert_eq!(pair.id_commitment.to_field(), hash_field(pallas::Base::from(5)));
    }

    #[test]
    fn test_id_key_bytes_round_trip() {
        let key = IdKey::from_field(pallas::Base::from(99));
        assert_eq!(IdKey::from_bytes(&key.to_bytes()).unwrap(), key);
        assert!(IdKey::from_bytes(&[0xff; FIELD_SIZE]).is_err());
    }

    #[test]
    fn test_proof_json_uses_hex() {
        let proof = Proof {
            proof: ProofBlob(vec![0xab, 0xcd]),
            merkle_root: pallas::Base::from(1),
            epoch: Epoch::from_u64(3),
            share_x: pallas::Base::from(4),
            share_y: pallas::Base::from(5),
            nullifier: pallas::Base::from(6),
            message_hash: pallas::Base::from(4),
        };

        let json = serde_json::to_string(&proof).unwrap();
        assert!(json.contains("\"proof\":\"abcd\""));
        assert!(json.contains(&field_to_hex(pallas::Base::from(5))));

        let decoded: Proof = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, proof);
    }
}
