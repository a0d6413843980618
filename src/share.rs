//! Per-epoch linear secret sharing.
//!
//! A member's signal in epoch `e` is a point on the line
//! `y = id_key + e * x`, where `x` is the hash of the message. Two distinct
//! points in the same epoch determine the line and therefore the intercept,
//! which is the member's secret.
//!
//! Observers cannot see which member produced a share, so shares are grouped
//! by the nullifier `Poseidon(id_key, epoch)`, which is stable for one member
//! within one epoch.

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;

use crate::epoch::Epoch;
use crate::hash::{hash_bytes, hash_pair};
use crate::types::{IdKey, Proof, Share};
use crate::utils::{field_to_bytes, field_to_hex, FIELD_SIZE};

/// Evaluates the member's line for `epoch` at `x = hash(message)`.
#[must_use]
pub fn compute_share(id_key: &IdKey, epoch: Epoch, message: &[u8]) -> Share {
    let x = hash_bytes(message);
    Share {
        x,
        y: id_key.to_field() + epoch.to_field() * x,
    }
}

/// Nullifier of `id_key` in `epoch`.
#[must_use]
pub fn compute_nullifier(id_key: &IdKey, epoch: Epoch) -> pallas::Base {
    hash_pair(id_key.to_field(), epoch.to_field())
}

/// Recovers the secret from two points on the same line.
///
/// Returns `None` when both shares have the same `x`: a single evaluation
/// point does not determine the line.
#[must_use]
pub fn recover_id_key(first: &Share, second: &Share) -> Option<IdKey> {
    let denominator = first.x - second.x;
    let inverse: Option<pallas::Base> = denominator.invert().into();
    inverse.map(|inv| IdKey::from_field((second.y * first.x - first.y * second.x) * inv))
}

/// Outcome of recording a proof's share in a [`NullifierLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareObservation {
    /// First share seen for this nullifier in this epoch.
    Fresh,
    /// The exact share was already recorded (replayed message).
    Duplicate,
    /// A second, different share: the signer exceeded the rate limit.
    Violation(IdKey),
    /// Same `x` as the recorded share but a different `y`. No single line
    /// passes through both, so the share is forged or corrupt.
    Inconsistent,
}

/// Records shares per `(epoch, nullifier)` and detects double signalling.
///
/// Call it only with proofs that already verified; it does not check proofs.
#[derive(Debug, Default)]
pub struct NullifierLog {
    epochs: BTreeMap<u64, HashMap<[u8; FIELD_SIZE], Share>>,
}

impl NullifierLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, proof: &Proof) -> ShareObservation {
        let share = proof.share();
        let seen = self.epochs.entry(proof.epoch.as_u64()).or_default();

        match seen.get(&field_to_bytes(proof.nullifier)) {
            None => {
                seen.insert(field_to_bytes(proof.nullifier), share);
                ShareObservation::Fresh
            }
            Some(previous) if *previous == share => ShareObservation::Duplicate,
            Some(previous) => match recover_id_key(previous, &share) {
                Some(id_key) => {
                    warn!(
                        "Rate limit violation in epoch {} by nullifier {}",
                        proof.epoch,
                        field_to_hex(proof.nullifier)
                    );
                    ShareObservation::Violation(id_key)
                }
                None => {
                    warn!(
                        "Inconsistent share in epoch {} for nullifier {}",
                        proof.epoch,
                        field_to_hex(proof.nullifier)
                    );
                    ShareObservation::Inconsistent
                }
            },
        }
    }

    /// Forgets every epoch strictly older than `epoch`.
    pub fn prune_before(&mut self, epoch: Epoch) {
        let kept = self.epochs.split_off(&epoch.as_u64());
        let dropped = std::mem::replace(&mut self.epochs, kept).len();
        if dropped > 0 {
            info!("Pruned nullifiers of {dropped} epochs before {epoch}");
        }
    }

    /// Number of distinct nullifiers recorded for `epoch`.
    #[must_use]
    pub fn nullifier_count(&self, epoch: Epoch) -> usize {
        self.epochs.get(&epoch.as_u64()).map_or(0, HashMap::len)
    }
}
