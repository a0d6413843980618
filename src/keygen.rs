//! Membership key generation.

use log::debug;
use pasta_curves::group::ff::{Field, FromUniformBytes};
use pasta_curves::pallas;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::error::{Result, RlnError};
use crate::types::{IdKey, MembershipKeyPair};

/// Draws of a zero key tolerated before the source is declared broken.
const MAX_ZERO_DRAWS: usize = 4;

/// Generates a key pair from the operating system's CSPRNG.
pub fn generate_membership_key() -> Result<MembershipKeyPair> {
    generate_membership_key_with(&mut OsRng)
}

/// Generates a key pair from `rng`.
///
/// The secret is reduced from 64 uniform bytes, so its distribution over the
/// field is statistically uniform. Zero is rejected.
///
/// # Errors
/// `RandomSource` if `rng` fails or keeps yielding zero.
pub fn generate_membership_key_with<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<MembershipKeyPair> {
    for _ in 0..MAX_ZERO_DRAWS {
        let mut wide = [0u8; 64];
        rng.try_fill_bytes(&mut wide)
            .map_err(|e| RlnError::RandomSource(e.to_string()))?;

        let secret = pallas::Base::from_uniform_bytes(&wide);
        if bool::from(secret.is_zero()) {
            debug!("Discarding zero identity key draw");
            continue;
        }
        return Ok(MembershipKeyPair::from_id_key(IdKey::from_field(secret)));
    }

    Err(RlnError::RandomSource(format!(
        "random source produced {MAX_ZERO_DRAWS} zero keys in a row"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::FIELD_SIZE;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct FailingRng;

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "entropy pool unavailable",
            )))
        }
    }

    impl CryptoRng for FailingRng {}

    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    #[test]
    fn test_membership_key_gen() {
        let key = generate_membership_key().unwrap();
        let id_key = key.id_key.to_bytes();
        let id_commitment = key.id_commitment.to_bytes();

        assert_eq!(id_key.len(), FIELD_SIZE);
        assert_eq!(id_commitment.len(), FIELD_SIZE);
        assert_ne!(id_key, [0u8; FIELD_SIZE]);
        assert_ne!(id_commitment, [0u8; FIELD_SIZE]);
        assert_eq!(key.id_commitment, key.id_key.commitment());
    }

    #[test]
    fn test_keys_are_distinct() {
        let a = generate_membership_key().unwrap();
        let b = generate_membership_key().unwrap();
        assert_ne!(a.id_key, b.id_key);
        assert_ne!(a.id_commitment, b.id_commitment);
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = generate_membership_key_with(&mut StdRng::seed_from_u64(7)).unwrap();
        let b = generate_membership_key_with(&mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_source_failure_surfaces() {
        let err = generate_membership_key_with(&mut FailingRng).unwrap_err();
        assert!(matches!(err, RlnError::RandomSource(_)));
        assert!(err.to_string().contains("entropy pool unavailable"));
    }

    #[test]
    fn test_zero_keys_rejected() {
        let err = generate_membership_key_with(&mut ZeroRng).unwrap_err();
        assert!(matches!(err, RlnError::RandomSource(_)));
    }
}
