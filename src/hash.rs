//! Poseidon based hashing into the Pallas base field.
//!
//! Every hash in the protocol goes through the `P128Pow5T3` permutation
//! (width 3, rate 2). The circuit uses the matching halo2 gadget, so values
//! computed here are the values the circuit constrains.

use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use pasta_curves::pallas;

use crate::utils::chunk_to_field;

/// Bytes absorbed per field element when hashing byte strings.
pub const BYTES_PER_CHUNK: usize = 31;

/// Poseidon hash of a single field element.
///
/// Identity commitments are `hash_field(id_key)`.
#[inline]
#[must_use]
pub fn hash_field(value: pallas::Base) -> pallas::Base {
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<1>, 3, 2>::init().hash([value])
}

/// Poseidon hash of two field elements.
///
/// Merkle levels combine children with this function, left child first.
///
/// # Example
///
/// ```
/// use rln::hash::hash_pair;
/// use pasta_curves::pallas;
///
/// let left = pallas::Base::from(1);
/// let right = pallas::Base::from(2);
/// assert_ne!(hash_pair(left, right), hash_pair(right, left));
/// ```
#[inline]
#[must_use]
pub fn hash_pair(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash([left, right])
}

/// Hashes an arbitrary byte string into the field.
///
/// The input is split into 31-byte little-endian chunks and chained through
/// [`hash_pair`], starting from a state seeded with the input length so that
/// inputs differing only in trailing zero bytes do not collide.
#[must_use]
pub fn hash_bytes(input: &[u8]) -> pallas::Base {
    let seed = hash_pair(pallas::Base::from(input.len() as u64), pallas::Base::zero());
    input
        .chunks(BYTES_PER_CHUNK)
        .fold(seed, |state, chunk| hash_pair(state, chunk_to_field(chunk)))
}
