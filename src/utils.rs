//! Hex validation and field element encoding helpers.

use pasta_curves::group::ff::PrimeField;
use pasta_curves::pallas;

use crate::error::{Result, RlnError};

/// Size in bytes of a canonical field element encoding.
pub const FIELD_SIZE: usize = 32;

/// Hex characters in an encoded field element (without prefix).
pub const FIELD_HEX_LENGTH: usize = FIELD_SIZE * 2;

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns `InvalidEncoding` if the stripped string does not have exactly
/// `expected_len` characters or contains non-hex characters.
///
/// # Examples
///
/// ```
/// use rln::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(RlnError::InvalidEncoding(format!(
            "hex string must be {} characters (got {})",
            expected_len,
            stripped.len()
        )));
    }

    if !is_valid_hex_string(stripped) {
        return Err(RlnError::InvalidEncoding(
            "hex string contains non-hex characters".to_string(),
        ));
    }

    Ok(stripped.to_string())
}

/// Canonical little-endian encoding of a field element.
#[inline]
#[must_use]
pub fn field_to_bytes(field: pallas::Base) -> [u8; FIELD_SIZE] {
    field.to_repr()
}

/// Decodes a canonical little-endian encoding.
///
/// Returns `None` for encodings of values at or above the field modulus, so
/// every accepted byte string maps to exactly one element and back.
#[inline]
#[must_use]
pub fn bytes_to_field(bytes: &[u8; FIELD_SIZE]) -> Option<pallas::Base> {
    Option::from(pallas::Base::from_repr(*bytes))
}

/// Folds up to 31 bytes, little-endian, into a field element.
///
/// Inputs shorter than the modulus width can never overflow, which makes this
/// total.
#[inline]
pub(crate) fn chunk_to_field(chunk: &[u8]) -> pallas::Base {
    debug_assert!(chunk.len() < FIELD_SIZE);
    let base = pallas::Base::from(256u64);
    chunk.iter().rev().fold(pallas::Base::zero(), |acc, &byte| {
        acc * base + pallas::Base::from(u64::from(byte))
    })
}

/// Hex encoding of a field element (64 lowercase characters, no prefix).
#[must_use]
pub fn field_to_hex(field: pallas::Base) -> String {
    hex::encode(field_to_bytes(field))
}

/// Parses a hex encoded field element, with or without `0x` prefix.
///
/// # Errors
/// Returns `InvalidEncoding` for malformed hex or non-canonical values.
pub fn field_from_hex(input: &str) -> Result<pallas::Base> {
    let stripped = validate_and_strip_hex(input, FIELD_HEX_LENGTH)?;
    let mut bytes = [0u8; FIELD_SIZE];
    hex::decode_to_slice(&stripped, &mut bytes)
        .map_err(|e| RlnError::InvalidEncoding(format!("invalid hex '{stripped}': {e}")))?;
    bytes_to_field(&bytes).ok_or_else(|| {
        RlnError::InvalidEncoding(format!("'{stripped}' is not a canonical field element"))
    })
}

/// Serde adapter storing field elements as hex strings.
pub mod field_hex {
    use pasta_curves::pallas;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(field: &pallas::Base, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::field_to_hex(*field))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<pallas::Base, D::Error> {
        let s = String::deserialize(d)?;
        super::field_from_hex(&s).map_err(D::Error::custom)
    }
}
