//! Parameter blob consumed by [`crate::engine::RlnEngine::new`].
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic   b"RLNP"
//! version u8   = 1
//! kind    u8   (0 mock, 1 halo2)
//! depth   u32
//! k       u32  (circuit size; 0 for mock)
//! body    ...  (halo2: `Params<vesta::Affine>`; mock: empty)
//! ```

use std::sync::Arc;

use halo2_proofs::poly::commitment::Params;
use log::info;
use pasta_curves::vesta;

use crate::backend::{BackendKind, ProvingBackend};
use crate::circuit::{circuit_k_for_depth, Halo2Backend};
use crate::error::{Result, RlnError};
use crate::merkle::MAX_TREE_DEPTH;
use crate::mock::MockBackend;

pub const MAGIC: &[u8; 4] = b"RLNP";
pub const FORMAT_VERSION: u8 = 1;
const HEADER_SIZE: usize = 4 + 1 + 1 + 4 + 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameters {
    kind: BackendKind,
    depth: usize,
    k: u32,
    body: Vec<u8>,
}

fn check_depth(depth: usize) -> Result<()> {
    if depth == 0 || depth > MAX_TREE_DEPTH {
        return Err(RlnError::Construction(format!(
            "tree depth must be between 1 and {MAX_TREE_DEPTH}, got {depth}"
        )));
    }
    Ok(())
}

impl Parameters {
    /// Generates parameters for a tree of `depth`.
    ///
    /// halo2 parameters are sampled fresh at the smallest `k` that fits the
    /// circuit.
    pub fn generate(depth: usize, kind: BackendKind) -> Result<Self> {
        check_depth(depth)?;

        let (k, body) = match kind {
            BackendKind::Mock => (0, Vec::new()),
            BackendKind::Halo2 => {
                let k = circuit_k_for_depth(depth);
                let params = Params::<vesta::Affine>::new(k);
                let mut body = Vec::new();
                params
                    .write(&mut body)
                    .map_err(|e| RlnError::Construction(format!("writing halo2 params: {e}")))?;
                (k, body)
            }
        };

        info!(
            "Generated {} parameters for depth {depth} (k = {k})",
            kind.as_str()
        );
        Ok(Self {
            kind,
            depth,
            k,
            body,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(RlnError::Construction(format!(
                "parameter blob too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(RlnError::Construction(
                "parameter blob has wrong magic".to_string(),
            ));
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(RlnError::Construction(format!(
                "unsupported parameter format version {}",
                bytes[4]
            )));
        }
        let kind = BackendKind::from_u8(bytes[5]).ok_or_else(|| {
            RlnError::Construction(format!("unknown backend kind {}", bytes[5]))
        })?;

        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[6..10]);
        let depth = u32::from_le_bytes(word) as usize;
        word.copy_from_slice(&bytes[10..14]);
        let k = u32::from_le_bytes(word);
        check_depth(depth)?;

        let body = bytes[HEADER_SIZE..].to_vec();
        match kind {
            BackendKind::Mock if !body.is_empty() => {
                return Err(RlnError::Construction(
                    "mock parameters carry an unexpected body".to_string(),
                ));
            }
            BackendKind::Halo2 if k < circuit_k_for_depth(depth) => {
                return Err(RlnError::Construction(format!(
                    "k = {k} is too small for depth {depth}"
                )));
            }
            _ => {}
        }

        Ok(Self {
            kind,
            depth,
            k,
            body,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.push(self.kind as u8);
        bytes.extend_from_slice(&(self.depth as u32).to_le_bytes());
        bytes.extend_from_slice(&self.k.to_le_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Instantiates the backend these parameters describe.
    ///
    /// For halo2 this derives the proving and verifying keys, which is the
    /// expensive part of engine construction. The body must carry exactly
    /// the `k` the header declares.
    pub fn backend(&self) -> Result<Arc<dyn ProvingBackend>> {
        match self.kind {
            BackendKind::Mock => Ok(Arc::new(MockBackend::new(self.depth))),
            BackendKind::Halo2 => {
                let params = Params::<vesta::Affine>::read(&mut &self.body[..])
                    .map_err(|e| RlnError::Construction(format!("reading halo2 params: {e}")))?;
                if params.k() != self.k {
                    return Err(RlnError::Construction(format!(
                        "header declares k = {}, halo2 params have k = {}",
                        self.k,
                        params.k()
                    )));
                }
                let backend = Halo2Backend::new(self.depth, params)
                    .map_err(|e| RlnError::Construction(e.to_string()))?;
                Ok(Arc::new(backend))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_blob_round_trip() {
        let params = Parameters::generate(10, BackendKind::Mock).unwrap();
        let bytes = params.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], MAGIC);

        let parsed = Parameters::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, params);
        assert_eq!(parsed.depth(), 10);
        assert_eq!(parsed.kind(), BackendKind::Mock);
        assert_eq!(parsed.backend().unwrap().depth(), 10);
    }

    #[test]
    fn test_header_fields_are_little_endian() {
        let bytes = Parameters::generate(20, BackendKind::Mock).unwrap().to_bytes();
        assert_eq!(bytes[4], FORMAT_VERSION);
        assert_eq!(bytes[5], 0);
        assert_eq!(&bytes[6..10], &[20, 0, 0, 0]);
    }

    #[test]
    fn test_malformed_blobs_rejected() {
        let good = Parameters::generate(4, BackendKind::Mock).unwrap().to_bytes();

        assert!(matches!(
            Parameters::from_bytes(&good[..5]),
            Err(RlnError::Construction(_))
        ));

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        assert!(Parameters::from_bytes(&bad_magic).is_err());

        let mut bad_version = good.clone();
        bad_version[4] = 9;
        assert!(Parameters::from_bytes(&bad_version).is_err());

        let mut bad_kind = good.clone();
        bad_kind[5] = 7;
        assert!(Parameters::from_bytes(&bad_kind).is_err());

        let mut zero_depth = good.clone();
        zero_depth[6..10].copy_from_slice(&0u32.to_le_bytes());
        assert!(Parameters::from_bytes(&zero_depth).is_err());

        let mut trailing = good;
        trailing.push(0);
        assert!(Parameters::from_bytes(&trailing).is_err());
    }

    #[test]
    fn test_invalid_depth_rejected() {
        assert!(Parameters::generate(0, BackendKind::Mock).is_err());
        assert!(Parameters::generate(MAX_TREE_DEPTH + 1, BackendKind::Mock).is_err());
    }

    #[test]
    fn test_truncated_halo2_body_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.push(BackendKind::Halo2 as u8);
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&circuit_k_for_depth(3).to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);

        let params = Parameters::from_bytes(&bytes).unwrap();
        assert!(matches!(params.backend(), Err(RlnError::Construction(_))));
    }

    #[test]
    fn test_header_k_must_match_body() {
        let depth = 3;
        let params = Parameters::generate(depth, BackendKind::Halo2).unwrap();
        assert_eq!(params.k(), circuit_k_for_depth(depth));

        let mut bytes = params.to_bytes();
        bytes[10..14].copy_from_slice(&(params.k() + 16).to_le_bytes());
        let forged = Parameters::from_bytes(&bytes).unwrap();
        assert_eq!(forged.k(), params.k() + 16);
        assert!(matches!(forged.backend(), Err(RlnError::Construction(_))));
    }

    #[test]
    fn test_small_k_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.push(BackendKind::Halo2 as u8);
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        assert!(Parameters::from_bytes(&bytes).is_err());
    }
}
