//! Rate-Limiting Nullifier (RLN)
//!
//! Members register a Poseidon commitment to a secret key in a Merkle tree.
//! To signal, a member proves in zero knowledge that their commitment is in
//! the tree and publishes one point of a per-epoch line whose intercept is
//! their secret. Two signals in the same epoch reveal the secret.
//!
//! # Components
//!
//! - [`MembershipTree`]: sparse fixed-depth Merkle tree of commitments
//! - [`Epoch`]: 32-byte epoch encoding and signed difference
//! - [`share`]: share computation, secret recovery, [`NullifierLog`]
//! - [`RlnEngine`]: thread-safe tree ownership, proof generation and verification
//! - [`ProvingBackend`]: the proving capability, with [`Halo2Backend`] and [`MockBackend`]
//! - [`Parameters`]: the parameter blob an engine is constructed from
//!
//! # Example
//!
//! ```no_run
//! use rln::{generate_membership_key, BackendKind, Epoch, Parameters, RlnEngine};
//!
//! let params = Parameters::generate(20, BackendKind::Halo2)?.to_bytes();
//! let engine = RlnEngine::new(20, &params)?;
//!
//! let member = generate_membership_key()?;
//! let index = engine.insert_member(member.id_commitment)?;
//!
//! let proof = engine.generate_proof(b"hello", &member, index, Epoch::from_u64(1))?;
//! assert!(engine.verify(b"hello", &proof));
//! # Ok::<(), rln::RlnError>(())
//! ```

pub mod backend;
pub mod circuit;
pub mod config;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod hash;
pub mod keygen;
pub mod merkle;
pub mod mock;
pub mod params;
pub mod share;
pub mod types;
pub mod utils;


pub use backend::{BackendKind, ProvingBackend, PublicInputs, Witness};
pub use circuit::{Halo2Backend, RlnCircuit};
pub use config::Config;
pub use engine::RlnEngine;
pub use epoch::{diff, Epoch};
pub use error::{BackendError, Result, RlnError};
pub use hash::{hash_bytes, hash_field, hash_pair};
pub use keygen::{generate_membership_key, generate_membership_key_with};
pub use merkle::{AuthPath, Direction, MembershipTree};
pub use mock::MockBackend;
pub use params::Parameters;
pub use share::{compute_nullifier, compute_share, recover_id_key, NullifierLog, ShareObservation};
pub use types::{FieldElement, IdCommitment, IdKey, MembershipIndex, MembershipKeyPair, Proof, ProofBlob, Share};
pub use utils::{bytes_to_field, field_to_bytes};
