//! halo2 circuit for the RLN relation, and the backend that proves it.
//!
//! The circuit takes the identity key, the Merkle siblings and the path bits
//! as private witnesses and exposes five public inputs in the instance column:
//!
//! | row | value      |
//! |-----|------------|
//! | 0   | tree root  |
//! | 1   | epoch      |
//! | 2   | share x    |
//! | 3   | share y    |
//! | 4   | nullifier  |
//!
//! It enforces:
//! 1. `leaf = Poseidon(id_key)`;
//! 2. hashing `leaf` up the path with `Poseidon(left, right)` yields the root,
//!    where each path bit is boolean and selects the child order;
//! 3. `share_y = id_key + epoch * share_x`;
//! 4. `nullifier = Poseidon(id_key, epoch)`.
//!
//! Poseidon is `P128Pow5T3` through the `halo2_gadgets` Pow5 chip, the same
//! permutation [`crate::hash`] runs outside the circuit.

use std::sync::Arc;

use halo2_gadgets::poseidon::{
    primitives::{ConstantLength, P128Pow5T3},
    Hash as PoseidonHash, Pow5Chip, Pow5Config,
};
use halo2_proofs::{
    circuit::{AssignedCell, Layouter, SimpleFloorPlanner, Value},
    plonk::{
        create_proof, keygen_pk, keygen_vk, verify_proof, Advice, Circuit, Column,
        ConstraintSystem, Error, Expression, Instance, ProvingKey, Selector, SingleVerifier,
    },
    poly::{commitment::Params, Rotation},
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use log::{debug, info};
use pasta_curves::{pallas, vesta};
use rand::rngs::OsRng;

use crate::backend::{
    ProvingBackend, PublicInputs, Witness, EPOCH_ROW, NULLIFIER_ROW, ROOT_ROW, SHARE_X_ROW,
    SHARE_Y_ROW,
};
use crate::error::BackendError;
use crate::merkle::Direction;
use crate::types::ProofBlob;

type Fp = pallas::Base;
type Cell = AssignedCell<Fp, Fp>;

/// Rows charged per Poseidon invocation when sizing the circuit.
const ROWS_PER_HASH: usize = 48;
/// Share gate, constants region and blinding rows.
const FIXED_OVERHEAD_ROWS: usize = 16;

/// Smallest `k` whose `2^k` rows fit a circuit for a tree of `depth`.
///
/// The circuit runs `depth + 2` Poseidon hashes (commitment, one per level,
/// nullifier) and one swap row per level.
#[must_use]
pub fn circuit_k_for_depth(depth: usize) -> u32 {
    let rows = ROWS_PER_HASH * (depth + 2) + depth + FIXED_OVERHEAD_ROWS;
    usize::BITS - rows.leading_zeros()
}

#[derive(Debug, Clone)]
pub struct RlnConfig {
    advice: [Column<Advice>; 5],
    instance: Column<Instance>,
    swap: Selector,
    share: Selector,
    poseidon: Pow5Config<Fp, 3, 2>,
}

/// The RLN relation for a tree of fixed depth.
#[derive(Debug, Clone)]
pub struct RlnCircuit {
    depth: usize,
    id_key: Value<Fp>,
    siblings: Vec<Value<Fp>>,
    /// `1` where the path node is a right child.
    path_bits: Vec<Value<Fp>>,
}

impl RlnCircuit {
    /// A circuit with every witness unknown, used for key generation.
    #[must_use]
    pub fn blank(depth: usize) -> Self {
        Self {
            depth,
            id_key: Value::unknown(),
            siblings: vec![Value::unknown(); depth],
            path_bits: vec![Value::unknown(); depth],
        }
    }

    #[must_use]
    pub fn from_witness(witness: &Witness) -> Self {
        let (siblings, path_bits) = witness
            .path
            .elements
            .iter()
            .map(|element| {
                let bit = match element.direction {
                    Direction::Left => Fp::zero(),
                    Direction::Right => Fp::one(),
                };
                (Value::known(element.sibling), Value::known(bit))
            })
            .unzip();

        Self {
            depth: witness.path.depth(),
            id_key: Value::known(witness.id_key.to_field()),
            siblings,
            path_bits,
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

fn poseidon_hash<const L: usize>(
    config: &RlnConfig,
    mut layouter: impl Layouter<Fp>,
    message: [Cell; L],
) -> Result<Cell, Error> {
    let chip = Pow5Chip::<Fp, 3, 2>::construct(config.poseidon.clone());
    let hasher = PoseidonHash::<Fp, Pow5Chip<Fp, 3, 2>, P128Pow5T3, ConstantLength<L>, 3, 2>::init(
        chip,
        layouter.namespace(|| "poseidon init"),
    )?;
    hasher.hash(layouter.namespace(|| "poseidon hash"), message)
}

impl Circuit<Fp> for RlnCircuit {
    type Config = RlnConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::blank(self.depth)
    }

    fn configure(meta: &mut ConstraintSystem<Fp>) -> Self::Config {
        let advice = [
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
            meta.advice_column(),
        ];
        for column in &advice {
            meta.enable_equality(*column);
        }
        let instance = meta.instance_column();
        meta.enable_equality(instance);

        let rc_a = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        let rc_b = [meta.fixed_column(), meta.fixed_column(), meta.fixed_column()];
        meta.enable_constant(rc_b[0]);
        let poseidon = Pow5Chip::<Fp, 3, 2>::configure::<P128Pow5T3>(
            meta,
            [advice[0], advice[1], advice[2]],
            advice[3],
            rc_a,
            rc_b,
        );

        // [current, sibling, bit, left, right]
        let swap = meta.selector();
        meta.create_gate("merkle swap", |meta| {
            let q = meta.query_selector(swap);
            let current = meta.query_advice(advice[0], Rotation::cur());
            let sibling = meta.query_advice(advice[1], Rotation::cur());
            let bit = meta.query_advice(advice[2], Rotation::cur());
            let left = meta.query_advice(advice[3], Rotation::cur());
            let right = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(Fp::one());

            vec![
                q.clone() * bit.clone() * (one - bit.clone()),
                q.clone()
                    * (left - (current.clone() + bit.clone() * (sibling.clone() - current.clone()))),
                q * (right - (sibling.clone() + bit * (current - sibling))),
            ]
        });

        // [id_key, epoch, x, y]
        let share = meta.selector();
        meta.create_gate("share line", |meta| {
            let q = meta.query_selector(share);
            let id_key = meta.query_advice(advice[0], Rotation::cur());
            let epoch = meta.query_advice(advice[1], Rotation::cur());
            let x = meta.query_advice(advice[2], Rotation::cur());
            let y = meta.query_advice(advice[3], Rotation::cur());

            vec![q * (y - (id_key + epoch * x))]
        });

        RlnConfig {
            advice,
            instance,
            swap,
            share,
            poseidon,
        }
    }

    fn synthesize(&self, config: Self::Config, mut layouter: impl Layouter<Fp>) -> Result<(), Error> {
        let id_key = layouter.assign_region(
            || "id key",
            |mut region| region.assign_advice(|| "id_key", config.advice[0], 0, || self.id_key),
        )?;

        let mut node = poseidon_hash(
            &config,
            layouter.namespace(|| "commitment"),
            [id_key.clone()],
        )?;

        for (level, (sibling, bit)) in self.siblings.iter().zip(&self.path_bits).enumerate() {
            let (left, right) = layouter.assign_region(
                || format!("merkle level {level}"),
                |mut region| {
                    config.swap.enable(&mut region, 0)?;

                    let current = node.copy_advice(|| "current", &mut region, config.advice[0], 0)?;
                    region.assign_advice(|| "sibling", config.advice[1], 0, || *sibling)?;
                    region.assign_advice(|| "bit", config.advice[2], 0, || *bit)?;

                    let current = current.value().copied();
                    let left_value = current
                        .zip(*sibling)
                        .zip(*bit)
                        .map(|((c, s), b)| c + b * (s - c));
                    let right_value = current
                        .zip(*sibling)
                        .zip(*bit)
                        .map(|((c, s), b)| s + b * (c - s));

                    let left = region.assign_advice(|| "left", config.advice[3], 0, || left_value)?;
                    let right =
                        region.assign_advice(|| "right", config.advice[4], 0, || right_value)?;
                    Ok((left, right))
                },
            )?;

            node = poseidon_hash(
                &config,
                layouter.namespace(|| format!("merkle hash {level}")),
                [left, right],
            )?;
        }

        layouter.constrain_instance(node.cell(), config.instance, ROOT_ROW)?;

        let epoch = layouter.assign_region(
            || "share",
            |mut region| {
                config.share.enable(&mut region, 0)?;
                id_key.copy_advice(|| "id_key", &mut region, config.advice[0], 0)?;
                let epoch = region.assign_advice_from_instance(
                    || "epoch",
                    config.instance,
                    EPOCH_ROW,
                    config.advice[1],
                    0,
                )?;
                region.assign_advice_from_instance(
                    || "share_x",
                    config.instance,
                    SHARE_X_ROW,
                    config.advice[2],
                    0,
                )?;
                region.assign_advice_from_instance(
                    || "share_y",
                    config.instance,
                    SHARE_Y_ROW,
                    config.advice[3],
                    0,
                )?;
                Ok(epoch)
            },
        )?;

        let nullifier = poseidon_hash(
            &config,
            layouter.namespace(|| "nullifier"),
            [id_key, epoch],
        )?;
        layouter.constrain_instance(nullifier.cell(), config.instance, NULLIFIER_ROW)?;

        Ok(())
    }
}

/// Proving backend running [`RlnCircuit`] over the Pasta IPA commitment.
///
/// Keys are derived once at construction from the blank circuit and shared
/// read-only across threads.
pub struct Halo2Backend {
    depth: usize,
    params: Arc<Params<vesta::Affine>>,
    pk: Arc<ProvingKey<vesta::Affine>>,
}

impl Halo2Backend {
    /// Derives proving and verifying keys for `depth` from `params`.
    pub fn new(depth: usize, params: Params<vesta::Affine>) -> Result<Self, BackendError> {
        let circuit = RlnCircuit::blank(depth);
        let vk = keygen_vk(&params, &circuit)
            .map_err(|e| BackendError::Synthesis(format!("verifying key: {e:?}")))?;
        let pk = keygen_pk(&params, vk, &circuit)
            .map_err(|e| BackendError::Synthesis(format!("proving key: {e:?}")))?;
        info!("halo2 keys ready for depth {depth}");

        Ok(Self {
            depth,
            params: Arc::new(params),
            pk: Arc::new(pk),
        })
    }

    /// Fresh parameters sized for `depth`, then keys.
    pub fn setup(depth: usize) -> Result<Self, BackendError> {
        Self::new(depth, Params::new(circuit_k_for_depth(depth)))
    }
}

impl ProvingBackend for Halo2Backend {
    fn name(&self) -> &'static str {
        "halo2"
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn prove(&self, witness: &Witness) -> Result<ProofBlob, BackendError> {
        if witness.path.depth() != self.depth {
            return Err(BackendError::Synthesis(format!(
                "path depth {} does not match circuit depth {}",
                witness.path.depth(),
                self.depth
            )));
        }

        let circuit = RlnCircuit::from_witness(witness);
        let instance = witness.public_inputs().to_vec();
        let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);

        create_proof(
            &self.params,
            &self.pk,
            &[circuit],
            &[&[&instance[..]]],
            OsRng,
            &mut transcript,
        )
        .map_err(|e| BackendError::Prover(format!("{e:?}")))?;

        let bytes = transcript.finalize();
        debug!("Created halo2 proof of {} bytes", bytes.len());
        Ok(ProofBlob(bytes))
    }

    fn verify(&self, blob: &ProofBlob, inputs: &PublicInputs) -> Result<bool, BackendError> {
        let instance = inputs.to_vec();
        let strategy = SingleVerifier::new(&self.params);
        let mut transcript =
            Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(blob.as_bytes());

        let result = verify_proof(
            &self.params,
            self.pk.get_vk(),
            strategy,
            &[&[&instance[..]]],
            &mut transcript,
        );
        if let Err(e) = &result {
            debug!("halo2 verification rejected proof: {e:?}");
        }
        Ok(result.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::Epoch;
    use crate::merkle::MembershipTree;
    use crate::share::{compute_nullifier, compute_share};
    use crate::types::IdKey;
    use halo2_proofs::dev::MockProver;

    const DEPTH: usize = 3;

    fn witness(tree: &mut MembershipTree, index: u64) -> Witness {
        let id_key = IdKey::from_field(Fp::from(1000 + index));
        tree.set(index, id_key.commitment()).unwrap();
        let epoch = Epoch::from_u64(77);
        let share = compute_share(&id_key, epoch, b"halo2 circuit");
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

    fn run(witness: &Witness, inputs: &PublicInputs) -> bool {
        let circuit = RlnCircuit::from_witness(witness);
        let prover =
            MockProver::run(circuit_k_for_depth(DEPTH), &circuit, vec![inputs.to_vec()]).unwrap();
        prover.verify().is_ok()
    }

    #[test]
    fn test_k_grows_with_depth() {
        assert!(circuit_k_for_depth(1) <= circuit_k_for_depth(20));
        assert!(circuit_k_for_depth(32) <= 12);
        assert!(1usize << circuit_k_for_depth(4) >= ROWS_PER_HASH * 6);
    }

    #[test]
    fn test_valid_witness_satisfies_circuit() {
        let mut tree = MembershipTree::new(DEPTH).unwrap();
        tree.set(0, IdKey::from_field(Fp::from(9)).commitment()).unwrap();
        let witness = witness(&mut tree, 5);
        assert!(run(&witness, &witness.public_inputs()));
    }

    #[test]
    fn test_left_child_satisfies_circuit() {
        let mut tree = MembershipTree::new(DEPTH).unwrap();
        let witness = witness(&mut tree, 0);
        assert!(run(&witness, &witness.public_inputs()));
    }

    #[test]
    fn test_wrong_path_is_unsatisfied() {
        let mut tree = MembershipTree::new(DEPTH).unwrap();
        let mut witness = witness(&mut tree, 2);
        witness.path.elements[1].sibling += Fp::one();
        assert!(!run(&witness, &witness.public_inputs()));
    }

    #[test]
    fn test_wrong_public_inputs_are_unsatisfied() {
        let mut tree = MembershipTree::new(DEPTH).unwrap();
        let witness = witness(&mut tree, 6);

        let mut inputs = witness.public_inputs();
        inputs.share_y += Fp::one();
        assert!(!run(&witness, &inputs));

        let mut inputs = witness.public_inputs();
        inputs.nullifier += Fp::one();
        assert!(!run(&witness, &inputs));

        let mut inputs = witness.public_inputs();
        inputs.epoch = Epoch::from_u64(78);
        assert!(!run(&witness, &inputs));
    }

    #[test]
    fn test_depth_mismatch_is_rejected_before_proving() {
        let backend = Halo2Backend::setup(DEPTH).unwrap();
        let mut tree = MembershipTree::new(DEPTH + 1).unwrap();
        let witness = witness(&mut tree, 1);
        assert!(matches!(
            backend.prove(&witness),
            Err(BackendError::Synthesis(_))
        ));
    }
}
