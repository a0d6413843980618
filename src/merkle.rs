//! Membership Merkle tree.
//!
//! A fixed-depth binary tree over identity commitments, hashed with
//! [`hash_pair`]. Empty leaves hold zero; an empty subtree of height `h`
//! therefore has the precomputed value `zeros[h]` and is never stored. Only
//! nodes that differ from their empty value live in the per-level maps, so a
//! depth-32 tree costs memory proportional to the number of members.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use pasta_curves::pallas;

use crate::error::{Result, RlnError};
use crate::hash::hash_pair;
use crate::types::{IdCommitment, MembershipIndex};
use crate::utils::field_to_hex;

/// Deepest supported tree.
pub const MAX_TREE_DEPTH: usize = 32;

/// Value of an unoccupied leaf.
#[must_use]
pub fn empty_leaf() -> pallas::Base {
    pallas::Base::zero()
}

/// A member whose leaf equals the empty value would be indistinguishable
/// from a free slot.
fn check_commitment(commitment: IdCommitment) -> Result<()> {
    if commitment.to_field() == empty_leaf() {
        return Err(RlnError::EmptyCommitment);
    }
    Ok(())
}

/// Which child of its parent a path node is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// One level of an authentication path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathElement {
    pub sibling: pallas::Base,
    pub direction: Direction,
}

/// Sibling hashes from a leaf up to (but excluding) the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthPath {
    pub index: MembershipIndex,
    pub elements: Vec<PathElement>,
}

impl AuthPath {
    #[must_use]
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// Folds `leaf` up the path and returns the resulting root.
    #[must_use]
    pub fn compute_root(&self, leaf: pallas::Base) -> pallas::Base {
        self.elements.iter().fold(leaf, |node, element| match element.direction {
            Direction::Left => hash_pair(node, element.sibling),
            Direction::Right => hash_pair(element.sibling, node),
        })
    }
}

impl fmt::Display for AuthPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthPath:\n  Index: {}\n  Siblings:", self.index)?;
        for element in &self.elements {
            write!(f, "\n    {:?} {}", element.direction, field_to_hex(element.sibling))?;
        }
        Ok(())
    }
}

/// Sparse fixed-depth Merkle tree with a cached root.
#[derive(Clone, Debug)]
pub struct MembershipTree {
    depth: usize,
    next_index: MembershipIndex,
    /// `zeros[h]` is the root of an empty subtree of height `h`.
    zeros: Vec<pallas::Base>,
    /// `nodes[0]` are leaves, `nodes[depth]` holds the root.
    nodes: Vec<HashMap<u64, pallas::Base>>,
    root: pallas::Base,
}

impl MembershipTree {
    /// Creates an empty tree with `2^depth` leaf slots.
    ///
    /// # Errors
    /// `Construction` unless `1 <= depth <= MAX_TREE_DEPTH`.
    pub fn new(depth: usize) -> Result<Self> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(RlnError::Construction(format!(
                "tree depth must be between 1 and {MAX_TREE_DEPTH}, got {depth}"
            )));
        }

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(empty_leaf());
        for level in 0..depth {
            zeros.push(hash_pair(zeros[level], zeros[level]));
        }

        Ok(Self {
            depth,
            next_index: 0,
            root: zeros[depth],
            zeros,
            nodes: vec![HashMap::new(); depth + 1],
        })
    }

    /// Builds a tree holding `commitments` at indices `0..len`.
    pub fn from_commitments(depth: usize, commitments: &[IdCommitment]) -> Result<Self> {
        let mut tree = Self::new(depth)?;
        for commitment in commitments {
            tree.insert(*commitment)?;
        }
        Ok(tree)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of leaf slots.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Index the next [`insert`](Self::insert) will use.
    #[must_use]
    pub fn next_index(&self) -> MembershipIndex {
        self.next_index
    }

    /// Current root. Maintained on every mutation.
    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.root
    }

    /// Root of a tree of this depth with no members.
    #[must_use]
    pub fn empty_root(&self) -> pallas::Base {
        self.zeros[self.depth]
    }

    /// Appends `commitment` at the next free index.
    ///
    /// # Errors
    /// `EmptyCommitment` for the empty leaf value. `CapacityExceeded` once
    /// all `2^depth` slots have been handed out. Deleted slots are not
    /// reused.
    pub fn insert(&mut self, commitment: IdCommitment) -> Result<MembershipIndex> {
        check_commitment(commitment)?;
        let index = self.next_index;
        if index >= self.capacity() {
            return Err(RlnError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }
        self.update_leaf(index, commitment.to_field());
        self.next_index = index + 1;
        debug!("Inserted member at index {index}, root {}", field_to_hex(self.root));
        Ok(index)
    }

    /// Writes `commitment` at a caller-chosen index.
    ///
    /// The next free index moves past `index` if needed.
    ///
    /// # Errors
    /// `IndexOutOfRange` beyond capacity, `EmptyCommitment` for the empty
    /// leaf value. Use [`delete`](Self::delete) to clear a slot.
    pub fn set(&mut self, index: MembershipIndex, commitment: IdCommitment) -> Result<()> {
        self.check_index(index)?;
        check_commitment(commitment)?;
        self.update_leaf(index, commitment.to_field());
        self.next_index = self.next_index.max(index + 1);
        Ok(())
    }

    /// Resets the leaf at `index` to the empty value.
    ///
    /// Deleting an empty slot succeeds and leaves the tree unchanged.
    pub fn delete(&mut self, index: MembershipIndex) -> Result<()> {
        self.check_index(index)?;
        self.update_leaf(index, empty_leaf());
        debug!("Deleted member at index {index}, root {}", field_to_hex(self.root));
        Ok(())
    }

    /// Leaf value at `index` (zero when empty).
    pub fn leaf(&self, index: MembershipIndex) -> Result<pallas::Base> {
        self.check_index(index)?;
        Ok(self.node(0, index))
    }

    /// Authentication path for the leaf at `index`, reflecting current content.
    pub fn authentication_path(&self, index: MembershipIndex) -> Result<AuthPath> {
        self.check_index(index)?;

        let elements = (0..self.depth)
            .map(|level| {
                let position = index >> level;
                PathElement {
                    sibling: self.node(level, position ^ 1),
                    direction: if position & 1 == 0 {
                        Direction::Left
                    } else {
                        Direction::Right
                    },
                }
            })
            .collect();

        Ok(AuthPath { index, elements })
    }

    /// Checks that `leaf` with `path` hashes to `root`.
    #[must_use]
    pub fn verify_path(root: pallas::Base, leaf: pallas::Base, path: &AuthPath) -> bool {
        path.compute_root(leaf) == root
    }

    fn check_index(&self, index: MembershipIndex) -> Result<()> {
        if index >= self.capacity() {
            return Err(RlnError::IndexOutOfRange {
                index,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    fn node(&self, level: usize, position: u64) -> pallas::Base {
        self.nodes[level]
            .get(&position)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    fn store(&mut self, level: usize, position: u64, value: pallas::Base) {
        if value == self.zeros[level] {
            self.nodes[level].remove(&position);
        } else {
            self.nodes[level].insert(position, value);
        }
    }

    fn update_leaf(&mut self, index: MembershipIndex, value: pallas::Base) {
        self.store(0, index, value);

        let mut position = index;
        let mut current = value;
        for level in 0..self.depth {
            let sibling = self.node(level, position ^ 1);
            current = if position & 1 == 0 {
                hash_pair(current, sibling)
            } else {
                hash_pair(sibling, current)
            };
            position >>= 1;
            self.store(level + 1, position, current);
        }

        self.root = current;
    }

    /// Number of stored (non-empty) leaves.
    #[must_use]
    pub fn occupied_leaves(&self) -> usize {
        self.nodes[0].len()
    }
}
