//! Configuration file support for the RLN engine.
//!
//! Settings load from TOML. Every field has a default, so a partial file
//! (or none at all) yields a usable configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_TREE_DEPTH: usize = 20;
const DEFAULT_ROOT_HISTORY: usize = 1;
const DEFAULT_EPOCH_PERIOD_SECS: u64 = 10;
const DEFAULT_MAX_EPOCH_GAP: u64 = 20;
const DEFAULT_MAX_PROOF_SIZE: usize = 512 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub epoch: EpochConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_tree_depth")]
    pub depth: usize,
    /// Number of most recent roots a proof may be made against, the live root
    /// included.
    #[serde(default = "default_root_history")]
    pub root_history: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochConfig {
    #[serde(default = "default_epoch_period_secs")]
    pub period_secs: u64,
    /// Largest accepted distance between a proof's epoch and the verifier's.
    #[serde(default = "default_max_epoch_gap")]
    pub max_epoch_gap: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Refuse to prove when the leaf at the given index is not the caller's
    /// commitment.
    #[serde(default = "default_check_membership")]
    pub check_membership: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_max_proof_size")]
    pub max_proof_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
            root_history: DEFAULT_ROOT_HISTORY,
        }
    }
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            period_secs: DEFAULT_EPOCH_PERIOD_SECS,
            max_epoch_gap: DEFAULT_MAX_EPOCH_GAP,
        }
    }
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            check_membership: true,
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_proof_size: DEFAULT_MAX_PROOF_SIZE,
        }
    }
}

fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}

fn default_root_history() -> usize {
    DEFAULT_ROOT_HISTORY
}

fn default_epoch_period_secs() -> u64 {
    DEFAULT_EPOCH_PERIOD_SECS
}

fn default_max_epoch_gap() -> u64 {
    DEFAULT_MAX_EPOCH_GAP
}

fn default_check_membership() -> bool {
    true
}

fn default_max_proof_size() -> usize {
    DEFAULT_MAX_PROOF_SIZE
}

impl EpochConfig {
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Config {
    /// A default configuration for a tree of `depth`.
    #[must_use]
    pub fn with_depth(depth: usize) -> Self {
        let mut config = Self::default();
        config.tree.depth = depth;
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.tree.root_history == 0 {
            bail!("tree.root_history must be at least 1");
        }
        if self.epoch.period_secs == 0 {
            bail!("epoch.period_secs must be at least 1");
        }
        if self.verifier.max_proof_size == 0 {
            bail!("verifier.max_proof_size must be at least 1");
        }
        Ok(())
    }

    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_from_file_or_default(path: &PathBuf) -> Self {
        Self::load_from_file(path).unwrap_or_default()
    }

    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
