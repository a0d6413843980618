use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use rln::utils::field_to_hex;
use rln::{BackendKind, Parameters, RlnEngine};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Mock,
    Halo2,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Mock => BackendKind::Mock,
            Backend::Halo2 => BackendKind::Halo2,
        }
    }
}

/// Writes an RLN parameter blob, optionally with a freshly generated static group.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Membership tree depth.
    #[arg(short, long, default_value_t = 20)]
    depth: usize,

    #[arg(short, long, value_enum, default_value_t = Backend::Halo2)]
    backend: Backend,

    #[arg(short, long, default_value = "rln_params.bin")]
    output: PathBuf,

    /// Also generate this many members and write their keys as JSON.
    #[arg(long)]
    group_size: Option<usize>,

    #[arg(long, default_value = "rln_group.json")]
    group_output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!(
        "Generating {:?} parameters for depth {}",
        args.backend, args.depth
    );
    let params = Parameters::generate(args.depth, args.backend.into())
        .context("Failed to generate parameters")?;
    let bytes = params.to_bytes();

    fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write parameters: {}", args.output.display()))?;
    info!(
        "Wrote {} bytes (k = {}) to {}",
        bytes.len(),
        params.k(),
        args.output.display()
    );

    if let Some(size) = args.group_size {
        let (members, root) = RlnEngine::build_membership_list(size, &bytes)
            .context("Failed to build static group")?;

        let group: Vec<serde_json::Value> = members
            .iter()
            .enumerate()
            .map(|(index, member)| {
                serde_json::json!({
                    "index": index,
                    "id_key": hex::encode(member.id_key.to_bytes()),
                    "id_commitment": hex::encode(member.id_commitment.to_bytes()),
                })
            })
            .collect();
        let document = serde_json::json!({
            "depth": args.depth,
            "root": field_to_hex(root),
            "members": group,
        });

        let json = serde_json::to_string_pretty(&document).context("Failed to serialize group")?;
        fs::write(&args.group_output, json).with_context(|| {
            format!("Failed to write group: {}", args.group_output.display())
        })?;

        println!("Group root: {}", field_to_hex(root));
        info!(
            "Wrote {size} member keys to {}",
            args.group_output.display()
        );
    }

    Ok(())
}
