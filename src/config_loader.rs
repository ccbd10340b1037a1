use crate::config::Config;
use crate::synth::PeerPolicy;
use crate::topology::Asn;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse configuration from a YAML file.
///
/// Runs before logging is set up, so it reports through its result only.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let file = File::open(config_path)
        .wrap_err_with(|| {
            format!("Failed to open configuration file '{}'", config_path.display())
        })?;
    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| {
            format!("Failed to parse configuration file '{}'", config_path.display())
        })?;

    config.validate()?;

    Ok(config)
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub seed_asn: Option<Asn>,
    pub depth: Option<u32>,
    pub output: Option<PathBuf>,
    pub strict_peers: bool,
}

/// Apply CLI overrides to a configuration
pub fn apply_cli_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(seed_asn) = overrides.seed_asn {
        info!("Overriding seed AS: {} -> {}", config.general.seed_asn, seed_asn);
        config.general.seed_asn = seed_asn;
    }

    if let Some(depth) = overrides.depth {
        info!("Overriding depth: {} -> {}", config.general.depth, depth);
        config.general.depth = depth;
    }

    if let Some(output) = &overrides.output {
        config.general.output = output.clone();
    }

    if overrides.strict_peers {
        config.synthesis.peer_policy = PeerPolicy::Strict;
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}
