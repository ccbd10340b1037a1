use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use emunet::config_loader::{self, CliOverrides};
use emunet::{orchestrator, Config};
use env_logger::Env;
use log::info;
use std::path::PathBuf;

/// Topology and BIRD configuration generator for emulated Internet networks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the build configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for router configurations, host scripts and the manifest
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// AS number the topology grows from
    #[arg(long)]
    seed_asn: Option<u32>,

    /// Number of hops to expand from the seed AS
    #[arg(short, long)]
    depth: Option<u32>,

    /// Fail on BGP peers that cannot be resolved instead of skipping them
    #[arg(long)]
    strict_peers: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            seed_asn: self.seed_asn,
            depth: self.depth,
            output: self.output.clone(),
            strict_peers: self.strict_peers,
        }
    }
}

fn log_filter(config: &Config) -> String {
    config.general.log_level.clone().unwrap_or_else(|| "info".to_string())
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // The configuration picks the log level, so it is loaded first
    let mut config = config_loader::load_config(&args.config)?;

    // Initialize logging with default filter level of "info", or the configured level
    env_logger::Builder::from_env(Env::default().default_filter_or(log_filter(&config))).init();

    info!("Starting emunet");
    info!("Loaded configuration from {:?}", args.config);

    config_loader::apply_cli_overrides(&mut config, &args.overrides())?;
    info!("Seed AS: {}, depth: {}", config.general.seed_asn, config.general.depth);
    info!("Output directory: {:?}", config.general.output);

    orchestrator::run(&config)
        .wrap_err_with(|| format!("Build from '{}' failed", args.config.display()))?;

    info!("Topology generation completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["emunet", "--config", "test.yaml"]);

        assert_eq!(args.config, PathBuf::from("test.yaml"));
        assert_eq!(args.output, None);
        assert!(!args.strict_peers);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "emunet",
            "--config",
            "test.yaml",
            "--seed-asn",
            "3320",
            "--depth",
            "0",
            "--output",
            "out",
            "--strict-peers",
        ]);

        let overrides = args.overrides();
        assert_eq!(overrides.seed_asn, Some(3320));
        assert_eq!(overrides.depth, Some(0));
        assert_eq!(overrides.output, Some(PathBuf::from("out")));
        assert!(overrides.strict_peers);
    }

    #[test]
    fn test_log_filter() {
        let mut config: Config = serde_yaml::from_str("general:\n  seed_asn: 100\n").unwrap();
        config.general.log_level = None;
        assert_eq!(log_filter(&config), "info");

        config.general.log_level = Some("emunet=debug".to_string());
        assert_eq!(log_filter(&config), "emunet=debug");
    }
}
