//! Build orchestrator.
//!
//! This module coordinates a full build: data provider and registry set-up
//! from the configuration, recursive topology generation, synthesis of every
//! router and host artifact, and finally writing them to the output
//! directory. Everything is rendered in memory first, so a failed build
//! leaves no partial output behind.

use crate::config::{Config, ProviderConfig};
use crate::ip::PrefixPool;
use crate::machine::{ComposeEntry, Machine};
use crate::provider::{DataProvider, FixtureProvider, HttpDataProvider};
use crate::synth::{synthesize_router, SynthesisOptions};
use crate::topology::{
    AutonomousSystem, Generator, InternetExchange, Peering, TopologyRegistry,
};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the topology manifest inside the output directory
pub const MANIFEST_FILE: &str = "topology.json";

/// Machine-readable description of a generated topology
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub seed_asn: u32,
    pub depth: u32,
    pub machines: Vec<ComposeEntry>,
    pub autonomous_systems: Vec<&'a AutonomousSystem>,
    pub exchanges: Vec<&'a InternetExchange>,
    pub peerings: &'a [Peering],
}

/// Rendered output files, keyed by path relative to the output directory
#[derive(Debug, Default)]
pub struct Artifacts {
    pub files: BTreeMap<PathBuf, String>,
}

impl Artifacts {
    fn add(&mut self, path: PathBuf, content: String) {
        self.files.insert(path, content);
    }
}

/// Create the data provider selected by the configuration
pub fn build_provider(config: &Config) -> Result<Box<dyn DataProvider>> {
    match &config.provider {
        ProviderConfig::Fixture { path } => {
            let provider = FixtureProvider::load(path)
                .wrap_err_with(|| format!("Failed to load fixture '{}'", path.display()))?;
            Ok(Box::new(provider))
        }
        ProviderConfig::Http {
            ripestat_url,
            peeringdb_url,
            timeout,
        } => {
            info!("Using RIPEstat at {} and PeeringDB at {}", ripestat_url, peeringdb_url);
            Ok(Box::new(HttpDataProvider::new(ripestat_url, peeringdb_url, *timeout)))
        }
    }
}

/// Create an empty registry with the configured address plan
pub fn build_registry(config: &Config) -> Result<TopologyRegistry> {
    let addressing = &config.addressing;
    let pool = PrefixPool::new(addressing.backbone_pool, addressing.backbone_prefix_len)
        .wrap_err("Invalid backbone prefix pool")?;
    Ok(TopologyRegistry::new(addressing.ranges, pool))
}

/// Generate the topology around the configured seed AS
pub fn generate_topology(
    config: &Config,
    provider: &mut dyn DataProvider,
) -> Result<TopologyRegistry> {
    let mut registry = build_registry(config)?;
    Generator::new(&mut registry, provider, config.generator.options())
        .generate(config.general.seed_asn, config.general.depth)
        .wrap_err_with(|| {
            format!("Failed to generate topology from AS{}", config.general.seed_asn)
        })?;
    Ok(registry)
}

/// Render router configurations, host boot scripts and the manifest
pub fn render_artifacts(
    config: &Config,
    registry: &TopologyRegistry,
    options: &SynthesisOptions,
) -> Result<Artifacts> {
    let mut artifacts = Artifacts::default();
    let mut machines = Vec::new();

    for router in registry.routers() {
        let bird = synthesize_router(router, registry, options)
            .wrap_err_with(|| format!("Failed to synthesize configuration of {}", router.name()))?;
        artifacts.add(Path::new(router.name()).join("bird.conf"), bird);
        machines.push(router.compose_entry(registry)?);
    }

    for host in registry.hosts() {
        let script = host
            .create_start_script(registry)
            .wrap_err_with(|| format!("Failed to render start script of {}", host.name()))?;
        artifacts.add(Path::new(host.name()).join("start.sh"), script);
        machines.push(host.compose_entry(registry)?);
    }

    let manifest = Manifest {
        seed_asn: config.general.seed_asn,
        depth: config.general.depth,
        machines,
        autonomous_systems: registry.autonomous_systems().collect(),
        exchanges: registry.exchanges().collect(),
        peerings: registry.peerings(),
    };
    artifacts.add(PathBuf::from(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?);

    Ok(artifacts)
}

/// Write rendered artifacts below `output_dir`
pub fn write_artifacts(artifacts: &Artifacts, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    for (relative, content) in &artifacts.files {
        let path = output_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directory '{}'", parent.display()))?;
        }
        fs::write(&path, content)
            .wrap_err_with(|| format!("Failed to write '{}'", path.display()))?;
        if path.extension().map_or(false, |ext| ext == "sh") {
            make_executable(&path)?;
        }
    }

    info!("Wrote {} files to {:?}", artifacts.files.len(), output_dir);
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .wrap_err_with(|| format!("Failed to make '{}' executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Run a complete build with the given provider
pub fn run_with_provider(config: &Config, provider: &mut dyn DataProvider) -> Result<()> {
    let registry = generate_topology(config, provider)?;
    let artifacts = render_artifacts(config, &registry, &config.synthesis)?;
    write_artifacts(&artifacts, &config.general.output)?;

    info!(
        "Generated {} ASes, {} routers and {} hosts",
        registry.visited().len(),
        registry.routers().count(),
        registry.hosts().count()
    );
    Ok(())
}

/// Run a complete build with the configured provider
pub fn run(config: &Config) -> Result<()> {
    let mut provider = build_provider(config)?;
    run_with_provider(config, provider.as_mut())
}
