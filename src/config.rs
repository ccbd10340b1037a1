use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::ip::AddressRanges;
use crate::provider::http::{DEFAULT_PEERINGDB_URL, DEFAULT_RIPESTAT_URL};
use crate::synth::SynthesisOptions;
use crate::topology::{Asn, GeneratorOptions};

/// Top-level configuration of a topology build
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub addressing: AddressingConfig,
    #[serde(default)]
    pub synthesis: SynthesisOptions,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.seed_asn == 0 {
            return Err(ValidationError::InvalidGeneral(
                "seed_asn cannot be 0".to_string(),
            ));
        }
        if self.general.output.as_os_str().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "output directory cannot be empty".to_string(),
            ));
        }

        self.addressing.validate()?;

        let hosts = self.addressing.ranges.host.len() as usize;
        if self.generator.hosts_per_network > hosts {
            return Err(ValidationError::InvalidGenerator(format!(
                "hosts_per_network {} exceeds the {} addresses of the host range",
                self.generator.hosts_per_network, hosts
            )));
        }

        match &self.provider {
            ProviderConfig::Fixture { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ValidationError::InvalidProvider(
                        "fixture path cannot be empty".to_string(),
                    ));
                }
            }
            ProviderConfig::Http { ripestat_url, peeringdb_url, .. } => {
                for url in [ripestat_url, peeringdb_url] {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err(ValidationError::InvalidProvider(format!(
                            "'{}' is not an HTTP URL",
                            url
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// General build settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneralConfig {
    /// AS the topology grows from
    pub seed_asn: Asn,
    /// Hops from the seed; 0 generates the seed alone
    #[serde(default = "default_depth")]
    pub depth: u32,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Fan-out caps of the topology generator
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct GeneratorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_prefixes_per_as: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ixps_per_as: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_members_per_ixp: Option<usize>,
    #[serde(default)]
    pub hosts_per_network: usize,
}

impl GeneratorConfig {
    pub fn options(&self) -> GeneratorOptions {
        GeneratorOptions {
            max_prefixes_per_as: self.max_prefixes_per_as,
            max_ixps_per_as: self.max_ixps_per_as,
            max_members_per_ixp: self.max_members_per_ixp,
            hosts_per_network: self.hosts_per_network,
        }
    }
}

/// Address plan shared by all networks
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AddressingConfig {
    #[serde(default)]
    pub ranges: AddressRanges,
    /// Supernet AS backbone networks are carved from
    #[serde(default = "default_backbone_pool")]
    pub backbone_pool: Ipv4Net,
    #[serde(default = "default_backbone_prefix_len")]
    pub backbone_prefix_len: u8,
}

impl AddressingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.backbone_prefix_len < self.backbone_pool.prefix_len()
            || self.backbone_prefix_len > 30
        {
            return Err(ValidationError::InvalidAddressing(format!(
                "cannot carve /{} backbones out of {}",
                self.backbone_prefix_len, self.backbone_pool
            )));
        }
        let size = 1u64 << (32 - u32::from(self.backbone_prefix_len));
        self.ranges.validate(size).map_err(|e| {
            ValidationError::InvalidAddressing(format!(
                "backbone /{}: {}",
                self.backbone_prefix_len, e
            ))
        })
    }
}

/// Source of real-world routing data
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged, deny_unknown_fields)]
pub enum ProviderConfig {
    /// Static YAML fixture
    Fixture { path: PathBuf },
    /// RIPEstat and PeeringDB over HTTP
    Http {
        #[serde(default = "default_ripestat_url")]
        ripestat_url: String,
        #[serde(default = "default_peeringdb_url")]
        peeringdb_url: String,
        #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
        timeout: Option<Duration>,
    },
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid generator configuration: {0}")]
    InvalidGenerator(String),
    #[error("Invalid addressing configuration: {0}")]
    InvalidAddressing(String),
    #[error("Invalid provider configuration: {0}")]
    InvalidProvider(String),
}

fn default_depth() -> u32 {
    1
}

fn default_output() -> PathBuf {
    PathBuf::from("emunet_output")
}

fn default_backbone_pool() -> Ipv4Net {
    Ipv4Net::new(Ipv4Addr::new(10, 0, 0, 0), 8).unwrap_or_default()
}

fn default_backbone_prefix_len() -> u8 {
    24
}

fn default_ripestat_url() -> String {
    DEFAULT_RIPESTAT_URL.to_string()
}

fn default_peeringdb_url() -> String {
    DEFAULT_PEERINGDB_URL.to_string()
}

/// Default implementations
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            seed_asn: 3320,
            depth: default_depth(),
            output: default_output(),
            log_level: Some("info".to_string()),
        }
    }
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            ranges: AddressRanges::default(),
            backbone_pool: default_backbone_pool(),
            backbone_prefix_len: default_backbone_prefix_len(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Http {
            ripestat_url: default_ripestat_url(),
            peeringdb_url: default_peeringdb_url(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}
