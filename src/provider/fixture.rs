//! Static data provider backed by a YAML fixture.
//!
//! ```yaml
//! systems:
//!   100:
//!     prefixes: ["192.0.2.0/24"]
//!     peers: {200: peer, 300: customer}
//!     exchanges: [1]
//! exchanges:
//!   1:
//!     prefix: "80.81.192.0/24"
//!     members: {100: "80.81.192.100"}
//! ```
//!
//! Exchange members not listed explicitly are derived from the `exchanges`
//! lists of the systems, without a known address.

use ipnet::{IpNet, Ipv4Net};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::net::Ipv4Addr;
use std::path::Path;

use super::{DataProvider, ProviderError, Verb};
use crate::topology::{Asn, IxpId, Relationship};

/// Routing data of one AS
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsFixture {
    #[serde(default)]
    pub prefixes: Vec<IpNet>,
    #[serde(default)]
    pub peers: BTreeMap<Asn, Relationship>,
    #[serde(default)]
    pub exchanges: Vec<IxpId>,
}

/// Peering LAN of one exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IxpFixture {
    pub prefix: Ipv4Net,
    #[serde(default)]
    pub members: BTreeMap<Asn, Option<Ipv4Addr>>,
}

/// In-memory [`DataProvider`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureProvider {
    #[serde(default)]
    pub systems: BTreeMap<Asn, AsFixture>,
    #[serde(default)]
    pub exchanges: BTreeMap<IxpId, IxpFixture>,
    #[serde(skip)]
    lookups: usize,
}

impl FixtureProvider {
    /// Load a fixture from a YAML file
    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let file = File::open(path).map_err(|e| ProviderError::Fixture {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let fixture: FixtureProvider =
            serde_yaml::from_reader(file).map_err(|e| ProviderError::Fixture {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        log::info!(
            "Loaded fixture '{}' with {} systems and {} exchanges",
            path.display(),
            fixture.systems.len(),
            fixture.exchanges.len()
        );
        Ok(fixture)
    }

    /// Add or replace an AS
    pub fn with_system(mut self, asn: Asn, system: AsFixture) -> Self {
        self.systems.insert(asn, system);
        self
    }

    /// Add or replace an exchange
    pub fn with_exchange(mut self, id: IxpId, prefix: Ipv4Net) -> Self {
        self.exchanges.insert(
            id,
            IxpFixture {
                prefix,
                members: BTreeMap::new(),
            },
        );
        self
    }

    /// Number of lookups answered so far
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    fn system(&mut self, asn: Asn) -> Option<&AsFixture> {
        self.lookups += 1;
        self.systems.get(&asn)
    }
}

impl DataProvider for FixtureProvider {
    fn prefixes(&mut self, asn: Asn) -> Result<Vec<IpNet>, ProviderError> {
        Ok(self.system(asn).map(|s| s.prefixes.clone()).unwrap_or_default())
    }

    fn peers(&mut self, asn: Asn) -> Result<BTreeMap<Asn, Relationship>, ProviderError> {
        Ok(self.system(asn).map(|s| s.peers.clone()).unwrap_or_default())
    }

    fn internet_exchanges(&mut self, asn: Asn) -> Result<Vec<IxpId>, ProviderError> {
        Ok(self.system(asn).map(|s| s.exchanges.clone()).unwrap_or_default())
    }

    fn internet_exchange_members(
        &mut self,
        ixp: IxpId,
    ) -> Result<BTreeMap<Asn, Option<Ipv4Addr>>, ProviderError> {
        self.lookups += 1;
        let mut members = self
            .exchanges
            .get(&ixp)
            .map(|x| x.members.clone())
            .unwrap_or_default();
        for (asn, system) in &self.systems {
            if system.exchanges.contains(&ixp) {
                members.entry(*asn).or_insert(None);
            }
        }
        Ok(members)
    }

    fn internet_exchange_prefix(&mut self, ixp: IxpId) -> Result<Ipv4Net, ProviderError> {
        self.lookups += 1;
        self.exchanges
            .get(&ixp)
            .map(|x| x.prefix)
            .ok_or(ProviderError::MissingData {
                verb: Verb::ExchangePrefix,
                resource: ixp.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FIXTURE: &str = r#"
systems:
  100:
    prefixes: ["192.0.2.0/24", "2001:db8::/32"]
    peers: {200: peer, 300: customer}
    exchanges: [1]
  200:
    exchanges: [1]
exchanges:
  1:
    prefix: "80.81.192.0/24"
    members:
      100: "80.81.192.10"
"#;

    #[test]
    fn test_load_fixture() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", FIXTURE).unwrap();

        let mut provider = FixtureProvider::load(file.path()).unwrap();
        assert_eq!(provider.prefixes(100).unwrap().len(), 2);
        assert_eq!(provider.peers(100).unwrap()[&300], Relationship::Customer);
        assert_eq!(provider.internet_exchanges(200).unwrap(), vec![1]);

        let members = provider.internet_exchange_members(1).unwrap();
        assert_eq!(members[&100], Some(Ipv4Addr::new(80, 81, 192, 10)));
        assert_eq!(members[&200], None);
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn test_unknown_entities() {
        let mut provider = FixtureProvider::default();
        assert!(provider.prefixes(64512).unwrap().is_empty());
        assert!(provider.peers(64512).unwrap().is_empty());
        assert!(matches!(
            provider.internet_exchange_prefix(9),
            Err(ProviderError::MissingData { .. })
        ));
        assert_eq!(provider.lookups(), 3);
    }

    #[test]
    fn test_missing_file() {
        let err = FixtureProvider::load(Path::new("/nonexistent/fixture.yaml")).unwrap_err();
        assert!(matches!(err, ProviderError::Fixture { .. }));
    }
}
