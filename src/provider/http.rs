//! RIPEstat / PeeringDB backed data provider.
//!
//! RIPEstat answers `GET {base}/{verb}/data.json?resource={asn}` with a JSON
//! envelope whose `status` must be `"ok"`; the payload sits under `data`.
//! PeeringDB answers `GET {base}/{object}?{filter}` with `{"data": [...]}`.
//! Every decoded payload is cached per (verb, resource), so repeated lookups
//! never hit the network twice.

use ipnet::{IpNet, Ipv4Net};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::time::Duration;

use super::{DataProvider, ProviderError, Verb};
use crate::topology::{Asn, IxpId, Relationship};

pub const DEFAULT_RIPESTAT_URL: &str = "https://stat.ripe.net/data";
pub const DEFAULT_PEERINGDB_URL: &str = "https://www.peeringdb.com/api";

/// Blocking JSON-over-HTTP GET
pub trait Transport {
    /// Fetch `url` with `query` parameters and parse the body as JSON.
    /// Any non-200 response must be reported as [`ProviderError::Http`].
    fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ProviderError>;
}

/// [`Transport`] backed by a `ureq` agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
        }
    }
}

impl Transport for UreqTransport {
    fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(key, value);
        }

        log::debug!("GET {} {:?}", url, query);
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(ProviderError::Http {
                    url: url.to_string(),
                    status,
                })
            }
            Err(e) => {
                return Err(ProviderError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
        };

        if response.status() != 200 {
            return Err(ProviderError::Http {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let body = response.into_string().map_err(|e| ProviderError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Transport {
            url: url.to_string(),
            message: format!("invalid JSON body: {}", e),
        })
    }
}

#[derive(Deserialize)]
struct RipeEnvelope {
    status: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct AnnouncedPrefixes {
    prefixes: Vec<PrefixEntry>,
}

#[derive(Deserialize)]
struct PrefixEntry {
    prefix: String,
}

#[derive(Deserialize)]
struct AsnNeighbours {
    neighbours: Vec<Neighbour>,
}

#[derive(Deserialize)]
struct Neighbour {
    asn: Asn,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct NetIxLan {
    ixlan_id: IxpId,
    asn: Asn,
    #[serde(default)]
    ipaddr4: Option<String>,
}

#[derive(Deserialize)]
struct IxPrefix {
    prefix: String,
    #[serde(default)]
    protocol: Option<String>,
}

/// HTTP data provider with per-(verb, resource) memoization
pub struct HttpDataProvider<T = UreqTransport> {
    transport: T,
    ripestat_url: String,
    peeringdb_url: String,
    cache: HashMap<(Verb, String), Value>,
}

impl HttpDataProvider<UreqTransport> {
    pub fn new(ripestat_url: &str, peeringdb_url: &str, timeout: Option<Duration>) -> Self {
        Self::with_transport(UreqTransport::new(timeout), ripestat_url, peeringdb_url)
    }
}

impl<T: Transport> HttpDataProvider<T> {
    pub fn with_transport(transport: T, ripestat_url: &str, peeringdb_url: &str) -> Self {
        Self {
            transport,
            ripestat_url: ripestat_url.trim_end_matches('/').to_string(),
            peeringdb_url: peeringdb_url.trim_end_matches('/').to_string(),
            cache: HashMap::new(),
        }
    }

    /// Number of distinct (verb, resource) pairs fetched so far
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn fetch(&mut self, verb: Verb, resource: String) -> Result<&Value, ProviderError> {
        let key = (verb, resource);
        if !self.cache.contains_key(&key) {
            let payload = match verb {
                Verb::AnnouncedPrefixes | Verb::AsnNeighbours => self.fetch_ripestat(verb, &key.1)?,
                Verb::NetworkExchanges => self.fetch_peeringdb("netixlan", "asn", &key.1)?,
                Verb::ExchangeMembers => self.fetch_peeringdb("netixlan", "ixlan_id", &key.1)?,
                Verb::ExchangePrefix => self.fetch_peeringdb("ixpfx", "ixlan_id", &key.1)?,
            };
            self.cache.insert(key.clone(), payload);
        } else {
            log::trace!("cache hit for {} {}", key.0, key.1);
        }
        self.cache.get(&key).ok_or(ProviderError::MissingData {
            verb: key.0,
            resource: key.1.clone(),
        })
    }

    fn fetch_ripestat(&self, verb: Verb, resource: &str) -> Result<Value, ProviderError> {
        let url = format!("{}/{}/data.json", self.ripestat_url, verb);
        let body = self
            .transport
            .get_json(&url, &[("resource", resource.to_string())])?;
        let envelope: RipeEnvelope =
            serde_json::from_value(body).map_err(|e| ProviderError::Decode {
                verb,
                resource: resource.to_string(),
                message: e.to_string(),
            })?;
        if envelope.status != "ok" {
            return Err(ProviderError::Status {
                url,
                status: envelope.status,
            });
        }
        Ok(envelope.data)
    }

    fn fetch_peeringdb(
        &self,
        object: &str,
        filter: &str,
        resource: &str,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.peeringdb_url, object);
        let mut body = self.transport.get_json(&url, &[(filter, resource.to_string())])?;
        Ok(body
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Array(Vec::new())))
    }

    fn decode<D: DeserializeOwned>(
        &mut self,
        verb: Verb,
        resource: String,
    ) -> Result<D, ProviderError> {
        let value = self.fetch(verb, resource.clone())?.clone();
        serde_json::from_value(value).map_err(|e| ProviderError::Decode {
            verb,
            resource,
            message: e.to_string(),
        })
    }
}

impl<T: Transport> DataProvider for HttpDataProvider<T> {
    fn prefixes(&mut self, asn: Asn) -> Result<Vec<IpNet>, ProviderError> {
        let payload: AnnouncedPrefixes = self.decode(Verb::AnnouncedPrefixes, asn.to_string())?;
        payload
            .prefixes
            .into_iter()
            .map(|entry| {
                entry.prefix.parse::<IpNet>().map_err(|e| ProviderError::Decode {
                    verb: Verb::AnnouncedPrefixes,
                    resource: asn.to_string(),
                    message: format!("bad prefix '{}': {}", entry.prefix, e),
                })
            })
            .collect()
    }

    fn peers(&mut self, asn: Asn) -> Result<BTreeMap<Asn, Relationship>, ProviderError> {
        let payload: AsnNeighbours = self.decode(Verb::AsnNeighbours, asn.to_string())?;
        payload
            .neighbours
            .into_iter()
            .map(|n| {
                n.kind
                    .parse::<Relationship>()
                    .map(|relationship| (n.asn, relationship))
                    .map_err(|message| ProviderError::Decode {
                        verb: Verb::AsnNeighbours,
                        resource: asn.to_string(),
                        message,
                    })
            })
            .collect()
    }

    fn internet_exchanges(&mut self, asn: Asn) -> Result<Vec<IxpId>, ProviderError> {
        let entries: Vec<NetIxLan> = self.decode(Verb::NetworkExchanges, asn.to_string())?;
        let mut ixps: Vec<IxpId> = entries
            .into_iter()
            .filter(|entry| entry.asn == asn)
            .map(|entry| entry.ixlan_id)
            .collect();
        ixps.sort_unstable();
        ixps.dedup();
        Ok(ixps)
    }

    fn internet_exchange_members(
        &mut self,
        ixp: IxpId,
    ) -> Result<BTreeMap<Asn, Option<Ipv4Addr>>, ProviderError> {
        let entries: Vec<NetIxLan> = self.decode(Verb::ExchangeMembers, ixp.to_string())?;
        let mut members = BTreeMap::new();
        for entry in entries {
            let address = entry.ipaddr4.as_deref().and_then(|a| a.parse::<Ipv4Addr>().ok());
            // keep the first known address of members with several ports
            let slot = members.entry(entry.asn).or_insert(None);
            if slot.is_none() {
                *slot = address;
            }
        }
        Ok(members)
    }

    fn internet_exchange_prefix(&mut self, ixp: IxpId) -> Result<Ipv4Net, ProviderError> {
        let entries: Vec<IxPrefix> = self.decode(Verb::ExchangePrefix, ixp.to_string())?;
        entries
            .into_iter()
            .filter(|entry| {
                entry
                    .protocol
                    .as_deref()
                    .map_or(true, |p| p.eq_ignore_ascii_case("ipv4"))
            })
            .find_map(|entry| entry.prefix.parse::<Ipv4Net>().ok())
            .ok_or(ProviderError::MissingData {
                verb: Verb::ExchangePrefix,
                resource: ixp.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    /// Transport answering from canned bodies and recording every request
    struct ScriptedTransport {
        responses: HashMap<String, Result<Value, u16>>,
        requests: RefCell<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<(&str, Result<Value, u16>)>) -> Self {
            Self {
                responses: responses.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
            let key = format!(
                "{}?{}",
                url,
                query.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("&")
            );
            self.requests.borrow_mut().push(key.clone());
            match self.responses.get(&key) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(ProviderError::Http { url: key, status: *status }),
                None => Err(ProviderError::Http { url: key, status: 404 }),
            }
        }
    }

    fn provider(responses: Vec<(&str, Result<Value, u16>)>) -> HttpDataProvider<ScriptedTransport> {
        HttpDataProvider::with_transport(
            ScriptedTransport::new(responses),
            "http://ripe/data/",
            "http://pdb/api",
        )
    }

    #[test]
    fn test_prefixes_are_memoized() {
        let mut p = provider(vec![(
            "http://ripe/data/announced-prefixes/data.json?resource=100",
            Ok(json!({
                "status": "ok",
                "data": {"prefixes": [{"prefix": "192.0.2.0/24"}, {"prefix": "2001:db8::/32"}]}
            })),
        )]);

        let first = p.prefixes(100).unwrap();
        let second = p.prefixes(100).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(p.transport.requests.borrow().len(), 1);
        assert_eq!(p.cached(), 1);
    }

    #[test]
    fn test_neighbour_types() {
        let mut p = provider(vec![(
            "http://ripe/data/asn-neighbours/data.json?resource=100",
            Ok(json!({
                "status": "ok",
                "data": {"neighbours": [
                    {"asn": 200, "type": "left"},
                    {"asn": 300, "type": "right"},
                    {"asn": 400, "type": "uncertain"}
                ]}
            })),
        )]);

        let peers = p.peers(100).unwrap();
        assert_eq!(peers[&200], Relationship::Provider);
        assert_eq!(peers[&300], Relationship::Customer);
        assert_eq!(peers[&400], Relationship::Peer);
    }

    #[test]
    fn test_non_ok_status_is_an_error() {
        let mut p = provider(vec![(
            "http://ripe/data/announced-prefixes/data.json?resource=100",
            Ok(json!({"status": "error", "data": {}})),
        )]);
        assert!(matches!(p.prefixes(100), Err(ProviderError::Status { .. })));
        // failures are not cached
        assert_eq!(p.cached(), 0);
    }

    #[test]
    fn test_http_error_propagates() {
        let mut p = provider(vec![(
            "http://ripe/data/asn-neighbours/data.json?resource=100",
            Err(500),
        )]);
        assert!(matches!(p.peers(100), Err(ProviderError::Http { status: 500, .. })));
    }

    #[test]
    fn test_exchange_lookups() {
        let mut p = provider(vec![
            (
                "http://pdb/api/netixlan?asn=100",
                Ok(json!({"data": [
                    {"ixlan_id": 31, "asn": 100, "ipaddr4": "80.81.192.100"},
                    {"ixlan_id": 31, "asn": 100, "ipaddr4": "80.81.193.100"},
                    {"ixlan_id": 18, "asn": 100, "ipaddr4": null}
                ]})),
            ),
            (
                "http://pdb/api/netixlan?ixlan_id=31",
                Ok(json!({"data": [
                    {"ixlan_id": 31, "asn": 100, "ipaddr4": "80.81.192.100"},
                    {"ixlan_id": 31, "asn": 200, "ipaddr4": null},
                    {"ixlan_id": 31, "asn": 200, "ipaddr4": "80.81.192.200"}
                ]})),
            ),
            (
                "http://pdb/api/ixpfx?ixlan_id=31",
                Ok(json!({"data": [
                    {"prefix": "2001:7f8::/64", "protocol": "IPv6"},
                    {"prefix": "80.81.192.0/21", "protocol": "IPv4"}
                ]})),
            ),
        ]);

        assert_eq!(p.internet_exchanges(100).unwrap(), vec![18, 31]);

        let members = p.internet_exchange_members(31).unwrap();
        assert_eq!(members[&100], Some(Ipv4Addr::new(80, 81, 192, 100)));
        assert_eq!(members[&200], Some(Ipv4Addr::new(80, 81, 192, 200)));

        assert_eq!(p.internet_exchange_prefix(31).unwrap().to_string(), "80.81.192.0/21");
        assert!(matches!(
            p.internet_exchange_prefix(18),
            Err(ProviderError::Http { status: 404, .. })
        ));
    }
}
