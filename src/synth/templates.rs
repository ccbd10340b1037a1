//! BIRD 2 configuration templates.
//!
//! Plain `format!` templates, one per stanza kind. Callers decide what to
//! put into them; nothing here looks at the topology.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Router id, device and kernel protocols
pub fn header(router_id: Ipv4Addr) -> String {
    format!(
        r#"router id {};

protocol device {{
}}

protocol kernel {{
    ipv4 {{
        import all;
        export all;
    }};
    learn;
}}

"#,
        router_id
    )
}

/// Directly connected prefixes of a router
pub fn direct(prefixes: &[Ipv4Net]) -> String {
    let nets = prefixes
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"protocol direct local_nets {{
    ipv4 {{
        import where net ~ [ {} ];
    }};
    interface "*";
}}

"#,
        nets
    )
}

/// Single-area OSPF over the given interface indices
pub fn ospf(interfaces: &[usize]) -> String {
    let mut stanzas = String::new();
    for index in interfaces {
        stanzas.push_str(&format!("        interface \"eth{}\" {{}};\n", index));
    }
    format!(
        r#"protocol ospf ospf1 {{
    ipv4 {{
        import all;
        export all;
    }};
    area 0 {{
{}    }};
}}

"#,
        stanzas
    )
}

/// Session with a router of another AS, or with a route server
pub fn ebgp(
    name: &str,
    local: Ipv4Addr,
    local_asn: u32,
    neighbor: Ipv4Addr,
    neighbor_asn: u32,
) -> String {
    format!(
        r#"protocol bgp {} {{
    ipv4 {{
        import all;
        export all;
    }};
    local {} as {};
    neighbor {} as {};
}}

"#,
        name, local, local_asn, neighbor, neighbor_asn
    )
}

/// Session between two routers of the same AS
pub fn ibgp(name: &str, local: Ipv4Addr, neighbor: Ipv4Addr, asn: u32) -> String {
    format!(
        r#"protocol bgp {} {{
    ipv4 {{
        import all;
        export all;
        next hop self;
    }};
    local {} as {};
    neighbor {} as {};
}}

"#,
        name, local, asn, neighbor, asn
    )
}

/// Route server session towards one exchange member
pub fn route_server(
    name: &str,
    local: Ipv4Addr,
    local_asn: u32,
    client: Ipv4Addr,
    client_asn: u32,
) -> String {
    format!(
        r#"protocol bgp {} {{
    ipv4 {{
        import all;
        export all;
    }};
    local {} as {};
    neighbor {} as {};
    rs client;
}}

"#,
        name, local, local_asn, client, client_asn
    )
}

/// Boot script of a host
pub fn host_start_script(gateway: Ipv4Addr) -> String {
    format!(
        r#"#!/bin/sh
ip route del default 2> /dev/null
ip route add default via {}
exec tail -f /dev/null
"#,
        gateway
    )
}

/// BIRD protocol names may only hold letters, digits and underscores
pub fn protocol_name(prefix: &str, peer: &str) -> String {
    let peer: String = peer
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", prefix, peer)
}
