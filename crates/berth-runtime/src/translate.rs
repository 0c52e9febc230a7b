//! Translation between bridge-network and host-reachable addresses.
//!
//! On hosts where only loopback is visible to the dashboard (virtualized or
//! WSL-style setups), each container gets its own loopback address: the
//! bridge address `10.10.0.x` is presented as `127.0.0.x`. Translation is
//! total: anything that is not a dotted quad becomes `127.0.0.1`.

use std::net::{Ipv4Addr, SocketAddrV4};

use berth_common::config::{HostScheme, NetworkSettings};
use berth_common::constants::DEFAULT_HOST_ADDRESS;
use berth_common::error::{BerthError, Result};
use berth_common::types::PortMapping;

/// Maps container addresses to host addresses and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortTranslator {
    scheme: HostScheme,
    bridge_prefix: [u8; 3],
    loopback_prefix: [u8; 3],
}

impl Default for PortTranslator {
    fn default() -> Self {
        Self {
            scheme: HostScheme::Loopback,
            bridge_prefix: [10, 10, 0],
            loopback_prefix: [127, 0, 0],
        }
    }
}

impl PortTranslator {
    /// Creates a translator with explicit prefixes.
    #[must_use]
    pub const fn new(scheme: HostScheme, bridge_prefix: [u8; 3], loopback_prefix: [u8; 3]) -> Self {
        Self {
            scheme,
            bridge_prefix,
            loopback_prefix,
        }
    }

    /// Builds a translator from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BerthError::Config`] if a prefix is not three dotted octets.
    pub fn from_settings(settings: &NetworkSettings) -> Result<Self> {
        Ok(Self::new(
            settings.scheme,
            parse_prefix(&settings.bridge_prefix)?,
            parse_prefix(&settings.loopback_prefix)?,
        ))
    }

    /// Returns the configured scheme.
    #[must_use]
    pub const fn scheme(&self) -> HostScheme {
        self.scheme
    }

    /// Translates an internal address into a host-reachable one.
    ///
    /// The last octet is always preserved for well-formed input.
    #[must_use]
    pub fn translate(&self, internal: &str) -> Ipv4Addr {
        let Some(addr) = parse_quad(internal) else {
            return DEFAULT_HOST_ADDRESS;
        };
        match self.scheme {
            HostScheme::Direct => addr,
            HostScheme::Loopback => {
                let [a, b, c] = self.loopback_prefix;
                Ipv4Addr::new(a, b, c, addr.octets()[3])
            }
        }
    }

    /// Maps a host address back onto the bridge network.
    ///
    /// Returns `None` when the address is outside the host range this
    /// translator hands out.
    #[must_use]
    pub fn reverse(&self, external: Ipv4Addr) -> Option<Ipv4Addr> {
        let [a, b, c, last] = external.octets();
        match self.scheme {
            HostScheme::Direct => Some(external),
            HostScheme::Loopback if [a, b, c] == self.loopback_prefix => {
                let [x, y, z] = self.bridge_prefix;
                Some(Ipv4Addr::new(x, y, z, last))
            }
            HostScheme::Loopback => None,
        }
    }

    /// Host endpoint at which a published port is reachable.
    #[must_use]
    pub fn host_endpoint(&self, internal: &str, mapping: PortMapping) -> SocketAddrV4 {
        SocketAddrV4::new(self.translate(internal), mapping.host)
    }

    /// Container endpoint a published port forwards to.
    #[must_use]
    pub fn container_endpoint(internal: &str, mapping: PortMapping) -> Option<SocketAddrV4> {
        parse_quad(internal).map(|addr| SocketAddrV4::new(addr, mapping.container))
    }
}

/// Parses exactly four dot-separated decimal octets.
fn parse_quad(s: &str) -> Option<Ipv4Addr> {
    let parts: Vec<&str> = s.trim().split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Some(Ipv4Addr::from(octets))
}

fn parse_prefix(s: &str) -> Result<[u8; 3]> {
    let invalid = || BerthError::Config {
        message: format!("network prefix must be three octets like 10.10.0, got {s:?}"),
    };
    let parts: Vec<&str> = s.trim().trim_end_matches('.').split('.').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }
    let mut prefix = [0u8; 3];
    for (slot, part) in prefix.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| invalid())?;
    }
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> PortTranslator {
        PortTranslator::default()
    }

    #[test]
    fn bridge_address_maps_to_loopback_with_same_last_octet() {
        assert_eq!(loopback().translate("10.10.0.7"), Ipv4Addr::new(127, 0, 0, 7));
    }

    #[test]
    fn any_well_formed_address_keeps_its_last_octet() {
        let t = loopback();
        for last in [0u8, 1, 2, 99, 254, 255] {
            for input in [format!("10.10.0.{last}"), format!("172.17.3.{last}")] {
                assert_eq!(t.translate(&input).octets()[3], last, "{input}");
            }
        }
    }

    #[test]
    fn malformed_addresses_fall_back_to_default() {
        let t = loopback();
        for input in ["", "10.10.0", "10.10.0.1.5", "localhost", "::1", "1.2.3.", "a.b.c.d", "10.10.0.300"] {
            assert_eq!(t.translate(input), DEFAULT_HOST_ADDRESS, "{input:?}");
        }
    }

    #[test]
    fn direct_scheme_passes_address_through() {
        let t = PortTranslator::new(HostScheme::Direct, [10, 10, 0], [127, 0, 0]);
        assert_eq!(t.translate("10.10.0.9"), Ipv4Addr::new(10, 10, 0, 9));
        assert_eq!(t.translate("junk"), DEFAULT_HOST_ADDRESS);
    }

    #[test]
    fn reverse_translation_round_trips_loopback_range() {
        let t = loopback();
        assert_eq!(
            t.reverse(Ipv4Addr::new(127, 0, 0, 12)),
            Some(Ipv4Addr::new(10, 10, 0, 12))
        );
        assert_eq!(t.reverse(Ipv4Addr::new(192, 168, 1, 12)), None);
    }

    #[test]
    fn endpoints_pair_addresses_with_the_right_ports() {
        let t = loopback();
        let mapping = PortMapping { host: 8080, container: 80 };
        assert_eq!(t.host_endpoint("10.10.0.3", mapping).to_string(), "127.0.0.3:8080");
        assert_eq!(
            PortTranslator::container_endpoint("10.10.0.3", mapping).map(|e| e.to_string()),
            Some("10.10.0.3:80".to_string())
        );
        assert_eq!(PortTranslator::container_endpoint("", mapping), None);
    }

    #[test]
    fn settings_prefixes_are_parsed() {
        let settings = NetworkSettings {
            scheme: HostScheme::Loopback,
            bridge_prefix: "172.20.0".into(),
            loopback_prefix: "127.1.0.".into(),
        };
        let t = PortTranslator::from_settings(&settings).expect("valid prefixes");
        assert_eq!(t.translate("172.20.0.4"), Ipv4Addr::new(127, 1, 0, 4));
        assert_eq!(t.reverse(Ipv4Addr::new(127, 1, 0, 4)), Some(Ipv4Addr::new(172, 20, 0, 4)));
    }

    #[test]
    fn bad_prefix_is_a_config_error() {
        let settings = NetworkSettings {
            bridge_prefix: "10.10".into(),
            ..NetworkSettings::default()
        };
        assert!(matches!(
            PortTranslator::from_settings(&settings),
            Err(BerthError::Config { .. })
        ));
    }
}
