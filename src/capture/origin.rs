use std::net::IpAddr;

use ipnetwork::IpNetwork;

/// Decides whether a packet was sent by this host.
#[derive(Debug, Clone, Default)]
pub struct LocalNetworks {
    networks: Vec<IpNetwork>,
}

impl LocalNetworks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts bare addresses (`192.168.0.89`) or CIDR blocks (`10.0.0.0/8`).
    pub fn from_strings<S: AsRef<str>>(entries: &[S]) -> Result<Self, ipnetwork::IpNetworkError> {
        let mut networks = Self::new();
        for entry in entries {
            networks.add_network(entry.as_ref())?;
        }
        Ok(networks)
    }

    pub fn from_addresses(addresses: &[IpAddr]) -> Self {
        Self {
            networks: addresses.iter().map(|addr| IpNetwork::from(*addr)).collect(),
        }
    }

    pub fn add_network(&mut self, network: &str) -> Result<(), ipnetwork::IpNetworkError> {
        let network: IpNetwork = network.parse()?;
        self.networks.push(network);
        Ok(())
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|network| network.contains(ip))
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn networks(&self) -> &[IpNetwork] {
        &self.networks
    }
}
