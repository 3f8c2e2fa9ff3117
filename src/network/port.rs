use std::{collections::HashSet, fmt::Display, net::IpAddr};

use serde::{Deserialize, Serialize};

use crate::network::entity::EntityId;

/// What a port is plugged into, decoded from the cloud's `device_owner` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceOwner {
    /// `compute:<zone>` - a server NIC.
    Compute(String),
    /// `network:router_interface*` and HA replicated interfaces.
    RouterInterface(String),
    /// `network:router_gateway`
    RouterGateway,
    Other(String),
}

impl DeviceOwner {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("compute:") || raw == "compute" {
            DeviceOwner::Compute(raw.to_string())
        } else if raw.starts_with("network:router_interface")
            || raw == "network:ha_router_replicated_interface"
        {
            DeviceOwner::RouterInterface(raw.to_string())
        } else if raw == "network:router_gateway" {
            DeviceOwner::RouterGateway
        } else {
            DeviceOwner::Other(raw.to_string())
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            DeviceOwner::Compute(raw) => raw.clone(),
            DeviceOwner::RouterInterface(raw) => raw.clone(),
            DeviceOwner::RouterGateway => "network:router_gateway".to_string(),
            DeviceOwner::Other(raw) => raw.clone(),
        }
    }
}

// The wire format is the plain owner string, so serde goes through parse/as_string.

impl Serialize for DeviceOwner {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for DeviceOwner {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(DeviceOwner::parse(&s))
    }
}

impl Display for DeviceOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedIp {
    pub ip_address: IpAddr,
    #[serde(default)]
    pub subnet_id: Option<String>,
}

/// A port record. Used both as the raw snapshot record and as the value kept on routers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    /// Gateway ports are synthesized from router records and carry no id.
    #[serde(default)]
    pub id: Option<String>,
    pub device_id: EntityId,
    pub network_id: EntityId,
    pub device_owner: DeviceOwner,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}

impl Port {
    /// Composite identity for ports that have a stable id.
    pub fn key(&self) -> Option<PortKey> {
        if self.device_owner == DeviceOwner::RouterGateway {
            return None;
        }
        let id = self.id.as_ref().filter(|id| !id.is_empty())?;
        Some(PortKey {
            port_id: id.clone(),
            device_id: self.device_id.clone(),
            network_id: self.network_id.clone(),
        })
    }

    pub fn ip_addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.fixed_ips.iter().map(|ip| ip.ip_address)
    }

    pub fn short_id(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.chars().take(8).collect(),
            _ => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortKey {
    pub port_id: String,
    pub device_id: EntityId,
    pub network_id: EntityId,
}

/// Ports already folded into the graph.
///
/// Keyed ports are looked up by [`PortKey`]; id-less ports fall back to a linear
/// structural comparison, which is fine because there is at most one gateway per router.
#[derive(Debug, Default)]
pub struct KnownPorts {
    keyed: HashSet<PortKey>,
    keyed_ports: Vec<Port>,
    structural: Vec<Port>,
}

impl KnownPorts {
    pub fn contains(&self, port: &Port) -> bool {
        match port.key() {
            Some(key) => self.keyed.contains(&key),
            None => self.structural.iter().any(|known| known == port),
        }
    }

    pub fn insert(&mut self, port: Port) {
        match port.key() {
            Some(key) => {
                if self.keyed.insert(key) {
                    self.keyed_ports.push(port);
                }
            }
            None => {
                if !self.structural.contains(&port) {
                    self.structural.push(port);
                }
            }
        }
    }

    pub fn forget(&mut self, port: &Port) -> bool {
        match port.key() {
            Some(key) => {
                if self.keyed.remove(&key) {
                    self.keyed_ports.retain(|known| known.key().as_ref() != Some(&key));
                    true
                } else {
                    false
                }
            }
            None => {
                let before = self.structural.len();
                self.structural.retain(|known| known != port);
                before != self.structural.len()
            }
        }
    }

    /// Drop every known port missing from `current`, returning the dropped ports.
    pub fn retain_present(&mut self, current: &[Port]) -> Vec<Port> {
        let current_keys: HashSet<PortKey> = current.iter().filter_map(Port::key).collect();
        let mut gone = Vec::new();

        let keyed_ports = std::mem::take(&mut self.keyed_ports);
        for port in keyed_ports {
            match port.key() {
                Some(key) if current_keys.contains(&key) => self.keyed_ports.push(port),
                Some(key) => {
                    self.keyed.remove(&key);
                    gone.push(port);
                }
                None => {}
            }
        }

        let structural = std::mem::take(&mut self.structural);
        for port in structural {
            if current.contains(&port) {
                self.structural.push(port);
            } else {
                gone.push(port);
            }
        }
        gone
    }

    /// Forget every port plugged into `id`, returning them.
    pub fn take_touching(&mut self, id: &str) -> Vec<Port> {
        let touching: Vec<Port> = self
            .iter()
            .filter(|port| port.device_id == id || port.network_id == id)
            .cloned()
            .collect();
        for port in touching.iter() {
            self.forget(port);
        }
        touching
    }

    /// Whether any known port still connects `device_id` to `network_id`.
    pub fn connects(&self, device_id: &str, network_id: &str) -> bool {
        self.iter()
            .any(|port| port.device_id == device_id && port.network_id == network_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.keyed_ports.iter().chain(self.structural.iter())
    }

    pub fn len(&self) -> usize {
        self.keyed_ports.len() + self.structural.len()
    }

    pub fn clear(&mut self) {
        self.keyed.clear();
        self.keyed_ports.clear();
        self.structural.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn port(id: Option<&str>, device: &str, network: &str, owner: &str) -> Port {
        Port {
            id: id.map(str::to_string),
            device_id: device.to_string(),
            network_id: network.to_string(),
            device_owner: DeviceOwner::parse(owner),
            status: "ACTIVE".to_string(),
            fixed_ips: Vec::new(),
        }
    }

    #[test]
    fn test_device_owner_classification() {
        assert!(matches!(DeviceOwner::parse("compute:nova"), DeviceOwner::Compute(_)));
        assert!(matches!(
            DeviceOwner::parse("network:router_interface_distributed"),
            DeviceOwner::RouterInterface(_)
        ));
        assert!(matches!(
            DeviceOwner::parse("network:ha_router_replicated_interface"),
            DeviceOwner::RouterInterface(_)
        ));
        assert_eq!(DeviceOwner::parse("network:router_gateway"), DeviceOwner::RouterGateway);
        assert_eq!(
            DeviceOwner::parse("network:dhcp"),
            DeviceOwner::Other("network:dhcp".to_string())
        );
    }

    #[test]
    fn test_port_deserialization() {
        let value = json!({
            "id": "p1",
            "device_id": "srv1",
            "network_id": "net1",
            "device_owner": "compute:nova",
            "status": "ACTIVE",
            "fixed_ips": [{"ip_address": "10.0.0.5", "subnet_id": "sub1"}]
        });
        let port: Port = serde_json::from_value(value).unwrap();
        assert!(matches!(port.device_owner, DeviceOwner::Compute(_)));
        assert_eq!(port.ip_addresses().count(), 1);
        assert!(port.key().is_some());

        let gateway: Port = serde_json::from_value(json!({
            "device_id": "r1",
            "network_id": "ext",
            "device_owner": "network:router_gateway"
        }))
        .unwrap();
        assert!(gateway.key().is_none());
    }

    #[test]
    fn test_known_ports_structural_fallback() {
        let mut known = KnownPorts::default();
        let gateway = port(None, "r1", "ext", "network:router_gateway");
        known.insert(gateway.clone());
        known.insert(gateway.clone());
        assert_eq!(known.len(), 1);
        assert!(known.contains(&gateway));

        let other_gateway = port(None, "r2", "ext", "network:router_gateway");
        assert!(!known.contains(&other_gateway));
    }

    #[test]
    fn test_known_ports_retain_present() {
        let mut known = KnownPorts::default();
        let a = port(Some("a"), "srv1", "net1", "compute:nova");
        let b = port(Some("b"), "srv1", "net2", "compute:nova");
        known.insert(a.clone());
        known.insert(b.clone());

        let gone = known.retain_present(std::slice::from_ref(&a));
        assert_eq!(gone, vec![b.clone()]);
        assert!(known.contains(&a));
        assert!(!known.contains(&b));
        assert!(known.connects("srv1", "net1"));
        assert!(!known.connects("srv1", "net2"));
    }
}
