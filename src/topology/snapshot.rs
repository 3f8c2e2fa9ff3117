/*!
Raw snapshot records as returned by the cloud, and their conversion into graph entities.

A snapshot is a full point-in-time listing:

```json
{
    "networks": [{"id": "...", "name": "...", "status": "ACTIVE", "router:external": false,
                  "subnets": [{"id": "...", "cidr": "10.0.0.0/24"}]}],
    "routers":  [{"id": "...", "name": "...", "status": "ACTIVE",
                  "external_gateway_info": {"network_id": "..."}}],
    "servers":  [{"id": "...", "name": "...", "status": "ACTIVE", "console": "vnc"}],
    "ports":    [{"id": "...", "device_id": "...", "network_id": "...",
                  "device_owner": "compute:nova", "fixed_ips": [{"ip_address": "10.0.0.3"}]}]
}
```
*/

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::network::{
    entity::{Entity, EntityId, EntityKind, Network, Router, Server, Subnet},
    port::{DeviceOwner, Port},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub networks: Vec<RawNetwork>,
    #[serde(default)]
    pub routers: Vec<RawRouter>,
    #[serde(default)]
    pub servers: Vec<RawServer>,
    #[serde(default)]
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNetwork {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(rename = "router:external", default)]
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalGatewayInfo {
    pub network_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRouter {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub external_gateway_info: Option<ExternalGatewayInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawServer {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub console: Option<String>,
}

impl From<&RawNetwork> for Entity {
    fn from(raw: &RawNetwork) -> Self {
        let network = Network {
            id: raw.id.clone(),
            name: raw.name.clone(),
            url: raw.url.clone(),
            status: raw.status.clone(),
            subnets: raw.subnets.clone(),
            collapsed: false,
            instance_count: 0,
        };
        if raw.external {
            Entity::ExternalNetwork(network)
        } else {
            Entity::Network(network)
        }
    }
}

impl From<&RawRouter> for Entity {
    fn from(raw: &RawRouter) -> Self {
        Entity::Router(Router {
            id: raw.id.clone(),
            name: raw.name.clone(),
            url: raw.url.clone(),
            status: raw.status.clone(),
            external_gateway: raw
                .external_gateway_info
                .as_ref()
                .map(|gw| gw.network_id.clone()),
            ports: Vec::new(),
            attached_networks: Vec::new(),
        })
    }
}

impl From<&RawServer> for Entity {
    fn from(raw: &RawServer) -> Self {
        Entity::Server(Server {
            id: raw.id.clone(),
            name: raw.name.clone(),
            url: raw.url.clone(),
            status: raw.status.clone(),
            console: raw.console.clone(),
            attached_networks: Vec::new(),
            ip_addresses: Vec::new(),
        })
    }
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Ids of every network, router and server listed.
    pub fn entity_ids(&self) -> HashSet<&str> {
        self.networks
            .iter()
            .map(|n| n.id.as_str())
            .chain(self.routers.iter().map(|r| r.id.as_str()))
            .chain(self.servers.iter().map(|s| s.id.as_str()))
            .collect()
    }

    /// Port records plus an id-less gateway port for every router whose external
    /// gateway is not already represented by an explicit gateway port.
    pub fn effective_ports(&self) -> Vec<Port> {
        let mut ports = self.ports.clone();
        for router in self.routers.iter() {
            let Some(gateway) = &router.external_gateway_info else {
                continue;
            };
            let explicit = self.ports.iter().any(|p| {
                p.device_id == router.id
                    && p.network_id == gateway.network_id
                    && p.device_owner == DeviceOwner::RouterGateway
            });
            if !explicit {
                ports.push(Port {
                    id: None,
                    device_id: router.id.clone(),
                    network_id: gateway.network_id.clone(),
                    device_owner: DeviceOwner::RouterGateway,
                    status: router.status.clone(),
                    fixed_ips: Vec::new(),
                });
            }
        }
        ports
    }

    /// Remove an entity and every port plugged into it. Returns false if it was not listed.
    pub fn remove_entity(&mut self, kind: EntityKind, id: &str) -> bool {
        let removed = match kind {
            EntityKind::Network | EntityKind::ExternalNetwork => {
                let before = self.networks.len();
                self.networks.retain(|n| n.id != id);
                self.ports.retain(|p| p.network_id != id);
                for router in self.routers.iter_mut() {
                    if router
                        .external_gateway_info
                        .as_ref()
                        .is_some_and(|gw| gw.network_id == id)
                    {
                        router.external_gateway_info = None;
                    }
                }
                before != self.networks.len()
            }
            EntityKind::Router => {
                let before = self.routers.len();
                self.routers.retain(|r| r.id != id);
                before != self.routers.len()
            }
            EntityKind::Server => {
                let before = self.servers.len();
                self.servers.retain(|s| s.id != id);
                before != self.servers.len()
            }
        };
        if removed {
            self.ports.retain(|p| p.device_id != id);
        }
        removed
    }

    /// Remove a single router interface port. Returns false if no such port was listed.
    pub fn remove_router_port(&mut self, router_id: &str, port: &Port) -> bool {
        let before = self.ports.len();
        self.ports.retain(|p| {
            let same = match (&p.id, &port.id) {
                (Some(a), Some(b)) => a == b,
                _ => p == port,
            };
            !(same && p.device_id == router_id)
        });
        before != self.ports.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Snapshot {
        serde_json::from_value(json!({
            "networks": [
                {"id": "net1", "name": "private", "status": "ACTIVE",
                 "subnets": [{"id": "sub1", "cidr": "10.0.0.0/24"}]},
                {"id": "ext", "name": "public", "status": "ACTIVE", "router:external": true}
            ],
            "routers": [
                {"id": "r1", "name": "router1", "status": "ACTIVE",
                 "external_gateway_info": {"network_id": "ext"}}
            ],
            "servers": [
                {"id": "srv1", "name": "vm1", "status": "ACTIVE", "console": "vnc"}
            ],
            "ports": [
                {"id": "p1", "device_id": "srv1", "network_id": "net1",
                 "device_owner": "compute:nova",
                 "fixed_ips": [{"ip_address": "10.0.0.5", "subnet_id": "sub1"}]},
                {"id": "p2", "device_id": "r1", "network_id": "net1",
                 "device_owner": "network:router_interface"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_snapshot_deserialization() {
        let snapshot = sample();
        assert_eq!(snapshot.networks.len(), 2);
        assert!(snapshot.networks[1].external);
        assert_eq!(snapshot.networks[0].subnets[0].cidr.to_string(), "10.0.0.0/24");

        let entity = Entity::from(&snapshot.networks[1]);
        assert_eq!(entity.kind(), EntityKind::ExternalNetwork);
        let entity = Entity::from(&snapshot.routers[0]);
        assert_eq!(
            entity.as_router().and_then(|r| r.external_gateway.as_deref()),
            Some("ext")
        );
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let snapshot = Snapshot::from_json(r#"{"networks": []}"#).unwrap();
        assert!(snapshot.routers.is_empty());
        assert!(snapshot.ports.is_empty());
    }

    #[test]
    fn test_effective_ports_synthesizes_gateway() {
        let snapshot = sample();
        let ports = snapshot.effective_ports();
        assert_eq!(ports.len(), 3);
        let gateway = ports.last().unwrap();
        assert_eq!(gateway.device_owner, DeviceOwner::RouterGateway);
        assert!(gateway.id.is_none());
        assert_eq!(gateway.network_id, "ext");
    }

    #[test]
    fn test_remove_entity_drops_ports() {
        let mut snapshot = sample();
        assert!(snapshot.remove_entity(EntityKind::Server, "srv1"));
        assert!(!snapshot.remove_entity(EntityKind::Server, "srv1"));
        assert_eq!(snapshot.ports.len(), 1);

        assert!(snapshot.remove_entity(EntityKind::ExternalNetwork, "ext"));
        assert!(snapshot.routers[0].external_gateway_info.is_none());
    }

    #[test]
    fn test_remove_router_port() {
        let mut snapshot = sample();
        let port = snapshot.ports[1].clone();
        assert!(snapshot.remove_router_port("r1", &port));
        assert!(!snapshot.remove_router_port("r1", &port));
        assert_eq!(snapshot.ports.len(), 1);
    }
}
