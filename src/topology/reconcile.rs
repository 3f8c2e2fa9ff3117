/*!
Folding a snapshot into the live graph.

Entities are upserted first (networks, then routers, then servers), then entities missing
from the snapshot are pruned, then ports are diffed against the ports already known.
Nodes keep their position across refreshes and derived state is carried forward from the
record being replaced, so applying the same snapshot twice changes nothing.
*/

use std::net::IpAddr;

use tracing::{debug, trace};

use crate::{
    network::{
        entity::{Entity, EntityId, Server},
        port::{DeviceOwner, Port},
    },
    topology::{aggregation::Placement, engine::TopologyEngine, snapshot::Snapshot},
};

/// What a single reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub hidden: usize,
    pub revealed: usize,
    pub links_created: usize,
    pub links_removed: usize,
    /// Something appeared that the layout has to place.
    pub topology_changed: bool,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        *self == ReconcileSummary::default()
    }

    fn record(&mut self, placement: Placement) {
        match placement {
            Placement::Hidden => self.hidden += 1,
            Placement::Visible { links } => {
                self.revealed += 1;
                self.links_created += links;
            }
        }
    }
}

impl TopologyEngine {
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for raw in snapshot.networks.iter() {
            self.upsert(Entity::from(raw), &mut summary);
        }
        for raw in snapshot.routers.iter() {
            self.upsert(Entity::from(raw), &mut summary);
        }
        for raw in snapshot.servers.iter() {
            self.upsert(Entity::from(raw), &mut summary);
        }

        self.prune_absent(snapshot, &mut summary);

        let ports = snapshot.effective_ports();
        for port in self.known_ports.retain_present(&ports) {
            self.detach_port(&port, &mut summary);
        }
        for port in ports {
            if self.known_ports.contains(&port) {
                continue;
            }
            if self.attach_port(&port, &mut summary) {
                self.known_ports.insert(port);
            }
        }

        summary.topology_changed =
            summary.added > 0 || summary.revealed > 0 || summary.links_created > 0;
        if summary.topology_changed {
            self.wake_layout(true);
        }
        self.refresh_popup();
        summary
    }

    fn upsert(&mut self, mut entity: Entity, summary: &mut ReconcileSummary) {
        let id = entity.id().to_string();

        if let Some(node) = self.graph.find_by_id_mut(&id) {
            entity.carry_forward(&node.data);
            if node.data != entity {
                trace!(id = %id, "updating entity");
                node.data = entity;
                summary.updated += 1;
                self.graph.refresh_label(&id);
            }
            return;
        }

        if let Some(entry) = self.hidden.get_mut(&id) {
            entity.carry_forward(&Entity::Server(entry.server.clone()));
            if let Entity::Server(server) = entity {
                if entry.server != server {
                    entry.server = server;
                    summary.updated += 1;
                }
            }
            return;
        }

        if let Some(network) = entity.as_network_mut() {
            network.collapsed = self.config.collapse_by_default;
        }
        trace!(entity = %entity, "adding entity");
        self.graph.add_node(entity, None);
        summary.added += 1;
    }

    fn prune_absent(&mut self, snapshot: &Snapshot, summary: &mut ReconcileSummary) {
        let present = snapshot.entity_ids();

        let dropped = self.hidden.retain(|id| present.contains(id));
        if dropped > 0 {
            debug!(dropped, "dropped hidden servers missing from snapshot");
            summary.removed += dropped;
        }

        let mut stale: Vec<EntityId> = self
            .graph
            .ids()
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect();
        stale.sort();

        for id in stale {
            let is_network = self
                .graph
                .find_by_id(&id)
                .is_some_and(|node| node.data.kind().is_network());
            if is_network {
                summary.revealed += self.release_hidden_behind(&id);
            }
            if self.popup.is_showing(&id) {
                self.hide_details();
            }
            self.settle_pending_deletion(&id);
            for port in self.known_ports.take_touching(&id) {
                self.detach_port(&port, summary);
            }
            if let Some(node) = self.graph.remove_node(&id) {
                trace!(entity = %node.data, "removing entity");
                summary.removed += 1;
            } else if self.hidden.remove(&id).is_some() {
                summary.removed += 1;
            }
        }
    }

    /// Undo what `attach_port` did for a port that is no longer listed.
    pub(super) fn detach_port(&mut self, port: &Port, summary: &mut ReconcileSummary) {
        let device_id = port.device_id.as_str();
        let network_id = port.network_id.as_str();

        match &port.device_owner {
            DeviceOwner::Compute(_) => {
                if let Some(network) = self
                    .graph
                    .find_by_id_mut(network_id)
                    .and_then(|node| node.data.as_network_mut())
                {
                    network.instance_count = network.instance_count.saturating_sub(1);
                }
                let ips: Vec<IpAddr> = port.ip_addresses().collect();
                if let Some(server) = self
                    .graph
                    .find_by_id_mut(device_id)
                    .and_then(|node| node.data.as_server_mut())
                {
                    strip_attachment(server, network_id, &ips);
                } else if let Some(entry) = self.hidden.get_mut(device_id) {
                    strip_attachment(&mut entry.server, network_id, &ips);
                    if entry.server.sole_network() != Some(&entry.network_id) {
                        let placement = self.reveal_hidden_server(device_id);
                        if placement != Placement::Hidden {
                            summary.record(placement);
                        }
                    }
                }
            }
            DeviceOwner::RouterInterface(_) => {
                if let Some(router) = self
                    .graph
                    .find_by_id_mut(device_id)
                    .and_then(|node| node.data.as_router_mut())
                {
                    router.ports.retain(|p| p != port);
                    if let Some(pos) = router.attached_networks.iter().position(|n| n == network_id) {
                        router.attached_networks.remove(pos);
                    }
                }
            }
            DeviceOwner::RouterGateway | DeviceOwner::Other(_) => {
                if let Some(router) = self
                    .graph
                    .find_by_id_mut(device_id)
                    .and_then(|node| node.data.as_router_mut())
                {
                    router.ports.retain(|p| p != port);
                }
            }
        }

        if !self.known_ports.connects(device_id, network_id)
            && self.graph.remove_link(device_id, network_id)
        {
            summary.links_removed += 1;
        }
        if self.hide_if_collapsed(device_id) {
            summary.hidden += 1;
        }
    }

    /// Fold a new port into the graph. Returns false if either end is unknown, in which
    /// case the port is retried on the next snapshot.
    fn attach_port(&mut self, port: &Port, summary: &mut ReconcileSummary) -> bool {
        let device_id = port.device_id.as_str();
        let network_id = port.network_id.as_str();

        let Some(network_collapsed) = self
            .graph
            .find_by_id(network_id)
            .and_then(|node| node.data.as_network())
            .map(|network| network.collapsed)
        else {
            trace!(port = %port.short_id(), network = network_id, "port network not visible");
            return false;
        };
        let device_hidden = self.hidden.contains(device_id);
        if !device_hidden && !self.graph.contains(device_id) {
            trace!(port = %port.short_id(), device = device_id, "port device not known");
            return false;
        }

        match &port.device_owner {
            DeviceOwner::Compute(_) => {
                self.bump_instance_count(network_id);

                if device_hidden {
                    let multi_homed = match self.hidden.get_mut(device_id) {
                        Some(entry) => {
                            entry.server.attached_networks.push(network_id.to_string());
                            entry.server.ip_addresses.extend(port.ip_addresses());
                            entry.server.sole_network().is_none()
                        }
                        None => false,
                    };
                    if multi_homed {
                        let placement = self.reveal_hidden_server(device_id);
                        summary.record(placement);
                    }
                    return true;
                }

                let first_attachment = match self
                    .graph
                    .find_by_id_mut(device_id)
                    .and_then(|node| node.data.as_server_mut())
                {
                    Some(server) => {
                        server.attached_networks.push(network_id.to_string());
                        server.ip_addresses.extend(port.ip_addresses());
                        server.sole_network().is_some()
                    }
                    None => return true,
                };

                if first_attachment && network_collapsed {
                    if self.hide_server(device_id, network_id) {
                        summary.hidden += 1;
                    }
                } else if self.graph.add_link(device_id, network_id) {
                    summary.links_created += 1;
                }
            }
            DeviceOwner::RouterInterface(_) => {
                if let Some(router) = self
                    .graph
                    .find_by_id_mut(device_id)
                    .and_then(|node| node.data.as_router_mut())
                {
                    router.attached_networks.push(network_id.to_string());
                    router.ports.push(port.clone());
                }
                if self.graph.add_link(device_id, network_id) {
                    summary.links_created += 1;
                }
            }
            DeviceOwner::RouterGateway | DeviceOwner::Other(_) => {
                let Some(router) = self
                    .graph
                    .find_by_id_mut(device_id)
                    .and_then(|node| node.data.as_router_mut())
                else {
                    return true;
                };
                router.ports.push(port.clone());
                if self.graph.add_link(device_id, network_id) {
                    summary.links_created += 1;
                }
            }
        }
        true
    }

    fn bump_instance_count(&mut self, network_id: &str) {
        if let Some(network) = self
            .graph
            .find_by_id_mut(network_id)
            .and_then(|node| node.data.as_network_mut())
        {
            network.instance_count += 1;
        }
    }
}

fn strip_attachment(server: &mut Server, network_id: &str, ips: &[IpAddr]) {
    server.detach_network(network_id);
    server.ip_addresses.retain(|ip| !ips.contains(ip));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        network::edge::UndirectedLinkKey,
        topology::{
            config::EngineConfig, snapshot::Snapshot, test_support::engine_with,
        },
    };

    fn snapshot(value: serde_json::Value) -> Snapshot {
        serde_json::from_value(value).unwrap()
    }

    fn base() -> Snapshot {
        snapshot(json!({
            "networks": [
                {"id": "net1", "name": "private", "status": "ACTIVE",
                 "subnets": [{"id": "sub1", "cidr": "10.0.0.0/24"}]},
                {"id": "ext", "name": "public", "status": "ACTIVE", "router:external": true}
            ],
            "routers": [
                {"id": "router1", "name": "router1", "status": "ACTIVE",
                 "external_gateway_info": {"network_id": "ext"}}
            ],
            "servers": [
                {"id": "srv1", "name": "web", "status": "ACTIVE"}
            ],
            "ports": [
                {"id": "p1", "device_id": "srv1", "network_id": "net1",
                 "device_owner": "compute:nova", "fixed_ips": [{"ip_address": "10.0.0.3"}]},
                {"id": "p2", "device_id": "router1", "network_id": "net1",
                 "device_owner": "network:router_interface",
                 "fixed_ips": [{"ip_address": "10.0.0.1"}]}
            ]
        }))
    }

    #[test]
    fn test_first_snapshot_builds_graph() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        let summary = engine.apply_snapshot(&base());

        assert_eq!(summary.added, 4);
        assert_eq!(summary.links_created, 3);
        assert!(summary.topology_changed);

        let graph = engine.graph();
        assert!(graph.has_link("srv1", "net1"));
        assert!(graph.has_link("router1", "net1"));
        assert!(graph.has_link("router1", "ext"));

        let net1 = graph.find_by_id("net1").unwrap().data.as_network().unwrap();
        assert_eq!(net1.instance_count, 1);
        let router = graph.find_by_id("router1").unwrap().data.as_router().unwrap();
        assert_eq!(router.ports.len(), 2);
        assert_eq!(router.attached_networks, vec!["net1"]);
        let server = graph.find_by_id("srv1").unwrap().data.as_server().unwrap();
        assert_eq!(server.ip_addresses, vec!["10.0.0.3".parse::<std::net::IpAddr>().unwrap()]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        let snapshot = base();
        engine.apply_snapshot(&snapshot);

        let nodes_before = engine.graph().node_count();
        let links_before = engine.graph().link_keys();
        let position_before = engine.graph().position("srv1");
        let router_before = engine.graph().find_by_id("router1").unwrap().data.clone();

        let summary = engine.apply_snapshot(&snapshot);
        assert!(summary.is_noop(), "unexpected changes: {:?}", summary);
        assert_eq!(engine.graph().node_count(), nodes_before);
        assert_eq!(engine.graph().link_keys(), links_before);
        assert_eq!(engine.graph().position("srv1"), position_before);
        assert_eq!(engine.graph().find_by_id("router1").unwrap().data, router_before);
    }

    #[test]
    fn test_port_removal_detaches_server() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&base());

        let mut next = base();
        next.ports.retain(|p| p.id.as_deref() != Some("p1"));
        let summary = engine.apply_snapshot(&next);

        assert_eq!(summary.links_removed, 1);
        assert!(!engine.graph().has_link("srv1", "net1"));
        let server = engine.graph().find_by_id("srv1").unwrap().data.as_server().unwrap();
        assert!(server.attached_networks.is_empty());
        assert!(server.ip_addresses.is_empty());
        let net1 = engine.graph().find_by_id("net1").unwrap().data.as_network().unwrap();
        assert_eq!(net1.instance_count, 0);
    }

    #[test]
    fn test_missing_entities_are_removed_with_links() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&base());

        let mut next = base();
        next.routers.clear();
        next.ports.retain(|p| p.device_id != "router1");
        let summary = engine.apply_snapshot(&next);

        assert_eq!(summary.removed, 1);
        assert!(!engine.graph().contains("router1"));
        assert_eq!(
            engine.graph().link_keys(),
            [UndirectedLinkKey::new("srv1", "net1")].into_iter().collect()
        );
    }

    #[test]
    fn test_unresolvable_port_is_retried() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        let mut early = base();
        early.servers.clear();
        engine.apply_snapshot(&early);
        assert!(!engine.graph().has_link("srv1", "net1"));

        let summary = engine.apply_snapshot(&base());
        assert_eq!(summary.added, 1);
        assert!(engine.graph().has_link("srv1", "net1"));
    }

    #[test]
    fn test_attributes_refresh_in_place() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&base());
        let position = engine.graph().position("srv1");

        let mut next = base();
        next.servers[0].status = "SHUTOFF".to_string();
        let summary = engine.apply_snapshot(&next);

        assert_eq!(summary.updated, 1);
        let node = engine.graph().find_by_id("srv1").unwrap();
        assert_eq!(node.data.status(), "SHUTOFF");
        assert_eq!(engine.graph().position("srv1"), position);
        assert_eq!(node.data.as_server().unwrap().attached_networks, vec!["net1"]);
    }

    #[test]
    fn test_explicit_gateway_port_is_not_duplicated() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        let mut snapshot = base();
        snapshot.ports.push(
            serde_json::from_value(json!({
                "id": "gw1", "device_id": "router1", "network_id": "ext",
                "device_owner": "network:router_gateway"
            }))
            .unwrap(),
        );
        engine.apply_snapshot(&snapshot);
        let router = engine.graph().find_by_id("router1").unwrap().data.as_router().unwrap();
        assert_eq!(router.ports.len(), 2);
        assert!(engine.apply_snapshot(&snapshot).is_noop());
    }
}
