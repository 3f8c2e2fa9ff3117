/*!
Collapsing networks.

A collapsed network hides every server attached only to it. Hidden servers are parked in
the [`SideTable`] together with the network they hide behind, and come back when the
network is expanded, when they gain a second network, or when their network goes away.
*/

use std::collections::HashMap;

use egui::Pos2;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    network::entity::{Entity, EntityId, Server},
    topology::engine::TopologyEngine,
};

#[derive(Debug, Clone, PartialEq)]
pub struct HiddenServer {
    pub server: Server,
    /// The collapsed network this server is hidden behind.
    pub network_id: EntityId,
}

/// Servers removed from the graph by a collapse, keyed by server id.
#[derive(Debug, Default)]
pub struct SideTable {
    entries: HashMap<EntityId, HiddenServer>,
}

impl SideTable {
    pub fn get(&self, id: &str) -> Option<&HiddenServer> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut HiddenServer> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, entry: HiddenServer) {
        self.entries.insert(entry.server.id.clone(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<HiddenServer> {
        self.entries.remove(id)
    }

    /// Ids of the servers hidden behind `network_id`, sorted for stable processing.
    pub fn hidden_behind(&self, network_id: &str) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entries
            .values()
            .filter(|entry| entry.network_id == network_id)
            .map(|entry| entry.server.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn count_behind(&self, network_id: &str) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.network_id == network_id)
            .count()
    }

    /// Drop entries whose id fails `keep`. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| keep(id));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HiddenServer> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("{0} is not visible")]
    NotFound(EntityId),
    #[error("{0} is not a network")]
    NotANetwork(EntityId),
    #[error("network {0} is already collapsed")]
    AlreadyCollapsed(EntityId),
    #[error("network {0} is already expanded")]
    AlreadyExpanded(EntityId),
}

/// Where a server ended up after being (re)placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Placement {
    Hidden,
    Visible { links: usize },
}

impl TopologyEngine {
    /// Hide every server attached only to `network_id`. Returns how many were hidden.
    pub fn collapse(&mut self, network_id: &str) -> Result<usize, AggregationError> {
        if self.network_collapsed(network_id)? {
            return Err(AggregationError::AlreadyCollapsed(network_id.to_string()));
        }

        let servers: Vec<EntityId> = self
            .graph
            .nodes()
            .filter_map(|node| node.data.as_server())
            .filter(|server| server.sole_network().map(String::as_str) == Some(network_id))
            .map(|server| server.id.clone())
            .collect();
        for id in servers.iter() {
            self.hide_server(id, network_id);
        }
        self.set_collapsed(network_id, true);

        info!(network = network_id, hidden = servers.len(), "collapsed network");
        Ok(servers.len())
    }

    /// Restore the servers hidden behind `network_id` and settle the layout around them.
    /// Returns how many were restored.
    pub fn expand(&mut self, network_id: &str) -> Result<usize, AggregationError> {
        if !self.network_collapsed(network_id)? {
            return Err(AggregationError::AlreadyExpanded(network_id.to_string()));
        }
        self.set_collapsed(network_id, false);

        let seed = self.graph.position(network_id);
        let mut restored = 0;
        for id in self.hidden.hidden_behind(network_id) {
            let Some(entry) = self.hidden.remove(&id) else {
                continue;
            };
            if self.place_server(entry.server, seed) != Placement::Hidden {
                restored += 1;
            }
        }

        self.layout.start();
        for _ in 0..self.config.expand_settle_ticks {
            self.layout.tick(&mut self.graph);
        }
        if self.popup.is_open() {
            self.layout.stop();
        }

        info!(network = network_id, restored, "expanded network");
        Ok(restored)
    }

    /// Collapse or expand depending on the current state. Returns the new collapsed state.
    pub fn toggle_collapse(&mut self, network_id: &str) -> Result<bool, AggregationError> {
        if self.network_collapsed(network_id)? {
            self.expand(network_id).map(|_| false)
        } else {
            self.collapse(network_id).map(|_| true)
        }
    }

    /// Count shown on a collapsed network, absent when nothing is hidden behind it.
    pub fn badge(&self, network_id: &str) -> Option<usize> {
        let count = self.hidden.count_behind(network_id);
        (count > 0).then_some(count)
    }

    fn network_collapsed(&self, network_id: &str) -> Result<bool, AggregationError> {
        let node = self
            .graph
            .find_by_id(network_id)
            .ok_or_else(|| AggregationError::NotFound(network_id.to_string()))?;
        node.data
            .as_network()
            .map(|network| network.collapsed)
            .ok_or_else(|| AggregationError::NotANetwork(network_id.to_string()))
    }

    fn set_collapsed(&mut self, network_id: &str, collapsed: bool) {
        if let Some(network) = self
            .graph
            .find_by_id_mut(network_id)
            .and_then(|node| node.data.as_network_mut())
        {
            network.collapsed = collapsed;
        }
    }

    /// Whether `network_id` is a visible, collapsed network.
    pub(super) fn is_collapsed_network(&self, network_id: &str) -> bool {
        self.network_collapsed(network_id).unwrap_or(false)
    }

    /// Move a visible server into the side table behind `network_id`. Anything that is not
    /// a visible server is left alone.
    pub(super) fn hide_server(&mut self, server_id: &str, network_id: &str) -> bool {
        let is_server = self
            .graph
            .find_by_id(server_id)
            .is_some_and(|node| node.data.as_server().is_some());
        if !is_server {
            return false;
        }
        if self.popup.is_showing(server_id) {
            self.hide_details();
        }
        let Some(Entity::Server(server)) = self.graph.remove_node(server_id).map(|node| node.data)
        else {
            return false;
        };
        debug!(server = server_id, network = network_id, "hiding server");
        self.hidden.insert(HiddenServer {
            server,
            network_id: network_id.to_string(),
        });
        true
    }

    /// Hide a visible server whose only network is collapsed.
    pub(super) fn hide_if_collapsed(&mut self, server_id: &str) -> bool {
        let Some(network_id) = self
            .graph
            .find_by_id(server_id)
            .and_then(|node| node.data.as_server())
            .and_then(|server| server.sole_network().cloned())
        else {
            return false;
        };
        self.is_collapsed_network(&network_id) && self.hide_server(server_id, &network_id)
    }

    /// Put a server back into the graph, or into the side table if its only network is
    /// collapsed. Visible servers are linked to every visible network they attach to.
    pub(super) fn place_server(&mut self, server: Server, seed: Option<Pos2>) -> Placement {
        if let Some(network_id) = server.sole_network().cloned() {
            if self.is_collapsed_network(&network_id) {
                self.hidden.insert(HiddenServer { server, network_id });
                return Placement::Hidden;
            }
        }

        let id = server.id.clone();
        let networks = server.attached_networks.clone();
        self.graph.add_node(Entity::Server(server), seed);
        let links = networks
            .iter()
            .filter(|network| self.graph.add_link(&id, network))
            .count();
        Placement::Visible { links }
    }

    /// Take a server out of the side table, e.g. after it gained a second network.
    pub(super) fn reveal_hidden_server(&mut self, server_id: &str) -> Placement {
        let Some(entry) = self.hidden.remove(server_id) else {
            return Placement::Hidden;
        };
        let seed = self.graph.position(&entry.network_id);
        debug!(server = server_id, network = %entry.network_id, "revealing server");
        self.place_server(entry.server, seed)
    }

    /// Release every server hidden behind a network that is going away. They lose their
    /// attachment to it and are placed again. Returns how many became visible.
    pub(super) fn release_hidden_behind(&mut self, network_id: &str) -> usize {
        let seed = self.graph.position(network_id);
        let mut revealed = 0;
        for id in self.hidden.hidden_behind(network_id) {
            let Some(mut entry) = self.hidden.remove(&id) else {
                continue;
            };
            entry.server.attached_networks.retain(|n| n != network_id);
            if self.place_server(entry.server, seed) != Placement::Hidden {
                revealed += 1;
            }
        }
        revealed
    }
}
