use std::{fmt::Display, net::IpAddr};

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::network::port::Port;

/// Identifier assigned by the cloud for networks, routers and servers.
pub type EntityId = String;

/// Discriminant of [`Entity`], also used to address delete commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Network,
    ExternalNetwork,
    Router,
    Server,
}

impl EntityKind {
    /// Path segment of the management endpoint responsible for this kind.
    pub fn url_segment(&self) -> &'static str {
        match self {
            EntityKind::Network | EntityKind::ExternalNetwork => "networks",
            EntityKind::Router => "routers",
            EntityKind::Server => "instances",
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, EntityKind::Network | EntityKind::ExternalNetwork)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Network => "Network",
            EntityKind::ExternalNetwork => "External network",
            EntityKind::Router => "Router",
            EntityKind::Server => "Server",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub cidr: IpNetwork,
    #[serde(default)]
    pub url: Option<String>,
}

impl Display for Subnet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.cidr)
        } else {
            write!(f, "{} ({})", self.name, self.cidr)
        }
    }
}

/// A tenant or externally routed network.
///
/// `collapsed` and `instance_count` are derived state: they never come from a snapshot
/// and are carried forward from the previous record on every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub id: EntityId,
    pub name: String,
    pub url: Option<String>,
    pub status: String,
    pub subnets: Vec<Subnet>,
    pub collapsed: bool,
    pub instance_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Router {
    pub id: EntityId,
    pub name: String,
    pub url: Option<String>,
    pub status: String,
    pub external_gateway: Option<EntityId>,
    /// Ports recorded while reconciling port records.
    pub ports: Vec<Port>,
    pub attached_networks: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub id: EntityId,
    pub name: String,
    pub url: Option<String>,
    pub status: String,
    pub console: Option<String>,
    pub attached_networks: Vec<EntityId>,
    pub ip_addresses: Vec<IpAddr>,
}

impl Server {
    /// The network this server is attached to, if it is attached to exactly one.
    /// Several ports on the same network still count as one attachment.
    pub fn sole_network(&self) -> Option<&EntityId> {
        let first = self.attached_networks.first()?;
        self.attached_networks
            .iter()
            .all(|n| n == first)
            .then_some(first)
    }

    pub fn detach_network(&mut self, network_id: &str) {
        if let Some(pos) = self.attached_networks.iter().position(|n| n == network_id) {
            self.attached_networks.remove(pos);
        }
    }
}

/// Everything the graph can show as a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Network(Network),
    ExternalNetwork(Network),
    Router(Router),
    Server(Server),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Network(_) => EntityKind::Network,
            Entity::ExternalNetwork(_) => EntityKind::ExternalNetwork,
            Entity::Router(_) => EntityKind::Router,
            Entity::Server(_) => EntityKind::Server,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Network(n) | Entity::ExternalNetwork(n) => &n.id,
            Entity::Router(r) => &r.id,
            Entity::Server(s) => &s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Network(n) | Entity::ExternalNetwork(n) => &n.name,
            Entity::Router(r) => &r.name,
            Entity::Server(s) => &s.name,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Entity::Network(n) | Entity::ExternalNetwork(n) => n.url.as_deref(),
            Entity::Router(r) => r.url.as_deref(),
            Entity::Server(s) => s.url.as_deref(),
        }
    }

    pub fn status(&self) -> &str {
        match self {
            Entity::Network(n) | Entity::ExternalNetwork(n) => &n.status,
            Entity::Router(r) => &r.status,
            Entity::Server(s) => &s.status,
        }
    }

    /// Name shown on the canvas; falls back to a shortened id for unnamed entities.
    pub fn label(&self) -> String {
        if self.name().is_empty() {
            let id = self.id();
            let short: String = id.chars().take(8).collect();
            format!("({})", short)
        } else {
            self.name().to_string()
        }
    }

    pub fn as_network(&self) -> Option<&Network> {
        match self {
            Entity::Network(n) | Entity::ExternalNetwork(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_network_mut(&mut self) -> Option<&mut Network> {
        match self {
            Entity::Network(n) | Entity::ExternalNetwork(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_router(&self) -> Option<&Router> {
        match self {
            Entity::Router(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_router_mut(&mut self) -> Option<&mut Router> {
        match self {
            Entity::Router(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_server(&self) -> Option<&Server> {
        match self {
            Entity::Server(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_server_mut(&mut self) -> Option<&mut Server> {
        match self {
            Entity::Server(s) => Some(s),
            _ => None,
        }
    }

    /// Copy derived state from the record this one replaces.
    ///
    /// Snapshot records only carry what the cloud reports; everything accumulated by the
    /// reconciler lives on the previous record and must survive the refresh.
    pub fn carry_forward(&mut self, previous: &Entity) {
        match (self, previous) {
            (
                Entity::Network(new) | Entity::ExternalNetwork(new),
                Entity::Network(old) | Entity::ExternalNetwork(old),
            ) => {
                new.collapsed = old.collapsed;
                new.instance_count = old.instance_count;
            }
            (Entity::Router(new), Entity::Router(old)) => {
                new.ports = old.ports.clone();
                new.attached_networks = old.attached_networks.clone();
            }
            (Entity::Server(new), Entity::Server(old)) => {
                new.attached_networks = old.attached_networks.clone();
                new.ip_addresses = old.ip_addresses.clone();
            }
            _ => {}
        }
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} [{}]", self.kind(), self.label(), self.id())
    }
}
