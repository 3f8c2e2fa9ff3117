use std::collections::{HashMap, HashSet};

use egui::Pos2;
use egui_graphs::Graph;
use petgraph::{
    Undirected,
    graph::DefaultIx,
    stable_graph::{EdgeIndex, NodeIndex, StableGraph},
    visit::EdgeRef,
};
use rand::Rng;

use crate::{
    gui::{edge_shape::NetworkLinkShape, node_shape::NetworkNodeShape},
    network::{
        edge::{GraphLink, UndirectedLinkKey},
        entity::{Entity, EntityId},
    },
};

/// An entity together with the transient state the canvas needs. The position lives on
/// the widget node that wraps this payload.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub data: Entity,
    /// Set while a delete for this entity awaits confirmation.
    pub loading: bool,
}

impl GraphNode {
    fn new(data: Entity) -> Self {
        Self {
            data,
            loading: false,
        }
    }

    pub fn id(&self) -> &str {
        self.data.id()
    }
}

pub type TopologyGraph =
    Graph<GraphNode, GraphLink, Undirected, DefaultIx, NetworkNodeShape, NetworkLinkShape>;

fn empty_graph() -> TopologyGraph {
    egui_graphs::to_graph(&StableGraph::<GraphNode, GraphLink, Undirected>::default())
}

/// The authoritative set of visible nodes and links.
///
/// Only rendered entities live here: servers hidden behind a collapsed network are not
/// findable through [`NetworkGraph::find_by_id`].
pub struct NetworkGraph {
    graph: TopologyGraph,
    node_id_to_index_map: HashMap<EntityId, NodeIndex>,
    layout_wake: bool,
}

impl Default for NetworkGraph {
    fn default() -> Self {
        Self {
            graph: empty_graph(),
            node_id_to_index_map: HashMap::new(),
            layout_wake: false,
        }
    }
}

impl NetworkGraph {
    pub fn find_by_id(&self, id: &str) -> Option<&GraphNode> {
        let index = self.node_id_to_index_map.get(id)?;
        self.graph.node(*index).map(|node| node.payload())
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        let index = self.node_id_to_index_map.get(id)?;
        self.graph.node_mut(*index).map(|node| node.payload_mut())
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_id_to_index_map.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_id_to_index_map.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<Pos2> {
        let index = self.node_id_to_index_map.get(id)?;
        self.graph.node(*index).map(|node| node.location())
    }

    /// Insert a node, seeding its position when given. Adding an entity whose id is
    /// already present returns the existing node untouched.
    pub fn add_node(&mut self, entity: Entity, position: Option<Pos2>) -> NodeIndex {
        if let Some(&index) = self.node_id_to_index_map.get(entity.id()) {
            return index;
        }
        let position = position.unwrap_or_else(|| {
            let mut rng = rand::rng();
            Pos2::new(rng.random_range(0.0..40.0), rng.random_range(0.0..40.0))
        });
        let id = entity.id().to_string();
        let label = entity.label();
        let index = self.graph.add_node(GraphNode::new(entity));
        if let Some(node) = self.graph.node_mut(index) {
            node.set_location(position);
            node.set_label(label);
        }
        self.node_id_to_index_map.insert(id, index);
        index
    }

    /// Push the entity's current label to the widget node after its record was replaced.
    pub fn refresh_label(&mut self, id: &str) {
        let Some(&index) = self.node_id_to_index_map.get(id) else {
            return;
        };
        if let Some(node) = self.graph.node_mut(index) {
            let label = node.payload().data.label();
            if node.label() != label {
                node.set_label(label);
            }
        }
    }

    /// Remove a node and every link touching it.
    pub fn remove_node(&mut self, id: &str) -> Option<GraphNode> {
        let index = *self.node_id_to_index_map.get(id)?;
        self.remove_links_for(id);
        self.node_id_to_index_map.remove(id);
        self.graph
            .remove_node(index)
            .map(|node| node.payload().clone())
    }

    /// Remove every link whose source or target is `id`. Returns how many were removed.
    pub fn remove_links_for(&mut self, id: &str) -> usize {
        let Some(&index) = self.node_id_to_index_map.get(id) else {
            return 0;
        };
        let incident: Vec<EdgeIndex> = self.graph.g().edges(index).map(|edge| edge.id()).collect();
        for edge in incident.iter() {
            self.graph.remove_edge(*edge);
        }
        self.layout_wake = true;
        incident.len()
    }

    /// Link two visible nodes. Returns false if either is missing or the link already exists.
    pub fn add_link(&mut self, source: &str, target: &str) -> bool {
        let (Some(&a), Some(&b)) = (
            self.node_id_to_index_map.get(source),
            self.node_id_to_index_map.get(target),
        ) else {
            return false;
        };
        if a == b || self.graph.g().find_edge(a, b).is_some() {
            return false;
        }
        self.graph.add_edge(a, b, GraphLink::new(source, target));
        true
    }

    pub fn remove_link(&mut self, source: &str, target: &str) -> bool {
        let (Some(&a), Some(&b)) = (
            self.node_id_to_index_map.get(source),
            self.node_id_to_index_map.get(target),
        ) else {
            return false;
        };
        match self.graph.g().find_edge(a, b) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                self.layout_wake = true;
                true
            }
            None => false,
        }
    }

    pub fn has_link(&self, source: &str, target: &str) -> bool {
        match (self.index_of(source), self.index_of(target)) {
            (Some(a), Some(b)) => self.graph.g().find_edge(a, b).is_some(),
            _ => false,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.nodes_iter().map(|(_, node)| node.payload())
    }

    /// Visible nodes together with their current canvas position.
    pub fn positioned_nodes(&self) -> impl Iterator<Item = (&GraphNode, Pos2)> {
        self.graph
            .nodes_iter()
            .map(|(_, node)| (node.payload(), node.location()))
    }

    pub fn links(&self) -> impl Iterator<Item = &GraphLink> {
        self.graph.edges_iter().map(|(_, edge)| edge.payload())
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.node_id_to_index_map.keys()
    }

    pub fn node_count(&self) -> usize {
        self.graph.g().node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.g().edge_count()
    }

    pub fn link_keys(&self) -> HashSet<UndirectedLinkKey> {
        self.links().map(GraphLink::key).collect()
    }

    pub fn set_loading(&mut self, id: &str, loading: bool) -> bool {
        match self.find_by_id_mut(id) {
            Some(node) => {
                node.loading = loading;
                true
            }
            None => false,
        }
    }

    /// The node currently selected on the canvas.
    pub fn selected(&self) -> Option<EntityId> {
        self.graph
            .nodes_iter()
            .find(|(_, node)| node.selected())
            .map(|(_, node)| node.payload().id().to_string())
    }

    /// The node under the pointer on the last drawn frame.
    pub fn hovered(&self) -> Option<EntityId> {
        self.graph
            .nodes_iter()
            .find(|(_, node)| node.hovered())
            .map(|(_, node)| node.payload().id().to_string())
    }

    pub fn clear_selection(&mut self) {
        let selected: Vec<NodeIndex> = self
            .graph
            .nodes_iter()
            .filter(|(_, node)| node.selected())
            .map(|(index, _)| index)
            .collect();
        for index in selected {
            if let Some(node) = self.graph.node_mut(index) {
                node.set_selected(false);
            }
        }
    }

    /// Whether something happened that should wake a paused layout. Resets the flag.
    pub fn take_layout_wake(&mut self) -> bool {
        std::mem::take(&mut self.layout_wake)
    }

    pub fn clear(&mut self) {
        self.graph = empty_graph();
        self.node_id_to_index_map.clear();
        self.layout_wake = true;
    }

    /// Raw access for the layout and the graph widget. Entity bookkeeping must go
    /// through the methods above so the id map stays in step.
    pub(crate) fn inner_mut(&mut self) -> &mut TopologyGraph {
        &mut self.graph
    }
}

impl std::fmt::Debug for NetworkGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkGraph")
            .field("nodes", &self.node_count())
            .field("links", &self.link_count())
            .field("layout_wake", &self.layout_wake)
            .finish()
    }
}

impl std::fmt::Display for NetworkGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph: {} nodes, {} links", self.node_count(), self.link_count())?;
        for (node, position) in self.positioned_nodes() {
            writeln!(f, "  {} @ ({:.1}, {:.1})", node.data, position.x, position.y)?;
        }
        for link in self.links() {
            writeln!(f, "  {} -- {}", link.source, link.target)?;
        }
        Ok(())
    }
}
