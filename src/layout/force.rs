use egui::{Pos2, Rect, Vec2, vec2};
use egui_graphs::{
    ForceAlgorithm, FruchtermanReingoldWithCenterGravity,
    FruchtermanReingoldWithCenterGravityState, LayoutForceDirected,
};

use crate::{layout::LayoutEngine, network::network_graph::NetworkGraph};

pub type LayoutState = FruchtermanReingoldWithCenterGravityState;
pub type Layout = LayoutForceDirected<FruchtermanReingoldWithCenterGravity>;

/// Fruchterman-Reingold with a pull toward the centre of the drawing area. There is no
/// cooling schedule, so a fresh start and a resume both just set the running flag.
#[derive(Clone)]
pub struct ForceLayout {
    state: LayoutState,
    size: Vec2,
}

impl Default for ForceLayout {
    fn default() -> Self {
        Self::new(LayoutState::default())
    }
}

impl ForceLayout {
    pub fn new(mut state: LayoutState) -> Self {
        state.base.is_running = false;
        Self {
            state,
            size: vec2(800.0, 600.0),
        }
    }

    fn view(&self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, self.size)
    }
}

impl LayoutEngine for ForceLayout {
    fn start(&mut self) {
        self.state.base.is_running = true;
    }

    fn stop(&mut self) {
        self.state.base.is_running = false;
    }

    fn resume(&mut self) {
        self.state.base.is_running = true;
    }

    fn is_running(&self) -> bool {
        self.state.base.is_running
    }

    fn size(&mut self, width: f32, height: f32) {
        self.size = vec2(width.max(1.0), height.max(1.0));
    }

    fn tick(&mut self, graph: &mut NetworkGraph) {
        let mut algorithm = FruchtermanReingoldWithCenterGravity::from_state(self.state.clone());
        algorithm.step(graph.inner_mut(), self.view());
        let running = self.state.base.is_running;
        self.state = algorithm.state();
        self.state.base.is_running = running;
    }

    fn store(&self, ui: &mut egui::Ui) {
        egui_graphs::set_layout_state(ui, self.state.clone(), None);
    }

    fn load(&mut self, ui: &egui::Ui) {
        self.state = egui_graphs::get_layout_state::<LayoutState>(ui, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::entity::{Entity, Network};

    fn net(id: &str) -> Entity {
        Entity::Network(Network {
            id: id.to_string(),
            name: id.to_string(),
            url: None,
            status: "ACTIVE".to_string(),
            subnets: Vec::new(),
            collapsed: false,
            instance_count: 0,
        })
    }

    #[test]
    fn test_transitions() {
        let mut layout = ForceLayout::default();
        assert!(!layout.is_running());
        layout.start();
        assert!(layout.is_running());
        layout.stop();
        assert!(!layout.is_running());
        layout.resume();
        assert!(layout.is_running());
    }

    #[test]
    fn test_tick_moves_nodes() {
        let mut graph = NetworkGraph::default();
        graph.add_node(net("a"), Some(Pos2::new(400.0, 300.0)));
        graph.add_node(net("b"), Some(Pos2::new(402.0, 300.0)));
        let mut layout = ForceLayout::default();
        layout.size(800.0, 600.0);
        layout.start();
        for _ in 0..20 {
            layout.tick(&mut graph);
        }
        let a = graph.position("a").unwrap();
        let b = graph.position("b").unwrap();
        assert!(a.x.is_finite() && b.y.is_finite());
        assert!(a.distance(b) > 2.0);
        assert!(layout.is_running());
    }

    #[test]
    fn test_tick_keeps_stopped_state() {
        let mut graph = NetworkGraph::default();
        graph.add_node(net("a"), None);
        let mut layout = ForceLayout::default();
        layout.start();
        layout.stop();
        layout.tick(&mut graph);
        assert!(!layout.is_running());
    }
}
