use std::time::Instant;

use egui::{Ui, Vec2};
use tracing::{debug, info};

use crate::{
    layout::LayoutEngine,
    network::{
        hull::{HullGroup, hull_groups},
        network_graph::{NetworkGraph, TopologyGraph},
        port::KnownPorts,
    },
    topology::{
        aggregation::SideTable,
        config::{DrawMode, EngineConfig},
        deletion::{CommandChannel, DeletionCoordinator},
        popup::DetailPopup,
        reconcile::ReconcileSummary,
        snapshot::Snapshot,
    },
};

/// Owns the graph and every piece of state that lives next to it.
///
/// All mutation goes through `&mut self`, so snapshot application, user actions and
/// notifications are serialized by whoever owns the engine.
pub struct TopologyEngine {
    pub(super) config: EngineConfig,
    pub(super) graph: NetworkGraph,
    pub(super) hidden: SideTable,
    pub(super) known_ports: KnownPorts,
    pub(super) popup: DetailPopup,
    pub(super) deletion: DeletionCoordinator,
    pub(super) layout: Box<dyn LayoutEngine>,
    pub(super) channel: Box<dyn CommandChannel>,
    /// A restart was requested while the popup kept the layout frozen.
    pub(super) layout_restart_deferred: bool,
    snapshots_applied: u64,
}

impl TopologyEngine {
    pub fn new(
        config: EngineConfig,
        layout: Box<dyn LayoutEngine>,
        channel: Box<dyn CommandChannel>,
    ) -> Self {
        Self {
            config,
            graph: NetworkGraph::default(),
            hidden: SideTable::default(),
            known_ports: KnownPorts::default(),
            popup: DetailPopup::default(),
            deletion: DeletionCoordinator::default(),
            layout,
            channel,
            layout_restart_deferred: false,
            snapshots_applied: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn side_table(&self) -> &SideTable {
        &self.hidden
    }

    pub fn known_ports(&self) -> &KnownPorts {
        &self.known_ports
    }

    pub fn popup(&self) -> &DetailPopup {
        &self.popup
    }

    pub fn deletion(&self) -> &DeletionCoordinator {
        &self.deletion
    }

    pub fn layout(&self) -> &dyn LayoutEngine {
        self.layout.as_ref()
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied
    }

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        self.config.draw_mode = mode;
    }

    /// Apply a freshly fetched snapshot according to the configured draw mode.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> ReconcileSummary {
        self.expire_pending_deletion(Instant::now());

        if self.config.draw_mode == DrawMode::Redraw && self.snapshots_applied > 0 {
            debug!("redraw mode, discarding previous graph");
            self.hide_details();
            self.graph.clear();
            self.hidden.clear();
            self.known_ports.clear();
        }

        let summary = self.reconcile(snapshot);

        if self.snapshots_applied == 0 {
            self.layout.start();
            for _ in 0..self.config.initial_settle_ticks {
                self.layout.tick(&mut self.graph);
            }
            if self.popup.is_open() {
                self.layout.stop();
            }
        }
        self.snapshots_applied += 1;

        info!(
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            links_created = summary.links_created,
            links_removed = summary.links_removed,
            "applied snapshot"
        );
        summary
    }

    /// Drop everything, as if no snapshot had been applied.
    pub fn clear(&mut self) {
        self.hide_details();
        self.graph.clear();
        self.hidden.clear();
        self.known_ports.clear();
        self.snapshots_applied = 0;
    }

    /// Wake the layout if the graph changed since the last frame. Returns whether it is
    /// still moving.
    pub fn prepare_frame(&mut self) -> bool {
        if self.graph.take_layout_wake() {
            self.wake_layout(false);
        }
        self.layout.is_running()
    }

    pub fn resize(&mut self, size: Vec2) {
        self.layout.size(size.x, size.y);
    }

    pub fn hulls(&self) -> Vec<HullGroup> {
        hull_groups(&self.graph, self.config.hull_offset)
    }

    /// Run `draw` with the raw graph for the graph widget. The layout state is handed to
    /// the widget before and taken back after, so the widget steps it only while running.
    pub fn with_canvas<R>(
        &mut self,
        ui: &mut Ui,
        draw: impl FnOnce(&mut Ui, &mut TopologyGraph) -> R,
    ) -> R {
        self.layout.store(ui);
        let result = draw(&mut *ui, self.graph.inner_mut());
        self.layout.load(ui);
        result
    }

    /// Deselect every node on the canvas.
    pub fn clear_selection(&mut self) {
        self.graph.clear_selection();
    }

    /// Start or resume the layout unless the popup is holding it.
    pub(super) fn wake_layout(&mut self, restart: bool) {
        if self.popup.is_open() {
            self.layout_restart_deferred |= restart;
            return;
        }
        if restart {
            self.layout.start();
        } else if !self.layout.is_running() {
            self.layout.resume();
        }
    }
}

impl std::fmt::Debug for TopologyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyEngine")
            .field("config", &self.config)
            .field("graph", &self.graph)
            .field("hidden", &self.hidden)
            .field("popup", &self.popup)
            .field("deletion", &self.deletion)
            .field("snapshots_applied", &self.snapshots_applied)
            .finish()
    }
}
