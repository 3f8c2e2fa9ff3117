/*!
Layout engines move nodes of a [`NetworkGraph`] around.

The engine owning the graph drives the layout through explicit transitions:
`start` after the topology changed, `stop` while a detail popup is open, `resume`
once it closes. Nothing starts or resumes implicitly.

While the canvas is on screen the graph widget steps the layout every frame. The
layout hands its state to the widget before drawing and takes it back afterwards.
*/

pub mod force;

use crate::network::network_graph::NetworkGraph;

pub use force::{ForceLayout, Layout, LayoutState};

pub trait LayoutEngine: Send {
    /// Restart the simulation with fresh energy.
    fn start(&mut self);
    /// Freeze the simulation; `tick` keeps working for explicit settling.
    fn stop(&mut self);
    /// Continue a stopped simulation.
    fn resume(&mut self);
    fn is_running(&self) -> bool;
    /// Size of the drawing area, used as the centre of gravity.
    fn size(&mut self, width: f32, height: f32);
    /// One integration step.
    fn tick(&mut self, graph: &mut NetworkGraph);
    /// Hand the current state to the graph widget drawn in `ui`.
    fn store(&self, ui: &mut egui::Ui);
    /// Take back whatever the graph widget did to the state.
    fn load(&mut self, ui: &egui::Ui);
}
