/*
 * Desktop front end: the canvas that draws the engine's graph, the detail popup
 * and the background snapshot poller.
 */

pub mod app;
pub mod autopoll;
pub mod canvas;
pub mod edge_shape;
pub mod node_panel;
pub mod node_shape;
