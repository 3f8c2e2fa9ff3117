/*
 * This module defines the graph format rendered by the GUI: the entity records,
 * ports, links and the store holding the visible nodes.
 */

pub mod edge;
pub mod entity;
pub mod hull;
pub mod network_graph;
pub mod port;
