/*!
Topology module

Everything between a raw snapshot and the graph the canvas draws.

Structure:
- `snapshot`: raw records as listed by the cloud and their conversion into entities.
- `source`: the async `SnapshotSource` trait and its error type; `file_source` reads JSON files.
- `config`: `EngineConfig`, loaded from JSON and overridden from the command line.
- `engine`: `TopologyEngine`, the owner of the graph and all state living next to it.
- `reconcile`: folding a snapshot into the graph.
- `aggregation`: collapsing networks and the side table of hidden servers.
- `popup`: the single detail popup.
- `deletion`: delete commands and their notifications.
*/

pub mod aggregation;
pub mod config;
pub mod deletion;
pub mod engine;
pub mod file_source;
pub mod popup;
pub mod reconcile;
pub mod snapshot;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{DrawMode, EngineConfig};
pub use engine::TopologyEngine;
pub use file_source::JsonFileSource;
pub use snapshot::Snapshot;
pub use source::{SnapshotSource, TopologyError, TopologyResult};
