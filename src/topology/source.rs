/*!
Snapshot provider interface.

This module defines:
- `TopologyError`: minimal error type for snapshot retrieval.
- `SnapshotSource`: an async trait returning a full topology snapshot.

Transports (a JSON file, an HTTP endpoint, ...) implement `SnapshotSource` and
encapsulate how they obtain and decode the listing.
*/

use std::fmt::Display;

use async_trait::async_trait;

use crate::topology::snapshot::Snapshot;

/// Error type for snapshot retrieval.
#[derive(Debug, Clone)]
pub enum TopologyError {
    /// Underlying IO/transport error.
    Acquisition(String),
    /// The source answered with something that is not a snapshot.
    Protocol(String),
}

impl Display for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyError::Acquisition(msg) => write!(f, "acquisition error: {msg}"),
            TopologyError::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for TopologyError {}

impl From<std::io::Error> for TopologyError {
    fn from(e: std::io::Error) -> Self {
        TopologyError::Acquisition(e.to_string())
    }
}

impl From<serde_json::Error> for TopologyError {
    fn from(e: serde_json::Error) -> Self {
        TopologyError::Protocol(e.to_string())
    }
}

/// Convenience result alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// A small async interface for providing snapshots to the engine.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&mut self) -> TopologyResult<Snapshot>;

    /// Human readable description used in logs and the side panel.
    fn describe(&self) -> String;
}
