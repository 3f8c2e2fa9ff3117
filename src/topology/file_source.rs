use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::topology::{
    snapshot::Snapshot,
    source::{SnapshotSource, TopologyResult},
};

/// Reads a snapshot from a JSON file on every fetch.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for JsonFileSource {
    async fn fetch_snapshot(&mut self) -> TopologyResult<Snapshot> {
        let json = tokio::fs::read_to_string(&self.path).await?;
        let snapshot = Snapshot::from_json(&json)?;
        debug!(
            path = %self.path.display(),
            networks = snapshot.networks.len(),
            routers = snapshot.routers.len(),
            servers = snapshot.servers.len(),
            ports = snapshot.ports.len(),
            "read snapshot"
        );
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
