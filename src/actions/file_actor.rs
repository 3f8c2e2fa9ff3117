use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    actions::{ActionError, DeleteActor},
    topology::{
        deletion::{DeleteCommand, DeletionTarget},
        snapshot::Snapshot,
    },
};

/// Deletes from the JSON snapshot file a `JsonFileSource` reads, so the next poll no
/// longer lists the entity.
pub struct SnapshotFileActor {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl SnapshotFileActor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl DeleteActor for SnapshotFileActor {
    async fn delete(&self, command: &DeleteCommand) -> Result<String, ActionError> {
        let _guard = self.lock.lock().await;
        let json = tokio::fs::read_to_string(&self.path).await?;
        let mut snapshot = Snapshot::from_json(&json)?;

        let message = match &command.target {
            DeletionTarget::Device { kind, id } => {
                if !snapshot.remove_entity(*kind, id) {
                    return Err(ActionError::NotFound(format!("{kind} {id}")));
                }
                format!("{kind} {id} deleted")
            }
            DeletionTarget::RouterInterface { router_id, port } => {
                if !snapshot.remove_router_port(router_id, port) {
                    return Err(ActionError::NotFound(format!(
                        "interface {} of router {router_id}",
                        port.short_id()
                    )));
                }
                format!("Interface {} removed from router {router_id}", port.short_id())
            }
        };

        tokio::fs::write(&self.path, serde_json::to_string_pretty(&snapshot)?).await?;
        info!(path = %self.path.display(), source_id = %command.source_id, "{}", message);
        Ok(message)
    }
}
