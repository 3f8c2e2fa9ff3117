/*!
Out-of-band deletion actors.

The engine only emits [`DeleteCommand`]s. An [`ActorChannel`] runs each command on its own
tokio task against a [`DeleteActor`] and posts the resulting notification on the bus the
UI thread drains.
*/

pub mod channel;
pub mod file_actor;

use async_trait::async_trait;
use thiserror::Error;

use crate::topology::deletion::DeleteCommand;

pub use channel::{ActorChannel, notification_bus};
pub use file_actor::SnapshotFileActor;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Something able to carry out a delete. Returns the message shown to the user.
#[async_trait]
pub trait DeleteActor: Send + Sync {
    async fn delete(&self, command: &DeleteCommand) -> Result<String, ActionError>;
}
