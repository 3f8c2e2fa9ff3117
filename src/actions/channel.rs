use std::sync::Arc;

use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};
use tracing::{debug, warn};

use crate::{
    actions::DeleteActor,
    topology::deletion::{CommandChannel, DeleteCommand, DeletionError, Notification},
};

pub fn notification_bus() -> (UnboundedSender<Notification>, UnboundedReceiver<Notification>) {
    unbounded_channel()
}

/// Runs every command on its own task and reports the outcome on the notification bus.
pub struct ActorChannel {
    runtime: Handle,
    actor: Arc<dyn DeleteActor>,
    bus: UnboundedSender<Notification>,
}

impl ActorChannel {
    pub fn new(runtime: Handle, actor: Arc<dyn DeleteActor>, bus: UnboundedSender<Notification>) -> Self {
        Self { runtime, actor, bus }
    }
}

impl CommandChannel for ActorChannel {
    fn dispatch(&mut self, command: DeleteCommand) -> Result<(), DeletionError> {
        if self.bus.is_closed() {
            return Err(DeletionError::Dispatch("notification bus closed".to_string()));
        }
        let actor = self.actor.clone();
        let bus = self.bus.clone();
        self.runtime.spawn(async move {
            debug!(source_id = %command.source_id, url = %command.url, "running delete");
            let notification = match actor.delete(&command).await {
                Ok(message) => Notification::success(command.source_id.clone(), message),
                Err(e) => Notification::error(command.source_id.clone(), e.to_string()),
            };
            if bus.send(notification).is_err() {
                warn!(source_id = %command.source_id, "notification bus closed before delete finished");
            }
        });
        Ok(())
    }
}
