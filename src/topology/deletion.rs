/*!
Asynchronous deletion flow.

A delete request is dispatched as a [`DeleteCommand`] over a [`CommandChannel`] and the
affected node is marked as loading. The graph is only changed once a matching
[`Notification`] arrives. Notifications are correlated by `source_id`, which is
`ifr_<entity id>` for devices.

Only one deletion may be pending at a time.
*/

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    network::{
        entity::{EntityId, EntityKind},
        port::Port,
    },
    topology::{engine::TopologyEngine, reconcile::ReconcileSummary},
};

/// Prefix of every correlation id.
pub const SOURCE_ID_PREFIX: &str = "ifr_";

/// What a delete request targets.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletionTarget {
    Device { kind: EntityKind, id: EntityId },
    /// A single interface port of a router.
    RouterInterface { router_id: EntityId, port: Port },
}

impl DeletionTarget {
    /// Correlation id carried by the command and echoed by its notification.
    pub fn source_id(&self) -> String {
        match self {
            DeletionTarget::Device { id, .. } => format!("{SOURCE_ID_PREFIX}{id}"),
            DeletionTarget::RouterInterface { router_id, port } => {
                format!("{SOURCE_ID_PREFIX}{router_id}_{}", port.short_id())
            }
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        match self {
            DeletionTarget::Device { kind, id } => {
                format!("{base_url}/{}/{id}/delete", kind.url_segment())
            }
            DeletionTarget::RouterInterface { router_id, .. } => {
                format!("{base_url}/routers/{router_id}/removeinterface")
            }
        }
    }

    fn payload_id(&self) -> String {
        match self {
            DeletionTarget::Device { id, .. } => id.clone(),
            DeletionTarget::RouterInterface { port, .. } => port.id.clone().unwrap_or_default(),
        }
    }

    /// The visible node showing progress for this deletion.
    pub fn node_id(&self) -> &str {
        match self {
            DeletionTarget::Device { id, .. } => id,
            DeletionTarget::RouterInterface { router_id, .. } => router_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePayload {
    pub id: String,
}

/// Request handed to whatever performs the actual deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCommand {
    pub source_id: String,
    pub url: String,
    pub payload: DeletePayload,
    pub target: DeletionTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Success,
    Error,
}

/// Outcome message posted back on the notification bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    #[serde(rename = "sourceId")]
    pub source_id: String,
}

impl Notification {
    pub fn success(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationType::Success,
            message: message.into(),
            source_id: source_id.into(),
        }
    }

    pub fn error(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationType::Error,
            message: message.into(),
            source_id: source_id.into(),
        }
    }
}

/// Sends delete commands out. Implementations must not block.
pub trait CommandChannel: Send {
    fn dispatch(&mut self, command: DeleteCommand) -> Result<(), DeletionError>;
}

#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("deletion of {0} is still pending")]
    AlreadyPending(String),
    #[error("{0} is not visible")]
    NotVisible(EntityId),
    #[error("router {router} has no interface port {port}")]
    NoSuchInterface { router: EntityId, port: String },
    #[error("failed to dispatch delete command: {0}")]
    Dispatch(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeletion {
    pub target: DeletionTarget,
    pub source_id: String,
    pub requested_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Message to surface to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserNotice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationOutcome {
    pub notice: Option<UserNotice>,
    /// Set when the notification confirmed a deletion that was applied to the graph.
    pub removed: Option<DeletionTarget>,
    /// The caller should fetch a fresh snapshot right away.
    pub refresh_now: bool,
}

#[derive(Debug, Default)]
pub struct DeletionCoordinator {
    pending: Option<PendingDeletion>,
    last_notification: Option<(String, String)>,
    sub_contexts: HashSet<String>,
}

impl DeletionCoordinator {
    pub fn pending(&self) -> Option<&PendingDeletion> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the pending deletion targets `id` itself or an interface of it.
    pub fn is_pending_for(&self, id: &str) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.target.node_id() == id)
    }

    /// Correlation ids of the listening contexts opened for in-flight commands.
    pub fn sub_contexts(&self) -> impl Iterator<Item = &String> {
        self.sub_contexts.iter()
    }

    fn begin(
        &mut self,
        target: DeletionTarget,
        base_url: &str,
        now: Instant,
    ) -> Result<DeleteCommand, DeletionError> {
        if let Some(pending) = &self.pending {
            return Err(DeletionError::AlreadyPending(pending.target.node_id().to_string()));
        }
        let source_id = target.source_id();
        let command = DeleteCommand {
            source_id: source_id.clone(),
            url: target.url(base_url),
            payload: DeletePayload {
                id: target.payload_id(),
            },
            target: target.clone(),
        };
        self.sub_contexts.insert(source_id.clone());
        self.pending = Some(PendingDeletion {
            target,
            source_id,
            requested_at: now,
        });
        Ok(command)
    }

    fn abort(&mut self, source_id: &str) {
        self.sub_contexts.remove(source_id);
        if self.pending.as_ref().is_some_and(|p| p.source_id == source_id) {
            self.pending = None;
        }
    }

    /// Record a notification. Returns false for an immediate duplicate of the previous one,
    /// unless it answers the pending deletion. Every notification tears down all listening
    /// contexts.
    fn receive(&mut self, notification: &Notification) -> bool {
        let correlated = self
            .pending
            .as_ref()
            .is_some_and(|p| p.source_id == notification.source_id);
        let key = (notification.source_id.clone(), notification.message.clone());
        if !correlated && self.last_notification.as_ref() == Some(&key) {
            return false;
        }
        self.last_notification = Some(key);
        self.sub_contexts.clear();
        true
    }

    fn take_if_correlated(&mut self, source_id: &str) -> Option<PendingDeletion> {
        if self.pending.as_ref()?.source_id == source_id {
            self.pending.take()
        } else {
            None
        }
    }

    fn take_expired(&mut self, now: Instant, timeout: Duration) -> Option<PendingDeletion> {
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|p| now.saturating_duration_since(p.requested_at) >= timeout);
        if expired {
            self.sub_contexts.clear();
            self.pending.take()
        } else {
            None
        }
    }

    fn take_pending(&mut self) -> Option<PendingDeletion> {
        self.sub_contexts.clear();
        self.pending.take()
    }
}

impl TopologyEngine {
    /// Ask for a visible network, router or server to be deleted.
    pub fn request_delete(&mut self, id: &str) -> Result<(), DeletionError> {
        let kind = self
            .graph
            .find_by_id(id)
            .map(|node| node.data.kind())
            .ok_or_else(|| DeletionError::NotVisible(id.to_string()))?;
        self.dispatch_deletion(DeletionTarget::Device {
            kind,
            id: id.to_string(),
        })?;
        self.graph.set_loading(id, true);
        Ok(())
    }

    /// Ask for one interface port of a visible router to be removed.
    pub fn request_interface_delete(
        &mut self,
        router_id: &str,
        port: &Port,
    ) -> Result<(), DeletionError> {
        let router = self
            .graph
            .find_by_id(router_id)
            .and_then(|node| node.data.as_router())
            .ok_or_else(|| DeletionError::NotVisible(router_id.to_string()))?;
        if !router.ports.contains(port) {
            return Err(DeletionError::NoSuchInterface {
                router: router_id.to_string(),
                port: port.short_id(),
            });
        }
        self.dispatch_deletion(DeletionTarget::RouterInterface {
            router_id: router_id.to_string(),
            port: port.clone(),
        })
    }

    fn dispatch_deletion(&mut self, target: DeletionTarget) -> Result<(), DeletionError> {
        let command = self
            .deletion
            .begin(target, &self.config.delete_base_url, Instant::now())?;
        let source_id = command.source_id.clone();
        info!(source_id = %source_id, url = %command.url, "dispatching delete command");
        if let Err(e) = self.channel.dispatch(command) {
            self.deletion.abort(&source_id);
            return Err(e);
        }
        Ok(())
    }

    /// Fold a notification from the bus into the graph.
    pub fn handle_notification(&mut self, notification: Notification) -> NotificationOutcome {
        if !self.deletion.receive(&notification) {
            debug!(message = %notification.message, "dropping duplicate notification");
            return NotificationOutcome::default();
        }

        let notice = Some(UserNotice {
            level: match notification.kind {
                NotificationType::Success => NoticeLevel::Info,
                NotificationType::Error => NoticeLevel::Error,
            },
            message: notification.message.clone(),
        });

        let Some(pending) = self.deletion.take_if_correlated(&notification.source_id) else {
            debug!(source_id = %notification.source_id, "notification matches no pending deletion");
            return NotificationOutcome {
                notice,
                ..Default::default()
            };
        };

        match notification.kind {
            NotificationType::Success => {
                info!(source_id = %pending.source_id, "deletion confirmed");
                self.apply_deletion(&pending.target);
                NotificationOutcome {
                    notice,
                    removed: Some(pending.target),
                    refresh_now: true,
                }
            }
            NotificationType::Error => {
                warn!(source_id = %pending.source_id, message = %notification.message, "deletion failed");
                self.graph.set_loading(pending.target.node_id(), false);
                NotificationOutcome {
                    notice,
                    ..Default::default()
                }
            }
        }
    }

    /// Abandon a pending deletion that has gone unanswered for too long.
    pub(super) fn expire_pending_deletion(&mut self, now: Instant) {
        if let Some(pending) = self
            .deletion
            .take_expired(now, self.config.deletion_timeout)
        {
            warn!(source_id = %pending.source_id, "deletion timed out without a notification");
            self.graph.set_loading(pending.target.node_id(), false);
        }
    }

    /// Drop a pending deletion whose target disappeared from a snapshot.
    pub(super) fn settle_pending_deletion(&mut self, id: &str) {
        if !self.deletion.is_pending_for(id) {
            return;
        }
        if let Some(pending) = self.deletion.take_pending() {
            info!(source_id = %pending.source_id, "deletion target vanished from snapshot");
        }
    }

    fn apply_deletion(&mut self, target: &DeletionTarget) {
        match target {
            DeletionTarget::Device { kind, id } => {
                if self.popup.is_showing(id) {
                    self.hide_details();
                }
                if kind.is_network() {
                    self.release_hidden_behind(id);
                }
                // Forget its ports so a reappearing device is wired up again.
                let mut summary = ReconcileSummary::default();
                for port in self.known_ports.take_touching(id) {
                    self.detach_port(&port, &mut summary);
                }
                if self.graph.remove_node(id).is_none() {
                    self.hidden.remove(id);
                }
            }
            DeletionTarget::RouterInterface { router_id, port } => {
                self.graph.remove_link(router_id, &port.network_id);
                if let Some(router) = self
                    .graph
                    .find_by_id_mut(router_id)
                    .and_then(|node| node.data.as_router_mut())
                {
                    router.ports.retain(|p| p != port);
                    if let Some(pos) = router
                        .attached_networks
                        .iter()
                        .position(|n| *n == port.network_id)
                    {
                        router.attached_networks.remove(pos);
                    }
                }
                self.known_ports.forget(port);
                self.refresh_popup();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        network::port::DeviceOwner,
        topology::{
            config::EngineConfig,
            popup::ViewTransform,
            test_support::{RecordingChannel, engine_with, two_networks},
        },
    };

    fn interface(id: &str) -> Port {
        Port {
            id: Some(id.to_string()),
            device_id: "router1".to_string(),
            network_id: "net1".to_string(),
            device_owner: DeviceOwner::parse("network:router_interface"),
            status: "ACTIVE".to_string(),
            fixed_ips: Vec::new(),
        }
    }

    #[test]
    fn test_device_command_shape() {
        let target = DeletionTarget::Device {
            kind: EntityKind::Router,
            id: "router1".to_string(),
        };
        let mut coordinator = DeletionCoordinator::default();
        let command = coordinator
            .begin(target, "/project", Instant::now())
            .unwrap();
        assert_eq!(command.source_id, "ifr_router1");
        assert_eq!(command.url, "/project/routers/router1/delete");
        assert_eq!(command.payload.id, "router1");
        assert!(coordinator.is_pending_for("router1"));
        assert_eq!(coordinator.sub_contexts().count(), 1);
    }

    #[test]
    fn test_second_request_rejected_while_pending() {
        let mut coordinator = DeletionCoordinator::default();
        let first = DeletionTarget::Device {
            kind: EntityKind::Server,
            id: "srv1".to_string(),
        };
        let second = DeletionTarget::RouterInterface {
            router_id: "router1".to_string(),
            port: interface("p1"),
        };
        coordinator.begin(first, "/project", Instant::now()).unwrap();
        assert!(matches!(
            coordinator.begin(second, "/project", Instant::now()),
            Err(DeletionError::AlreadyPending(id)) if id == "srv1"
        ));
    }

    #[test]
    fn test_duplicate_notifications_are_dropped() {
        let mut coordinator = DeletionCoordinator::default();
        let notification = Notification::success("ifr_x", "Deleted x");
        assert!(coordinator.receive(&notification));
        assert!(!coordinator.receive(&notification));
        assert!(coordinator.receive(&Notification::success("ifr_y", "Deleted y")));
    }

    #[test]
    fn test_same_text_from_another_source_is_kept() {
        let mut coordinator = DeletionCoordinator::default();
        assert!(coordinator.receive(&Notification::error("ifr_x", "Unable to delete")));
        assert!(coordinator.receive(&Notification::error("ifr_y", "Unable to delete")));
    }

    #[test]
    fn test_expiry() {
        let mut coordinator = DeletionCoordinator::default();
        let start = Instant::now();
        let target = DeletionTarget::Device {
            kind: EntityKind::Server,
            id: "srv1".to_string(),
        };
        coordinator.begin(target, "/project", start).unwrap();
        let timeout = Duration::from_secs(60);
        assert!(coordinator.take_expired(start + Duration::from_secs(30), timeout).is_none());
        assert!(coordinator.take_expired(start + Duration::from_secs(61), timeout).is_some());
        assert!(!coordinator.is_pending());
    }

    #[test]
    fn test_notification_wire_format() {
        let parsed: Notification = serde_json::from_str(
            r#"{"type": "error", "message": "Unable to delete router", "sourceId": "ifr_router1"}"#,
        )
        .unwrap();
        assert_eq!(parsed, Notification::error("ifr_router1", "Unable to delete router"));
    }

    #[test]
    fn test_router_deletion_round_trip() {
        let (mut engine, sent) = engine_with(EngineConfig::default());
        let snapshot = two_networks();
        engine.apply_snapshot(&snapshot);

        engine.request_delete("router1").unwrap();
        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].source_id, "ifr_router1");
            assert_eq!(sent[0].payload.id, "router1");
        }
        assert!(engine.graph().find_by_id("router1").unwrap().loading);

        // Still listed while the delete is in flight.
        engine.apply_snapshot(&snapshot);
        assert!(engine.graph().find_by_id("router1").unwrap().loading);

        let outcome =
            engine.handle_notification(Notification::success("ifr_router1", "Deleted router1"));
        assert!(outcome.refresh_now);
        assert_eq!(outcome.notice.unwrap().level, NoticeLevel::Info);
        assert!(!engine.graph().contains("router1"));
        assert!(!engine.graph().has_link("router1", "net1"));
        assert!(!engine.deletion().is_pending());
        assert_eq!(engine.deletion().sub_contexts().count(), 0);
    }

    #[test]
    fn test_failed_deletion_keeps_node() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&two_networks());
        engine.request_delete("srv1").unwrap();

        let outcome = engine.handle_notification(Notification::error(
            "ifr_srv1",
            "Unable to delete instance",
        ));
        assert!(!outcome.refresh_now);
        assert_eq!(outcome.notice.unwrap().level, NoticeLevel::Error);
        let node = engine.graph().find_by_id("srv1").unwrap();
        assert!(!node.loading);
        assert!(!engine.deletion().is_pending());

        engine.request_delete("srv1").unwrap();
    }

    #[test]
    fn test_retried_delete_failing_with_same_text_is_reported() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&two_networks());

        engine.request_delete("srv1").unwrap();
        engine.handle_notification(Notification::error("ifr_srv1", "Unable to delete instance"));

        engine.request_delete("srv1").unwrap();
        assert!(engine.graph().find_by_id("srv1").unwrap().loading);
        let outcome = engine
            .handle_notification(Notification::error("ifr_srv1", "Unable to delete instance"));

        assert_eq!(outcome.notice.unwrap().level, NoticeLevel::Error);
        assert!(!engine.graph().find_by_id("srv1").unwrap().loading);
        assert!(!engine.deletion().is_pending());
    }

    #[test]
    fn test_deleted_server_is_relinked_when_it_reappears() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        let snapshot = two_networks();
        engine.apply_snapshot(&snapshot);

        engine.request_delete("srv1").unwrap();
        engine.handle_notification(Notification::success("ifr_srv1", "Deleted srv1"));
        assert!(!engine.graph().contains("srv1"));
        assert!(engine.known_ports().iter().all(|p| p.device_id != "srv1"));

        // The refresh still lists it, e.g. the delete was only accepted.
        engine.apply_snapshot(&snapshot);

        assert!(engine.graph().has_link("srv1", "net1"));
        let net1 = engine.graph().find_by_id("net1").unwrap().data.as_network().unwrap();
        assert_eq!(net1.instance_count, 2);
    }

    #[test]
    fn test_uncorrelated_notification_only_notifies() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&two_networks());
        engine.request_delete("srv1").unwrap();

        let outcome =
            engine.handle_notification(Notification::success("ifr_other", "Deleted other"));
        assert!(outcome.notice.is_some());
        assert!(outcome.removed.is_none());
        assert!(engine.graph().contains("srv1"));
        assert!(engine.deletion().is_pending_for("srv1"));
    }

    #[test]
    fn test_second_delete_rejected() {
        let (mut engine, sent) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&two_networks());
        engine.request_delete("srv1").unwrap();

        assert!(matches!(
            engine.request_delete("srv2"),
            Err(DeletionError::AlreadyPending(_))
        ));
        assert!(!engine.graph().find_by_id("srv2").unwrap().loading);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_failure_rolls_back() {
        let channel = RecordingChannel {
            fail: true,
            ..Default::default()
        };
        let mut engine = TopologyEngine::new(
            EngineConfig::default(),
            Box::new(crate::layout::ForceLayout::default()),
            Box::new(channel),
        );
        engine.apply_snapshot(&two_networks());

        assert!(matches!(
            engine.request_delete("srv1"),
            Err(DeletionError::Dispatch(_))
        ));
        assert!(!engine.deletion().is_pending());
        assert!(!engine.graph().find_by_id("srv1").unwrap().loading);
    }

    #[test]
    fn test_interface_deletion_removes_only_that_link() {
        let (mut engine, sent) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&two_networks());
        engine
            .show_details("router1", &ViewTransform::default())
            .unwrap();

        let port = engine
            .graph()
            .find_by_id("router1")
            .and_then(|node| node.data.as_router())
            .and_then(|router| router.ports.iter().find(|p| p.id.as_deref() == Some("p4")))
            .cloned()
            .unwrap();
        engine.request_interface_delete("router1", &port).unwrap();
        let source_id = sent.lock().unwrap()[0].source_id.clone();
        assert_eq!(sent.lock().unwrap()[0].url, "/project/routers/router1/removeinterface");

        engine.handle_notification(Notification::success(source_id, "Removed interface"));

        let router = engine.graph().find_by_id("router1").unwrap().data.as_router().unwrap();
        assert!(!router.ports.contains(&port));
        assert_eq!(router.attached_networks, vec!["net2"]);
        assert!(!engine.graph().has_link("router1", "net1"));
        assert!(engine.graph().has_link("router1", "net2"));
        assert!(engine.graph().contains("net1"));
        assert!(!engine.known_ports().contains(&port));

        match &engine.popup().open().unwrap().content {
            crate::topology::popup::PopupContent::Router { ports, .. } => {
                assert!(!ports.contains(&port))
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_unknown_interface_rejected() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        engine.apply_snapshot(&two_networks());
        let bogus = interface("nope");
        assert!(matches!(
            engine.request_interface_delete("router1", &bogus),
            Err(DeletionError::NoSuchInterface { .. })
        ));
    }

    #[test]
    fn test_pending_cleared_when_target_vanishes() {
        let (mut engine, _) = engine_with(EngineConfig::default());
        let mut snapshot = two_networks();
        engine.apply_snapshot(&snapshot);
        engine.request_delete("srv1").unwrap();

        snapshot.servers.retain(|s| s.id != "srv1");
        snapshot.ports.retain(|p| p.device_id != "srv1");
        engine.apply_snapshot(&snapshot);

        assert!(!engine.graph().contains("srv1"));
        assert!(!engine.deletion().is_pending());
    }

    #[test]
    fn test_stale_pending_deletion_expires() {
        let config = EngineConfig {
            deletion_timeout: Duration::ZERO,
            ..EngineConfig::default()
        };
        let (mut engine, _) = engine_with(config);
        let snapshot = two_networks();
        engine.apply_snapshot(&snapshot);
        engine.request_delete("srv1").unwrap();

        engine.apply_snapshot(&snapshot);
        assert!(!engine.deletion().is_pending());
        assert!(!engine.graph().find_by_id("srv1").unwrap().loading);
    }
}
