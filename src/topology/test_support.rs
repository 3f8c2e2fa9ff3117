use std::sync::{Arc, Mutex};

use crate::{
    layout::ForceLayout,
    topology::{
        config::EngineConfig,
        deletion::{CommandChannel, DeleteCommand, DeletionError},
        engine::TopologyEngine,
    },
};

pub type SentCommands = Arc<Mutex<Vec<DeleteCommand>>>;

/// Keeps every dispatched command for inspection.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: SentCommands,
    pub fail: bool,
}

impl CommandChannel for RecordingChannel {
    fn dispatch(&mut self, command: DeleteCommand) -> Result<(), DeletionError> {
        if self.fail {
            return Err(DeletionError::Dispatch("channel closed".to_string()));
        }
        self.sent.lock().unwrap().push(command);
        Ok(())
    }
}

pub fn engine_with(config: EngineConfig) -> (TopologyEngine, SentCommands) {
    let channel = RecordingChannel::default();
    let sent = channel.sent.clone();
    let engine = TopologyEngine::new(config, Box::new(ForceLayout::default()), Box::new(channel));
    (engine, sent)
}

/// Two tenant networks behind one router. `srv1` sits on `net1` only, `srv2` is attached
/// to both networks.
pub fn two_networks() -> crate::topology::snapshot::Snapshot {
    serde_json::from_value(serde_json::json!({
        "networks": [
            {"id": "net1", "name": "private", "status": "ACTIVE",
             "subnets": [{"id": "sub1", "cidr": "10.0.0.0/24"}]},
            {"id": "net2", "name": "backend", "status": "ACTIVE",
             "subnets": [{"id": "sub2", "cidr": "10.0.1.0/24"}]},
            {"id": "ext", "name": "public", "status": "ACTIVE", "router:external": true}
        ],
        "routers": [
            {"id": "router1", "name": "router1", "status": "ACTIVE",
             "external_gateway_info": {"network_id": "ext"}}
        ],
        "servers": [
            {"id": "srv1", "name": "web", "status": "ACTIVE", "console": "novnc"},
            {"id": "srv2", "name": "db", "status": "ACTIVE"}
        ],
        "ports": [
            {"id": "p1", "device_id": "srv1", "network_id": "net1",
             "device_owner": "compute:nova", "fixed_ips": [{"ip_address": "10.0.0.3"}]},
            {"id": "p2", "device_id": "srv2", "network_id": "net1",
             "device_owner": "compute:nova", "fixed_ips": [{"ip_address": "10.0.0.4"}]},
            {"id": "p3", "device_id": "srv2", "network_id": "net2",
             "device_owner": "compute:nova", "fixed_ips": [{"ip_address": "10.0.1.4"}]},
            {"id": "p4", "device_id": "router1", "network_id": "net1",
             "device_owner": "network:router_interface", "fixed_ips": [{"ip_address": "10.0.0.1"}]},
            {"id": "p5", "device_id": "router1", "network_id": "net2",
             "device_owner": "network:router_interface", "fixed_ips": [{"ip_address": "10.0.1.1"}]}
        ]
    }))
    .unwrap()
}
