use std::{sync::Arc, time::Duration};

use tokio::{
    runtime::Handle,
    sync::{Notify, mpsc::UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::topology::{Snapshot, SnapshotSource, TopologyError};

#[derive(Debug)]
pub enum PollEvent {
    Snapshot(Snapshot),
    Failed(TopologyError),
}

/// Background fetch loop. Fetches are chained: the next one starts only after the
/// previous result was handed over and the interval elapsed, or a refresh was requested.
pub struct Poller {
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Poller {
    pub fn spawn(
        runtime: &Handle,
        mut source: Box<dyn SnapshotSource>,
        interval: Duration,
        events: UnboundedSender<PollEvent>,
        repaint: impl Fn() + Send + 'static,
    ) -> Self {
        let refresh = Arc::new(Notify::new());
        let wake = refresh.clone();
        let task = runtime.spawn(async move {
            debug!(source = %source.describe(), ?interval, "poller started");
            loop {
                let event = match source.fetch_snapshot().await {
                    Ok(snapshot) => PollEvent::Snapshot(snapshot),
                    Err(e) => {
                        warn!(source = %source.describe(), error = %e, "failed to fetch snapshot");
                        PollEvent::Failed(e)
                    }
                };
                if events.send(event).is_err() {
                    debug!("poll receiver dropped, stopping poller");
                    break;
                }
                repaint();

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = wake.notified() => debug!("immediate refresh requested"),
                }
            }
        });
        Self { refresh, task }
    }

    /// Cut the current wait short and fetch right away.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
