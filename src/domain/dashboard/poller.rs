use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::client::api_trait::OrchestratorApi;
use crate::domain::dashboard::state::{SharedState, write_state};
use crate::domain::graph::device_graph::GraphUpdate;

/// Background task refreshing the device list on a fixed interval.
///
/// The first fetch happens immediately. The task ends when the poller is stopped or dropped;
/// a fetch in flight at that moment is abandoned.
pub struct DevicePoller {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl DevicePoller {
    pub fn spawn<O: OrchestratorApi + 'static>(orchestrator: Arc<O>, state: SharedState, interval: Duration, revision: Arc<watch::Sender<u64>>) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_devices(orchestrator, state, interval, revision, token.clone()));
        DevicePoller { token, handle: Some(handle) }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the task and waits until it has finished.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::error!("Device poller ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for DevicePoller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn poll_devices<O: OrchestratorApi>(orchestrator: Arc<O>, state: SharedState, interval: Duration, revision: Arc<watch::Sender<u64>>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs = interval.as_secs(), "Device poller started.");
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            _ = token.cancelled() => break,
            fetched = orchestrator.devices() => fetched,
        };

        match fetched {
            Ok(devices) => {
                let count = devices.len();
                let update = write_state(&state).apply_devices(devices);
                if update != GraphUpdate::Unchanged {
                    revision.send_modify(|r| *r += 1);
                }
                tracing::debug!(devices = count, update = ?update, "Device poll applied.");
            }
            Err(e) => tracing::warn!("Device poll failed: {}", e),
        }
    }
    tracing::info!("Device poller stopped.");
}
