use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::poller::{Poller, PollerHandle};

/// Owns every running poller for the lifetime of the process.
pub struct PollerManager {
    cancel: CancellationToken,
    handles: Vec<PollerHandle>,
}

impl PollerManager {
    /// Start each poller on its own task. Cancelling `parent` stops them all.
    pub fn start_all(pollers: Vec<Poller>, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        let handles: Vec<PollerHandle> = pollers
            .into_iter()
            .map(|p| p.start(cancel.child_token()))
            .collect();
        tracing::info!(count = handles.len(), "Pollers started");
        Self { cancel, handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop all pollers, giving each in-flight tick up to `grace` to finish.
    /// Returns how many had to be aborted.
    pub async fn stop_all(self, grace: Duration) -> usize {
        self.cancel.cancel();
        let results = join_all(self.handles.into_iter().map(|h| h.stop(grace))).await;
        let aborted = results.iter().filter(|graceful| !**graceful).count();
        tracing::info!(
            stopped = results.len() - aborted,
            aborted,
            "Pollers shut down"
        );
        aborted
    }
}
