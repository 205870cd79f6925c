use std::sync::Arc;
use std::time::Instant;

use crate::dispatcher::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub poller_count: usize,
    pub webhook_count: usize,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, poller_count: usize, webhook_count: usize) -> Self {
        Self {
            dispatcher,
            poller_count,
            webhook_count,
            started_at: Instant::now(),
        }
    }
}
