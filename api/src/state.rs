use std::sync::Arc;
use std::time::Instant;

use engine::{Aggregator, Lifecycle};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<Lifecycle>,
    pub aggregator: Arc<Aggregator>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(lifecycle: Lifecycle, aggregator: Aggregator) -> Self {
        Self {
            lifecycle: Arc::new(lifecycle),
            aggregator: Arc::new(aggregator),
            started_at: Instant::now(),
        }
    }
}
