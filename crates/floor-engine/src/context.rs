//! Shared state handed to every component.

use std::sync::Arc;

use floor_db::{Database, UnitOfWork};

use crate::clock::Clock;
use crate::config::FloorConfig;
use crate::error::FloorResult;
use crate::events::{publish_all, EventSink, FloorEvent};
use crate::locks::LockManager;
use crate::retry::RetryPolicy;

pub(crate) struct FloorContext {
    pub db: Database,
    pub config: FloorConfig,
    pub locks: LockManager,
    pub retry: RetryPolicy,
    pub clock: Arc<dyn Clock>,
    pub sink: Arc<dyn EventSink>,
}

impl FloorContext {
    pub async fn begin(&self) -> FloorResult<UnitOfWork> {
        Ok(self.db.begin().await?)
    }

    /// Publishes events from an operation that has already committed.
    pub async fn emit(&self, events: &[FloorEvent]) {
        publish_all(self.sink.as_ref(), events).await;
    }
}
