//! # Floor Events
//!
//! Fire-and-forget notifications for the analytics/rollup collaborator.
//!
//! ## Delivery Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  operation ──► uow.commit() ──► publish_all(sink, events)              │
//! │                     │                  │                                │
//! │                     │                  ├── Ok  → debug!                │
//! │                     │                  └── Err → warn!, carry on        │
//! │                     │                                                   │
//! │                     └── failed? no events are published                │
//! │                                                                         │
//! │  A sink error never fails or rolls back the operation.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use floor_core::Quantity;
use floor_db::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::FloorResult;

/// Something that happened on the floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FloorEvent {
    OrderCreated {
        order_id: String,
        table_id: String,
        staff_id: String,
        item_count: usize,
    },
    OrderUpdated {
        order_id: String,
        table_id: String,
        item_count: usize,
    },
    OrderFinalized {
        order_id: String,
        table_id: String,
        finalized_by: String,
        total_cents: i64,
    },
    ReservationCreated {
        reservation_id: String,
        table_id: String,
    },
    ReservationUpdated {
        reservation_id: String,
        table_id: String,
    },
    ReservationCancelled {
        reservation_id: String,
        table_id: String,
    },
    ReservationCompleted {
        reservation_id: String,
        table_id: String,
    },
    ReservationNoShow {
        reservation_id: String,
        table_id: String,
    },
    StockBelowMinimum {
        stock_id: String,
        name: String,
        quantity: Quantity,
        minimum: Quantity,
    },
}

impl FloorEvent {
    /// Outbox event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            FloorEvent::OrderCreated { .. } => "ORDER_CREATED",
            FloorEvent::OrderUpdated { .. } => "ORDER_UPDATED",
            FloorEvent::OrderFinalized { .. } => "ORDER_FINALIZED",
            FloorEvent::ReservationCreated { .. } => "RESERVATION_CREATED",
            FloorEvent::ReservationUpdated { .. } => "RESERVATION_UPDATED",
            FloorEvent::ReservationCancelled { .. } => "RESERVATION_CANCELLED",
            FloorEvent::ReservationCompleted { .. } => "RESERVATION_COMPLETED",
            FloorEvent::ReservationNoShow { .. } => "RESERVATION_NO_SHOW",
            FloorEvent::StockBelowMinimum { .. } => "STOCK_BELOW_MINIMUM",
        }
    }

    /// Id of the order, reservation, or stock the event is about.
    pub fn aggregate_id(&self) -> &str {
        match self {
            FloorEvent::OrderCreated { order_id, .. }
            | FloorEvent::OrderUpdated { order_id, .. }
            | FloorEvent::OrderFinalized { order_id, .. } => order_id,
            FloorEvent::ReservationCreated { reservation_id, .. }
            | FloorEvent::ReservationUpdated { reservation_id, .. }
            | FloorEvent::ReservationCancelled { reservation_id, .. }
            | FloorEvent::ReservationCompleted { reservation_id, .. }
            | FloorEvent::ReservationNoShow { reservation_id, .. } => reservation_id,
            FloorEvent::StockBelowMinimum { stock_id, .. } => stock_id,
        }
    }
}

// =============================================================================
// Sink Trait
// =============================================================================

/// Receives events after the operation that produced them has committed.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &FloorEvent) -> FloorResult<()>;
}

/// Publishes each event in order, logging and swallowing failures.
pub async fn publish_all(sink: &dyn EventSink, events: &[FloorEvent]) {
    for event in events {
        match sink.publish(event).await {
            Ok(()) => debug!(
                event_type = event.event_type(),
                aggregate_id = %event.aggregate_id(),
                "Event published"
            ),
            Err(e) => warn!(
                event_type = event.event_type(),
                aggregate_id = %event.aggregate_id(),
                error = %e,
                "Event delivery failed, continuing"
            ),
        }
    }
}

// =============================================================================
// Implementations
// =============================================================================

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn publish(&self, _event: &FloorEvent) -> FloorResult<()> {
        Ok(())
    }
}

/// Writes events to the `event_outbox` table, one short transaction each.
pub struct OutboxSink {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl OutboxSink {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        OutboxSink { db, clock }
    }
}

#[async_trait]
impl EventSink for OutboxSink {
    async fn publish(&self, event: &FloorEvent) -> FloorResult<()> {
        let payload = serde_json::to_string(event).map_err(floor_db::DbError::from)?;

        let mut uow = self.db.begin().await?;
        uow.outbox()
            .enqueue(event.event_type(), event.aggregate_id(), &payload, self.clock.now_utc())
            .await?;
        uow.commit().await?;

        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FloorEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn events(&self) -> Vec<FloorEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Names of the events published so far.
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(FloorEvent::event_type).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &FloorEvent) -> FloorResult<()> {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
