//! # Floor
//!
//! Wires configuration, storage, locks, clock and event sink together and
//! hands out the four components.
//!
//! ```text
//! FloorBuilder::new(config)
//!     .clock(..)     default SystemClock
//!     .sink(..)      default OutboxSink on the same database
//!     .database(..)  default config.to_db_config()
//!     .build().await ──► Floor
//!                          ├── tables()        TableStateMachine
//!                          ├── orders()        OrderLifecycle
//!                          ├── inventory()     InventoryLedger
//!                          ├── catalog()       Catalog
//!                          └── reservations()  ReservationConflictDetector
//! ```
//!
//! Every component handed out shares one lock registry, so a table locked
//! by an order is also locked for reservations.

use std::sync::Arc;
use std::time::Duration;

use floor_db::{Database, DbConfig};
use tracing::info;

use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::FloorConfig;
use crate::context::FloorContext;
use crate::error::FloorResult;
use crate::events::{EventSink, OutboxSink};
use crate::inventory::InventoryLedger;
use crate::locks::LockManager;
use crate::orders::OrderLifecycle;
use crate::reservations::ReservationConflictDetector;
use crate::retry::RetryPolicy;
use crate::tables::TableStateMachine;

/// Handle to a running floor. Cheap to clone.
#[derive(Clone)]
pub struct Floor {
    ctx: Arc<FloorContext>,
}

impl Floor {
    /// Opens the configured database (running migrations) with the system
    /// clock and the outbox sink.
    pub async fn open(config: FloorConfig) -> FloorResult<Self> {
        FloorBuilder::new(config).build().await
    }

    pub fn builder(config: FloorConfig) -> FloorBuilder {
        FloorBuilder::new(config)
    }

    pub fn tables(&self) -> TableStateMachine {
        TableStateMachine::new(Arc::clone(&self.ctx))
    }

    pub fn orders(&self) -> OrderLifecycle {
        OrderLifecycle::new(Arc::clone(&self.ctx))
    }

    pub fn inventory(&self) -> InventoryLedger {
        InventoryLedger::new(Arc::clone(&self.ctx))
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(Arc::clone(&self.ctx))
    }

    pub fn reservations(&self) -> ReservationConflictDetector {
        ReservationConflictDetector::new(Arc::clone(&self.ctx))
    }

    /// A handle on the same floor whose lock waits give up after `timeout`.
    ///
    /// Locks are shared with `self`; only the wait bound differs. When it
    /// elapses the call fails with `LockTimeout` before writing anything.
    pub fn with_lock_timeout(&self, timeout: Duration) -> Floor {
        let ctx = FloorContext {
            db: self.ctx.db.clone(),
            config: self.ctx.config.clone(),
            locks: self.ctx.locks.with_timeout(timeout),
            retry: self.ctx.retry.clone(),
            clock: Arc::clone(&self.ctx.clock),
            sink: Arc::clone(&self.ctx.sink),
        };
        Floor { ctx: Arc::new(ctx) }
    }

    /// The underlying database, for draining the event outbox.
    pub fn db(&self) -> &Database {
        &self.ctx.db
    }

    pub fn config(&self) -> &FloorConfig {
        &self.ctx.config
    }

    /// Closes the pool. Outstanding handles fail afterwards.
    pub async fn close(&self) {
        self.ctx.db.close().await;
    }
}

/// Builds a [`Floor`] with optional replacements for its collaborators.
pub struct FloorBuilder {
    config: FloorConfig,
    database: Option<DbConfig>,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl FloorBuilder {
    pub fn new(config: FloorConfig) -> Self {
        FloorBuilder {
            config,
            database: None,
            clock: None,
            sink: None,
        }
    }

    /// Uses this pool configuration instead of the one derived from
    /// `[database]`.
    pub fn database(mut self, database: DbConfig) -> Self {
        self.database = Some(database);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub async fn build(self) -> FloorResult<Floor> {
        let config = self.config;
        config.validate()?;

        let db_config = self.database.unwrap_or_else(|| config.to_db_config());
        let db = Database::new(db_config).await?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(OutboxSink::new(db.clone(), Arc::clone(&clock))));

        info!(
            window_minutes = config.window_minutes(),
            max_retries = config.concurrency.max_retries,
            lock_timeout_ms = config.concurrency.lock_timeout_ms,
            "Floor engine ready"
        );

        let ctx = FloorContext {
            locks: LockManager::new(config.concurrency.lock_timeout()),
            retry: RetryPolicy::from_settings(&config.concurrency),
            db,
            config,
            clock,
            sink,
        };

        Ok(Floor { ctx: Arc::new(ctx) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FloorError;
    use crate::testing;
    use chrono::{NaiveDate, NaiveTime};
    use floor_core::{CoreError, Money, OrderLine, ReservationRequest, TableStatus};

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = FloorConfig::default();
        config.reservations.window_minutes = 0;

        let result = Floor::builder(config).database(DbConfig::in_memory()).build().await;
        assert!(matches!(result, Err(FloorError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_default_sink_writes_outbox() {
        let floor = Floor::builder(FloorConfig::default())
            .database(DbConfig::in_memory())
            .build()
            .await
            .unwrap();

        let water = floor
            .catalog()
            .create_product("Water", "Drinks", Money::from_cents(300), &[])
            .await
            .unwrap();
        let salon = floor.tables().create_salon("Bar").await.unwrap();
        let table = floor.tables().register_table(&salon.id, 1, 2).await.unwrap();
        floor
            .orders()
            .open_or_upsert(&table.id, "staff-1", &[OrderLine::new(&water.product.id, 1)])
            .await
            .unwrap();

        let mut uow = floor.db().begin().await.unwrap();
        assert_eq!(uow.outbox().count_pending().await.unwrap(), 1);
        let pending = uow.outbox().pending(10).await.unwrap();
        assert_eq!(pending[0].event_type, "ORDER_CREATED");
    }

    #[tokio::test]
    async fn test_per_call_lock_timeout() {
        let (floor, _, _) = testing::floor().await;
        let salon = floor.tables().create_salon("Patio").await.unwrap();
        let table = floor.tables().register_table(&salon.id, 3, 4).await.unwrap();

        let held = floor.ctx.locks.lock_table(&table.id).await.unwrap();
        let hurried = floor.with_lock_timeout(Duration::from_millis(10));

        let err = hurried.tables().set_status(&table.id, TableStatus::Occupied).await.unwrap_err();
        assert!(matches!(err, FloorError::LockTimeout { .. }));
        drop(held);

        assert_eq!(floor.tables().status(&table.id).await.unwrap(), TableStatus::Available);
        let table = hurried.tables().set_status(&table.id, TableStatus::Occupied).await.unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
    }

    #[tokio::test]
    async fn test_unknown_ids_leave_no_lock_slots() {
        let (floor, _, _) = testing::floor().await;
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let seven = NaiveTime::from_hms_opt(19, 0, 0).unwrap();

        for n in 0..50 {
            let ghost = format!("ghost-{n}");
            let err = floor.tables().set_status(&ghost, TableStatus::Occupied).await.unwrap_err();
            assert!(matches!(err, FloorError::Domain(CoreError::TableNotFound(_))));

            let lines = [OrderLine::new("nothing", 1)];
            assert!(floor.orders().open_or_upsert(&ghost, "staff-1", &lines).await.is_err());
            assert!(floor.reservations().validate(&ghost, day, seven, 2, None).await.is_err());

            let request = ReservationRequest {
                table_id: ghost,
                customer_name: "Ada Lovelace".to_string(),
                customer_phone: "555-0100".to_string(),
                customer_email: None,
                reservation_date: day,
                reservation_time: seven,
                party_size: 2,
                status: None,
                created_by: "host-1".to_string(),
            };
            assert!(floor.reservations().create(request).await.is_err());
        }

        assert_eq!(floor.ctx.locks.slot_counts(), (0, 0));
    }
}
