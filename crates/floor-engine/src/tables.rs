//! # Table State Machine
//!
//! Floor setup and the occupancy status of each dining table.
//!
//! ## States
//! ```text
//!                 ┌──────────────────────────────────────────┐
//!                 ▼                                          │
//!          ┌─────────────┐  order opened   ┌─────────────┐    │
//!  new ───►│  AVAILABLE  │────────────────►│  OCCUPIED   │    │
//!          └─────────────┘                 └──────┬──────┘    │
//!             ▲       ▲                           │ release   │
//!             │       │                           ▼           │
//!    ┌────────┴──┐  ┌─┴───────────┐        ┌─────────────┐    │
//!    │ RESERVED  │  │ MAINTENANCE │        │  CLEANING   │────┘
//!    └───────────┘  └─────────────┘        └─────────────┘
//! ```
//!
//! Any recognized status may follow any other here. Rules that depend on
//! orders (a table with an open order is never AVAILABLE) are enforced by
//! `OrderLifecycle::release_table`, which can see orders.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use floor_core::validation::{validate_capacity, validate_name, validate_table_number};
use floor_core::{CoreError, DiningTable, Salon, TableStatus, ValidationError};
use floor_db::{DbError, UnitOfWork};
use tracing::{info, warn};

use crate::context::FloorContext;
use crate::error::{FloorError, FloorResult};

/// Owns each table's occupancy status.
#[derive(Clone)]
pub struct TableStateMachine {
    ctx: Arc<FloorContext>,
}

impl TableStateMachine {
    pub(crate) fn new(ctx: Arc<FloorContext>) -> Self {
        TableStateMachine { ctx }
    }

    // =========================================================================
    // Floor Setup
    // =========================================================================

    /// Creates a salon (a dining room that groups tables).
    pub async fn create_salon(&self, name: &str) -> FloorResult<Salon> {
        validate_name("salon name", name)?;

        let mut uow = self.ctx.begin().await?;
        let salon = uow.tables().create_salon(name).await?;
        uow.commit().await?;

        info!(salon_id = %salon.id, name = %salon.name, "Salon created");
        Ok(salon)
    }

    /// Adds a table to a salon in `AVAILABLE`.
    pub async fn register_table(
        &self,
        salon_id: &str,
        number: i64,
        capacity: i64,
    ) -> FloorResult<DiningTable> {
        validate_table_number(number)?;
        validate_capacity(capacity)?;

        let mut uow = self.ctx.begin().await?;

        if uow.tables().get_salon(salon_id).await?.is_none() {
            return Err(ValidationError::NotAllowed {
                field: "salon".to_string(),
                reason: format!("no salon with id {salon_id}"),
            }
            .into());
        }

        if uow.tables().number_exists(salon_id, number).await? {
            return Err(duplicate_number(number));
        }

        let table = uow
            .tables()
            .insert(salon_id, number, capacity, self.ctx.clock.now_utc())
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => duplicate_number(number),
                other => other.into(),
            })?;
        uow.commit().await?;

        info!(table_id = %table.id, salon_id = %salon_id, number, capacity, "Table registered");
        Ok(table)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, table_id: &str) -> FloorResult<DiningTable> {
        let mut uow = self.ctx.begin().await?;
        Self::load(&mut uow, table_id).await
    }

    /// Current status of a table.
    pub async fn status(&self, table_id: &str) -> FloorResult<TableStatus> {
        Ok(self.get(table_id).await?.status)
    }

    /// A salon's tables, ordered by number.
    pub async fn list_tables(&self, salon_id: &str) -> FloorResult<Vec<DiningTable>> {
        let mut uow = self.ctx.begin().await?;
        Ok(uow.tables().list_by_salon(salon_id).await?)
    }

    pub async fn list_salons(&self) -> FloorResult<Vec<Salon>> {
        let mut uow = self.ctx.begin().await?;
        Ok(uow.tables().list_salons().await?)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Sets a table's status under the table lock.
    pub async fn set_status(
        &self,
        table_id: &str,
        status: TableStatus,
    ) -> FloorResult<DiningTable> {
        let _guard = self.ctx.locks.lock_table(table_id).await?;

        self.ctx
            .retry
            .run("table", table_id, || async move {
                let mut uow = self.ctx.begin().await?;
                Self::apply_status(&mut uow, table_id, status, self.ctx.clock.now_utc()).await?;
                let table = Self::load(&mut uow, table_id).await?;
                uow.commit().await?;
                Ok(table)
            })
            .await
    }

    /// Parses a free-form status (`"occupied"`, `"no-show"` style) and sets it.
    ///
    /// Unknown values are rejected before storage is touched.
    pub async fn set_status_named(&self, table_id: &str, status: &str) -> FloorResult<DiningTable> {
        let parsed: TableStatus = status.parse().map_err(|e: CoreError| {
            warn!(table_id = %table_id, requested = %status, "Rejected unknown table status");
            FloorError::from(e)
        })?;
        self.set_status(table_id, parsed).await
    }

    // =========================================================================
    // In-Transaction Helpers
    // =========================================================================

    /// Writes a status inside the caller's transaction.
    ///
    /// The caller holds the table lock.
    pub(crate) async fn apply_status(
        uow: &mut UnitOfWork,
        table_id: &str,
        status: TableStatus,
        now: DateTime<Utc>,
    ) -> FloorResult<()> {
        uow.tables().set_status(table_id, status, now).await?;
        info!(table_id = %table_id, status = %status, "Table status changed");
        Ok(())
    }

    pub(crate) async fn load(uow: &mut UnitOfWork, table_id: &str) -> FloorResult<DiningTable> {
        uow.tables()
            .get(table_id)
            .await?
            .ok_or_else(|| CoreError::TableNotFound(table_id.to_string()).into())
    }
}

fn duplicate_number(number: i64) -> FloorError {
    ValidationError::Duplicate {
        field: "table number".to_string(),
        value: number.to_string(),
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::testing::floor;
    use crate::FloorError;
    use floor_core::{CoreError, TableStatus, ValidationError};

    #[tokio::test]
    async fn test_register_and_list() {
        let (floor, _, _) = floor().await;
        let tables = floor.tables();

        let salon = tables.create_salon("Terrace").await.unwrap();
        tables.register_table(&salon.id, 2, 4).await.unwrap();
        let first = tables.register_table(&salon.id, 1, 2).await.unwrap();
        assert_eq!(first.status, TableStatus::Available);

        let listed = tables.list_tables(&salon.id).await.unwrap();
        let numbers: Vec<i64> = listed.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_duplicate_number_rejected() {
        let (floor, _, _) = floor().await;
        let tables = floor.tables();

        let salon = tables.create_salon("Terrace").await.unwrap();
        tables.register_table(&salon.id, 7, 4).await.unwrap();

        let err = tables.register_table(&salon.id, 7, 2).await.unwrap_err();
        assert!(matches!(
            err,
            FloorError::Domain(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        let err = tables.register_table(&salon.id, 8, 0).await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_set_status() {
        let (floor, _, _) = floor().await;
        let tables = floor.tables();

        let salon = tables.create_salon("Hall").await.unwrap();
        let table = tables.register_table(&salon.id, 1, 4).await.unwrap();

        let updated = tables.set_status(&table.id, TableStatus::Cleaning).await.unwrap();
        assert_eq!(updated.status, TableStatus::Cleaning);

        let updated = tables.set_status_named(&table.id, " maintenance ").await.unwrap();
        assert_eq!(updated.status, TableStatus::Maintenance);
        assert_eq!(tables.status(&table.id).await.unwrap(), TableStatus::Maintenance);
    }

    #[tokio::test]
    async fn test_unknown_status_and_table() {
        let (floor, _, _) = floor().await;
        let tables = floor.tables();

        let salon = tables.create_salon("Hall").await.unwrap();
        let table = tables.register_table(&salon.id, 1, 4).await.unwrap();

        let err = tables.set_status_named(&table.id, "on fire").await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::InvalidStatusTransition(_))));
        assert_eq!(tables.status(&table.id).await.unwrap(), TableStatus::Available);

        let err = tables.set_status("missing", TableStatus::Occupied).await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::TableNotFound(_))));

        let err = tables.get("missing").await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::TableNotFound(_))));
    }
}
