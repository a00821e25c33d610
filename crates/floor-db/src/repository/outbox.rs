//! # Event Outbox Repository
//!
//! Durable queue of floor events for the analytics/rollup collaborator.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  floor-engine operation commits                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  OutboxSink::publish(event)                                            │
//! │       │  INSERT INTO event_outbox (event_type, aggregate_id, payload)  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            EXTERNAL CONSUMER (rollups, notifications)           │   │
//! │  │                                                                 │   │
//! │  │  1. pending(limit)       WHERE delivered_at IS NULL            │   │
//! │  │  2. deliver each entry                                         │   │
//! │  │     a. success → mark_delivered(id)                            │   │
//! │  │     b. failure → mark_failed(id, error)  attempts += 1         │   │
//! │  │  3. purge_delivered(before) now and then                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  A failed enqueue is logged by the sink and never undoes the           │
//! │  operation that produced the event.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

const OUTBOX_COLUMNS: &str = "id, event_type, aggregate_id, payload, attempts, last_error, \
     created_at, attempted_at, delivered_at";

/// A queued event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: String,
    /// Event name, e.g. `ORDER_FINALIZED`.
    pub event_type: String,
    /// Id of the order, reservation, or stock the event is about.
    pub aggregate_id: String,
    /// JSON serialization of the full event.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Repository for the event outbox.
#[derive(Debug)]
pub struct EventOutboxRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> EventOutboxRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        EventOutboxRepository { conn }
    }

    /// Queues an event.
    pub async fn enqueue(
        &mut self,
        event_type: &str,
        aggregate_id: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> DbResult<OutboxEntry> {
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            payload: payload.to_string(),
            attempts: 0,
            last_error: None,
            created_at: now,
            attempted_at: None,
            delivered_at: None,
        };

        debug!(
            event_type = %event_type,
            aggregate_id = %aggregate_id,
            "Queuing event"
        );

        sqlx::query(
            r#"
            INSERT INTO event_outbox (
                id, event_type, aggregate_id, payload,
                attempts, last_error, created_at, attempted_at, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.event_type)
        .bind(&entry.aggregate_id)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.attempted_at)
        .bind(entry.delivered_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(entry)
    }

    /// Undelivered entries, oldest first.
    pub async fn pending(&mut self, limit: u32) -> DbResult<Vec<OutboxEntry>> {
        let sql = format!(
            r#"
            SELECT {OUTBOX_COLUMNS}
            FROM event_outbox
            WHERE delivered_at IS NULL
            ORDER BY rowid ASC
            LIMIT ?1
            "#
        );
        let entries = sqlx::query_as::<_, OutboxEntry>(&sql)
            .bind(limit)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(entries)
    }

    /// Marks an entry as delivered.
    pub async fn mark_delivered(&mut self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            "UPDATE event_outbox SET delivered_at = ?2, attempted_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&mut self, id: &str, error: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE event_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Counts undelivered entries.
    pub async fn count_pending(&mut self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM event_outbox WHERE delivered_at IS NULL")
                .fetch_one(&mut *self.conn)
                .await?;

        Ok(count)
    }

    /// Deletes entries delivered before `before`.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn purge_delivered(&mut self, before: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM event_outbox WHERE delivered_at IS NOT NULL AND delivered_at < ?1",
        )
        .bind(before)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_outbox_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        let now = Utc::now();

        let first = uow
            .outbox()
            .enqueue("ORDER_CREATED", "order-1", r#"{"type":"ORDER_CREATED"}"#, now)
            .await
            .unwrap();
        uow.outbox()
            .enqueue("ORDER_FINALIZED", "order-1", r#"{"type":"ORDER_FINALIZED"}"#, now)
            .await
            .unwrap();

        assert_eq!(uow.outbox().count_pending().await.unwrap(), 2);

        let pending = uow.outbox().pending(10).await.unwrap();
        assert_eq!(pending[0].id, first.id);

        uow.outbox().mark_failed(&first.id, "consumer offline", now).await.unwrap();
        let retried = uow.outbox().pending(1).await.unwrap();
        assert_eq!(retried[0].attempts, 1);
        assert_eq!(retried[0].last_error.as_deref(), Some("consumer offline"));

        uow.outbox().mark_delivered(&first.id, now).await.unwrap();
        assert_eq!(uow.outbox().count_pending().await.unwrap(), 1);

        let purged = uow
            .outbox()
            .purge_delivered(now + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(uow.outbox().count_pending().await.unwrap(), 1);
    }
}
