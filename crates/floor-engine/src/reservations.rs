//! # Reservation Conflict Detector
//!
//! Admits reservations whose window fits the table, and moves them through
//! their terminal statuses.
//!
//! ## Conflict Rules
//! ```text
//! proposed  [start, start + window)
//!
//!   1. party_size > table.capacity                  → OverCapacity
//!   2. overlaps an active (CONFIRMED/PENDING) one   → Overlap
//!   3. table has an open order and the proposed
//!      window overlaps [now, now + window)          → TableOccupied
//! ```
//! Windows are compared as full date-times, so a late booking that runs past
//! midnight still blocks the next morning's first slot.
//!
//! ## Statuses
//! ```text
//!   PENDING ──┐
//!             ├──► CANCELLED | COMPLETED | NO_SHOW   (terminal)
//!   CONFIRMED ┘
//! ```
//! The check and the insert run under the table lock, so two requests for
//! the same slot cannot both pass.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use floor_core::reservation::{ConflictCheck, Occupancy};
use floor_core::validation::{
    validate_customer_name, validate_email, validate_party_size, validate_phone, validate_staff_id,
};
use floor_core::{
    CoreError, Reservation, ReservationChanges, ReservationRequest, ReservationStatus, TableStatus,
    ValidationError,
};
use floor_db::UnitOfWork;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::FloorContext;
use crate::error::FloorResult;
use crate::events::FloorEvent;
use crate::tables::TableStateMachine;

/// Validates, stores, and transitions reservations.
#[derive(Clone)]
pub struct ReservationConflictDetector {
    ctx: Arc<FloorContext>,
}

impl ReservationConflictDetector {
    pub(crate) fn new(ctx: Arc<FloorContext>) -> Self {
        ReservationConflictDetector { ctx }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Checks whether a booking would fit, without storing anything.
    ///
    /// `excluding` names a reservation to leave out of the overlap check
    /// (the one being moved).
    ///
    /// ## Errors
    /// - `TableNotFound`
    /// - `ReservationConflict` (over capacity, overlap, or occupied table)
    pub async fn validate(
        &self,
        table_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        party_size: i64,
        excluding: Option<&str>,
    ) -> FloorResult<()> {
        validate_party_size(party_size)?;

        let _table = self.ctx.locks.lock_table(table_id).await?;
        let mut uow = self.ctx.begin().await?;
        self.check(&mut uow, table_id, date, time, party_size, excluding).await
    }

    /// Runs the conflict rules inside the caller's transaction.
    ///
    /// The caller holds the table lock.
    async fn check(
        &self,
        uow: &mut UnitOfWork,
        table_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        party_size: i64,
        excluding: Option<&str>,
    ) -> FloorResult<()> {
        let table = TableStateMachine::load(uow, table_id).await?;
        let active = uow.reservations().active_for_table(table_id).await?;
        let open_order = uow.orders().find_open_for_table(table_id).await?;

        let check = ConflictCheck {
            proposed_start: date.and_time(time),
            party_size,
            capacity: table.capacity,
            window_minutes: self.ctx.config.window_minutes(),
            excluding,
            occupancy: open_order.as_ref().map(|order| Occupancy {
                order_id: &order.id,
                now: self.ctx.clock.now_local(),
            }),
        };

        check.run(&active).map_err(|e| {
            warn!(
                table_id = %table_id,
                start = %check.proposed_start,
                party_size,
                error = %e,
                "Reservation rejected"
            );
            e.into()
        })
    }

    // =========================================================================
    // Create & Update
    // =========================================================================

    /// Validates and stores a new reservation.
    ///
    /// The status defaults to the configured one (CONFIRMED); only
    /// CONFIRMED or PENDING may be requested. The table status is left alone.
    pub async fn create(&self, request: ReservationRequest) -> FloorResult<Reservation> {
        validate_request_fields(
            &request.customer_name,
            &request.customer_phone,
            request.customer_email.as_deref(),
            request.party_size,
        )?;
        validate_staff_id(&request.created_by)?;

        let status = request.status.unwrap_or(self.ctx.config.reservations.default_status);
        if status.is_terminal() {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                reason: format!("a new reservation cannot start as {status}"),
            }
            .into());
        }

        let table_id = request.table_id.as_str();
        let _table = self.ctx.locks.lock_table(table_id).await?;

        let request = &request;
        let reservation = self
            .ctx
            .retry
            .run("table", table_id, || async move {
                let now = self.ctx.clock.now_utc();
                let mut uow = self.ctx.begin().await?;
                self.check(
                    &mut uow,
                    table_id,
                    request.reservation_date,
                    request.reservation_time,
                    request.party_size,
                    None,
                )
                .await?;

                let reservation = Reservation {
                    id: Uuid::new_v4().to_string(),
                    table_id: table_id.to_string(),
                    customer_name: request.customer_name.trim().to_string(),
                    customer_phone: request.customer_phone.trim().to_string(),
                    customer_email: clean_email(request.customer_email.as_deref()),
                    reservation_date: request.reservation_date,
                    reservation_time: request.reservation_time,
                    party_size: request.party_size,
                    status,
                    created_by: request.created_by.clone(),
                    created_at: now,
                    updated_at: now,
                };
                uow.reservations().insert(&reservation).await?;
                uow.commit().await?;
                Ok(reservation)
            })
            .await?;

        info!(
            reservation_id = %reservation.id,
            table_id = %reservation.table_id,
            start = %reservation.starts_at(),
            party_size = reservation.party_size,
            "Reservation created"
        );
        self.ctx
            .emit(&[FloorEvent::ReservationCreated {
                reservation_id: reservation.id.clone(),
                table_id: reservation.table_id.clone(),
            }])
            .await;

        Ok(reservation)
    }

    /// Applies changes to an active reservation, re-checking its window with
    /// itself excluded.
    pub async fn update(
        &self,
        reservation_id: &str,
        changes: ReservationChanges,
    ) -> FloorResult<Reservation> {
        let current = self.load_active(reservation_id).await?;
        let proposed = changes.apply_to(&current);
        validate_request_fields(
            &proposed.customer_name,
            &proposed.customer_phone,
            proposed.customer_email.as_deref(),
            proposed.party_size,
        )?;

        let table_id = proposed.table_id.clone();
        let _table = self.ctx.locks.lock_table(&table_id).await?;

        let (table_id, changes) = (table_id.as_str(), &changes);
        let updated = self
            .ctx
            .retry
            .run("reservation", reservation_id, || async move {
                let mut uow = self.ctx.begin().await?;
                let current = load(&mut uow, reservation_id).await?;
                ensure_active(&current)?;

                let mut updated = changes.apply_to(&current);
                if updated.table_id != table_id {
                    // Moved to another table since the pre-read; the lock held
                    // is the wrong one.
                    return Err(CoreError::ConcurrencyConflict {
                        entity: "reservation".to_string(),
                        id: reservation_id.to_string(),
                        attempts: 1,
                    }
                    .into());
                }

                self.check(
                    &mut uow,
                    table_id,
                    updated.reservation_date,
                    updated.reservation_time,
                    updated.party_size,
                    Some(reservation_id),
                )
                .await?;

                updated.customer_name = updated.customer_name.trim().to_string();
                updated.customer_phone = updated.customer_phone.trim().to_string();
                updated.customer_email = clean_email(updated.customer_email.as_deref());
                updated.updated_at = self.ctx.clock.now_utc();

                uow.reservations().update(&updated).await?;
                uow.commit().await?;
                Ok(updated)
            })
            .await?;

        info!(
            reservation_id = %reservation_id,
            table_id = %updated.table_id,
            start = %updated.starts_at(),
            "Reservation updated"
        );
        self.ctx
            .emit(&[FloorEvent::ReservationUpdated {
                reservation_id: updated.id.clone(),
                table_id: updated.table_id.clone(),
            }])
            .await;

        Ok(updated)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, reservation_id: &str) -> FloorResult<Reservation> {
        let mut uow = self.ctx.begin().await?;
        load(&mut uow, reservation_id).await
    }

    /// Every reservation on a table for one day, by time, in any status.
    pub async fn list_for_table(
        &self,
        table_id: &str,
        date: NaiveDate,
    ) -> FloorResult<Vec<Reservation>> {
        let mut uow = self.ctx.begin().await?;
        TableStateMachine::load(&mut uow, table_id).await?;
        Ok(uow.reservations().list_for_table_on(table_id, date).await?)
    }

    // =========================================================================
    // Status Transitions
    // =========================================================================

    pub async fn cancel(&self, reservation_id: &str) -> FloorResult<Reservation> {
        self.transition(reservation_id, ReservationStatus::Cancelled).await
    }

    pub async fn complete(&self, reservation_id: &str) -> FloorResult<Reservation> {
        self.transition(reservation_id, ReservationStatus::Completed).await
    }

    pub async fn mark_no_show(&self, reservation_id: &str) -> FloorResult<Reservation> {
        self.transition(reservation_id, ReservationStatus::NoShow).await
    }

    /// Moves an active reservation to a terminal status.
    ///
    /// A `RESERVED` table with no open order goes back to `AVAILABLE`.
    async fn transition(
        &self,
        reservation_id: &str,
        status: ReservationStatus,
    ) -> FloorResult<Reservation> {
        let current = self.load_active(reservation_id).await?;
        let table_id = current.table_id;

        let _table = self.ctx.locks.lock_table(&table_id).await?;
        let table_id = table_id.as_str();

        let (reservation, freed) = self
            .ctx
            .retry
            .run("reservation", reservation_id, || async move {
                let now = self.ctx.clock.now_utc();
                let mut uow = self.ctx.begin().await?;
                let mut reservation = load(&mut uow, reservation_id).await?;
                ensure_active(&reservation)?;

                uow.reservations().set_status(reservation_id, status, now).await?;
                reservation.status = status;
                reservation.updated_at = now;

                // Only the locked table may be touched.
                let mut freed = false;
                if reservation.table_id == table_id {
                    let table = TableStateMachine::load(&mut uow, table_id).await?;
                    let open_order = uow.orders().find_open_for_table(table_id).await?;
                    if table.status == TableStatus::Reserved && open_order.is_none() {
                        let available = TableStatus::Available;
                        TableStateMachine::apply_status(&mut uow, table_id, available, now).await?;
                        freed = true;
                    }
                }

                uow.commit().await?;
                Ok((reservation, freed))
            })
            .await?;

        info!(
            reservation_id = %reservation_id,
            table_id = %reservation.table_id,
            status = %status,
            "Reservation closed"
        );
        if freed {
            debug!(table_id = %reservation.table_id, "Reserved table released");
        }

        let reservation_id = reservation.id.clone();
        let table_id = reservation.table_id.clone();
        let event = match status {
            ReservationStatus::Cancelled => FloorEvent::ReservationCancelled {
                reservation_id,
                table_id,
            },
            ReservationStatus::Completed => FloorEvent::ReservationCompleted {
                reservation_id,
                table_id,
            },
            _ => FloorEvent::ReservationNoShow {
                reservation_id,
                table_id,
            },
        };
        self.ctx.emit(&[event]).await;

        Ok(reservation)
    }

    /// Pre-read outside any lock; the result is re-checked under it.
    async fn load_active(&self, reservation_id: &str) -> FloorResult<Reservation> {
        let mut uow = self.ctx.begin().await?;
        let reservation = load(&mut uow, reservation_id).await?;
        ensure_active(&reservation)?;
        Ok(reservation)
    }
}

fn validate_request_fields(
    name: &str,
    phone: &str,
    email: Option<&str>,
    party_size: i64,
) -> FloorResult<()> {
    validate_customer_name(name)?;
    validate_phone(phone)?;
    validate_email(email)?;
    validate_party_size(party_size)?;
    Ok(())
}

fn clean_email(email: Option<&str>) -> Option<String> {
    email.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string)
}

fn ensure_active(reservation: &Reservation) -> FloorResult<()> {
    if reservation.status.is_terminal() {
        return Err(CoreError::InvalidReservationState {
            reservation_id: reservation.id.clone(),
            status: reservation.status.as_str().to_string(),
        }
        .into());
    }
    Ok(())
}

async fn load(uow: &mut UnitOfWork, reservation_id: &str) -> FloorResult<Reservation> {
    uow.reservations()
        .get(reservation_id)
        .await?
        .ok_or_else(|| CoreError::ReservationNotFound(reservation_id.to_string()).into())
}

// =============================================================================
// Unit Tests
// =============================================================================
