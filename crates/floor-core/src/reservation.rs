//! # Reservation Windows
//!
//! Conflict detection between bookings on one table.
//!
//! ## Window Model
//! ```text
//! A reservation holds its table for a fixed block starting at its time:
//!
//!      [start, start + window)        half-open
//!
//!  19:00 ├──────────── A ────────────┤ 20:00
//!           19:15 ├──────────── B ───────────┤ 20:15     A ∩ B ≠ ∅  ❌
//!                                  20:00 ├──── C ────┤   touches A   ✅
//!
//!  Conflict iff  s1 < e2  AND  s2 < e1
//! ```
//!
//! Windows are built on the combined date and time, so a late booking whose
//! block runs past midnight still collides with an early booking on the next
//! day.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{ConflictReason, CoreError, CoreResult};
use crate::types::Reservation;

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The interval a reservation occupies its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ReservationWindow {
    /// A window of `minutes` starting at `start`.
    pub fn new(start: NaiveDateTime, minutes: i64) -> Self {
        ReservationWindow {
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    /// Half-open intersection test.
    #[inline]
    pub fn overlaps(&self, other: &ReservationWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `at` falls inside the window.
    #[inline]
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }
}

/// A table's uncompleted order, treated as occupying it for one window from
/// the present.
#[derive(Debug, Clone, Copy)]
pub struct Occupancy<'a> {
    pub order_id: &'a str,
    pub now: NaiveDateTime,
}

/// Everything the detector needs to judge one proposed booking.
#[derive(Debug, Clone, Copy)]
pub struct ConflictCheck<'a> {
    pub proposed_start: NaiveDateTime,
    pub party_size: i64,
    pub capacity: i64,
    pub window_minutes: i64,
    /// Reservation being updated; excluded from its own check.
    pub excluding: Option<&'a str>,
    pub occupancy: Option<Occupancy<'a>>,
}

impl<'a> ConflictCheck<'a> {
    pub fn window(&self) -> ReservationWindow {
        ReservationWindow::new(self.proposed_start, self.window_minutes)
    }

    /// Checks capacity, then existing reservations, then live occupancy.
    ///
    /// Only active (CONFIRMED/PENDING) reservations take part.
    pub fn run(&self, existing: &[Reservation]) -> CoreResult<()> {
        if self.party_size > self.capacity {
            return Err(CoreError::ReservationConflict(ConflictReason::OverCapacity {
                party_size: self.party_size,
                capacity: self.capacity,
            }));
        }

        let proposed = self.window();

        let clash = existing
            .iter()
            .filter(|r| r.status.is_active())
            .filter(|r| Some(r.id.as_str()) != self.excluding)
            .map(|r| (r, ReservationWindow::new(r.starts_at(), self.window_minutes)))
            .find(|(_, window)| window.overlaps(&proposed));

        if let Some((reservation, window)) = clash {
            return Err(CoreError::ReservationConflict(ConflictReason::Overlap {
                existing_id: reservation.id.clone(),
                existing_start: window.start.format(DISPLAY_FORMAT).to_string(),
                existing_end: window.end.format(DISPLAY_FORMAT).to_string(),
            }));
        }

        if let Some(occupancy) = self.occupancy {
            let occupied = ReservationWindow::new(occupancy.now, self.window_minutes);
            if occupied.overlaps(&proposed) {
                return Err(CoreError::ReservationConflict(ConflictReason::TableOccupied {
                    order_id: occupancy.order_id.to_string(),
                }));
            }
        }

        Ok(())
    }
}

/// Active reservations whose scheduled start is at or before `now`.
///
/// These are the stale bookings a finalize closes out.
pub fn due_reservations<'r>(
    reservations: &'r [Reservation],
    now: NaiveDateTime,
) -> impl Iterator<Item = &'r Reservation> {
    reservations
        .iter()
        .filter(move |r| r.status.is_active() && r.starts_at() <= now)
}

// =============================================================================
// Unit Tests
// =============================================================================
