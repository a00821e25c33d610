//! # Floor Error Types
//!
//! The error every engine operation returns.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Floor Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Domain      │  │    Storage      │  │     Coordination        │ │
//! │  │   (CoreError)   │  │   (DbError)     │  │                         │ │
//! │  │                 │  │                 │  │  LockTimeout            │ │
//! │  │  EmptyOrder     │  │  Busy           │  │                         │ │
//! │  │  Insufficient-  │  │  Connection-    │  │                         │ │
//! │  │    Stock        │  │    Failed       │  │                         │ │
//! │  │  Reservation-   │  │  QueryFailed    │  │                         │ │
//! │  │    Conflict ... │  │  ...            │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Configuration  │   Domain errors are returned to the caller as-is. │
//! │  │                 │   Storage errors propagate unmodified once the    │
//! │  │  InvalidConfig  │   retry policy gives up on them.                  │
//! │  │  ConfigLoad     │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use floor_core::CoreError;
use floor_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type FloorResult<T> = Result<T, FloorError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum FloorError {
    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A business rule rejected the request.
    #[error(transparent)]
    Domain(#[from] CoreError),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The persistence layer failed.
    #[error("Storage error: {0}")]
    Storage(DbError),

    // =========================================================================
    // Coordination Errors
    // =========================================================================
    /// A table or stock lock was not acquired in time.
    ///
    /// Raised before any write, so nothing was changed.
    #[error("Timed out after {waited_ms}ms waiting for lock on {resource}")]
    LockTimeout { resource: String, waited_ms: u64 },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid floor configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoad(String),
}

impl FloorError {
    /// The wrapped business error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            FloorError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if the storage layer reported a transient conflict.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FloorError::Storage(err) if err.is_retryable())
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for FloorError {
    fn from(err: DbError) -> Self {
        match err {
            // Repositories report missing rows from UPDATEs; surface the
            // domain error the caller expects.
            DbError::NotFound { entity, id } => match entity.as_str() {
                "Table" => CoreError::TableNotFound(id).into(),
                "Order" => CoreError::OrderNotFound(id).into(),
                "Reservation" => CoreError::ReservationNotFound(id).into(),
                "Stock" => CoreError::StockNotFound(id).into(),
                "Product" => CoreError::ProductNotFound(id).into(),
                _ => FloorError::Storage(DbError::NotFound { entity, id }),
            },
            other => FloorError::Storage(other),
        }
    }
}

impl From<floor_core::ValidationError> for FloorError {
    fn from(err: floor_core::ValidationError) -> Self {
        FloorError::Domain(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for FloorError {
    fn from(err: std::io::Error) -> Self {
        FloorError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for FloorError {
    fn from(err: toml::de::Error) -> Self {
        FloorError::ConfigLoad(err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
