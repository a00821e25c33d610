//! # Validation Module
//!
//! Input validation for floor operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (HTTP layer, terminal UI)                             │
//! │  └── Deserialization, basic shape                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: floor-engine component                                       │
//! │  └── THIS MODULE: field rules, before any lock or read                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE (salon_id, number)                                         │
//! │  └── One open order per table (partial unique index)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use floor_core::validation::{validate_item_quantity, validate_party_size};
//!
//! validate_item_quantity(3).unwrap();
//! assert!(validate_party_size(0).is_err());
//! ```

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::quantity::Quantity;
use crate::types::{OrderLine, ProductIngredient};
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PRICE_CENTS, MAX_STOCK_MILLI};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required_trimmed<'a>(field: &str, value: &'a str, max: usize) -> ValidationResult<&'a str> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value)
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a salon, product, or stock name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    required_trimmed(field, name, 200).map(|_| ())
}

/// Validates a reservation's customer name.
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    required_trimmed("customer_name", name, 100).map(|_| ())
}

/// Validates a reservation's contact phone.
///
/// ## Rules
/// - 6 to 20 characters after trimming
/// - Digits, spaces, and `+ - ( )` only
/// - At least six digits
///
/// ## Example
/// ```rust
/// use floor_core::validation::validate_phone;
///
/// assert!(validate_phone("+1 (555) 010-9999").is_ok());
/// assert!(validate_phone("call me").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = required_trimmed("customer_phone", phone, 20)?;

    if phone.chars().count() < 6 {
        return Err(ValidationError::InvalidFormat {
            field: "customer_phone".to_string(),
            reason: "must be at least 6 characters".to_string(),
        });
    }

    let allowed = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')');
    if !phone.chars().all(allowed) {
        return Err(ValidationError::InvalidFormat {
            field: "customer_phone".to_string(),
            reason: "only digits, spaces and + - ( ) are allowed".to_string(),
        });
    }

    if phone.chars().filter(|c| c.is_ascii_digit()).count() < 6 {
        return Err(ValidationError::InvalidFormat {
            field: "customer_phone".to_string(),
            reason: "must contain at least 6 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional contact email.
///
/// Blank is treated as absent. Anything else needs a local part and a domain
/// around a single `@`.
pub fn validate_email(email: Option<&str>) -> ValidationResult<()> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(());
    };

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "customer_email".to_string(),
            max: 254,
        });
    }

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(ValidationError::InvalidFormat {
            field: "customer_email".to_string(),
            reason: "must look like name@domain".to_string(),
        }),
    }
}

/// Validates an opaque staff id from the identity boundary.
pub fn validate_staff_id(staff_id: &str) -> ValidationResult<()> {
    required_trimmed("staff_id", staff_id, 100).map(|_| ())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the quantity of a product on one order line.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_item_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (complimentary items).
///
/// ```rust
/// use floor_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// assert!(validate_price_cents(i64::MAX / 2).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a reservation party size.
pub fn validate_party_size(party_size: i64) -> ValidationResult<()> {
    if party_size < 1 {
        return Err(ValidationError::MustBePositive {
            field: "party_size".to_string(),
        });
    }

    Ok(())
}

/// Validates a table's seat count.
pub fn validate_capacity(capacity: i64) -> ValidationResult<()> {
    if capacity < 1 {
        return Err(ValidationError::MustBePositive {
            field: "capacity".to_string(),
        });
    }

    Ok(())
}

/// Validates a table number.
pub fn validate_table_number(number: i64) -> ValidationResult<()> {
    if number < 1 {
        return Err(ValidationError::MustBePositive {
            field: "table number".to_string(),
        });
    }

    Ok(())
}

/// Validates a stock amount that must be strictly positive (deduct, add,
/// recipe line).
pub fn validate_positive_quantity(field: &str, quantity: Quantity) -> ValidationResult<()> {
    if !quantity.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    validate_stock_ceiling(field, quantity)
}

/// Validates an on-hand or threshold amount, which may be zero.
pub fn validate_non_negative_quantity(field: &str, quantity: Quantity) -> ValidationResult<()> {
    if quantity.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK_MILLI,
        });
    }

    validate_stock_ceiling(field, quantity)
}

/// Rejects amounts above [`MAX_STOCK_MILLI`].
pub fn validate_stock_ceiling(field: &str, quantity: Quantity) -> ValidationResult<()> {
    if quantity.milli() > MAX_STOCK_MILLI {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK_MILLI,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates and normalizes order upsert lines.
///
/// Lines for the same product are merged by summing quantities, and the
/// result is sorted by product id. An empty input is not an error here; the
/// order lifecycle reports it as `EmptyOrder` with the table id attached.
///
/// ```rust
/// use floor_core::types::OrderLine;
/// use floor_core::validation::normalize_order_lines;
///
/// let lines = vec![OrderLine::new("pizza", 1), OrderLine::new("pizza", 2)];
/// let merged = normalize_order_lines(&lines).unwrap();
/// assert_eq!(merged, vec![OrderLine::new("pizza", 3)]);
/// ```
pub fn normalize_order_lines(lines: &[OrderLine]) -> ValidationResult<Vec<OrderLine>> {
    let mut merged: BTreeMap<&str, i64> = BTreeMap::new();

    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            });
        }
        validate_item_quantity(line.quantity)?;
        *merged.entry(line.product_id.as_str()).or_insert(0) += line.quantity;
    }

    if merged.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "order lines".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    merged
        .into_iter()
        .map(|(product_id, quantity)| {
            validate_item_quantity(quantity)?;
            Ok(OrderLine::new(product_id, quantity))
        })
        .collect()
}

/// Validates a recipe: positive quantities, each stock listed once.
pub fn validate_recipe(recipe: &[ProductIngredient]) -> ValidationResult<()> {
    let mut seen = std::collections::HashSet::new();

    for line in recipe {
        validate_positive_quantity("recipe quantity", line.quantity)?;
        if !seen.insert(line.stock_id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "recipe stock".to_string(),
                value: line.stock_id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
