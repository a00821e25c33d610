//! # Recipe Expansion
//!
//! Flattens an order into the stock it consumes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order items            Recipes                  Requirements           │
//! │                                                                         │
//! │  3 × Pizza  ──────►  Pizza: 2.000 Tomato  ──┐                           │
//! │                             0.150 Cheese  ──┼──►  Cheese  0.550         │
//! │  2 × Toast  ──────►  Toast: 0.050 Cheese  ──┘     Tomato  6.000         │
//! │                             1.000 Bread   ─────►  Bread   2.000         │
//! │                                                                         │
//! │  One entry per stock, sorted by stock id = the stock lock order.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two-hop Product → ProductIngredient → Stock lookup is done once per
//! finalize, outside the atomic section; only the flat list is carried in.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::quantity::Quantity;
use crate::types::{ProductIngredient, Stock};

/// Total amount of one stock needed by an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub stock_id: String,
    pub quantity: Quantity,
}

/// Expands `(product_id, item quantity)` pairs through their recipes.
///
/// `recipe quantity × item quantity` is summed per stock. Products with no
/// recipe lines consume nothing. The result is sorted by ascending stock id
/// and never contains zero entries.
///
/// ## Errors
/// `Validation(OutOfRange)` if a product or a per-stock sum does not fit.
pub fn expand_requirements(
    items: &[(String, i64)],
    recipes: &HashMap<String, Vec<ProductIngredient>>,
) -> CoreResult<Vec<Requirement>> {
    let mut totals: BTreeMap<&str, Quantity> = BTreeMap::new();

    for (product_id, item_quantity) in items {
        let Some(recipe) = recipes.get(product_id) else {
            continue;
        };
        for line in recipe {
            let needed = line.quantity.times(*item_quantity)?;
            let total = totals.entry(line.stock_id.as_str()).or_default();
            *total = total.checked_add(needed)?;
        }
    }

    Ok(totals
        .into_iter()
        .filter(|(_, quantity)| !quantity.is_zero())
        .map(|(stock_id, quantity)| Requirement {
            stock_id: stock_id.to_string(),
            quantity,
        })
        .collect())
}

/// Stock ids of a requirement list, in lock order.
pub fn stock_ids(requirements: &[Requirement]) -> Vec<String> {
    requirements.iter().map(|r| r.stock_id.clone()).collect()
}

/// Checks every requirement against the current stock rows.
///
/// Fails on the first stock (in id order) that is missing or would go
/// negative. Nothing is mutated, so callers can check all before deducting
/// any.
pub fn check_availability(requirements: &[Requirement], stocks: &[Stock]) -> CoreResult<()> {
    let by_id: HashMap<&str, &Stock> = stocks.iter().map(|s| (s.id.as_str(), s)).collect();

    for requirement in requirements {
        let stock = by_id
            .get(requirement.stock_id.as_str())
            .ok_or_else(|| CoreError::StockNotFound(requirement.stock_id.clone()))?;

        if stock.quantity < requirement.quantity {
            return Err(CoreError::InsufficientStock {
                stock_id: stock.id.clone(),
                name: stock.name.clone(),
                available: stock.quantity,
                requested: requirement.quantity,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use chrono::Utc;

    fn ingredient(product: &str, stock: &str, quantity: &str) -> ProductIngredient {
        ProductIngredient {
            product_id: product.to_string(),
            stock_id: stock.to_string(),
            quantity: Quantity::parse(quantity).unwrap(),
        }
    }

    fn stock(id: &str, quantity: &str) -> Stock {
        let now = Utc::now();
        let quantity = Quantity::parse(quantity).unwrap();
        Stock {
            id: id.to_string(),
            name: id.to_uppercase(),
            unit: "kg".to_string(),
            quantity,
            initial_quantity: quantity,
            minimum_quantity: Quantity::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    fn recipes() -> HashMap<String, Vec<ProductIngredient>> {
        let mut recipes = HashMap::new();
        recipes.insert(
            "pizza".to_string(),
            vec![
                ingredient("pizza", "tomato", "2.0"),
                ingredient("pizza", "cheese", "0.150"),
            ],
        );
        recipes.insert(
            "toast".to_string(),
            vec![
                ingredient("toast", "cheese", "0.050"),
                ingredient("toast", "bread", "1"),
            ],
        );
        recipes
    }

    #[test]
    fn test_expand_aggregates_per_stock() {
        let items = vec![("pizza".to_string(), 3), ("toast".to_string(), 2)];
        let requirements = expand_requirements(&items, &recipes()).unwrap();

        assert_eq!(
            requirements,
            vec![
                Requirement {
                    stock_id: "bread".to_string(),
                    quantity: Quantity::from_units(2)
                },
                Requirement {
                    stock_id: "cheese".to_string(),
                    quantity: Quantity::from_milli(550)
                },
                Requirement {
                    stock_id: "tomato".to_string(),
                    quantity: Quantity::from_units(6)
                },
            ]
        );
        assert_eq!(stock_ids(&requirements), vec!["bread", "cheese", "tomato"]);
    }

    #[test]
    fn test_expand_skips_products_without_recipe() {
        let items = vec![("water".to_string(), 5)];
        assert!(expand_requirements(&items, &recipes()).unwrap().is_empty());
    }

    #[test]
    fn test_expand_rejects_overflowing_requirement() {
        let mut recipes = HashMap::new();
        recipes.insert(
            "feast".to_string(),
            vec![ProductIngredient {
                product_id: "feast".to_string(),
                stock_id: "tomato".to_string(),
                quantity: Quantity::from_milli(i64::MAX / 2),
            }],
        );

        let items = vec![("feast".to_string(), 3)];
        let err = expand_requirements(&items, &recipes).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));

        // Each line fits on its own; the per-stock sum does not.
        let items = vec![("feast".to_string(), 1), ("feast".to_string(), 2)];
        assert!(expand_requirements(&items, &recipes).is_err());
    }

    #[test]
    fn test_check_availability() {
        let requirements = vec![Requirement {
            stock_id: "tomato".to_string(),
            quantity: Quantity::from_units(6),
        }];

        assert!(check_availability(&requirements, &[stock("tomato", "10")]).is_ok());
        assert!(check_availability(&requirements, &[stock("tomato", "6")]).is_ok());

        let err = check_availability(&requirements, &[stock("tomato", "5.999")]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { ref stock_id, available, requested, .. }
                if stock_id == "tomato"
                    && available == Quantity::from_milli(5_999)
                    && requested == Quantity::from_units(6)
        ));

        let err = check_availability(&requirements, &[]).unwrap_err();
        assert!(matches!(err, CoreError::StockNotFound(ref id) if id == "tomato"));
    }
}
