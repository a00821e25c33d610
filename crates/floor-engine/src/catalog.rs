//! # Catalog
//!
//! Menu products and their recipes (bill of materials).
//!
//! ```text
//! Product "Margherita" ──► ProductIngredient ──► Stock
//!                            Flour      0.250
//!                            Tomato     0.150
//!                            Mozzarella 0.125
//! ```
//!
//! A recipe is always replaced whole. Every line must name an existing stock
//! and a strictly positive quantity, and a stock may appear once per recipe.

use std::sync::Arc;

use floor_core::validation::{validate_name, validate_price_cents, validate_recipe};
use floor_core::{CoreError, Money, Product, ProductIngredient, ProductWithRecipe, Quantity};
use floor_db::UnitOfWork;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::context::FloorContext;
use crate::error::FloorResult;

/// One recipe line as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub stock_id: String,
    /// Amount of the stock consumed per unit of product.
    pub quantity: Quantity,
}

impl RecipeLine {
    pub fn new(stock_id: impl Into<String>, quantity: Quantity) -> Self {
        RecipeLine {
            stock_id: stock_id.into(),
            quantity,
        }
    }
}

/// Products and recipes.
#[derive(Clone)]
pub struct Catalog {
    ctx: Arc<FloorContext>,
}

impl Catalog {
    pub(crate) fn new(ctx: Arc<FloorContext>) -> Self {
        Catalog { ctx }
    }

    /// Creates an active product with its recipe.
    pub async fn create_product(
        &self,
        name: &str,
        category: &str,
        price: Money,
        recipe: &[RecipeLine],
    ) -> FloorResult<ProductWithRecipe> {
        validate_name("product name", name)?;
        validate_name("category", category)?;
        validate_price_cents(price.cents())?;

        let now = self.ctx.clock.now_utc();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            category: category.trim().to_string(),
            price_cents: price.cents(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let lines = to_ingredients(&product.id, recipe);
        validate_recipe(&lines)?;

        let mut uow = self.ctx.begin().await?;
        ensure_stocks_exist(&mut uow, &lines).await?;
        uow.products().insert(&product).await?;
        uow.products().replace_recipe(&product.id, &lines).await?;
        uow.commit().await?;

        info!(
            product_id = %product.id,
            name = %product.name,
            recipe_lines = lines.len(),
            "Product created"
        );
        Ok(ProductWithRecipe { product, recipe: lines })
    }

    /// Replaces a product's recipe.
    ///
    /// Orders finalized afterwards consume by the new recipe; a finalize
    /// already past planning re-plans.
    pub async fn set_recipe(
        &self,
        product_id: &str,
        recipe: &[RecipeLine],
    ) -> FloorResult<ProductWithRecipe> {
        let lines = to_ingredients(product_id, recipe);
        validate_recipe(&lines)?;

        let mut uow = self.ctx.begin().await?;
        let product = load(&mut uow, product_id).await?;
        ensure_stocks_exist(&mut uow, &lines).await?;
        uow.products().replace_recipe(product_id, &lines).await?;
        uow.commit().await?;

        info!(product_id = %product_id, recipe_lines = lines.len(), "Recipe replaced");
        Ok(ProductWithRecipe { product, recipe: lines })
    }

    /// Takes a product off the menu. Existing orders keep their items.
    pub async fn deactivate(&self, product_id: &str) -> FloorResult<()> {
        let mut uow = self.ctx.begin().await?;
        if !uow.products().set_active(product_id, false, self.ctx.clock.now_utc()).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        uow.commit().await?;

        info!(product_id = %product_id, "Product deactivated");
        Ok(())
    }

    pub async fn get(&self, product_id: &str) -> FloorResult<ProductWithRecipe> {
        let mut uow = self.ctx.begin().await?;
        let product = load(&mut uow, product_id).await?;
        let recipe = uow.products().recipe(product_id).await?;
        Ok(ProductWithRecipe { product, recipe })
    }

    /// Active products by category, then name.
    pub async fn list_active(&self) -> FloorResult<Vec<Product>> {
        let mut uow = self.ctx.begin().await?;
        Ok(uow.products().list_active().await?)
    }
}

fn to_ingredients(product_id: &str, recipe: &[RecipeLine]) -> Vec<ProductIngredient> {
    recipe
        .iter()
        .map(|line| ProductIngredient {
            product_id: product_id.to_string(),
            stock_id: line.stock_id.clone(),
            quantity: line.quantity,
        })
        .collect()
}

async fn ensure_stocks_exist(uow: &mut UnitOfWork, lines: &[ProductIngredient]) -> FloorResult<()> {
    for line in lines {
        if uow.stock().get(&line.stock_id).await?.is_none() {
            return Err(CoreError::StockNotFound(line.stock_id.clone()).into());
        }
    }
    Ok(())
}

async fn load(uow: &mut UnitOfWork, product_id: &str) -> FloorResult<Product> {
    uow.products()
        .get(product_id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
}

// =============================================================================
// Unit Tests
// =============================================================================
