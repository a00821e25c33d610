//! # Product Repository
//!
//! Catalog products and their recipes (bill of materials).
//!
//! ```text
//! products ──< product_ingredients >── stocks
//!              (product_id, stock_id, quantity per unit sold)
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use floor_core::{Product, ProductIngredient};

const PRODUCT_COLUMNS: &str = "id, name, category, price_cents, is_active, created_at, updated_at";

/// Repository for products and recipe lines.
#[derive(Debug)]
pub struct ProductRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    /// Inserts a product.
    pub async fn insert(&mut self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, price_cents, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets a product by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(product)
    }

    /// Gets several products keyed by id. Missing ids are absent from the map.
    pub async fn get_many(&mut self, ids: &[String]) -> DbResult<HashMap<String, Product>> {
        let mut products = HashMap::with_capacity(ids.len());
        for id in ids {
            if products.contains_key(id) {
                continue;
            }
            if let Some(product) = self.get(id).await? {
                products.insert(id.clone(), product);
            }
        }
        Ok(products)
    }

    /// Lists active products by category and name.
    pub async fn list_active(&mut self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY category, name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(products)
    }

    /// Sets the active flag.
    ///
    /// ## Returns
    /// `false` if no product has this id.
    pub async fn set_active(
        &mut self,
        id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(active)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Counts products.
    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Recipes
    // =========================================================================

    /// Replaces a product's whole recipe, keeping line order.
    pub async fn replace_recipe(
        &mut self,
        product_id: &str,
        lines: &[ProductIngredient],
    ) -> DbResult<()> {
        debug!(product_id = %product_id, lines = lines.len(), "Replacing recipe");

        sqlx::query("DELETE FROM product_ingredients WHERE product_id = ?1")
            .bind(product_id)
            .execute(&mut *self.conn)
            .await?;

        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_ingredients (product_id, stock_id, quantity, position)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(product_id)
            .bind(&line.stock_id)
            .bind(line.quantity)
            .bind(position as i64)
            .execute(&mut *self.conn)
            .await?;
        }

        Ok(())
    }

    /// A product's recipe lines in entry order.
    pub async fn recipe(&mut self, product_id: &str) -> DbResult<Vec<ProductIngredient>> {
        let lines = sqlx::query_as::<_, ProductIngredient>(
            r#"
            SELECT product_id, stock_id, quantity
            FROM product_ingredients
            WHERE product_id = ?1
            ORDER BY position
            "#,
        )
        .bind(product_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(lines)
    }

    /// Recipes for several products, keyed by product id.
    ///
    /// Products without recipe lines map to an empty list.
    pub async fn recipes_for(
        &mut self,
        product_ids: &[String],
    ) -> DbResult<HashMap<String, Vec<ProductIngredient>>> {
        let mut recipes = HashMap::with_capacity(product_ids.len());
        for product_id in product_ids {
            if recipes.contains_key(product_id) {
                continue;
            }
            let lines = self.recipe(product_id).await?;
            recipes.insert(product_id.clone(), lines);
        }
        Ok(recipes)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, UnitOfWork};
    use chrono::Utc;
    use floor_core::{Product, ProductIngredient, Quantity, Stock};
    use uuid::Uuid;

    fn product(name: &str) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category: "Mains".to_string(),
            price_cents: 990,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn stock(uow: &mut UnitOfWork, name: &str) -> Stock {
        let now = Utc::now();
        let stock = Stock {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            unit: "kg".to_string(),
            quantity: Quantity::from_units(10),
            initial_quantity: Quantity::from_units(10),
            minimum_quantity: Quantity::zero(),
            created_at: now,
            updated_at: now,
        };
        uow.stock().insert(&stock).await.unwrap();
        stock
    }

    #[tokio::test]
    async fn test_recipe_replace_and_read() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let tomato = stock(&mut uow, "Tomato").await;
        let cheese = stock(&mut uow, "Cheese").await;
        let pizza = product("Pizza");
        uow.products().insert(&pizza).await.unwrap();

        let line = |stock: &Stock, milli: i64| ProductIngredient {
            product_id: pizza.id.clone(),
            stock_id: stock.id.clone(),
            quantity: Quantity::from_milli(milli),
        };

        uow.products()
            .replace_recipe(&pizza.id, &[line(&tomato, 2_000), line(&cheese, 150)])
            .await
            .unwrap();
        let recipe = uow.products().recipe(&pizza.id).await.unwrap();
        assert_eq!(recipe.len(), 2);
        assert_eq!(recipe[0].stock_id, tomato.id);
        assert_eq!(recipe[0].quantity, Quantity::from_units(2));

        uow.products()
            .replace_recipe(&pizza.id, &[line(&cheese, 200)])
            .await
            .unwrap();
        let recipe = uow.products().recipe(&pizza.id).await.unwrap();
        assert_eq!(recipe, vec![line(&cheese, 200)]);
    }

    #[tokio::test]
    async fn test_recipes_for_many() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let bread = stock(&mut uow, "Bread").await;
        let toast = product("Toast");
        let water = product("Water");
        uow.products().insert(&toast).await.unwrap();
        uow.products().insert(&water).await.unwrap();
        uow.products()
            .replace_recipe(
                &toast.id,
                &[ProductIngredient {
                    product_id: toast.id.clone(),
                    stock_id: bread.id.clone(),
                    quantity: Quantity::from_units(1),
                }],
            )
            .await
            .unwrap();

        let ids = vec![toast.id.clone(), water.id.clone()];
        let recipes = uow.products().recipes_for(&ids).await.unwrap();
        assert_eq!(recipes[&toast.id].len(), 1);
        assert!(recipes[&water.id].is_empty());

        let products = uow.products().get_many(&ids).await.unwrap();
        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn test_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let soup = product("Soup");
        uow.products().insert(&soup).await.unwrap();
        assert_eq!(uow.products().list_active().await.unwrap().len(), 1);

        assert!(uow.products().set_active(&soup.id, false, Utc::now()).await.unwrap());
        assert!(uow.products().list_active().await.unwrap().is_empty());
        assert!(!uow.products().get(&soup.id).await.unwrap().unwrap().is_active);
        assert!(!uow.products().set_active("missing", false, Utc::now()).await.unwrap());
    }
}
