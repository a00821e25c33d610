//! # Seed Data Generator
//!
//! Populates a floor database for local development.
//!
//! ## Usage
//! ```bash
//! # One salon with 12 tables (default)
//! cargo run -p floor-db --bin seed
//!
//! # Custom table count and database path
//! cargo run -p floor-db --bin seed -- --db ./floor_dev.db --tables 20
//! ```
//!
//! ## Generated Data
//! - One salon, "Main Hall", tables numbered from 1 with 2/4/6 seats
//! - Stock for every ingredient below, with a minimum threshold
//! - Menu products whose recipes draw on that stock

use chrono::Utc;
use floor_core::{Product, ProductIngredient, Quantity, Stock};
use floor_db::{Database, DbConfig, DbResult, UnitOfWork};
use std::collections::HashMap;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// (name, unit, on hand, minimum) with quantities in thousandths.
const STOCKS: &[(&str, &str, i64, i64)] = &[
    ("Tomato", "kg", 25_000, 5_000),
    ("Mozzarella", "kg", 12_000, 3_000),
    ("Flour", "kg", 40_000, 10_000),
    ("Olive Oil", "l", 8_000, 2_000),
    ("Basil", "kg", 1_500, 300),
    ("Pasta", "kg", 20_000, 5_000),
    ("Beef", "kg", 15_000, 4_000),
    ("Lettuce", "kg", 6_000, 1_500),
    ("Espresso Beans", "kg", 5_000, 1_000),
    ("Milk", "l", 18_000, 4_000),
];

/// (name, category, price cents, recipe of (stock name, quantity per unit)).
const PRODUCTS: &[(&str, &str, i64, &[(&str, i64)])] = &[
    (
        "Margherita",
        "Pizza",
        1150,
        &[("Flour", 250), ("Tomato", 150), ("Mozzarella", 125), ("Basil", 5)],
    ),
    (
        "Marinara",
        "Pizza",
        950,
        &[("Flour", 250), ("Tomato", 200), ("Olive Oil", 20)],
    ),
    (
        "Spaghetti al Pomodoro",
        "Pasta",
        1300,
        &[("Pasta", 180), ("Tomato", 220), ("Olive Oil", 15), ("Basil", 3)],
    ),
    (
        "Lasagne",
        "Pasta",
        1650,
        &[("Pasta", 150), ("Beef", 180), ("Tomato", 150), ("Mozzarella", 80), ("Milk", 100)],
    ),
    ("House Salad", "Starters", 700, &[("Lettuce", 120), ("Tomato", 80), ("Olive Oil", 10)]),
    ("Espresso", "Drinks", 250, &[("Espresso Beans", 8)]),
    ("Cappuccino", "Drinks", 350, &[("Espresso Beans", 8), ("Milk", 150)]),
    ("Sparkling Water", "Drinks", 300, &[]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,floor=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut tables: i64 = 12;
    let mut db_path = String::from("./floor_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tables" | "-t" => {
                if i + 1 < args.len() {
                    tables = args[i + 1].parse().unwrap_or(12);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Floor POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --tables <N>   Number of tables to create (default: 12)");
                println!("  -d, --db <PATH>    Database file path (default: ./floor_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %db_path, tables, "Seeding floor database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let mut uow = db.begin().await?;
    let existing = uow.tables().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has tables, skipping seed");
        println!("Database already has {} tables. Delete the file to regenerate.", existing);
        return Ok(());
    }

    let start = std::time::Instant::now();
    seed(&mut uow, tables).await?;
    uow.commit().await?;

    println!(
        "Seeded {} tables, {} stock items, {} products in {:?}",
        tables,
        STOCKS.len(),
        PRODUCTS.len(),
        start.elapsed()
    );

    Ok(())
}

async fn seed(uow: &mut UnitOfWork, tables: i64) -> DbResult<()> {
    let now = Utc::now();

    let salon = uow.tables().create_salon("Main Hall").await?;
    for number in 1..=tables {
        let capacity = match number % 3 {
            0 => 6,
            1 => 2,
            _ => 4,
        };
        uow.tables().insert(&salon.id, number, capacity, now).await?;
    }

    let mut stock_ids = HashMap::new();
    for (name, unit, on_hand, minimum) in STOCKS {
        let stock = Stock {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            unit: unit.to_string(),
            quantity: Quantity::from_milli(*on_hand),
            initial_quantity: Quantity::from_milli(*on_hand),
            minimum_quantity: Quantity::from_milli(*minimum),
            created_at: now,
            updated_at: now,
        };
        uow.stock().insert(&stock).await?;
        stock_ids.insert(*name, stock.id);
    }

    for (name, category, price_cents, recipe) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category: category.to_string(),
            price_cents: *price_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        uow.products().insert(&product).await?;

        let lines: Vec<ProductIngredient> = recipe
            .iter()
            .filter_map(|(stock_name, milli)| {
                stock_ids.get(stock_name).map(|stock_id| ProductIngredient {
                    product_id: product.id.clone(),
                    stock_id: stock_id.clone(),
                    quantity: Quantity::from_milli(*milli),
                })
            })
            .collect();
        uow.products().replace_recipe(&product.id, &lines).await?;
    }

    Ok(())
}
