//! # Seed Data Generator
//!
//! Populates a development database with a cafe menu, opening stock and a
//! few loyalty customers, then rings up sample sales.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (cafe-pos.toml / CAFE_DB_PATH)
//! cargo run -p cafe-db --bin seed
//!
//! # Specify database path and opening stock
//! cargo run -p cafe-db --bin seed -- --db ./cafe_dev.db --stock 50
//! ```

use std::env;
use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cafe_core::{CheckoutLine, CheckoutRequest, CustomerInput, Money, PaymentMethod, RedemptionRequest};
use cafe_db::{MovementSource, NewProduct, PosConfig};

/// Menu items with prices in whole currency units.
const MENU: &[(&str, i64)] = &[
    ("Espresso", 35_000),
    ("Americano", 39_000),
    ("Cappuccino", 45_000),
    ("Latte", 45_000),
    ("Iced Milk Coffee", 29_000),
    ("Coconut Coffee", 49_000),
    ("Peach Tea", 42_000),
    ("Matcha Latte", 52_000),
    ("Croissant", 30_000),
    ("Banana Bread", 25_000),
];

/// Loyalty customers (name, phone).
const CUSTOMERS: &[(&str, &str)] = &[
    ("Lan Nguyen", "0900000001"),
    ("Minh Tran", "0900000002"),
    ("Huong Le", "0900000003"),
];

/// Actor id recorded on seeded movements and orders.
const SEED_ACTOR: i64 = 1;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cafe=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config = PosConfig::load(None)?;
    let mut opening_stock: i64 = 100;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database.path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    opening_stock = args[i + 1].parse().unwrap_or(100);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Cafe POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: from cafe-pos.toml)");
                println!("  -s, --stock <N>     Opening stock per product (default: 100)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(path = %config.database.path.display(), "Seeding database");
    let db = config.open_database().await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(
            existing,
            "Database already has products; skipping seed. Delete the file to regenerate."
        );
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut product_ids = Vec::with_capacity(MENU.len());

    for (name, price) in MENU {
        let product = match db
            .products()
            .insert(&NewProduct::new(*name, Money::from_major(*price)))
            .await
        {
            Ok(product) => product,
            Err(e) => {
                error!(name, error = %e, "Failed to insert product");
                continue;
            }
        };

        if opening_stock > 0 {
            db.stock()
                .increment(product.id, opening_stock, MovementSource::actor(SEED_ACTOR))
                .await?;
        }
        product_ids.push((product.id, product.price()));
    }
    info!(products = product_ids.len(), "Menu created");

    for (name, phone) in CUSTOMERS {
        db.loyalty()
            .lookup_or_create(&CustomerInput::new(*name, *phone))
            .await?;
    }
    info!(customers = CUSTOMERS.len(), "Customers created");

    // A few sales so the history screens have something to show.
    let checkout = config.checkout_service(&db);
    if opening_stock >= 3 && product_ids.len() == MENU.len() {
        let cart = |picks: &[(usize, i64)]| {
            picks
                .iter()
                .map(|(idx, qty)| {
                    let (id, price) = product_ids[*idx];
                    CheckoutLine::new(id, price, *qty)
                })
                .collect::<Vec<_>>()
        };

        let sales = [
            CheckoutRequest::new(cart(&[(0, 2), (8, 1)]), PaymentMethod::Cash, SEED_ACTOR),
            CheckoutRequest::new(cart(&[(3, 3)]), PaymentMethod::Card, SEED_ACTOR)
                .with_customer(CustomerInput::new(CUSTOMERS[0].0, CUSTOMERS[0].1)),
            CheckoutRequest::new(cart(&[(5, 2), (9, 2)]), PaymentMethod::EWallet, SEED_ACTOR)
                .with_customer(CustomerInput::new(CUSTOMERS[0].0, CUSTOMERS[0].1))
                .with_redemption(RedemptionRequest::EntireBalance),
        ];

        for request in &sales {
            match checkout.checkout(request).await {
                Ok(receipt) => info!(
                    order_id = receipt.order_id(),
                    total = %receipt.final_total(),
                    "Sample sale recorded"
                ),
                Err(e) => error!(error = %e, "Sample sale failed"),
            }
        }
    }

    info!(elapsed = ?start.elapsed(), "Seed complete");
    db.close().await;
    Ok(())
}
