//! # Seed Data Generator
//!
//! Populates the database with development data: products, customers, the
//! VAT rule, and a points-based loyalty program.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p sable-db --bin seed
//!
//! # Generate a custom product count
//! cargo run -p sable-db --bin seed -- --count 500
//!
//! # Specify the database path
//! cargo run -p sable-db --bin seed -- --db ./data/sable.db
//! ```

use chrono::Utc;
use std::env;

use sable_core::loyalty::{AccrualRule, LoyaltyProgram, RedemptionPolicy};
use sable_core::money::{Money, Rate};
use sable_core::tax::{TaxCharge, TaxMethod, TaxRule};
use sable_core::types::{MarkupKind, Product, ShopZone};
use sable_db::repository::stock::generate_product_id;
use sable_db::{Database, DbConfig};

/// Product categories with brand names for realistic test data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "shoes",
        &[
            "Clarks Desert Boot",
            "Adidas Samba",
            "Nike Air Force 1",
            "Timberland 6-Inch",
            "Vans Old Skool",
            "Converse Chuck 70",
            "New Balance 574",
            "Dr. Martens 1460",
        ],
    ),
    (
        "bags",
        &[
            "Leather Tote",
            "Canvas Backpack",
            "Crossbody Satchel",
            "Travel Duffel",
            "Laptop Messenger",
        ],
    ),
    (
        "clothing",
        &[
            "Ankara Shirt",
            "Denim Jacket",
            "Chino Trousers",
            "Polo Shirt",
            "Kaftan",
            "Agbada Set",
        ],
    ),
];

const LOCATIONS: &[&str] = &["ABUJA", "LAGOS"];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let db_path = flag_value(&args, "--db").unwrap_or_else(|| "./sable.db".to_string());
    let count: usize = flag_value(&args, "--count")
        .and_then(|v| v.parse().ok())
        .unwrap_or(200);

    tracing::info!(db = %db_path, count = %count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .expect("failed to open database");

    seed_products(&db, count).await;
    seed_customers(&db).await;
    seed_tax(&db).await;
    seed_loyalty(&db).await;
    seed_payment_methods(&db).await;

    tracing::info!("Seed complete");
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

async fn seed_products(db: &Database, count: usize) {
    let now = Utc::now();
    let mut inserted = 0usize;

    'outer: for i in 0.. {
        for (category, brands) in CATEGORIES {
            for brand in *brands {
                if inserted >= count {
                    break 'outer;
                }
                // Deterministic pseudo-variety: cost ₦3,000..₦42,000,
                // stock 0..40, spread across both locations.
                let cost = Money::from_naira(3_000 + ((inserted * 977) % 39_000) as i64);
                let product = Product {
                    id: generate_product_id(),
                    brand: format!("{brand} #{i}"),
                    category: category.to_string(),
                    cost_price_kobo: cost.kobo(),
                    markup_kind: MarkupKind::Percentage,
                    markup_value: 2_500 + ((inserted % 4) as i64) * 500, // 25%..40%
                    selling_price_kobo: 0,                              // derived on insert
                    quantity: (inserted % 41) as i64,
                    location: LOCATIONS[inserted % LOCATIONS.len()].to_string(),
                    shop_zone: if inserted % 7 == 0 {
                        ShopZone::Warehouse
                    } else {
                        ShopZone::Store
                    },
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                db.stock().insert(&product).await.expect("insert product");
                inserted += 1;
            }
        }
    }

    tracing::info!(inserted, "Products seeded");
}

async fn seed_customers(db: &Database) {
    let now = Utc::now();
    let customers = [
        ("Amina Bello", Some("amina@example.com")),
        ("Chinedu Okafor", Some("chinedu@example.com")),
        ("Funke Adeyemi", None),
        ("Ibrahim Musa", Some("ibrahim@example.com")),
    ];

    for (i, (name, email)) in customers.iter().enumerate() {
        sqlx::query("INSERT INTO customers (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(format!("seed-customer-{i}"))
            .bind(name)
            .bind(email)
            .bind(now)
            .execute(db.pool())
            .await
            .expect("insert customer");
    }

    tracing::info!(count = customers.len(), "Customers seeded");
}

async fn seed_tax(db: &Database) {
    db.config()
        .insert_tax(
            &TaxRule {
                code: "VAT".into(),
                name: "Value Added Tax".into(),
                charge: TaxCharge::Percentage(Rate::from_bps(750)),
                method: TaxMethod::Exclusive,
            },
            true,
            0,
        )
        .await
        .expect("insert tax");

    tracing::info!("VAT 7.5% (exclusive) seeded");
}

async fn seed_loyalty(db: &Database) {
    db.config()
        .insert_loyalty_program(&LoyaltyProgram {
            id: "seed-loyalty-combined".into(),
            name: "Sable Rewards".into(),
            is_active: true,
            rule: AccrualRule::Combined {
                points: 1,
                points_per_unit: 1,
                unit_value_kobo: Money::from_naira(100).kobo(),
            },
            redemption: RedemptionPolicy {
                rate_per_point_kobo: 100,
                minimum_points: 100,
                max_discount: Rate::from_bps(2_000),
            },
        })
        .await
        .expect("insert loyalty program");

    tracing::info!("Loyalty program seeded");
}

async fn seed_payment_methods(db: &Database) {
    for (i, (code, name)) in [
        ("pos_moniepoint", "POS Moniepoint"),
        ("transfer_sterling", "Transfer Sterling"),
    ]
    .iter()
    .enumerate()
    {
        db.config()
            .insert_payment_method(code, name, i as i64)
            .await
            .expect("insert payment method");
    }

    tracing::info!("Custom payment methods seeded");
}
