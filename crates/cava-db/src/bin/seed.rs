//! # Demo Catalog Seeder
//!
//! Populates a database with a small beer catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by the config file / CAVA_DATABASE_PATH
//! cargo run -p cava-db --bin seed
//!
//! # Specify database path and exchange rate
//! cargo run -p cava-db --bin seed -- --db ./data/cava_dev.db --rate 40.50
//!
//! # Also issue a license key for this organization
//! cargo run -p cava-db --bin seed -- --license ABCD-EFGH-1234-5678
//! ```
//!
//! ## Seeded Data
//! - Emissions per subtype (Case, Half-Case, Unit)
//! - Six products, each with local and standard prices
//! - Bottle and can stock for every product
//! - The `exchange_rate` setting

use std::env;
use std::path::PathBuf;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cava_core::lookup::UNIT_EMISSION;
use cava_core::{LicenseKey, Money, PriceMode, Subtype};
use cava_db::{AppConfig, Database, DbConfig};

/// (product, bottle unit price in cents)
const PRODUCTS: &[(&str, i64)] = &[
    ("Polar Pilsen", 100),
    ("Polar Light", 100),
    ("Solera", 120),
    ("Solera Light", 120),
    ("Zulia", 110),
    ("Regional", 90),
];

/// (emission, subtype, units)
const EMISSIONS: &[(&str, Subtype, u32)] = &[
    ("Case", Subtype::Bottle, 36),
    ("Half-Case", Subtype::Bottle, 18),
    ("Case", Subtype::BottleThird, 36),
    ("Half-Case", Subtype::BottleThird, 18),
    ("Case", Subtype::Can, 24),
    ("Half-Case", Subtype::Can, 12),
    ("Case", Subtype::TallCan, 24),
    ("Half-Case", Subtype::TallCan, 12),
];

/// Units put on hand for bottles and cans of every product.
const STARTING_UNITS: i64 = 360;

/// Standard (take-away) prices are this percentage of local ones.
const STANDARD_PRICE_PCT: i64 = 85;

const DEFAULT_RATE: &str = "40.00";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cava=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut rate = String::from(DEFAULT_RATE);
    let mut license: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--rate" | "-r" => {
                if i + 1 < args.len() {
                    rate = args[i + 1].clone();
                    i += 1;
                }
            }
            "--license" | "-l" => {
                if i + 1 < args.len() {
                    license = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Cava POS Demo Catalog Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("  -d, --db <PATH>       Database file path (overrides config)");
                println!(
                    "  -r, --rate <RATE>     Exchange rate Bs. per $ (default: {DEFAULT_RATE})"
                );
                println!("  -l, --license <KEY>   Issue this license key");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = AppConfig::load_or_default(config_path);
    if let Some(path) = db_path {
        config.database.path = path;
    }
    let org = config.organization_id().to_string();
    let rate_cents = parse_rate(&rate)?;

    info!(
        database = %config.database.path.display(),
        organization_id = %org,
        rate = %rate,
        "Seeding demo catalog"
    );

    let db = Database::new(DbConfig::from_app_config(&config)).await?;

    // Emissions
    let catalog = db.catalog();
    for (name, subtype, units) in EMISSIONS {
        catalog.upsert_emission(&org, name, *subtype, *units).await?;
    }

    // Products, prices and stock
    let prices = db.prices();
    let inventory = db.inventory();
    for (product, unit_cents) in PRODUCTS {
        db.products().upsert(&org, product).await?;

        for subtype in Subtype::ALL {
            for (emission, units) in emissions_for(subtype) {
                let local = unit_cents * i64::from(units);
                let standard = local * STANDARD_PRICE_PCT / 100;

                for (mode, cents) in [(PriceMode::Local, local), (PriceMode::Standard, standard)] {
                    prices
                        .upsert(
                            &org,
                            product,
                            emission,
                            subtype,
                            mode,
                            Money::from_cents(cents),
                            Money::from_cents(cents * rate_cents / 100),
                        )
                        .await?;
                }
            }
        }

        for subtype in [Subtype::Bottle, Subtype::Can] {
            inventory.set_units(&org, product, subtype, STARTING_UNITS).await?;
        }
    }

    db.settings().set(&org, "exchange_rate", &rate).await?;

    if let Some(raw) = license {
        let key = LicenseKey::parse(&raw)?;
        match db.licenses().issue(&org, &key).await {
            Ok(_) => info!(key = %key.masked(), "License issued"),
            Err(e) => warn!(error = %e, "License not issued"),
        }
    }

    let catalog = db.catalog().load(&org).await?;
    info!(
        products = PRODUCTS.len(),
        emissions = db.catalog().list_emissions(&org).await?.len(),
        priced = catalog.products_for(Subtype::Bottle).len(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

/// Emissions sold for `subtype`, with their unit counts.
fn emissions_for(subtype: Subtype) -> Vec<(&'static str, u32)> {
    let mut emissions: Vec<(&'static str, u32)> = EMISSIONS
        .iter()
        .filter(|(_, s, _)| *s == subtype)
        .map(|(name, _, units)| (*name, *units))
        .collect();
    emissions.push((UNIT_EMISSION, 1));
    emissions
}

/// Parses "40.50" into hundredths (4050).
fn parse_rate(rate: &str) -> Result<i64, String> {
    let (whole, frac) = rate.trim().split_once('.').unwrap_or((rate.trim(), "0"));
    let whole: i64 = whole.parse().map_err(|_| format!("invalid rate: {rate}"))?;
    let frac: i64 = format!("{frac:0<2}")
        .get(..2)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| format!("invalid rate: {rate}"))?;

    if whole < 0 || (whole == 0 && frac == 0) {
        return Err(format!("rate must be positive: {rate}"));
    }
    Ok(whole * 100 + frac)
}
