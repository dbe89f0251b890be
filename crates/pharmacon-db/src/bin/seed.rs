//! # Seed Data Generator
//!
//! Populates an empty database with an admin account and a small pharmacy
//! catalogue for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./pharmacon_dev.db with admin/admin
//! cargo run -p pharmacon-db --bin seed
//!
//! # Specify database path and admin password
//! cargo run -p pharmacon-db --bin seed -- --db ./data/pharmacon.db --password s3cret
//! ```
//!
//! ## Generated Data
//! - User `admin` (admin flag set)
//! - Units: tablet, strip, box, bottle, ml
//! - Medicines with opening stock in tablets/bottles and strip/box conversions
//! - A walk-in customer, one supplier and the company profile

use anyhow::Context;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use pharmacon_core::{CompanyProfileDraft, SupplierDraft};
use pharmacon_db::{Database, DbConfig};
use std::env;

/// (barcode, name, base unit, opening qty, [(unit, factor)])
const MEDICINES: &[(&str, &str, &str, f64, &[(&str, f64)])] = &[
    ("8992112010011", "Paracetamol 500 mg", "tablet", 1_000.0, &[("strip", 10.0), ("box", 100.0)]),
    ("8992112010028", "Amoxicillin 500 mg", "tablet", 500.0, &[("strip", 10.0), ("box", 100.0)]),
    ("8992112010035", "Ibuprofen 400 mg", "tablet", 300.0, &[("strip", 10.0)]),
    ("8992112010042", "Cetirizine 10 mg", "tablet", 200.0, &[("strip", 10.0)]),
    ("8992112010059", "Omeprazole 20 mg", "tablet", 140.0, &[("strip", 14.0)]),
    ("8992112010066", "OBH Syrup 100 ml", "bottle", 48.0, &[("box", 12.0)]),
    ("8992112010073", "Saline 0.9% 500 ml", "bottle", 24.0, &[]),
    ("8992112010080", "Puyer Batuk Anak", "tablet", 0.0, &[]),
];

const UNITS: &[&str] = &["tablet", "strip", "box", "bottle", "ml"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./pharmacon_dev.db");
    let mut password = String::from("admin");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pharmacon POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>         Database file path (default: ./pharmacon_dev.db)");
                println!("  -p, --password <PASS>   Password for the admin user (default: admin)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Pharmacon POS Seed Data Generator");
    println!("====================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .context("opening database")?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.users().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} users", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hashing admin password: {e}"))?
        .to_string();
    let admin = db.users().insert("admin", &hash, true, "").await?;
    println!("✓ Created user 'admin'");

    for unit in UNITS {
        db.units().get_or_create(unit).await?;
    }
    println!("✓ Created {} units", UNITS.len());

    for (barcode, name, base_unit, qty, conversions) in MEDICINES {
        let base = db.units().get_or_create(base_unit).await?;
        let medicine = db
            .medicines()
            .insert(barcode, name, *qty, base.id, Some(admin.id))
            .await
            .with_context(|| format!("inserting {name}"))?;

        for (unit, factor) in conversions.iter() {
            let unit = db.units().get_or_create(unit).await?;
            db.medicines().set_conversion(medicine.id, unit.id, *factor).await?;
        }
    }
    println!("✓ Created {} medicines", MEDICINES.len());

    db.customers().insert("Walk-in").await?;
    db.suppliers()
        .insert(
            &SupplierDraft {
                name: "PT Enseval Putera".to_string(),
                address: "Jl. Pulo Lentut 10, Jakarta".to_string(),
                company_phone_number: "021-4600000".to_string(),
                contact_person_name: "Sari".to_string(),
                contact_person_number: "0812000000".to_string(),
                terms: "NET 30".to_string(),
                vendor_is_taxable: true,
            },
            admin.id,
        )
        .await?;
    db.company_profile()
        .upsert(
            &CompanyProfileDraft {
                name: "Apotek Pharmacon".to_string(),
                address: "Jl. Sehat 1".to_string(),
                business_number: "SIA-0001".to_string(),
                pharmacist: "apt. Rina".to_string(),
                pharmacist_license_number: "SIPA-0001".to_string(),
            },
            admin.id,
        )
        .await?;
    println!("✓ Created customer, supplier and company profile");

    println!();
    let found = db.medicines().search("500", 10).await?;
    println!("  Search '500': {} results", found.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
