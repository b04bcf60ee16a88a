use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use voyant_hub::importer::{inspect_csv, locale_target};

/// Show how a Voyant CSV's columns would be imported, without touching the database.
#[derive(Parser, Debug)]
#[command(name = "validate-csv", version, about = "Validate a Voyant CSV header")]
struct Cli {
    /// Path to the Voyant CSV file
    path: PathBuf,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let map = inspect_csv(&args.path)
        .with_context(|| format!("Failed to inspect {}", args.path.display()))?;

    println!("required columns:");
    println!("- Location: column {}", map.location + 1);
    println!("- ID: column {}", map.id + 1);
    println!("- en: column {}", map.en + 1);
    println!("- est: column {}", map.est + 1);

    let mut invalid = Vec::new();
    println!("locale columns ({}):", map.locales.len());
    for column in &map.locales {
        match locale_target(&column.legacy_code) {
            Ok(target) => println!(
                "- {:?} -> {} ({}, bcp47 {}{})",
                column.header,
                target.code,
                target.name,
                target.bcp47,
                if target.is_rtl { ", rtl" } else { "" }
            ),
            Err(e) => {
                println!("- {:?} -> invalid: {e}", column.header);
                invalid.push(column.header.clone());
            }
        }
    }

    if invalid.is_empty() {
        println!("valid");
        Ok(())
    } else {
        eprintln!("invalid locale columns: {}", invalid.join(", "));
        std::process::exit(1)
    }
}
