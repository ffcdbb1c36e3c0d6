//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks a type
//! catalog without cloning anything.
//!
//! ## Functionality
//!
//! - **Catalog Validation**: Parses the catalog file, checks that every
//!   relation target, inverse field and link-rule field exists and that every
//!   field kind is one the clone rules handle.
//! - **Auto-Link Pairing**: Resolves the pairing of every read-only
//!   collection. Ambiguous pairings are errors, missing ones are warnings.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use template_clone::catalog::{FieldKind, TypeCatalog};
use template_clone::config::CloneConfig;
use template_clone::output::{emoji, OutputConfig};

use super::load_config;

/// Validate a type catalog
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the type catalog YAML file.
    #[arg(long, value_name = "FILE", env = "TEMPLATE_CLONE_CATALOG")]
    pub catalog: PathBuf,

    /// Path to a clone configuration YAML file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use strict validation (fail on warnings).
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, out: &OutputConfig) -> Result<()> {
    println!(
        "{} Validating catalog: {}",
        emoji(out, "🔍", "[SCAN]"),
        args.catalog.display()
    );

    let config = load_config(args.config.as_deref())?;

    let catalog = match TypeCatalog::from_file(&args.catalog, &config) {
        Ok(catalog) => {
            println!("{} Catalog parsed successfully", emoji(out, "✅", "[OK]"));
            catalog
        }
        Err(e) => {
            println!("{} Catalog parsing failed: {}", emoji(out, "❌", "[ERR]"), e);
            return Err(anyhow::anyhow!("Catalog parsing failed: {}", e));
        }
    };

    print_summary(&catalog, &config, out);

    let mut has_warnings = false;

    println!(
        "\n{} Resolving auto-link pairings...",
        emoji(out, "🔗", "[CHECK]")
    );
    match catalog.validate() {
        Ok(unpaired) if unpaired.is_empty() => {
            println!("{} Every auto-link collection is paired", emoji(out, "✅", "[OK]"));
        }
        Ok(unpaired) => {
            for field in unpaired {
                println!(
                    "{} {} has no link rule pairing; its members will not be cloned",
                    emoji(out, "⚠️", "[WARN]"),
                    field.qualified_name()
                );
            }
            has_warnings = true;
        }
        Err(e) => {
            println!("{} {}", emoji(out, "❌", "[ERR]"), e);
            println!("\n{} Validation Result:", emoji(out, "🎯", "[RESULT]"));
            println!(
                "{} Catalog has errors that must be fixed",
                emoji(out, "❌", "[ERR]")
            );
            return Err(anyhow::anyhow!("Catalog validation failed"));
        }
    }

    println!("\n{} Validation Result:", emoji(out, "🎯", "[RESULT]"));

    if has_warnings && args.strict {
        println!(
            "{} Catalog has warnings (strict mode enabled)",
            emoji(out, "❌", "[ERR]")
        );
        return Err(anyhow::anyhow!("Catalog validation failed in strict mode"));
    }

    if has_warnings {
        println!(
            "{} Catalog is valid but has warnings",
            emoji(out, "⚠️", "[WARN]")
        );
    } else {
        println!("{} Catalog is valid", emoji(out, "✅", "[OK]"));
    }

    Ok(())
}

fn print_summary(catalog: &TypeCatalog, config: &CloneConfig, out: &OutputConfig) {
    let mut fields = 0;
    let mut relations = 0;
    let mut templatable = 0;

    for type_name in catalog.type_names() {
        if catalog.has_field(type_name, &config.template_field) {
            templatable += 1;
        }
        for field in catalog.fields_of(type_name).unwrap_or_default() {
            fields += 1;
            if matches!(field.kind, FieldKind::Relation | FieldKind::Collection) {
                relations += 1;
            }
        }
    }

    println!("\n{} Catalog Summary:", emoji(out, "📊", "[INFO]"));
    println!("   Types: {}", catalog.type_names().count());
    println!("   Fields: {}", fields);
    println!("   Relations and collections: {}", relations);
    println!(
        "   Types with a {} field: {}",
        config.template_field, templatable
    );
}
