//! # Clone Command Implementation
//!
//! This module implements the `clone` subcommand: it loads a store snapshot,
//! clones a template into a subject entity and writes the resulting snapshot.
//!
//! ## Functionality
//!
//! - **Snapshot Store**: The store is a JSON snapshot held in memory for the
//!   duration of the run.
//! - **Clone and Commit**: Runs one clone session for the subject, then
//!   commits every staged write.
//! - **Summary**: Prints the clones created and the writes issued.
//!
//! Without `--output` the resulting snapshot is discarded, which makes the
//! command a dry run.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use template_clone::output::{emoji, entity, OutputConfig};
use template_clone::session::{CloneOutcome, CloneSession};
use template_clone::store::memory::Snapshot;
use template_clone::store::MemoryStore;
use template_clone::value::{EntityId, EntityKey};

use super::{load_catalog, load_config};

/// Clone a template into a subject entity
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Path to the type catalog YAML file.
    #[arg(long, value_name = "FILE", env = "TEMPLATE_CLONE_CATALOG")]
    pub catalog: PathBuf,

    /// Path to the store snapshot JSON file.
    #[arg(long, value_name = "FILE")]
    pub store: PathBuf,

    /// Type of the subject entity.
    #[arg(long = "type", value_name = "TYPE")]
    pub type_name: String,

    /// Id of the subject entity.
    #[arg(long, value_name = "ID")]
    pub subject: String,

    /// Id of the template. Defaults to the subject's own template link.
    #[arg(long, value_name = "ID")]
    pub template: Option<String>,

    /// Path to a clone configuration YAML file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where to write the resulting snapshot.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the `clone` command.
pub fn execute(args: CloneArgs, out: &OutputConfig) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let catalog = Arc::new(load_catalog(&args.catalog, &config)?);

    let snapshot = Snapshot::from_file(&args.store).map_err(|e| {
        anyhow::anyhow!("Failed to load store from {}: {}", args.store.display(), e)
    })?;
    let store = Arc::new(MemoryStore::from_snapshot(snapshot).with_catalog(&catalog));

    let subject = EntityKey::new(args.type_name.clone(), args.subject.clone());
    println!(
        "{} Cloning into {}",
        emoji(out, "🧬", "[CLONE]"),
        entity(out, &subject)
    );

    let session = CloneSession::new(catalog, store.clone(), config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime
        .block_on(session.clone_subject(&subject, args.template.map(EntityId::from)))
        .map_err(|e| anyhow::anyhow!("Clone failed: {}", e))?;

    print_summary(&session, &outcome, out)?;

    match &args.output {
        Some(path) => {
            let json = store.snapshot()?.to_json()?;
            std::fs::write(path, json)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
            println!(
                "{} Wrote snapshot to {}",
                emoji(out, "💾", "[SAVE]"),
                path.display()
            );
        }
        None => {
            println!(
                "{} No --output given, snapshot not saved",
                emoji(out, "ℹ️", "[INFO]")
            );
        }
    }

    Ok(())
}

fn print_summary(session: &CloneSession, outcome: &CloneOutcome, out: &OutputConfig) -> Result<()> {
    println!(
        "{} Cloned {} into {}",
        emoji(out, "✅", "[OK]"),
        entity(out, &outcome.template),
        entity(out, &outcome.subject)
    );

    let pairs = session.clone_pairs()?;
    if !pairs.is_empty() {
        println!("\n{} Clones:", emoji(out, "📋", "[INFO]"));
        for (template, clone) in pairs {
            println!("   {} → {}", template, entity(out, &clone));
        }
    }

    let report = outcome.report;
    println!("\n{} Writes:", emoji(out, "📊", "[INFO]"));
    println!("   Entities updated: {}", report.updates);
    println!("   Collection members added: {}", report.members_added);
    println!("   Files copied: {}", report.files_copied);
    Ok(())
}
