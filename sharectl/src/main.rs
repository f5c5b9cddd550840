//! Sharing permission inventory and reconciliation tool.
//!
//! `list` exports every owned, shared item with its path and role sets to a
//! table; `edit` diffs an edited table against live state and applies the
//! difference as a minimal set of permission changes.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sharectl_core::{
    credentials::CredentialStore,
    drive::{DriveClient, DEFAULT_API_BASE},
    export,
    inventory::InventoryBuilder,
    mutate::{ApplyMode, PermissionMutator},
    provider::CloudProvider,
    reconcile::reconcile,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sharectl")]
#[command(about = "Inventory and reconcile sharing permissions on a cloud drive")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every owned, shared item to a snapshot table
    List {
        /// Credential file
        #[arg(short, long, default_value = "token.json")]
        credentials: PathBuf,

        /// Destination table
        #[arg(short, long, default_value = "output.csv")]
        output: PathBuf,
    },

    /// Apply an edited snapshot table back to the provider
    Edit {
        /// Credential file
        #[arg(short, long, default_value = "token.json")]
        credentials: PathBuf,

        /// Edited table previously produced by `list`
        #[arg(short, long, default_value = "output.csv")]
        input: PathBuf,

        /// Report the planned mutations without applying them
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::List {
            credentials,
            output,
        } => run_list(&credentials, &output),
        Commands::Edit {
            credentials,
            input,
            dry_run,
        } => run_edit(&credentials, &input, dry_run),
    }
}

fn connect(credentials: &Path) -> Result<DriveClient> {
    let store = CredentialStore::new(credentials);
    let creds = store.load().context("loading credentials")?;
    let base = std::env::var("SHARECTL_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    Ok(DriveClient::with_base(creds.access_token, base))
}

fn run_list(credentials: &Path, output: &Path) -> Result<()> {
    let client = connect(credentials)?;
    let owner = client
        .current_user_email()
        .context("fetching account identity")?;
    info!(%owner, "building sharing inventory");

    let inventory = InventoryBuilder::new(&client).build(&owner)?;
    export::write_snapshot(output, &inventory.rows)
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "{} shared items written to {}",
        inventory.rows.len(),
        output.display()
    );
    if inventory.skipped > 0 {
        println!("{} items could not be inventoried (see log)", inventory.skipped);
    }
    Ok(())
}

fn run_edit(credentials: &Path, input: &Path, dry_run: bool) -> Result<()> {
    let client = connect(credentials)?;
    let owner = client
        .current_user_email()
        .context("fetching account identity")?;

    let import =
        export::read_snapshot(input).with_context(|| format!("reading {}", input.display()))?;
    for issue in &import.skipped {
        warn!(line = issue.line, reason = %issue.reason, "table row skipped");
    }
    if !import.skipped.is_empty() {
        println!("{} table rows skipped (see log)", import.skipped.len());
    }

    info!(%owner, "building live snapshot");
    let live = InventoryBuilder::new(&client).build(&owner)?;
    let plan = reconcile(&import.rows, &live.rows);

    for warning in &plan.warnings {
        println!("warning: {warning}");
    }
    if plan.ops.is_empty() {
        println!("nothing to change");
        return Ok(());
    }

    let mode = if dry_run {
        ApplyMode::DryRun
    } else {
        ApplyMode::Commit
    };
    let report = PermissionMutator::new(&client, mode).apply_batch(&plan.ops);

    if dry_run {
        for op in &plan.ops {
            println!("would apply: {op}");
        }
        println!("dry run: {} operations planned", plan.ops.len());
        return Ok(());
    }

    println!(
        "{} applied, {} already satisfied, {} failed",
        report.applied,
        report.already_satisfied,
        report.failed.len()
    );
    for failure in &report.failed {
        println!("failed: {failure}");
    }
    if !report.failed.is_empty() {
        bail!("{} of {} operations failed", report.failed.len(), plan.ops.len());
    }
    Ok(())
}
