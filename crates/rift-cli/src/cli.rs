use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rift",
    about = "Rift vault maintenance: rebuild, migrate, verify, inspect",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Engine configuration file.
    #[arg(short, long, global = true, default_value = "rift.toml")]
    pub config: PathBuf,

    /// Override the configured data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Recompute template reference counts from every ledger
    Rebuild(RebuildArgs),
    /// Move legacy slot inventories into ledgers
    Migrate(MigrateArgs),
    /// Check ledgers against the template index without changing anything
    Verify,
    /// Show one owner's ledger
    Inspect(InspectArgs),
    /// List stored templates
    Templates(TemplatesArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct RebuildArgs {
    /// Remove templates no ledger references.
    #[arg(long)]
    pub cleanup: bool,
}

#[derive(Args)]
pub struct MigrateArgs {
    /// Owner UUIDs to migrate.
    #[arg(required = true)]
    pub owners: Vec<String>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Owner UUID.
    pub owner: String,
    /// Show the merged view this owner would see instead of their own ledger.
    #[arg(long)]
    pub merged: bool,
}

#[derive(Args)]
pub struct TemplatesArgs {
    /// Only list templates with no references.
    #[arg(long)]
    pub unreferenced: bool,
}
