use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use tracing::info;

use rift_sdk::{EngineConfig, NullSink, OwnerId, RiftEngine, ViolationKind};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = EngineConfig::load(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir);
    }

    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    info!(data_dir = %config.data_dir.display(), "opening vault");
    let mut engine = RiftEngine::open(config, Arc::new(NullSink))
        .context("opening vault data directory")?;

    let result = match cli.command {
        Command::Rebuild(args) => cmd_rebuild(&mut engine, args),
        Command::Migrate(args) => cmd_migrate(&mut engine, args),
        Command::Verify => cmd_verify(&mut engine),
        Command::Inspect(args) => cmd_inspect(&mut engine, args),
        Command::Templates(args) => cmd_templates(&engine, args),
        Command::Config => Ok(()),
    };

    engine.shutdown().context("flushing vault state")?;
    result
}

fn parse_owner(raw: &str) -> anyhow::Result<OwnerId> {
    raw.parse()
        .with_context(|| format!("invalid owner id {raw:?}"))
}

fn cmd_rebuild(engine: &mut RiftEngine, args: RebuildArgs) -> anyhow::Result<()> {
    let report = engine.rebuild(args.cleanup)?;
    println!("{} Reference counts rebuilt", "✓".green().bold());
    println!("  Owners visited: {}", report.owners_visited.to_string().bold());
    println!("  Templates updated: {}", report.templates_updated.to_string().bold());
    if args.cleanup {
        println!("  Templates removed: {}", report.templates_removed.to_string().bold());
    }
    println!("  Total references: {}", report.total_refs.to_string().cyan());
    if !report.unknown_references.is_empty() {
        println!(
            "  {} {} ledger entries reference unknown templates",
            "!".yellow().bold(),
            report.unknown_references.len()
        );
        for (owner, hash) in &report.unknown_references {
            println!("    {} {}", owner.to_string().dimmed(), hash.short_hex().yellow());
        }
    }
    Ok(())
}

fn cmd_migrate(engine: &mut RiftEngine, args: MigrateArgs) -> anyhow::Result<()> {
    let owners = args
        .owners
        .iter()
        .map(|raw| parse_owner(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut failed = 0usize;
    for owner in owners {
        match engine.migrate_one(owner) {
            Ok(true) => println!("{} {} migrated", "✓".green().bold(), owner),
            Ok(false) => println!("  {} nothing to migrate", owner.to_string().dimmed()),
            Err(e) => {
                failed += 1;
                println!("{} {} {}", "✗".red().bold(), owner, e.to_string().red());
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} migration(s) failed; legacy inventories left untouched");
    }
    Ok(())
}

fn cmd_verify(engine: &mut RiftEngine) -> anyhow::Result<()> {
    let report = engine.verify()?;
    println!(
        "Checked {} owners against {} templates",
        report.owners_checked.to_string().bold(),
        report.templates_checked.to_string().bold()
    );
    if report.is_valid() {
        println!("{} Reference counts match ledgers", "✓".green().bold());
        return Ok(());
    }

    for v in &report.violations {
        let label = match v.kind {
            ViolationKind::UnknownTemplate => "unknown".yellow(),
            ViolationKind::RefCountDrift => "drift".red(),
            ViolationKind::HashMismatch => "mismatch".red(),
        };
        println!("  {label} {} {}", v.template.short_hex().cyan(), v.description);
    }
    anyhow::bail!(
        "{} violation(s) found; run `rift rebuild` to repair reference counts",
        report.violations.len()
    )
}

fn cmd_inspect(engine: &mut RiftEngine, args: InspectArgs) -> anyhow::Result<()> {
    let owner = parse_owner(&args.owner)?;
    let ledger = engine.ledger(owner);
    if ledger.is_empty() {
        println!("{} holds nothing.", owner.to_string().bold());
        return Ok(());
    }

    println!(
        "{}: {} templates, {} units",
        owner.to_string().bold(),
        ledger.len(),
        ledger.total_units().to_string().cyan()
    );
    for entry in ledger.ordered() {
        let name = engine
            .index()
            .find(&entry.template)
            .map(|t| t.sample.to_string())
            .unwrap_or_else(|| "<unknown template>".red().to_string());
        println!(
            "  {} {:>8}  {}",
            entry.template.short_hex().dimmed(),
            entry.count.to_string().bold(),
            name
        );
    }
    Ok(())
}

fn cmd_templates(engine: &RiftEngine, args: TemplatesArgs) -> anyhow::Result<()> {
    let mut shown = 0usize;
    for template in engine.index().iter() {
        if args.unreferenced && template.ref_count > 0 {
            continue;
        }
        shown += 1;
        println!(
            "{} {:>8}  {}  ({})",
            template.hash.short_hex().yellow(),
            template.ref_count.to_string().bold(),
            template.sample,
            template.context.registry.dimmed()
        );
    }
    if shown == 0 {
        println!("No templates.");
    }
    Ok(())
}
