use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invader_tracker::{
    catalog_count, category_counts, fetch_and_locate, load_catalog, load_catalog_csv,
    load_located_csv, load_names, read_name_slots, recent_runs, record_run, repair_names,
    save_catalog, setup_database, to_flash, write_located_csv, write_reconciled_csv, Config,
    DiagnosticReport, RunRecord,
};

const USAGE: &str = "Usage: invader-tracker [--config <file>] <command>

Commands:
  locate                    Fuse the catalog with the location feeds
  to-flash <found files...> List invaders not flashed yet
  repair <names file>       Rewrite names to their canonical form
  runs                      Show recent runs";

/// Parsed command line: `--config` may appear anywhere
struct Args {
    config: Option<PathBuf>,
    command: Option<String>,
    rest: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut config = None;
    let mut positional = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args.next().context("Missing value for --config")?;
                config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    Ok(Args {
        config,
        command: positional.next(),
        rest: positional.collect(),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invader_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = parse_args()?;
    let config = Config::resolve(args.config.as_deref())?;

    match args.command.as_deref() {
        Some("locate") => run_locate(&config),
        Some("to-flash") => run_to_flash(&config, &args.rest),
        Some("repair") => run_repair(&args.rest),
        Some("runs") => run_list_runs(&config),
        Some(other) => bail!("Unknown command: {}\n\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    }
}

fn open_store(config: &Config) -> Result<Connection> {
    let db_path = config.database_path();
    ensure_parent(&db_path)?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn print_report(report: &DiagnosticReport) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{}", report.summary());
    if !report.unresolved.is_empty() {
        println!("⚠️  Unresolved catalog names: {}", report.unresolved.join(", "));
    }
    if !report.not_found.is_empty() {
        println!("⚠️  Not found: {}", report.not_found.join(", "));
    }
    if report.missing_locations() > 0 {
        println!("\n{}", report.render_table());
    }
}

fn run_locate(config: &Config) -> Result<()> {
    println!("🗺️  Locating invaders");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load scraper dump
    let catalog_path = config.catalog_path();
    println!("\n📂 Loading {}...", catalog_path.display());
    let records = load_catalog_csv(&catalog_path)?;
    println!("✓ Loaded {} records", records.len());

    // 2. Fetch feeds and fuse, any fetch failure aborts here
    println!("\n🌍 Fetching {} location feeds...", config.feeds.len());
    let providers = config.providers()?;
    let (catalog, report) = fetch_and_locate(&records, &providers)?;
    println!("✓ Located {} / {} invaders", catalog.located_count(), catalog.len());

    // 3. Write outputs
    let located_path = config.located_path();
    ensure_parent(&located_path)?;
    write_located_csv(&located_path, &catalog)?;
    println!("✓ Wrote {}", located_path.display());

    let mut conn = open_store(config)?;
    save_catalog(&mut conn, &catalog)?;
    record_run(&conn, &RunRecord::new("locate", &report)?)?;
    println!("✓ Snapshot saved to {}", config.database_path().display());

    print_report(&report);
    Ok(())
}

fn run_to_flash(config: &Config, found_files: &[String]) -> Result<()> {
    println!("🎯 Invaders left to flash");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let located_path = config.located_path();
    let catalog = if located_path.exists() {
        let catalog = load_located_csv(&located_path)?;
        println!("\n✓ Loaded {} invaders", catalog.len());
        catalog
    } else {
        // Fall back to the last snapshot saved by `locate`
        let conn = open_store(config)?;
        if catalog_count(&conn)? == 0 {
            eprintln!("❌ Located catalog not found: {}", located_path.display());
            eprintln!("   Run: invader-tracker locate");
            std::process::exit(1);
        }
        let catalog = load_catalog(&conn)?;
        println!(
            "\n⚠️  {} missing, using snapshot from {}",
            located_path.display(),
            config.database_path().display()
        );
        println!("✓ Loaded {} invaders", catalog.len());
        catalog
    };

    let mut flashed_names = Vec::new();
    for file in found_files {
        let names = load_names(Path::new(file))?;
        println!("✓ {} names from {}", names.len(), file);
        flashed_names.extend(names);
    }

    let exclusions = match config.exclusion_path() {
        Some(path) if path.exists() => Some(load_names(&path)?),
        Some(path) => {
            tracing::warn!(path = %path.display(), "Exclusion file missing, skipping");
            None
        }
        None => None,
    };

    let (remaining, report) = to_flash(&catalog, &flashed_names, exclusions.as_deref());

    let out_path = config.to_flash_path();
    ensure_parent(&out_path)?;
    write_reconciled_csv(&out_path, &remaining)?;
    println!("✓ Wrote {}", out_path.display());

    for (category, count) in category_counts(&remaining) {
        println!("   {:<10} {}", category, count);
    }

    let conn = open_store(config)?;
    record_run(&conn, &RunRecord::new("to-flash", &report)?)?;

    print_report(&report);
    println!("\n🎉 {} invaders left to flash!", remaining.len());
    Ok(())
}

fn run_repair(rest: &[String]) -> Result<()> {
    let path = rest.first().context("Missing names file\n\nUsage: invader-tracker repair <names file>")?;
    let slots = read_name_slots(Path::new(path))?;

    let repaired = repair_names(&slots);
    for name in &repaired {
        println!("{} -> {}", name.original.as_deref().unwrap_or("<empty>"), name.repaired);
    }

    let unresolved = repaired.iter().filter(|r| r.was_unresolved()).count();
    println!("\n✓ {} names, {} unresolved", repaired.len(), unresolved);
    Ok(())
}

fn run_list_runs(config: &Config) -> Result<()> {
    let conn = open_store(config)?;
    println!("🗄️  Snapshot: {} invaders\n", catalog_count(&conn)?);
    let runs = recent_runs(&conn, 10)?;

    if runs.is_empty() {
        println!("No runs recorded yet");
        return Ok(());
    }

    for run in runs {
        let catalog_size = run.summary["catalog_size"].as_u64().unwrap_or(0);
        let located = run.summary["located"].as_u64().unwrap_or(0);
        println!(
            "{}  {:<9} {} invaders, {} located  ({})",
            run.timestamp.format("%Y-%m-%d %H:%M"),
            run.kind,
            catalog_size,
            located,
            run.run_id
        );
    }
    Ok(())
}
