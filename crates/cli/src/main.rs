use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use cli::config::{
    EngineConfig, DEFAULT_COMPRESSION_LEVEL, DEFAULT_LOG_DIRECTIVES, DEFAULT_ORDER,
    DEFAULT_SNAPSHOT_PATH,
};
use cli::engine::Engine;
use record::Identifier;
use snapshot::CitizenView;

#[derive(Parser)]
#[command(name = "civic", about = "Disk-backed citizen index")]
struct Args {
    /// B-tree minimum degree; must match the order the snapshot was written with
    #[arg(long, global = true, default_value_t = DEFAULT_ORDER)]
    order: usize,

    /// zstd level used when saving
    #[arg(long, global = true, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    level: i32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load zstd-compressed CSV lines into the snapshot (created if missing)
    Ingest {
        /// Compressed CSV input
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = DEFAULT_SNAPSHOT_PATH)]
        snapshot: PathBuf,
    },
    /// Look up one citizen by identifier
    Search {
        #[arg(long, default_value = DEFAULT_SNAPSHOT_PATH)]
        snapshot: PathBuf,
        /// 8-character identifier
        id: String,
    },
    /// Validate a snapshot and print its size and shape
    Stats {
        #[arg(long, default_value = DEFAULT_SNAPSHOT_PATH)]
        snapshot: PathBuf,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let engine = Engine::new(EngineConfig {
        order: args.order,
        compression_level: args.level,
    })?;

    match args.command {
        Command::Ingest { input, snapshot } => ingest(&engine, &input, &snapshot),
        Command::Search { snapshot, id } => search(&engine, &snapshot, &id),
        Command::Stats { snapshot } => stats(&engine, &snapshot),
    }
}

fn ingest(engine: &Engine, input: &Path, snapshot: &Path) -> Result<()> {
    if snapshot.exists() {
        engine.deserialize_from_file(snapshot)?;
    }
    let stats = engine.ingest_compressed_csv(input)?;
    let bytes = engine.serialize_to_file(snapshot)?;
    println!(
        "OK: inserted {}, skipped {}, {} records in {} ({} bytes)",
        stats.inserted,
        stats.skipped,
        engine.len(),
        snapshot.display(),
        bytes
    );
    Ok(())
}

fn search(engine: &Engine, snapshot: &Path, id: &str) -> Result<()> {
    let id: Identifier = id
        .parse()
        .with_context(|| format!("invalid identifier {:?}", id))?;
    engine.deserialize_from_file(snapshot)?;
    match engine.search_resolved(&id)? {
        Some(view) => print_citizen(&view),
        None => println!("{}: not found", id),
    }
    Ok(())
}

fn stats(engine: &Engine, snapshot: &Path) -> Result<()> {
    engine.deserialize_from_file(snapshot)?;
    engine.check().context("snapshot failed validation")?;
    let s = engine.stats();
    println!("records: {}", s.records);
    println!("strings: {}", s.strings);
    println!("height:  {}", s.height);
    println!("nodes:   {}", s.nodes);
    Ok(())
}

fn print_citizen(c: &CitizenView) {
    println!("id:             {}", c.id);
    println!("given names:    {}", c.given_names);
    println!("family names:   {}", c.family_names);
    println!("birthplace:     {}", c.birthplace);
    println!(
        "address:        {}, {}, {}, {}, {}",
        c.address.location, c.address.district, c.address.city, c.address.subregion, c.address.region
    );
    println!("phone:          {}", c.phone);
    println!("email:          {}", c.email);
    println!("country:        {}", c.country);
    println!("sex:            {:?}", c.sex);
    println!("marital status: {:?}", c.marital_status);
}
