//! CLI for extracting warscroll statistics from faction-pack PDFs

use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use warscroll_stats::{
    collect_inputs, export_tables, run, ExportOptions, ExtractConfig, OutputFormat, UnitSizeTable,
};

#[derive(Debug, Parser)]
#[command(
    name = "warscroll-stats",
    version,
    about = "Extract unit, weapon and ability tables from faction-pack PDFs"
)]
struct Args {
    /// PDF files or directories containing PDFs
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the tables are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Output format: csv or tsv
    #[arg(long, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// CSV/TSV file with Faction, Unit and Unit size columns
    #[arg(long)]
    unit_sizes: Option<PathBuf>,

    /// Process documents in parallel
    #[arg(long)]
    parallel: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let paths = match collect_inputs(&args.inputs) {
        Ok(paths) if !paths.is_empty() => paths,
        Ok(_) => {
            eprintln!("No PDF files found");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error reading inputs: {}", e);
            process::exit(1);
        }
    };

    let unit_sizes = match &args.unit_sizes {
        Some(path) => match UnitSizeTable::from_path(path) {
            Ok(table) => Some(table),
            Err(e) => {
                eprintln!("Error loading unit sizes from {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => None,
    };

    let config = ExtractConfig {
        parallel: args.parallel,
        unit_sizes,
        ..ExtractConfig::default()
    };

    let start = Instant::now();
    let tables = run(&paths, &config);

    println!("Warscroll Extraction");
    println!("====================");
    for doc in &tables.documents {
        match &doc.error {
            Some(error) => println!("{}: FAILED ({})", doc.source, error),
            None => println!(
                "{}: {} [{} pages: {} unit, {} faction traits, {} deleted] {} units, {} weapons, {} abilities",
                doc.source,
                doc.faction.as_deref().unwrap_or("Unknown"),
                doc.pages,
                doc.unit_pages,
                doc.faction_trait_pages,
                doc.deleted_pages,
                doc.units,
                doc.weapons,
                doc.abilities
            ),
        }
    }
    println!();
    println!(
        "Total: {} units, {} weapons, {} abilities, {} gaps ({}ms)",
        tables.units.len(),
        tables.weapons.len(),
        tables.abilities.len(),
        tables.gaps.len(),
        start.elapsed().as_millis()
    );

    let options = ExportOptions {
        format: args.format,
        output_dir: args.output_dir,
    };
    if let Err(e) = export_tables(&tables, &options) {
        eprintln!("Error writing tables: {}", e);
        process::exit(1);
    }

    if tables.documents.iter().all(|d| d.error.is_some()) {
        process::exit(1);
    }
}
