//! Simulate a fight between two units extracted from faction-pack PDFs

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process;
use warscroll_stats::{
    collect_inputs, run, simulate, Combatant, ExtractConfig, SimulationOptions, Tables,
    UnitSizeTable,
};

#[derive(Debug, Parser)]
#[command(
    name = "combat_sim",
    version,
    about = "Monte Carlo combat between two extracted units"
)]
struct Args {
    /// PDF files or directories containing PDFs
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// CSV/TSV file with Faction, Unit and Unit size columns
    #[arg(long)]
    unit_sizes: PathBuf,

    /// Unit that strikes first
    #[arg(long)]
    attacker: String,

    /// Unit that strikes back
    #[arg(long)]
    defender: String,

    #[arg(long, default_value_t = 10_000)]
    iterations: u32,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Chance that the defender strikes first
    #[arg(long, default_value_t = 0.0)]
    inversion: f64,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    attacker_hit_mod: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    attacker_wound_mod: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    defender_hit_mod: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    defender_wound_mod: i32,

    /// Attacker ward value (5 for 5+)
    #[arg(long)]
    attacker_ward: Option<i32>,

    /// Defender ward value (5 for 5+)
    #[arg(long)]
    defender_ward: Option<i32>,
}

fn combatant(tables: &Tables, name: &str, ward: Option<i32>) -> Combatant {
    let Some(unit) = tables
        .units
        .iter()
        .find(|u| u.name.eq_ignore_ascii_case(name.trim()))
    else {
        eprintln!("Unit not found: {}", name);
        process::exit(1);
    };
    match Combatant::from_records(unit, &tables.weapons) {
        Ok(mut combatant) => {
            combatant.ward = ward;
            combatant
        }
        Err(e) => {
            eprintln!("Cannot simulate {}: {}", unit.name, e);
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
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

    let unit_sizes = match UnitSizeTable::from_path(&args.unit_sizes) {
        Ok(table) => table,
        Err(e) => {
            eprintln!(
                "Error loading unit sizes from {}: {}",
                args.unit_sizes.display(),
                e
            );
            process::exit(1);
        }
    };

    let config = ExtractConfig {
        unit_sizes: Some(unit_sizes),
        ..ExtractConfig::default()
    };
    let tables = run(&paths, &config);

    let attacker = combatant(&tables, &args.attacker, args.attacker_ward);
    let defender = combatant(&tables, &args.defender, args.defender_ward);

    let options = SimulationOptions {
        iterations: args.iterations,
        order_inversion_probability: args.inversion,
        attacker_hit_modifier: args.attacker_hit_mod,
        attacker_wound_modifier: args.attacker_wound_mod,
        defender_hit_modifier: args.defender_hit_mod,
        defender_wound_modifier: args.defender_wound_mod,
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let result = simulate(&attacker, &defender, &options, &mut rng);

    println!("Combat Simulation");
    println!("=================");
    println!(
        "{} ({} models, {} wounds) vs {} ({} models, {} wounds)",
        attacker.name,
        attacker.models,
        attacker.total_wounds(),
        defender.name,
        defender.models,
        defender.total_wounds()
    );
    println!(
        "{} fights, {} with the defender striking first",
        result.iterations, result.inverted_fights
    );
    println!(
        "Average wounds remaining: {} {:.2}, {} {:.2}",
        attacker.name,
        result.attacker_wounds_remaining,
        defender.name,
        result.defender_wounds_remaining
    );
}
