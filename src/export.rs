//! Delimited table output
//!
//! Each table goes to its own file in the output directory. Null values are
//! written as empty cells.

use crate::pipeline::Tables;
use crate::records::{AbilityRecord, ExtractionGap, UnitRecord, WeaponRecord};
use crate::TableError;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Tsv,
}

impl OutputFormat {
    pub fn delimiter(&self) -> u8 {
        match self {
            OutputFormat::Csv => b',',
            OutputFormat::Tsv => b'\t',
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            other => Err(TableError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Options for writing the output tables
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: OutputFormat,
    pub output_dir: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            output_dir: PathBuf::from("."),
        }
    }
}

pub const UNIT_COLUMNS: &[&str] = &["Faction", "Unit", "Health", "Move", "Save", "Control"];
pub const UNIT_SIZE_COLUMN: &str = "Unit size";
pub const WEAPON_COLUMNS: &[&str] = &[
    "Unit",
    "Weapon",
    "Type",
    "Range",
    "Attacks",
    "To Hit",
    "To Wound",
    "Rend",
    "Damage",
    "Abilities",
];
pub const ABILITY_COLUMNS: &[&str] = &["Faction", "Unit", "Ability", "Timing", "Text"];
pub const GAP_COLUMNS: &[&str] = &["Document", "Page", "Unit", "Field", "Detail"];

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn unit_row(unit: &UnitRecord, with_size: bool) -> Vec<String> {
    let mut row = vec![
        unit.faction.clone(),
        unit.name.clone(),
        cell(unit.health),
        cell(unit.move_inches),
        cell(unit.save),
        cell(unit.control),
    ];
    if with_size {
        row.push(cell(unit.unit_size));
    }
    row
}

fn weapon_row(weapon: &WeaponRecord) -> Vec<String> {
    vec![
        weapon.unit.clone(),
        weapon.name.clone(),
        weapon.weapon_type.to_string(),
        cell(weapon.range),
        weapon.attacks.clone(),
        weapon.to_hit.to_string(),
        weapon.to_wound.to_string(),
        weapon.rend.to_string(),
        weapon.damage.clone(),
        weapon.abilities.clone().unwrap_or_default(),
    ]
}

fn ability_row(ability: &AbilityRecord) -> Vec<String> {
    vec![
        ability.faction.clone(),
        ability.unit.clone(),
        ability.name.clone(),
        ability.timing.clone(),
        ability.text.clone(),
    ]
}

fn gap_row(gap: &ExtractionGap) -> Vec<String> {
    vec![
        gap.source.clone(),
        cell(gap.page),
        gap.unit.clone().unwrap_or_default(),
        gap.field.to_string(),
        gap.detail.clone(),
    ]
}

/// Write a header and rows to any writer
pub fn write_table<W, I>(
    writer: W,
    format: OutputFormat,
    header: &[&str],
    rows: I,
) -> Result<(), TableError>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_writer(writer);
    csv_writer.write_record(header)?;
    for row in rows {
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_units<W: Write>(
    writer: W,
    format: OutputFormat,
    units: &[UnitRecord],
    with_size: bool,
) -> Result<(), TableError> {
    let mut header = UNIT_COLUMNS.to_vec();
    if with_size {
        header.push(UNIT_SIZE_COLUMN);
    }
    write_table(
        writer,
        format,
        &header,
        units.iter().map(|u| unit_row(u, with_size)),
    )
}

pub fn write_weapons<W: Write>(
    writer: W,
    format: OutputFormat,
    weapons: &[WeaponRecord],
) -> Result<(), TableError> {
    write_table(writer, format, WEAPON_COLUMNS, weapons.iter().map(weapon_row))
}

pub fn write_abilities<W: Write>(
    writer: W,
    format: OutputFormat,
    abilities: &[AbilityRecord],
) -> Result<(), TableError> {
    write_table(writer, format, ABILITY_COLUMNS, abilities.iter().map(ability_row))
}

pub fn write_gaps<W: Write>(
    writer: W,
    format: OutputFormat,
    gaps: &[ExtractionGap],
) -> Result<(), TableError> {
    write_table(writer, format, GAP_COLUMNS, gaps.iter().map(gap_row))
}

fn table_path(dir: &Path, name: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}.{}", name, format.extension()))
}

/// Write all tables; returns the paths written, in order units, weapons,
/// abilities, gaps
pub fn export_tables(tables: &Tables, options: &ExportOptions) -> Result<Vec<PathBuf>, TableError> {
    std::fs::create_dir_all(&options.output_dir)?;
    let format = options.format;
    let dir = options.output_dir.as_path();

    let units_path = table_path(dir, "units", format);
    write_units(
        std::fs::File::create(&units_path)?,
        format,
        &tables.units,
        tables.unit_sizes_joined,
    )?;

    let weapons_path = table_path(dir, "weapons", format);
    write_weapons(std::fs::File::create(&weapons_path)?, format, &tables.weapons)?;

    let abilities_path = table_path(dir, "abilities", format);
    write_abilities(
        std::fs::File::create(&abilities_path)?,
        format,
        &tables.abilities,
    )?;

    let gaps_path = table_path(dir, "gaps", format);
    write_gaps(std::fs::File::create(&gaps_path)?, format, &tables.gaps)?;

    let written = vec![units_path, weapons_path, abilities_path, gaps_path];
    for path in &written {
        log::info!("Wrote {}", path.display());
    }
    Ok(written)
}
