//! Manually maintained unit-size lookup
//!
//! Model counts are not printed on warscrolls, so they come from a separate
//! delimited file with `Faction`, `Unit` and `Unit size` columns.

use crate::records::{ExtractionGap, GapField, UnitRecord};
use crate::TableError;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct UnitSizeRow {
    #[serde(rename = "Faction")]
    faction: String,
    #[serde(rename = "Unit", alias = "Unit name")]
    unit: String,
    #[serde(rename = "Unit size", alias = "Models")]
    unit_size: u32,
}

/// Unit sizes keyed by normalized (faction, unit name)
#[derive(Debug, Default, Clone)]
pub struct UnitSizeTable {
    sizes: HashMap<(String, String), u32>,
}

fn normalize_key(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl UnitSizeTable {
    /// Load from a CSV file, or a TSV file when the extension is `.tsv`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => b',',
        };
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, delimiter)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = Self::default();
        for row in csv_reader.deserialize() {
            let row: UnitSizeRow = row?;
            table.insert(&row.faction, &row.unit, row.unit_size);
        }
        log::debug!("Loaded {} unit sizes", table.len());
        Ok(table)
    }

    pub fn insert(&mut self, faction: &str, unit: &str, size: u32) {
        self.sizes
            .insert((normalize_key(faction), normalize_key(unit)), size);
    }

    pub fn get(&self, faction: &str, unit: &str) -> Option<u32> {
        self.sizes
            .get(&(normalize_key(faction), normalize_key(unit)))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Fill `unit_size` on every unit; units without an entry get a gap
    pub fn apply(&self, units: &mut [UnitRecord]) -> Vec<ExtractionGap> {
        let mut gaps = Vec::new();
        for unit in units.iter_mut() {
            unit.unit_size = self.get(&unit.faction, &unit.name);
            if unit.unit_size.is_none() {
                gaps.push(
                    ExtractionGap::new(
                        &unit.source,
                        Some(unit.page),
                        GapField::UnitSize,
                        format!("no entry for {} / {} in unit size table", unit.faction, unit.name),
                    )
                    .for_unit(&unit.name),
                );
            }
        }
        gaps
    }
}
