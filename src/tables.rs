//! Weapon table detection and row parsing
//!
//! A weapon table starts at a header row naming most of the profile columns
//! (`Rng Atk Hit Wnd Rnd Dmg` or their long forms) and runs until a row no
//! longer reads as a weapon profile.

use crate::records::WeaponType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Column header alternatives, one entry per profile column
static HEADER_COLUMNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:range|rng)\b",
        r"(?i)\b(?:attacks|atk)\b",
        r"(?i)\b(?:to hit|hit)\b",
        r"(?i)\b(?:to wound|wound|wnd)\b",
        r"(?i)\b(?:rend|rnd)\b",
        r"(?i)\b(?:damage|dmg)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RANGE_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:range|rng)\b").unwrap());
static RANGED_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:ranged|shooting|missile)\b").unwrap());
static MELEE_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bmelee\b").unwrap());

const DICE: &str = r"\d*[dD]\d+(?:\s?\+\s?\d+)?|\d+";

static RANGED_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^(?P<name>.+?)\s+(?P<range>\d{{1,2}})\s*(?:"|”|″|'')\s+(?P<attacks>{DICE})\s+(?P<hit>\d)\+\s+(?P<wound>\d)\+\s+(?P<rend>[-–—]|-?\d)\s+(?P<damage>{DICE})(?:\s+(?P<abilities>.+))?$"#
    ))
    .unwrap()
});

static MELEE_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^(?P<name>.+?)\s+(?P<attacks>{DICE})\s+(?P<hit>\d)\+\s+(?P<wound>\d)\+\s+(?P<rend>[-–—]|-?\d)\s+(?P<damage>{DICE})(?:\s+(?P<abilities>.+))?$"#
    ))
    .unwrap()
});

/// A weapon profile read from one table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponRow {
    pub name: String,
    pub range: Option<u8>,
    pub attacks: String,
    pub to_hit: u8,
    pub to_wound: u8,
    pub rend: u8,
    pub damage: String,
    pub abilities: Option<String>,
}

/// A detected weapon table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponTable {
    pub weapon_type: WeaponType,
    /// Index of the header row within the page rows
    pub header_row: usize,
    /// Index one past the last row belonging to the table
    pub end_row: usize,
    pub weapons: Vec<WeaponRow>,
}

/// Number of profile columns named by a row
fn header_column_count(row: &str) -> usize {
    HEADER_COLUMNS.iter().filter(|re| re.is_match(row)).count()
}

/// Words allowed on a header row besides the column names
const HEADER_WORDS: &[&str] = &[
    "range", "rng", "attacks", "atk", "to", "hit", "wound", "wnd", "rend", "rnd", "damage",
    "dmg", "ability", "abilities", "ranged", "melee", "weapons", "weapon",
];

/// Share of tokens on the row that are header words
fn header_word_ratio(row: &str) -> f32 {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let header_words = tokens
        .iter()
        .filter(|t| {
            let word = t.trim_matches(|c: char| !c.is_alphanumeric());
            HEADER_WORDS.iter().any(|h| h.eq_ignore_ascii_case(word))
        })
        .count();
    header_words as f32 / tokens.len() as f32
}

/// A header names at least four profile columns and reads as a header, not
/// a sentence: no sentence punctuation and mostly header words
pub fn is_header_row(row: &str) -> bool {
    header_column_count(row) >= 4
        && !row.contains(['.', ',', ';', ':'])
        && header_word_ratio(row) >= 0.75
}

/// Weapon type from markers on the header row or the row above it, else
/// from whether the header has a range column
fn table_weapon_type(header: &str, previous: Option<&str>) -> WeaponType {
    for text in std::iter::once(header).chain(previous) {
        if RANGED_MARKER_RE.is_match(text) {
            return WeaponType::Ranged;
        }
        if MELEE_MARKER_RE.is_match(text) {
            return WeaponType::Melee;
        }
    }
    if RANGE_HEADER_RE.is_match(header) {
        WeaponType::Ranged
    } else {
        WeaponType::Melee
    }
}

fn normalize_dice(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn parse_rend(s: &str) -> u8 {
    s.trim_start_matches('-').parse().unwrap_or(0)
}

/// Parse one row as a weapon profile of the given type
pub fn parse_weapon_row(row: &str, weapon_type: WeaponType) -> Option<WeaponRow> {
    let re = match weapon_type {
        WeaponType::Ranged => &*RANGED_ROW_RE,
        WeaponType::Melee => &*MELEE_ROW_RE,
    };
    let caps = re.captures(row.trim())?;
    let field = |name: &str| caps.name(name).map(|m| m.as_str().trim());

    let abilities = field("abilities")
        .filter(|a| !matches!(*a, "-" | "–" | "—"))
        .map(str::to_string);

    Some(WeaponRow {
        name: field("name")?.to_string(),
        range: field("range").and_then(|r| r.parse().ok()),
        attacks: normalize_dice(field("attacks")?),
        to_hit: field("hit")?.parse().ok()?,
        to_wound: field("wound")?.parse().ok()?,
        rend: parse_rend(field("rend")?),
        damage: normalize_dice(field("damage")?),
        abilities,
    })
}

/// Detect every weapon table in the page rows
pub fn detect_weapon_tables(rows: &[String]) -> Vec<WeaponTable> {
    let mut tables = Vec::new();
    let mut i = 0;

    while i < rows.len() {
        if !is_header_row(&rows[i]) {
            i += 1;
            continue;
        }

        let previous = i.checked_sub(1).map(|p| rows[p].as_str());
        let weapon_type = table_weapon_type(&rows[i], previous);
        let header_row = i;
        let mut weapons: Vec<WeaponRow> = Vec::new();
        i += 1;

        while i < rows.len() && !is_header_row(&rows[i]) {
            if let Some(weapon) = parse_weapon_row(&rows[i], weapon_type) {
                weapons.push(weapon);
            } else if let Some(last) = weapons
                .last_mut()
                .filter(|w| w.abilities.as_deref().is_some_and(|a| a.ends_with(',')))
            {
                // Wrapped ability list
                if let Some(abilities) = last.abilities.as_mut() {
                    abilities.push(' ');
                    abilities.push_str(rows[i].trim());
                }
            } else {
                break;
            }
            i += 1;
        }

        log::debug!(
            "{} weapon table at row {}: {} profiles",
            weapon_type,
            header_row,
            weapons.len()
        );

        tables.push(WeaponTable {
            weapon_type,
            header_row,
            end_row: i,
            weapons,
        });
    }

    tables
}
