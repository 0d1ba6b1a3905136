//! Output records produced by a parse run

use std::fmt;

/// One row of the unit statistics table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRecord {
    pub faction: String,
    pub name: String,
    pub health: Option<u8>,
    /// Move in inches
    pub move_inches: Option<u8>,
    /// Save target (`3+` is 3)
    pub save: Option<u8>,
    pub control: Option<u8>,
    /// Model count, only known after joining the manual size table
    pub unit_size: Option<u32>,
    /// Source document the unit was parsed from
    pub source: String,
    /// Page number (1-indexed)
    pub page: u32,
}

impl UnitRecord {
    /// All four stats were parsed
    pub fn is_complete(&self) -> bool {
        self.health.is_some()
            && self.move_inches.is_some()
            && self.save.is_some()
            && self.control.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeaponType {
    Ranged,
    Melee,
}

impl fmt::Display for WeaponType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeaponType::Ranged => write!(f, "Ranged"),
            WeaponType::Melee => write!(f, "Melee"),
        }
    }
}

/// One row of the weapon statistics table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponRecord {
    /// Name of the owning unit
    pub unit: String,
    pub name: String,
    pub weapon_type: WeaponType,
    /// Range in inches; melee weapons have none
    pub range: Option<u8>,
    /// Dice expression such as `3`, `D6` or `2D3+1`
    pub attacks: String,
    pub to_hit: u8,
    pub to_wound: u8,
    /// `-` is 0
    pub rend: u8,
    /// Dice expression
    pub damage: String,
    /// Weapon abilities; none when printed as `-`
    pub abilities: Option<String>,
    /// Page the profile was read from
    pub page: u32,
}

/// One row of the unit abilities table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityRecord {
    pub faction: String,
    pub unit: String,
    pub name: String,
    /// Phase or trigger line, e.g. `Passive` or `Your Hero Phase`
    pub timing: String,
    pub text: String,
    /// Page the ability was read from
    pub page: u32,
}

/// Field a gap refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GapField {
    Page,
    Faction,
    UnitName,
    StatBlock,
    Health,
    Move,
    Save,
    Control,
    WeaponTable,
    UnitSize,
    DuplicateUnit,
}

impl fmt::Display for GapField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GapField::Page => "page",
            GapField::Faction => "faction",
            GapField::UnitName => "unit name",
            GapField::StatBlock => "stat block",
            GapField::Health => "health",
            GapField::Move => "move",
            GapField::Save => "save",
            GapField::Control => "control",
            GapField::WeaponTable => "weapon table",
            GapField::UnitSize => "unit size",
            GapField::DuplicateUnit => "duplicate unit",
        };
        f.write_str(s)
    }
}

/// A missing or unparsable value, kept for manual review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionGap {
    pub source: String,
    pub page: Option<u32>,
    pub unit: Option<String>,
    pub field: GapField,
    pub detail: String,
}

impl ExtractionGap {
    pub fn new(source: &str, page: Option<u32>, field: GapField, detail: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            page,
            unit: None,
            field,
            detail: detail.into(),
        }
    }

    pub fn for_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }
}

impl fmt::Display for ExtractionGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(page) = self.page {
            write!(f, " p{}", page)?;
        }
        if let Some(unit) = &self.unit {
            write!(f, " [{}]", unit)?;
        }
        write!(f, ": {}: {}", self.field, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_display() {
        let gap = ExtractionGap::new("sylvaneth.pdf", Some(7), GapField::Save, "no save value")
            .for_unit("KURNOTH HUNTERS");
        assert_eq!(
            gap.to_string(),
            "sylvaneth.pdf p7 [KURNOTH HUNTERS]: save: no save value"
        );
    }

    #[test]
    fn test_unit_record_complete() {
        let mut unit = UnitRecord {
            faction: "SYLVANETH".into(),
            name: "DRYADS".into(),
            health: Some(1),
            move_inches: Some(6),
            save: Some(5),
            control: Some(1),
            unit_size: None,
            source: "sylvaneth.pdf".into(),
            page: 9,
        };
        assert!(unit.is_complete());
        unit.control = None;
        assert!(!unit.is_complete());
    }
}
