//! Unit page parsing
//!
//! Turns a page classified as `unit` into a [`UnitRecord`], its weapon
//! profiles and its abilities. Nothing here fails: whatever cannot be read
//! becomes a null field plus an [`ExtractionGap`].

use crate::loader::{Page, TextLine};
use crate::records::{AbilityRecord, ExtractionGap, GapField, UnitRecord, WeaponRecord};
use crate::stats::{parse_stat_block, StatBlock};
use crate::tables::detect_weapon_tables;
use once_cell::sync::Lazy;
use regex::Regex;

static FACTION_PACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z][A-Z \t\-'’]*?)\s*FACTION PACK").unwrap());
static FACTION_PACK_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"FACTION PACK\s*[:\-–]\s*([A-Z][A-Z \t\-'’]*[A-Z])").unwrap());

/// All-caps words following the `• ... WARSCROLL •` banner
static UNIT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    let word = r"[A-Z](?:[A-Z'’\-]*[A-Z])?\b";
    Regex::new(&format!(
        r"(?:•\s*)?[^\n•]*?WARSCROLL\s*•?\s*((?:{word})(?:\s+(?:{word}))*)"
    ))
    .unwrap()
});

/// Uppercase rows that can follow the unit name but are not part of it
const NAME_STOP_WORDS: &[&str] = &[
    "RANGED WEAPONS",
    "MELEE WEAPONS",
    "KEYWORDS",
    "HEALTH",
    "MOVE",
    "SAVE",
    "CONTROL",
];

static TIMING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^
        (?:once\ per\ (?:battle|turn)(?:\ \(army\))?(?:\s*,\s*|\s*$))?
        (?:
            passive
          | reaction:.*
          | deployment\ phase
          | (?:start|end)\ of\ (?:any|your|the|the\ enemy's|the\ first)\ (?:turn|battle\ round)
          | (?:your|enemy|any|opponent's)\ (?:hero\ |movement\ |shooting\ |charge\ |combat\ |end\ of\ turn\ )?phase
          | (?:your|enemy|any)\ turn
        )?
        \s*$",
    )
    .unwrap()
});

static KEYWORDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^keywords\b").unwrap());
static ABILITY_TEXT_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:declare|effect|keywords)\s*:").unwrap());

/// Everything parsed from one unit page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitPage {
    pub unit: Option<UnitRecord>,
    pub weapons: Vec<WeaponRecord>,
    pub abilities: Vec<AbilityRecord>,
    pub gaps: Vec<ExtractionGap>,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Faction name from a faction-pack cover page
pub fn detect_faction(text: &str) -> Option<String> {
    let caps = FACTION_PACK_RE
        .captures(text)
        .or_else(|| FACTION_PACK_PREFIX_RE.captures(text))?;
    let name = collapse_whitespace(caps.get(1)?.as_str());
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Unit name from the warscroll banner
pub fn parse_unit_name(text: &str) -> Option<String> {
    let caps = UNIT_NAME_RE.captures(text)?;
    let mut name = collapse_whitespace(caps.get(1)?.as_str());

    let bytes = name.as_bytes();
    let cut = NAME_STOP_WORDS
        .iter()
        .filter_map(|stop| {
            name.match_indices(stop)
                .find(|(i, _)| {
                    let end = i + stop.len();
                    (*i == 0 || bytes[i - 1] == b' ') && (end == bytes.len() || bytes[end] == b' ')
                })
                .map(|(i, _)| i)
        })
        .min();
    if let Some(cut) = cut {
        name.truncate(cut);
        name = name.trim_end().to_string();
    }

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub fn is_timing_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && TIMING_RE.is_match(line)
}

/// Abilities in reading order: timing line, name line, text up to the next
/// timing line or the keywords row
pub fn parse_abilities(
    lines: &[String],
    faction: &str,
    unit: &str,
    page: u32,
) -> Vec<AbilityRecord> {
    let mut abilities = Vec::new();
    let mut current: Option<(String, Option<String>, Vec<String>)> = None;

    let mut flush = |current: &mut Option<(String, Option<String>, Vec<String>)>| {
        if let Some((timing, name, text)) = current.take() {
            let name = name.unwrap_or_else(|| timing.clone());
            abilities.push(AbilityRecord {
                faction: faction.to_string(),
                unit: unit.to_string(),
                name,
                timing,
                text: text.join(" "),
                page,
            });
        }
    };

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if KEYWORDS_RE.is_match(line) {
            break;
        }
        if is_timing_line(line) {
            flush(&mut current);
            current = Some((line.to_string(), None, Vec::new()));
            continue;
        }
        if let Some((_, name, text)) = current.as_mut() {
            if name.is_none() && text.is_empty() && !ABILITY_TEXT_START_RE.is_match(line) {
                *name = Some(line.to_string());
            } else {
                text.push(line.to_string());
            }
        }
    }
    flush(&mut current);

    abilities
}

fn stat_gaps(page: &Page, unit: &str, stats: &StatBlock) -> Vec<ExtractionGap> {
    [
        (stats.health, GapField::Health),
        (stats.move_inches, GapField::Move),
        (stats.save, GapField::Save),
        (stats.control, GapField::Control),
    ]
    .into_iter()
    .filter(|(value, _)| value.is_none())
    .map(|(_, field)| {
        ExtractionGap::new(&page.source, Some(page.index), field, "value not found in stat block")
            .for_unit(unit)
    })
    .collect()
}

/// Parse a page already classified as `unit`
///
/// `min_labelled_stats` is the classifier's labelled-anchor threshold.
pub fn parse_unit_page(page: &Page, faction: &str, min_labelled_stats: usize) -> UnitPage {
    let text = page.text();
    let mut result = UnitPage::default();

    let stats = parse_stat_block(&text, min_labelled_stats);
    if stats.is_empty() {
        log::warn!(
            "{} p{}: no stat block found, page skipped",
            page.source,
            page.index
        );
        result.gaps.push(ExtractionGap::new(
            &page.source,
            Some(page.index),
            GapField::StatBlock,
            "no stat block found",
        ));
        return result;
    }

    let name = match parse_unit_name(&text) {
        Some(name) => name,
        None => {
            let fallback = format!("Unknown (page {})", page.index);
            log::warn!("{} p{}: no unit name found", page.source, page.index);
            result.gaps.push(
                ExtractionGap::new(
                    &page.source,
                    Some(page.index),
                    GapField::UnitName,
                    "warscroll banner not found",
                )
                .for_unit(&fallback),
            );
            fallback
        }
    };

    result.gaps.extend(stat_gaps(page, &name, &stats));

    let rows: Vec<String> = page.rows().iter().map(TextLine::text).collect();
    for table in detect_weapon_tables(&rows) {
        if table.weapons.is_empty() {
            result.gaps.push(
                ExtractionGap::new(
                    &page.source,
                    Some(page.index),
                    GapField::WeaponTable,
                    format!("{} table header without parsable rows", table.weapon_type),
                )
                .for_unit(&name),
            );
        }
        result
            .weapons
            .extend(table.weapons.into_iter().map(|w| WeaponRecord {
                unit: name.clone(),
                name: w.name,
                weapon_type: table.weapon_type,
                range: w.range,
                attacks: w.attacks,
                to_hit: w.to_hit,
                to_wound: w.to_wound,
                rend: w.rend,
                damage: w.damage,
                abilities: w.abilities,
                page: page.index,
            }));
    }

    let lines: Vec<String> = page.lines().iter().map(TextLine::text).collect();
    result.abilities = parse_abilities(&lines, faction, &name, page.index);

    log::debug!(
        "{} p{}: {} ({} weapons, {} abilities)",
        page.source,
        page.index,
        name,
        result.weapons.len(),
        result.abilities.len()
    );

    result.unit = Some(UnitRecord {
        faction: faction.to_string(),
        name,
        health: stats.health,
        move_inches: stats.move_inches,
        save: stats.save,
        control: stats.control,
        unit_size: None,
        source: page.source.clone(),
        page: page.index,
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::TextItem;

    fn page_from_lines(lines: &[&str]) -> Page {
        let items = lines
            .iter()
            .enumerate()
            .map(|(i, text)| TextItem {
                text: text.to_string(),
                x: 40.0,
                y: 800.0 - 20.0 * i as f32,
                width: 100.0,
                height: 10.0,
                font: "F1".into(),
                font_size: 10.0,
                page: 5,
            })
            .collect();
        Page::new(5, "sylvaneth.pdf", items)
    }

    #[test]
    fn test_detect_faction() {
        assert_eq!(
            detect_faction("WARHAMMER AGE OF SIGMAR\nSYLVANETH FACTION PACK"),
            Some("SYLVANETH".to_string())
        );
        assert_eq!(
            detect_faction("LUMINETH  REALM-LORDS\nFACTION PACK"),
            Some("LUMINETH REALM-LORDS".to_string())
        );
        assert_eq!(
            detect_faction("FACTION PACK: SERAPHON"),
            Some("SERAPHON".to_string())
        );
        assert_eq!(detect_faction("Core Rules"), None);
    }

    #[test]
    fn test_unit_name_from_banner() {
        assert_eq!(
            parse_unit_name("• WARSCROLL •\nKURNOTH HUNTERS\nWITH GREATBOWS\n4+\n2"),
            Some("KURNOTH HUNTERS WITH GREATBOWS".to_string())
        );
        assert_eq!(
            parse_unit_name("• HERO WARSCROLL • ALARIELLE\nHealth 14"),
            Some("ALARIELLE".to_string())
        );
        assert_eq!(
            parse_unit_name("WARSCROLL\nTREE-REVENANTS\nRANGED WEAPONS Rng Atk"),
            Some("TREE-REVENANTS".to_string())
        );
        assert_eq!(parse_unit_name("no banner here"), None);
    }

    #[test]
    fn test_timing_lines() {
        assert!(is_timing_line("Passive"));
        assert!(is_timing_line("Your Hero Phase"));
        assert!(is_timing_line("Any Combat Phase"));
        assert!(is_timing_line("Once Per Battle, Your Hero Phase"));
        assert!(is_timing_line("Once Per Turn (Army), Any Shooting Phase"));
        assert!(is_timing_line("Once Per Battle"));
        assert!(is_timing_line("End of Any Turn"));
        assert!(is_timing_line("Reaction: You declared a Fight ability for this unit"));
        assert!(!is_timing_line("Effect: Roll a dice."));
        assert!(!is_timing_line("Guardians of the Glades"));
    }

    #[test]
    fn test_parse_abilities() {
        let lines: Vec<String> = [
            "KURNOTH HUNTERS",
            "Passive",
            "Envoys of the Everqueen",
            "Effect: Add 1 to hit rolls for this unit.",
            "Your Hero Phase",
            "Declare: Pick a friendly unit.",
            "Effect: Heal (D3) that unit.",
            "KEYWORDS INFANTRY",
            "Passive",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let abilities = parse_abilities(&lines, "SYLVANETH", "KURNOTH HUNTERS", 12);
        assert!(abilities.iter().all(|a| a.page == 12));
        assert_eq!(abilities.len(), 2);
        assert_eq!(abilities[0].name, "Envoys of the Everqueen");
        assert_eq!(abilities[0].timing, "Passive");
        assert_eq!(abilities[0].text, "Effect: Add 1 to hit rolls for this unit.");
        assert_eq!(abilities[1].name, "Your Hero Phase");
        assert_eq!(
            abilities[1].text,
            "Declare: Pick a friendly unit. Effect: Heal (D3) that unit."
        );
    }

    #[test]
    fn test_complete_page() {
        let page = page_from_lines(&[
            "• WARSCROLL •",
            "DRYADS",
            "Health 1, Move 6\", Save 5+, Control 1",
            "MELEE WEAPONS Atk Hit Wnd Rnd Dmg Ability",
            "Wracking Talons 2 4+ 4+ - 1 -",
            "Passive",
            "Impenetrable Thicket",
            "Effect: Subtract 1 from hit rolls for attacks that target this unit.",
            "KEYWORDS INFANTRY, WARD (6+)",
        ]);

        let parsed = parse_unit_page(&page, "SYLVANETH", 3);
        let unit = parsed.unit.unwrap();
        assert_eq!(unit.name, "DRYADS");
        assert_eq!(unit.faction, "SYLVANETH");
        assert!(unit.is_complete());
        assert_eq!(unit.page, 5);
        assert_eq!(parsed.weapons.len(), 1);
        assert!(parsed.weapons.iter().all(|w| w.unit == "DRYADS"));
        assert_eq!(parsed.abilities.len(), 1);
        assert!(parsed.gaps.is_empty());
    }

    #[test]
    fn test_badge_page_with_move_in_rules_text() {
        let page = page_from_lines(&[
            "• WARSCROLL •",
            "DRYADS",
            "5+ 1 1 7\"",
            "Passive",
            "Wild Pursuit",
            "Effect: This unit can move 6\" but cannot end that move in combat.",
        ]);
        let parsed = parse_unit_page(&page, "SYLVANETH", 3);
        let unit = parsed.unit.unwrap();
        assert_eq!(unit.save, Some(5));
        assert_eq!(unit.control, Some(1));
        assert_eq!(unit.health, Some(1));
        assert_eq!(unit.move_inches, Some(7));
        assert!(parsed.gaps.is_empty());
    }

    #[test]
    fn test_rules_prose_naming_columns_is_not_a_weapon_table() {
        let page = page_from_lines(&[
            "• WARSCROLL •",
            "KURNOTH HUNTERS",
            "Health 5, Move 5\", Save 4+, Control 2",
            "MELEE WEAPONS Atk Hit Wnd Rnd Dmg Ability",
            "Vicious Claws 3 4+ 3+ - 1 Companion",
            "Once Per Battle, Your Hero Phase",
            "Wrath of the Glade",
            "Effect: Add 1 to hit rolls and wound rolls for attacks made by this unit, and add 1 to the Rend and Damage characteristics of its weapons.",
        ]);
        let parsed = parse_unit_page(&page, "SYLVANETH", 3);
        assert_eq!(parsed.weapons.len(), 1);
        assert!(parsed.gaps.is_empty());
        assert_eq!(parsed.abilities.len(), 1);
        assert_eq!(parsed.abilities[0].name, "Wrath of the Glade");
    }

    #[test]
    fn test_no_weapon_table_is_not_an_error() {
        let page = page_from_lines(&["• WARSCROLL •", "SPITE-REVENANTS", "Health 1, Move 5\", Save 5+, Control 1"]);
        let parsed = parse_unit_page(&page, "SYLVANETH", 3);
        assert!(parsed.unit.is_some());
        assert!(parsed.weapons.is_empty());
        assert!(parsed.gaps.is_empty());
    }

    #[test]
    fn test_missing_stats_become_gaps() {
        let page = page_from_lines(&["• WARSCROLL •", "BRANCHWYCH", "Health 5", "Save 5+"]);
        let parsed = parse_unit_page(&page, "SYLVANETH", 3);
        let unit = parsed.unit.unwrap();
        assert_eq!(unit.health, Some(5));
        assert_eq!(unit.move_inches, None);
        let fields: Vec<GapField> = parsed.gaps.iter().map(|g| g.field).collect();
        assert_eq!(fields, vec![GapField::Move, GapField::Control]);
    }

    #[test]
    fn test_no_stat_block_yields_no_records() {
        let page = page_from_lines(&[
            "• WARSCROLL •",
            "GHOST UNIT",
            "MELEE WEAPONS Atk Hit Wnd Rnd Dmg Ability",
            "Claws 2 4+ 4+ - 1 -",
        ]);
        let parsed = parse_unit_page(&page, "SYLVANETH", 3);
        assert!(parsed.unit.is_none());
        assert!(parsed.weapons.is_empty());
        assert_eq!(parsed.gaps.len(), 1);
        assert_eq!(parsed.gaps[0].field, GapField::StatBlock);
    }

    #[test]
    fn test_missing_name_falls_back_to_page() {
        let page = page_from_lines(&["Health 1, Move 6\", Save 5+, Control 1"]);
        let parsed = parse_unit_page(&page, "SYLVANETH", 3);
        assert_eq!(parsed.unit.unwrap().name, "Unknown (page 5)");
        assert_eq!(parsed.gaps[0].field, GapField::UnitName);
    }
}
