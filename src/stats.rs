//! Stat block detection and parsing
//!
//! Two layouts are recognised:
//! - labelled: `Health 4, Move 5", Save 3+, Control 1` (any order, any separators)
//! - compact: the warscroll badge as it comes out of the content stream,
//!   `3+ 1 5 6"` meaning save, control, health, move

use once_cell::sync::Lazy;
use regex::Regex;

static HEALTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhealth\b\s*[:\-]?\s*(\d{1,3})\b").unwrap());
static MOVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bmove\b\s*[:\-]?\s*(\d{1,2})\s*(?:"|”|″|''|in\b)?"#).unwrap());
static SAVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsave\b\s*[:\-]?\s*(\d)\s*\+?").unwrap());
static CONTROL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcontrol\b\s*[:\-]?\s*(\d{1,2})\b").unwrap());
static COMPACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\d+)\+\s*(\d+)\s*(\d+)\s*(\d+)\s*(?:"|”|″)"#).unwrap());

/// Which layout a stat block was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatBlockForm {
    Labelled,
    Compact,
}

/// Parsed stat values; any of them may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatBlock {
    pub health: Option<u8>,
    pub move_inches: Option<u8>,
    pub save: Option<u8>,
    pub control: Option<u8>,
    pub form: Option<StatBlockForm>,
}

impl StatBlock {
    pub fn is_empty(&self) -> bool {
        self.form.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.health.is_some()
            && self.move_inches.is_some()
            && self.save.is_some()
            && self.control.is_some()
    }
}

fn first_number(re: &Regex, text: &str) -> Option<u8> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn labelled(text: &str) -> StatBlock {
    StatBlock {
        health: first_number(&HEALTH_RE, text),
        move_inches: first_number(&MOVE_RE, text),
        save: first_number(&SAVE_RE, text),
        control: first_number(&CONTROL_RE, text),
        form: Some(StatBlockForm::Labelled),
    }
}

fn labelled_count(block: &StatBlock) -> usize {
    [block.health, block.move_inches, block.save, block.control]
        .iter()
        .filter(|v| v.is_some())
        .count()
}

fn compact(text: &str) -> Option<StatBlock> {
    let caps = COMPACT_RE.captures(text)?;
    let value = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u8>().ok());
    Some(StatBlock {
        save: value(1),
        control: value(2),
        health: value(3),
        move_inches: value(4),
        form: Some(StatBlockForm::Compact),
    })
}

/// Parse the stat block of a unit page
///
/// Uses the same precedence as [`detect_stat_block`]: a labelled block with
/// at least `min_labelled` anchors, then the compact badge, then whatever
/// labelled anchors were found. An empty block means no stat was found.
pub fn parse_stat_block(text: &str, min_labelled: usize) -> StatBlock {
    let block = labelled(text);
    let count = labelled_count(&block);
    if count >= min_labelled.max(1) {
        return block;
    }
    if let Some(badge) = compact(text) {
        return badge;
    }
    if count > 0 {
        block
    } else {
        StatBlock::default()
    }
}

/// Whether the text shows a stat block, and in which layout
///
/// A labelled block needs `min_labelled` of the four anchors.
pub fn detect_stat_block(text: &str, min_labelled: usize) -> Option<StatBlockForm> {
    if labelled_count(&labelled(text)) >= min_labelled.max(1) {
        return Some(StatBlockForm::Labelled);
    }
    COMPACT_RE
        .is_match(text)
        .then_some(StatBlockForm::Compact)
}
