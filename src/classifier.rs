//! Heuristic page classification
//!
//! Each page is labelled `unit`, `faction_traits` or `delete` by matching
//! known header text of the faction-pack layout. Anything unrecognised is
//! dropped.

use crate::loader::Page;
use crate::stats::{detect_stat_block, StatBlockForm};
use std::fmt;

/// Page classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    /// Warscroll page with a stat block
    Unit,
    /// Battle traits, formations, lores and similar faction rules
    FactionTraits,
    /// Everything else, including Spearhead pages
    Delete,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Unit => "unit",
            PageType::FactionTraits => "faction_traits",
            PageType::Delete => "delete",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What made the classifier pick a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// A delete marker such as `SPEARHEAD` was found
    DeleteMarker(String),
    StatBlock(StatBlockForm),
    TraitHeader(String),
    /// Both a stat block and a faction-trait header were found
    Ambiguous { header: String },
    NoMatch,
}

/// Result of page classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub page_type: PageType,
    pub evidence: Evidence,
}

impl Classification {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.evidence, Evidence::Ambiguous { .. })
    }
}

/// Configuration for page classification
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Markers that send a page to `delete` wherever they appear (case-insensitive)
    pub delete_markers: Vec<String>,
    /// Section headers of faction-trait pages, matched against line starts
    pub faction_trait_headers: Vec<String>,
    /// Labelled stat anchors (of Health/Move/Save/Control) needed for a stat block
    pub min_labelled_stats: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            delete_markers: vec!["SPEARHEAD".to_string()],
            faction_trait_headers: [
                "BATTLE TRAITS",
                "BATTLE FORMATIONS",
                "HEROIC TRAITS",
                "ARTEFACTS OF POWER",
                "SPELL LORE",
                "PRAYER LORE",
                "MANIFESTATION LORE",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_labelled_stats: 3,
        }
    }
}

/// Classify a loaded page
pub fn classify_page(page: &Page, config: &ClassifierConfig) -> Classification {
    let classification = classify_text(&page.text(), config);
    log::debug!(
        "{} p{}: {} ({:?})",
        page.source,
        page.index,
        classification.page_type,
        classification.evidence
    );
    classification
}

/// Classify page text
pub fn classify_text(text: &str, config: &ClassifierConfig) -> Classification {
    let upper = text.to_uppercase();

    if let Some(marker) = config
        .delete_markers
        .iter()
        .find(|m| upper.contains(&m.to_uppercase()))
    {
        return Classification {
            page_type: PageType::Delete,
            evidence: Evidence::DeleteMarker(marker.clone()),
        };
    }

    let stat_block = detect_stat_block(text, config.min_labelled_stats);
    let header = find_trait_header(&upper, &config.faction_trait_headers);

    let (page_type, evidence) = match (stat_block, header) {
        (Some(_), Some(header)) => (PageType::Delete, Evidence::Ambiguous { header }),
        (Some(form), None) => (PageType::Unit, Evidence::StatBlock(form)),
        (None, Some(header)) => (PageType::FactionTraits, Evidence::TraitHeader(header)),
        (None, None) => (PageType::Delete, Evidence::NoMatch),
    };

    Classification {
        page_type,
        evidence,
    }
}

/// First configured header that starts a line of the (uppercased) text
fn find_trait_header(upper: &str, headers: &[String]) -> Option<String> {
    upper.lines().map(str::trim).find_map(|line| {
        headers
            .iter()
            .find(|h| line.starts_with(h.to_uppercase().as_str()))
            .cloned()
    })
}
