//! Extraction pipeline
//!
//! Loader → classifier → unit page parser, once per document, then the
//! per-document results are merged into [`Tables`].

use crate::classifier::{classify_page, ClassifierConfig, PageType};
use crate::loader::PdfDocument;
use crate::parser::{detect_faction, parse_unit_page};
use crate::records::{AbilityRecord, ExtractionGap, GapField, UnitRecord, WeaponRecord};
use crate::unit_sizes::UnitSizeTable;
use crate::LoadError;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Configuration for an extraction run
#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    pub classifier: ClassifierConfig,
    /// Process documents concurrently; output order is unchanged
    pub parallel: bool,
    /// Manual unit-size table to join onto the unit records
    pub unit_sizes: Option<UnitSizeTable>,
}

/// Everything extracted from one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentExtraction {
    pub source: String,
    pub faction: String,
    pub page_count: u32,
    /// Label of every page, in page order
    pub page_types: Vec<(u32, PageType)>,
    pub units: Vec<UnitRecord>,
    pub weapons: Vec<WeaponRecord>,
    pub abilities: Vec<AbilityRecord>,
    pub gaps: Vec<ExtractionGap>,
}

impl DocumentExtraction {
    pub fn count(&self, page_type: PageType) -> usize {
        self.page_types
            .iter()
            .filter(|(_, t)| *t == page_type)
            .count()
    }
}

/// Extract a document from disk
pub fn extract_document<P: AsRef<Path>>(
    path: P,
    config: &ExtractConfig,
) -> Result<DocumentExtraction, LoadError> {
    let path = path.as_ref();
    let doc = PdfDocument::open(path)?;
    let fallback = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_uppercase());
    Ok(extract_from(&doc, fallback, config))
}

/// Extract a document from a memory buffer
pub fn extract_document_mem(
    buffer: &[u8],
    source: &str,
    config: &ExtractConfig,
) -> Result<DocumentExtraction, LoadError> {
    let doc = PdfDocument::from_bytes(buffer, source)?;
    Ok(extract_from(&doc, None, config))
}

/// Faction from the cover page, then the PDF title, then the file name
fn resolve_faction(
    doc: &PdfDocument,
    fallback: Option<String>,
    gaps: &mut Vec<ExtractionGap>,
) -> String {
    let from_cover = doc
        .pages()
        .next()
        .and_then(Result::ok)
        .and_then(|page| detect_faction(&page.text()));
    if let Some(faction) = from_cover {
        return faction;
    }

    let from_title = doc
        .title()
        .map(|title| detect_faction(&title.to_uppercase()).unwrap_or(title));
    let (faction, detail) = match (from_title, fallback) {
        (Some(title), _) => (title, "cover page has no faction name, used PDF title"),
        (None, Some(stem)) => (stem, "cover page has no faction name, used file name"),
        (None, None) => ("Unknown".to_string(), "faction name not found"),
    };
    log::warn!("{}: {} ({})", doc.source(), detail, faction);
    gaps.push(ExtractionGap::new(doc.source(), Some(1), GapField::Faction, detail));
    faction
}

fn extract_from(
    doc: &PdfDocument,
    fallback_faction: Option<String>,
    config: &ExtractConfig,
) -> DocumentExtraction {
    let mut gaps = Vec::new();
    let faction = resolve_faction(doc, fallback_faction, &mut gaps);

    let mut extraction = DocumentExtraction {
        source: doc.source().to_string(),
        faction,
        page_count: doc.page_count(),
        page_types: Vec::new(),
        units: Vec::new(),
        weapons: Vec::new(),
        abilities: Vec::new(),
        gaps,
    };

    for (position, page) in doc.pages().enumerate() {
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                log::warn!("{}: page {} unreadable: {}", doc.source(), position + 1, e);
                extraction.gaps.push(ExtractionGap::new(
                    doc.source(),
                    Some(position as u32 + 1),
                    GapField::Page,
                    e.to_string(),
                ));
                extraction
                    .page_types
                    .push((position as u32 + 1, PageType::Delete));
                continue;
            }
        };

        let classification = classify_page(&page, &config.classifier);
        if classification.is_ambiguous() {
            log::warn!(
                "{} p{}: ambiguous page ({:?}), dropped",
                page.source,
                page.index,
                classification.evidence
            );
        }
        extraction
            .page_types
            .push((page.index, classification.page_type));

        if classification.page_type != PageType::Unit {
            continue;
        }

        let parsed = parse_unit_page(
            &page,
            &extraction.faction,
            config.classifier.min_labelled_stats,
        );
        extraction.units.extend(parsed.unit);
        extraction.weapons.extend(parsed.weapons);
        extraction.abilities.extend(parsed.abilities);
        extraction.gaps.extend(parsed.gaps);
    }

    log::info!(
        "{}: {} pages ({} unit, {} faction traits, {} deleted), {} units, {} weapons, {} abilities, {} gaps",
        extraction.source,
        extraction.page_count,
        extraction.count(PageType::Unit),
        extraction.count(PageType::FactionTraits),
        extraction.count(PageType::Delete),
        extraction.units.len(),
        extraction.weapons.len(),
        extraction.abilities.len(),
        extraction.gaps.len()
    );

    extraction
}

/// Per-document outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub source: String,
    pub faction: Option<String>,
    pub pages: u32,
    pub unit_pages: usize,
    pub faction_trait_pages: usize,
    pub deleted_pages: usize,
    pub units: usize,
    pub weapons: usize,
    pub abilities: usize,
    /// Set when the document could not be loaded
    pub error: Option<String>,
}

/// Merged output of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    pub units: Vec<UnitRecord>,
    pub weapons: Vec<WeaponRecord>,
    pub abilities: Vec<AbilityRecord>,
    pub gaps: Vec<ExtractionGap>,
    pub documents: Vec<DocumentSummary>,
    /// Whether a unit-size table was joined (adds the size column)
    pub unit_sizes_joined: bool,
    seen_units: HashSet<(String, String)>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one document, dropping units whose name already exists in the
    /// same faction together with their weapons and abilities
    pub fn absorb(&mut self, doc: DocumentExtraction) {
        let mut summary = DocumentSummary {
            source: doc.source.clone(),
            faction: Some(doc.faction.clone()),
            pages: doc.page_count,
            unit_pages: doc.count(PageType::Unit),
            faction_trait_pages: doc.count(PageType::FactionTraits),
            deleted_pages: doc.count(PageType::Delete),
            units: 0,
            weapons: 0,
            abilities: 0,
            error: None,
        };
        self.gaps.extend(doc.gaps);

        let mut dropped_pages: HashSet<u32> = HashSet::new();
        for unit in doc.units {
            let key = (unit.faction.clone(), unit.name.clone());
            if self.seen_units.insert(key) {
                summary.units += 1;
                self.units.push(unit);
            } else {
                log::warn!(
                    "{} p{}: duplicate unit {} / {}, dropped",
                    unit.source,
                    unit.page,
                    unit.faction,
                    unit.name
                );
                self.gaps.push(
                    ExtractionGap::new(
                        &unit.source,
                        Some(unit.page),
                        GapField::DuplicateUnit,
                        format!("{} already parsed for {}", unit.name, unit.faction),
                    )
                    .for_unit(&unit.name),
                );
                dropped_pages.insert(unit.page);
            }
        }

        let weapons: Vec<WeaponRecord> = doc
            .weapons
            .into_iter()
            .filter(|w| !dropped_pages.contains(&w.page))
            .collect();
        let abilities: Vec<AbilityRecord> = doc
            .abilities
            .into_iter()
            .filter(|a| !dropped_pages.contains(&a.page))
            .collect();
        summary.weapons = weapons.len();
        summary.abilities = abilities.len();
        self.weapons.extend(weapons);
        self.abilities.extend(abilities);
        self.documents.push(summary);
    }

    /// Record a document that failed to load
    pub fn record_failure(&mut self, source: &str, error: &LoadError) {
        log::warn!("{}: could not load: {}", source, error);
        self.documents.push(DocumentSummary {
            source: source.to_string(),
            faction: None,
            pages: 0,
            unit_pages: 0,
            faction_trait_pages: 0,
            deleted_pages: 0,
            units: 0,
            weapons: 0,
            abilities: 0,
            error: Some(error.to_string()),
        });
    }

    /// Attach unit sizes from the manual table
    pub fn join_unit_sizes(&mut self, sizes: &UnitSizeTable) {
        let gaps = sizes.apply(&mut self.units);
        self.gaps.extend(gaps);
        self.unit_sizes_joined = true;
    }
}

/// Run the pipeline over every input document
pub fn run(paths: &[PathBuf], config: &ExtractConfig) -> Tables {
    let results: Vec<Result<DocumentExtraction, LoadError>> = if config.parallel {
        paths
            .par_iter()
            .map(|path| extract_document(path, config))
            .collect()
    } else {
        paths
            .iter()
            .map(|path| extract_document(path, config))
            .collect()
    };

    let mut tables = Tables::new();
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(doc) => tables.absorb(doc),
            Err(e) => tables.record_failure(&path.display().to_string(), &e),
        }
    }

    if let Some(sizes) = &config.unit_sizes {
        tables.join_unit_sizes(sizes);
    }

    tables
}

/// Expand directories into their `*.pdf` files (sorted); files pass through
pub fn collect_inputs(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .and_then(|e| e.to_str())
                            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
                })
                .collect();
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, page: u32) -> UnitRecord {
        UnitRecord {
            faction: "SYLVANETH".into(),
            name: name.into(),
            health: Some(1),
            move_inches: Some(6),
            save: Some(5),
            control: Some(1),
            unit_size: None,
            source: "a.pdf".into(),
            page,
        }
    }

    fn weapon(unit: &str, page: u32) -> WeaponRecord {
        WeaponRecord {
            unit: unit.into(),
            name: "Talons".into(),
            weapon_type: crate::records::WeaponType::Melee,
            range: None,
            attacks: "2".into(),
            to_hit: 4,
            to_wound: 4,
            rend: 0,
            damage: "1".into(),
            abilities: None,
            page,
        }
    }

    fn extraction(source: &str, units: Vec<UnitRecord>, weapons: Vec<WeaponRecord>) -> DocumentExtraction {
        DocumentExtraction {
            source: source.into(),
            faction: "SYLVANETH".into(),
            page_count: 3,
            page_types: vec![(1, PageType::Delete), (2, PageType::Unit), (3, PageType::Unit)],
            units,
            weapons,
            abilities: vec![],
            gaps: vec![],
        }
    }

    #[test]
    fn test_duplicate_units_across_documents_dropped() {
        let mut tables = Tables::new();
        tables.absorb(extraction(
            "a.pdf",
            vec![unit("DRYADS", 2)],
            vec![weapon("DRYADS", 2)],
        ));
        let mut second = unit("DRYADS", 5);
        second.source = "b.pdf".into();
        tables.absorb(extraction("b.pdf", vec![second], vec![weapon("DRYADS", 5)]));

        assert_eq!(tables.units.len(), 1);
        assert_eq!(tables.weapons.len(), 1);
        assert_eq!(tables.gaps.len(), 1);
        assert_eq!(tables.gaps[0].field, GapField::DuplicateUnit);
        assert_eq!(tables.documents[1].units, 0);
        assert_eq!(tables.documents[1].weapons, 0);
    }

    #[test]
    fn test_duplicate_within_document_drops_only_that_page() {
        let mut tables = Tables::new();
        tables.absorb(extraction(
            "a.pdf",
            vec![unit("DRYADS", 2), unit("DRYADS", 3)],
            vec![weapon("DRYADS", 2), weapon("DRYADS", 3)],
        ));
        assert_eq!(tables.units.len(), 1);
        assert_eq!(tables.units[0].page, 2);
        assert_eq!(tables.weapons.len(), 1);
        assert_eq!(tables.weapons[0].page, 2);
    }

    #[test]
    fn test_summary_counts() {
        let mut tables = Tables::new();
        tables.absorb(extraction(
            "a.pdf",
            vec![unit("DRYADS", 2), unit("BRANCHWYCH", 3)],
            vec![weapon("DRYADS", 2), weapon("BRANCHWYCH", 3)],
        ));
        let summary = &tables.documents[0];
        assert_eq!(summary.unit_pages, 2);
        assert_eq!(summary.deleted_pages, 1);
        assert_eq!(summary.units, 2);
        assert_eq!(summary.weapons, 2);
    }

    #[test]
    fn test_join_unit_sizes_sets_flag() {
        let mut tables = Tables::new();
        tables.absorb(extraction("a.pdf", vec![unit("DRYADS", 2)], vec![]));
        let mut sizes = UnitSizeTable::default();
        sizes.insert("Sylvaneth", "Dryads", 10);
        tables.join_unit_sizes(&sizes);
        assert!(tables.unit_sizes_joined);
        assert_eq!(tables.units[0].unit_size, Some(10));
        assert!(tables.gaps.is_empty());
    }

    #[test]
    fn test_record_failure() {
        let mut tables = Tables::new();
        tables.record_failure("missing.pdf", &LoadError::InvalidStructure);
        assert_eq!(tables.documents.len(), 1);
        assert!(tables.documents[0].error.is_some());
        assert!(tables.units.is_empty());
    }

    #[test]
    fn test_collect_inputs_expands_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let single = PathBuf::from("x.pdf");

        let paths = collect_inputs(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("a.PDF"));
        assert!(paths[1].ends_with("b.pdf"));
        assert_eq!(paths[2], single);
    }
}
