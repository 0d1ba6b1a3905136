//! Warscroll statistics extraction from faction-pack PDFs using lopdf
//!
//! This crate provides:
//! - Lazy page loading with positioned text (ToUnicode aware)
//! - Heuristic page classification (unit / faction traits / delete)
//! - Unit page parsing into unit, weapon and ability records
//! - Joining of an external unit-size table and CSV/TSV export
//! - Monte Carlo combat simulation over the extracted records

pub mod classifier;
pub mod export;
pub mod loader;
pub mod parser;
pub mod pipeline;
pub mod records;
pub mod simulator;
pub mod stats;
pub mod tables;
pub mod tounicode;
pub mod unit_sizes;

pub use classifier::{classify_page, classify_text, Classification, ClassifierConfig, PageType};
pub use export::{export_tables, ExportOptions, OutputFormat};
pub use loader::{Page, PdfDocument, TextItem, TextLine};
pub use parser::{detect_faction, parse_unit_page, UnitPage};
pub use pipeline::{
    collect_inputs, extract_document, extract_document_mem, run, DocumentExtraction,
    DocumentSummary, ExtractConfig, Tables,
};
pub use records::{AbilityRecord, ExtractionGap, GapField, UnitRecord, WeaponRecord, WeaponType};
pub use simulator::{simulate, Combatant, SimulationOptions, SimulationResult};
pub use unit_sizes::UnitSizeTable;

/// Failure to open or read a source document
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Invalid PDF structure: no pages")]
    InvalidStructure,
}

impl From<lopdf::Error> for LoadError {
    fn from(e: lopdf::Error) -> Self {
        LoadError::Parse(e.to_string())
    }
}

/// Failure reading or writing a delimited table
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unknown output format: {0}")]
    UnknownFormat(String),
}

/// A unit or weapon that cannot be simulated
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("{unit} has no {field}")]
    MissingStat { unit: String, field: &'static str },
    #[error("Invalid dice expression: {0}")]
    InvalidDice(String),
}
