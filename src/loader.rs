//! Document loading and positioned text extraction using lopdf
//!
//! A [`PdfDocument`] owns the parsed lopdf document for the duration of one
//! extraction. Its pages are produced lazily by [`PdfDocument::pages`], each
//! carrying the text items of the page in content-stream order.

use crate::tounicode::FontCMaps;
use crate::LoadError;
use lopdf::{Document, Object, ObjectId};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::path::Path;

/// A text item with position information
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    /// The text content
    pub text: String,
    /// X position on page
    pub x: f32,
    /// Y position on page (PDF coordinates, origin at bottom-left)
    pub y: f32,
    /// Estimated width of text
    pub width: f32,
    /// Height (approximated from font size)
    pub height: f32,
    /// Font resource name
    pub font: String,
    /// Rendered font size
    pub font_size: f32,
    /// Page number (1-indexed)
    pub page: u32,
}

/// A line of text (grouped text items)
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub items: Vec<TextItem>,
    pub y: f32,
    pub page: u32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One physical page of a source document
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Page number (1-indexed)
    pub index: u32,
    /// Identifier of the source document (usually its path)
    pub source: String,
    /// Text items in content-stream order
    pub items: Vec<TextItem>,
}

impl Page {
    pub fn new(index: u32, source: impl Into<String>, items: Vec<TextItem>) -> Self {
        Self {
            index,
            source: source.into(),
            items,
        }
    }

    /// Lines in content-stream (reading) order
    pub fn lines(&self) -> Vec<TextLine> {
        group_into_lines(self.items.clone())
    }

    /// Page text in reading order, one line per row
    pub fn text(&self) -> String {
        self.lines()
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lines banded by vertical position, top to bottom; used for tables
    pub fn rows(&self) -> Vec<TextLine> {
        group_into_rows(self.items.clone())
    }
}

/// An opened PDF document
pub struct PdfDocument {
    source: String,
    doc: Document,
}

impl PdfDocument {
    /// Open a PDF from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let buffer = std::fs::read(path)?;
        Self::from_bytes(&buffer, path.display().to_string())
    }

    /// Open a PDF from a memory buffer
    pub fn from_bytes(buffer: &[u8], source: impl Into<String>) -> Result<Self, LoadError> {
        let doc = Document::load_mem(buffer)?;
        if doc.get_pages().is_empty() {
            return Err(LoadError::InvalidStructure);
        }
        Ok(Self {
            source: source.into(),
            doc,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Lazily extract each page; calling again restarts from the first page
    pub fn pages(&self) -> Pages<'_> {
        Pages {
            document: self,
            inner: self.doc.get_pages().into_iter(),
        }
    }

    /// Document title from the Info dictionary
    pub fn title(&self) -> Option<String> {
        let info_ref = self.doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
        let info = self.doc.get_dictionary(info_ref).ok()?;

        match info.get(b"Title").ok()? {
            Object::String(bytes, _) => {
                let title = decode_text_string(bytes);
                let title = title.trim();
                if title.is_empty() {
                    None
                } else {
                    Some(title.to_string())
                }
            }
            _ => None,
        }
    }
}

/// Lazy page sequence of a [`PdfDocument`]
pub struct Pages<'a> {
    document: &'a PdfDocument,
    inner: btree_map::IntoIter<u32, ObjectId>,
}

impl Pages<'_> {
    fn load(&self, page_num: u32, page_id: ObjectId) -> Result<Page, LoadError> {
        extract_page_text_items(&self.document.doc, page_id, page_num)
            .map(|items| Page::new(page_num, self.document.source.clone(), items))
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Page, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (page_num, page_id) = self.inner.next()?;
        Some(self.load(page_num, page_id))
    }

    // Skipped pages are never decoded
    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        let (page_num, page_id) = self.inner.nth(n)?;
        Some(self.load(page_num, page_id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// TJ offsets (thousandths of text space) more negative than this are word gaps
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// Text and graphics state while walking a content stream
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    leading: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
        }
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.line_matrix[5] -= leading;
        self.text_matrix = self.line_matrix;
    }

    fn item(&self, text: String, page: u32) -> TextItem {
        let rendered_size = effective_font_size(self.font_size, &self.text_matrix);
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        let width = text.chars().count() as f32 * rendered_size * 0.5;
        TextItem {
            text,
            x: combined[4],
            y: combined[5],
            width,
            height: rendered_size,
            font: self.font.clone(),
            font_size: rendered_size,
            page,
        }
    }
}

/// Extract text items from a single page
fn extract_page_text_items(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
) -> Result<Vec<TextItem>, LoadError> {
    use lopdf::content::Content;

    let mut items = Vec::new();

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let cmaps = FontCMaps::for_page(doc, page_id);

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| LoadError::Parse(format!("page {}: {}", page_num, e)))?;

    let content = Content::decode(&content_data)
        .map_err(|e| LoadError::Parse(format!("page {}: {}", page_num, e)))?;

    let mut state = TextState::new();
    let decoder = TextDecoder {
        doc,
        fonts: &fonts,
        cmaps: &cmaps,
    };

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if operands.len() >= 6 {
                    let mut m = IDENTITY;
                    for (i, operand) in operands.iter().take(6).enumerate() {
                        m[i] = get_number(operand).unwrap_or(IDENTITY[i]);
                    }
                    state.ctm = multiply_matrices(&m, &state.ctm);
                }
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => state.in_text_block = false,
            "Tf" => {
                if operands.len() >= 2 {
                    if let Ok(name) = operands[0].as_name() {
                        state.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(get_number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if operands.len() >= 2 {
                    let tx = get_number(&operands[0]).unwrap_or(0.0);
                    let ty = get_number(&operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.line_matrix = multiply_matrices(
                        &[1.0, 0.0, 0.0, 1.0, tx, ty],
                        &state.line_matrix,
                    );
                    state.text_matrix = state.line_matrix;
                }
            }
            "Tm" => {
                if operands.len() >= 6 {
                    for (i, operand) in operands.iter().take(6).enumerate() {
                        state.text_matrix[i] = get_number(operand).unwrap_or(IDENTITY[i]);
                    }
                    state.line_matrix = state.text_matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if state.in_text_block {
                    if let Some(text) = operands.first().and_then(|o| decoder.decode(o, &state.font)) {
                        if !text.trim().is_empty() {
                            items.push(state.item(text, page_num));
                        }
                    }
                }
            }
            "TJ" => {
                if state.in_text_block {
                    if let Some(Ok(array)) = operands.first().map(Object::as_array) {
                        let mut combined_text = String::new();
                        for element in array {
                            match get_number(element) {
                                Some(offset) if offset < TJ_SPACE_THRESHOLD => {
                                    if !combined_text.ends_with(' ') {
                                        combined_text.push(' ');
                                    }
                                }
                                Some(_) => {}
                                None => {
                                    if let Some(text) = decoder.decode(element, &state.font) {
                                        combined_text.push_str(&text);
                                    }
                                }
                            }
                        }
                        if !combined_text.trim().is_empty() {
                            items.push(state.item(combined_text, page_num));
                        }
                    }
                }
            }
            "'" | "\"" => {
                state.next_line();
                // `"` carries word and char spacing before the string
                let text_operand = if op.operator == "\"" {
                    operands.get(2)
                } else {
                    operands.first()
                };
                if let Some(text) = text_operand.and_then(|o| decoder.decode(o, &state.font)) {
                    if !text.trim().is_empty() {
                        items.push(state.item(text, page_num));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute effective font size from base size and text matrix
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Decodes string operands using the page's fonts
struct TextDecoder<'a> {
    doc: &'a Document,
    fonts: &'a BTreeMap<Vec<u8>, &'a lopdf::Dictionary>,
    cmaps: &'a FontCMaps,
}

impl TextDecoder<'_> {
    fn decode(&self, obj: &Object, current_font: &str) -> Option<String> {
        let Object::String(bytes, _) = obj else {
            return None;
        };

        if let Some(font) = self.cmaps.get(current_font) {
            return Some(font.decode(bytes));
        }

        if let Some(font_dict) = self.fonts.get(current_font.as_bytes()) {
            if let Ok(encoding) = font_dict.get_font_encoding(self.doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }

        Some(decode_text_string(bytes))
    }
}

/// UTF-16BE (with BOM) or Latin-1
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Vertical tolerance for items sharing a line
const Y_TOLERANCE: f32 = 3.0;

/// Group text items into lines, preserving content-stream order
///
/// Only consecutive items on the same line (same Y within tolerance) are
/// merged, so the reading order of the PDF stream is kept.
pub fn group_into_lines(items: Vec<TextItem>) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();

    for item in items {
        match lines.last_mut() {
            Some(last) if last.page == item.page && (last.y - item.y).abs() < Y_TOLERANCE => {
                last.items.push(item);
            }
            _ => {
                let (y, page) = (item.y, item.page);
                lines.push(TextLine {
                    items: vec![item],
                    y,
                    page,
                });
            }
        }
    }

    sort_line_items(&mut lines);
    lines
}

/// Group text items into layout rows: per page, top to bottom, left to right
///
/// Unlike [`group_into_lines`] this ignores stream order, so table cells that
/// were emitted column by column still end up on their row.
pub fn group_into_rows(items: Vec<TextItem>) -> Vec<TextLine> {
    let mut sorted = items;
    sorted.sort_by(|a, b| {
        a.page.cmp(&b.page).then(
            b.y.partial_cmp(&a.y)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });

    let mut rows: Vec<TextLine> = Vec::new();
    for item in sorted {
        match rows.last_mut() {
            Some(row) if row.page == item.page && (row.y - item.y).abs() < Y_TOLERANCE => {
                row.items.push(item);
            }
            _ => {
                let (y, page) = (item.y, item.page);
                rows.push(TextLine {
                    items: vec![item],
                    y,
                    page,
                });
            }
        }
    }

    sort_line_items(&mut rows);
    rows
}

/// Sort items within each line by X position (left to right)
fn sort_line_items(lines: &mut [TextLine]) {
    for line in lines {
        line.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, x: f32, y: f32) -> TextItem {
        TextItem {
            text: text.into(),
            x,
            y,
            width: 50.0,
            height: 12.0,
            font: "F1".into(),
            font_size: 12.0,
            page: 1,
        }
    }

    #[test]
    fn test_group_into_lines() {
        let items = vec![
            item("Hello", 100.0, 700.0),
            item("World", 160.0, 700.0),
            item("Next line", 100.0, 680.0),
        ];

        let lines = group_into_lines(items);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello World");
        assert_eq!(lines[1].text(), "Next line");
    }

    #[test]
    fn test_lines_keep_stream_order_rows_do_not() {
        // A table emitted column by column
        let items = vec![
            item("Bow", 50.0, 500.0),
            item("Claws", 50.0, 480.0),
            item("18\"", 200.0, 500.0),
            item("3", 200.0, 480.0),
        ];

        let lines = group_into_lines(items.clone());
        assert_eq!(lines.len(), 4);

        let rows = group_into_rows(items);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text(), "Bow 18\"");
        assert_eq!(rows[1].text(), "Claws 3");
    }

    #[test]
    fn test_page_text_joins_lines() {
        let page = Page::new(
            3,
            "test.pdf",
            vec![item("Health", 50.0, 700.0), item("4", 120.0, 700.0), item("Move 5\"", 50.0, 680.0)],
        );
        assert_eq!(page.text(), "Health 4\nMove 5\"");
    }

    #[test]
    fn test_effective_font_size_scaled_matrix() {
        let size = effective_font_size(1.0, &[9.0, 0.0, 0.0, 9.0, 0.0, 0.0]);
        assert!((size - 9.0).abs() < 0.001);
    }

    #[test]
    fn test_decode_text_string_utf16() {
        let bytes = [0xFE, 0xFF, 0x00, 0x53, 0x00, 0x42];
        assert_eq!(decode_text_string(&bytes), "SB");
        assert_eq!(decode_text_string(b"Plain"), "Plain");
    }
}
