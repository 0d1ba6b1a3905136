//! ToUnicode CMap parsing for PDF text extraction
//!
//! Faction packs are typeset with embedded subset fonts whose glyph codes only
//! make sense through the font's ToUnicode CMap. This module parses those CMaps
//! and resolves them per page font.

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::io::Read;

/// A parsed ToUnicode CMap mapping character codes to Unicode strings
#[derive(Debug, Default, Clone)]
pub struct ToUnicodeCMap {
    /// Direct character mappings (code -> Unicode string)
    pub char_map: HashMap<u16, String>,
    /// Range mappings (start_code, end_code) -> base_unicode
    pub ranges: Vec<(u16, u16, u32)>,
}

impl ToUnicodeCMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a ToUnicode CMap from its decompressed content
    pub fn parse(content: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(content);
        let mut cmap = ToUnicodeCMap::new();

        for section in sections(&text, "beginbfchar", "endbfchar") {
            cmap.parse_bfchar_section(section);
        }
        for section in sections(&text, "beginbfrange", "endbfrange") {
            cmap.parse_bfrange_section(section);
        }

        if cmap.char_map.is_empty() && cmap.ranges.is_empty() {
            None
        } else {
            Some(cmap)
        }
    }

    /// Parse a bfchar section: `<src> <dst>` pairs
    fn parse_bfchar_section(&mut self, section: &str) {
        let tokens = hex_tokens(section);
        for pair in tokens.chunks_exact(2) {
            if let (Some(src), Some(dst)) = (parse_hex_u16(&pair[0]), hex_to_unicode_string(&pair[1]))
            {
                self.char_map.insert(src, dst);
            }
        }
    }

    /// Parse a bfrange section: `<start> <end> <base>` or `<start> <end> [<d0> <d1> ...]`
    fn parse_bfrange_section(&mut self, section: &str) {
        let mut rest = section;

        loop {
            let Some((start_hex, after)) = next_hex(rest) else {
                break;
            };
            let Some((end_hex, after)) = next_hex(after) else {
                break;
            };
            let (Some(start), Some(end)) = (parse_hex_u16(&start_hex), parse_hex_u16(&end_hex))
            else {
                break;
            };

            let after = after.trim_start();
            if let Some(array_body) = after.strip_prefix('[') {
                let close = array_body.find(']').unwrap_or(array_body.len());
                for (offset, dst) in hex_tokens(&array_body[..close]).iter().enumerate() {
                    let Ok(offset) = u16::try_from(offset) else {
                        break;
                    };
                    let code = start.saturating_add(offset);
                    if code > end {
                        break;
                    }
                    if let Some(s) = hex_to_unicode_string(dst) {
                        self.char_map.insert(code, s);
                    }
                }
                rest = array_body.get(close + 1..).unwrap_or("");
            } else if let Some((base_hex, after)) = next_hex(after) {
                if let Some(base) = parse_hex_u32(&base_hex) {
                    self.ranges.push((start, end, base));
                }
                rest = after;
            } else {
                break;
            }
        }
    }

    /// Look up a code and return the Unicode string
    pub fn lookup(&self, code: u16) -> Option<String> {
        if let Some(s) = self.char_map.get(&code) {
            return Some(s.clone());
        }

        for &(start, end, base) in &self.ranges {
            if code >= start && code <= end {
                let unicode = base + (code - start) as u32;
                if let Some(c) = char::from_u32(unicode) {
                    return Some(c.to_string());
                }
            }
        }

        None
    }

    /// Decode a byte slice of two-byte CIDs (Type0 fonts)
    pub fn decode_cids(&self, bytes: &[u8]) -> String {
        let mut result = String::new();

        for chunk in bytes.chunks(2) {
            if chunk.len() == 2 {
                let cid = u16::from_be_bytes([chunk[0], chunk[1]]);
                if let Some(s) = self.lookup(cid) {
                    result.push_str(&s);
                } else if let Some(c) = char::from_u32(cid as u32) {
                    result.push(c);
                }
            }
        }

        result
    }

    /// Decode single-byte codes (simple fonts that also ship a ToUnicode map)
    pub fn decode_single(&self, bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|&b| self.lookup(b as u16).unwrap_or_else(|| (b as char).to_string()))
            .collect()
    }
}

/// Slices of `text` between each `begin`/`end` marker pair
fn sections<'a>(text: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = text[pos..].find(begin) {
        let section_start = pos + start + begin.len();
        match text[section_start..].find(end) {
            Some(len) => {
                out.push(&text[section_start..section_start + len]);
                pos = section_start + len;
            }
            None => break,
        }
    }
    out
}

/// All `<hex>` tokens in order
fn hex_tokens(section: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = section;
    while let Some((hex, after)) = next_hex(rest) {
        tokens.push(hex);
        rest = after;
    }
    tokens
}

/// The next `<hex>` token, skipping only whitespace before it
fn next_hex(s: &str) -> Option<(String, &str)> {
    let s = s.trim_start();
    let body = s.strip_prefix('<')?;
    let close = body.find('>')?;
    Some((body[..close].to_string(), &body[close + 1..]))
}

fn parse_hex_u16(hex: &str) -> Option<u16> {
    u16::from_str_radix(hex.trim(), 16).ok()
}

fn parse_hex_u32(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex.trim(), 16).ok()
}

/// Convert a hex string of UTF-16BE code units to a Unicode string
fn hex_to_unicode_string(hex: &str) -> Option<String> {
    let hex = hex.trim();
    if !hex.is_ascii() {
        return None;
    }
    let units: Vec<u16> = (0..hex.len() / 4)
        .filter_map(|i| u16::from_str_radix(&hex[i * 4..i * 4 + 4], 16).ok())
        .collect();

    let result = String::from_utf16_lossy(&units);
    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Font decoding info for a single page resource font
#[derive(Debug, Clone)]
pub struct FontCMap {
    pub cmap: ToUnicodeCMap,
    /// Type0 fonts use two-byte codes
    pub two_byte: bool,
}

impl FontCMap {
    pub fn decode(&self, bytes: &[u8]) -> String {
        if self.two_byte {
            self.cmap.decode_cids(bytes)
        } else {
            self.cmap.decode_single(bytes)
        }
    }
}

/// ToUnicode CMaps of one page, keyed by font resource name (e.g. "F1")
#[derive(Debug, Default)]
pub struct FontCMaps {
    pub by_name: HashMap<String, FontCMap>,
}

impl FontCMaps {
    /// Resolve the CMaps of every font on a page
    pub fn for_page(doc: &Document, page_id: ObjectId) -> Self {
        let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
        let mut by_name = HashMap::new();

        for (name, font) in fonts {
            if let Some(cmap) = font_cmap(doc, font) {
                let two_byte = matches!(font.get(b"Subtype").and_then(Object::as_name), Ok(b"Type0"));
                by_name.insert(
                    String::from_utf8_lossy(&name).to_string(),
                    FontCMap { cmap, two_byte },
                );
            }
        }

        FontCMaps { by_name }
    }

    pub fn get(&self, font_name: &str) -> Option<&FontCMap> {
        self.by_name.get(font_name)
    }
}

/// Parse the ToUnicode stream referenced by a font dictionary
fn font_cmap(doc: &Document, font: &Dictionary) -> Option<ToUnicodeCMap> {
    let stream = match font.get(b"ToUnicode").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_stream().ok()?,
        Object::Stream(stream) => stream,
        _ => return None,
    };
    ToUnicodeCMap::parse(&stream_bytes(stream))
}

/// Decompressed stream content, falling back to a raw zlib inflate and then
/// to the bytes as stored
fn stream_bytes(stream: &Stream) -> Vec<u8> {
    if let Ok(data) = stream.decompressed_content() {
        return data;
    }

    let mut decoder = ZlibDecoder::new(stream.content.as_slice());
    let mut inflated = Vec::new();
    if decoder.read_to_end(&mut inflated).is_ok() {
        inflated
    } else {
        stream.content.clone()
    }
}
