//! Style table shared by every sheet of a stream file.
//!
//! Excel stores cell formats as an array (`cellXfs`) addressed by index. The
//! package always predefines [`BUILTIN_STYLE_COUNT`] formats; each distinct
//! header type signature observed while writing gets one more format, which
//! the sheet's data rows point at. Identical signatures share an index, so
//! repeated schemas never grow the table.

#[cfg(feature = "fast-hash")]
use hashbrown::HashMap;
#[cfg(not(feature = "fast-hash"))]
use std::collections::HashMap;

use crate::cell::CellType;

/// Number of cell formats every package defines before any signature is seen.
pub const BUILTIN_STYLE_COUNT: u32 = 2;
/// The highest built-in style id; new signatures are numbered after it.
pub const INITIAL_MAX_STYLE_ID: u32 = BUILTIN_STYLE_COUNT - 1;
/// Built-in style used by every cell written as [`CellType::Date`].
pub const DATE_STYLE_ID: u32 = 1;
/// Built-in number format id for dates (`mm-dd-yy`).
pub const DATE_NUM_FMT_ID: u32 = 14;

/// The canonical per-column types of a sheet header.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StyleSignature(Vec<CellType>);

impl StyleSignature {
    /// Build a signature from declared column defaults. Missing defaults and
    /// explicit `String` defaults both become `InlineString`.
    pub fn from_column_types(types: &[Option<CellType>]) -> Self {
        StyleSignature(
            types
                .iter()
                .map(|t| t.map_or(CellType::InlineString, CellType::canonical))
                .collect(),
        )
    }

    /// The canonical column types.
    pub fn types(&self) -> &[CellType] {
        &self.0
    }
}

/// Maps header signatures to style ids in first-seen order.
#[derive(Clone, Debug)]
pub struct StyleTable {
    ids: HashMap<StyleSignature, u32>,
    order: Vec<StyleSignature>,
    max_style_id: u32,
}

impl StyleTable {
    /// Create an empty table; the first signature gets `INITIAL_MAX_STYLE_ID + 1`.
    pub fn new() -> Self {
        StyleTable {
            ids: HashMap::new(),
            order: Vec::new(),
            max_style_id: INITIAL_MAX_STYLE_ID,
        }
    }

    /// Get the id of `signature`, assigning the next one if it is new.
    pub fn get_or_add(&mut self, signature: &StyleSignature) -> u32 {
        if let Some(id) = self.get(signature) {
            return id;
        }
        self.max_style_id += 1;
        let id = self.max_style_id;
        self.ids.insert(signature.clone(), id);
        self.order.push(signature.clone());
        log::debug!("style {} assigned to signature {:?}", id, signature.types());
        id
    }

    /// The id already assigned to `signature`, if any.
    pub fn get(&self, signature: &StyleSignature) -> Option<u32> {
        self.ids.get(signature).copied()
    }

    /// Number of distinct signatures seen.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Signatures in the order their ids were assigned.
    pub fn signatures(&self) -> impl Iterator<Item = &StyleSignature> {
        self.order.iter()
    }

    /// Total cell formats in the style sheet: built-ins plus one per signature.
    pub fn style_count(&self) -> u32 {
        BUILTIN_STYLE_COUNT + self.order.len() as u32
    }

    /// Render `xl/styles.xml` for the current state of the table.
    pub fn to_styles_xml(&self) -> String {
        let mut xml = String::with_capacity(1024 + 64 * self.order.len());
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
"#);

        let mut count = itoa::Buffer::new();
        xml.push_str("<cellXfs count=\"");
        xml.push_str(count.format(self.style_count()));
        xml.push_str("\">");
        xml.push_str(r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#);
        xml.push_str(r#"<xf numFmtId=""#);
        xml.push_str(count.format(DATE_NUM_FMT_ID));
        xml.push_str(r#"" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#);
        for signature in self.signatures() {
            log::trace!("cell format for signature {:?}", signature.types());
            xml.push_str(r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#);
        }
        xml.push_str("</cellXfs>\n");

        xml.push_str(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#);
        xml
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}
