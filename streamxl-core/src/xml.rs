//! XML fragments for worksheet rows and cells.
//!
//! All caller-supplied text goes through [`push_escaped_text`], so cell
//! content can never be read back as markup, whatever it contains.

use quick_xml::escape::escape;

use crate::cell::{CellType, ResolvedCell};
use crate::style::DATE_STYLE_ID;
use crate::utils::push_coordinate;

/// Append `text` escaped for use as element content or a quoted attribute value.
///
/// Markup characters become entity references. Characters XML 1.0 cannot
/// carry (control characters other than tab and newline, U+FFFE, U+FFFF) use
/// the OOXML `_xHHHH_` form, and text that already looks like `_xHHHH_` has
/// its underscore protected as `_x005F_` so a reader does not decode it.
/// Carriage returns are written as a character reference to survive
/// line-ending normalization.
pub fn push_escaped_text(out: &mut String, text: &str) {
    if !text.chars().any(needs_ooxml_escape) && !text.contains("_x") {
        out.push_str(&escape(text));
        return;
    }

    let mut plain_start = 0;
    for (idx, ch) in text.char_indices() {
        let replacement = if ch == '\r' {
            Some(Replacement::CharRef)
        } else if needs_ooxml_escape(ch) {
            Some(Replacement::Ooxml(ch as u32))
        } else if ch == '_' && is_ooxml_escape_sequence(&text[idx..]) {
            Some(Replacement::Ooxml('_' as u32))
        } else {
            None
        };

        if let Some(replacement) = replacement {
            out.push_str(&escape(&text[plain_start..idx]));
            match replacement {
                Replacement::CharRef => out.push_str("&#xD;"),
                Replacement::Ooxml(code) => push_ooxml_escape(out, code),
            }
            plain_start = idx + ch.len_utf8();
        }
    }
    out.push_str(&escape(&text[plain_start..]));
}

enum Replacement {
    CharRef,
    Ooxml(u32),
}

fn needs_ooxml_escape(ch: char) -> bool {
    matches!(ch, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
        || ch == '\r'
}

/// `_xHHHH_` with exactly four hex digits.
fn is_ooxml_escape_sequence(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

fn push_ooxml_escape(out: &mut String, code: u32) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.push_str("_x");
    for shift in [12, 8, 4, 0] {
        out.push(HEX[((code >> shift) & 0xF) as usize] as char);
    }
    out.push('_');
}

/// Append one `<c>` element for a resolved cell at (`row`, `column`).
pub fn push_cell(out: &mut String, row: u32, column: u32, cell: &ResolvedCell<'_>) {
    out.push_str("<c r=\"");
    push_coordinate(out, row, column);
    out.push('"');

    if cell.cell_type == CellType::Date {
        let mut buf = itoa::Buffer::new();
        out.push_str(" s=\"");
        out.push_str(buf.format(DATE_STYLE_ID));
        out.push('"');
    }
    if let Some(t) = cell.cell_type.type_attribute() {
        out.push_str(" t=\"");
        out.push_str(t);
        out.push('"');
    }

    match cell.cell_type {
        CellType::String | CellType::InlineString => {
            let value = cell.value.as_ref();
            if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
                out.push_str(r#"><is><t xml:space="preserve">"#);
            } else {
                out.push_str("><is><t>");
            }
            push_escaped_text(out, value);
            out.push_str("</t></is></c>");
        }
        _ => {
            out.push_str("><v>");
            push_escaped_text(out, &cell.value);
            out.push_str("</v></c>");
        }
    }
}

/// Append a `<row>` start tag. `style_id` marks every cell of the row with
/// that format.
pub fn push_row_start(out: &mut String, row: u32, width: usize, style_id: Option<u32>) {
    let mut buf = itoa::Buffer::new();
    out.push_str("<row r=\"");
    out.push_str(buf.format(row));
    out.push('"');
    if width > 0 {
        out.push_str(" spans=\"1:");
        out.push_str(buf.format(width));
        out.push('"');
    }
    if let Some(id) = style_id {
        out.push_str(" s=\"");
        out.push_str(buf.format(id));
        out.push_str("\" customFormat=\"1\"");
    }
    out.push('>');
}

pub fn push_row_end(out: &mut String) {
    out.push_str("</row>");
}
