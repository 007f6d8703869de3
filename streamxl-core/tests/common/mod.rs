//! Minimal xlsx reader used to check what the stream writer produced.

#![allow(dead_code)]

use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use streamxl_core::utils::push_coordinate;
use streamxl_core::CellType;
use zip::ZipArchive;

#[derive(Debug, Clone, PartialEq)]
pub struct ReadCell {
    pub reference: String,
    pub cell_type: CellType,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReadRow {
    pub number: u32,
    pub style: Option<u32>,
    pub cells: Vec<ReadCell>,
}

#[derive(Debug, Clone)]
pub struct ReadSheet {
    pub name: String,
    pub dimension: String,
    pub rows: Vec<ReadRow>,
}

impl ReadSheet {
    /// Cell values row by row.
    pub fn values(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| r.cells.iter().map(|c| c.value.clone()).collect())
            .collect()
    }

    /// Cell types row by row.
    pub fn types(&self) -> Vec<Vec<CellType>> {
        self.rows
            .iter()
            .map(|r| r.cells.iter().map(|c| c.cell_type).collect())
            .collect()
    }
}

#[derive(Debug)]
pub struct ReadWorkbook {
    pub sheets: Vec<ReadSheet>,
    /// `numFmtId` of every `cellXfs` entry, in order.
    pub cell_xfs: Vec<u32>,
    /// The declared `cellXfs` count.
    pub cell_xfs_count: u32,
}

impl ReadWorkbook {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> &ReadSheet {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no sheet named {name:?}"))
    }
}

pub fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, path: &str) -> String {
    let mut file = archive
        .by_name(path)
        .unwrap_or_else(|e| panic!("missing part {path}: {e}"));
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

pub fn read_workbook(bytes: &[u8]) -> ReadWorkbook {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

    let names = parse_sheet_names(&read_part(&mut archive, "xl/workbook.xml"));
    let (cell_xfs_count, cell_xfs) = parse_cell_xfs(&read_part(&mut archive, "xl/styles.xml"));

    let sheets = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let xml = read_part(&mut archive, &format!("xl/worksheets/sheet{}.xml", i + 1));
            let (dimension, rows) = parse_worksheet(&xml, &cell_xfs);
            ReadSheet {
                name,
                dimension,
                rows,
            }
        })
        .collect();

    ReadWorkbook {
        sheets,
        cell_xfs,
        cell_xfs_count,
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| a.unescape_value().unwrap().into_owned())
}

fn reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    reader
}

fn parse_sheet_names(xml: &str) -> Vec<String> {
    let mut reader = reader(xml);
    let mut names = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"sheet" => {
                names.push(decode_ooxml(&attribute(&e, b"name").unwrap()));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    names
}

fn parse_cell_xfs(xml: &str) -> (u32, Vec<u32>) {
    let mut reader = reader(xml);
    let mut count = 0;
    let mut xfs = Vec::new();
    let mut in_cell_xfs = false;
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.name().as_ref() == b"cellXfs" => {
                in_cell_xfs = true;
                count = attribute(&e, b"count").unwrap().parse().unwrap();
            }
            Event::End(e) if e.name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Start(e) | Event::Empty(e) if in_cell_xfs && e.name().as_ref() == b"xf" => {
                xfs.push(attribute(&e, b"numFmtId").unwrap().parse().unwrap());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    (count, xfs)
}

fn cell_type(t: Option<&str>, style: Option<u32>, cell_xfs: &[u32]) -> CellType {
    match t {
        Some("inlineStr") | Some("str") => CellType::InlineString,
        Some("s") => CellType::String,
        Some("b") => CellType::Bool,
        Some("e") => CellType::Error,
        Some(other) => panic!("unexpected cell type {other:?}"),
        None => {
            let num_fmt = style.and_then(|s| cell_xfs.get(s as usize)).copied();
            match num_fmt {
                Some(14..=22) => CellType::Date,
                _ => CellType::Numeric,
            }
        }
    }
}

fn parse_worksheet(xml: &str, cell_xfs: &[u32]) -> (String, Vec<ReadRow>) {
    let mut reader = reader(xml);
    let mut dimension = String::new();
    let mut rows = Vec::new();
    let mut row: Option<ReadRow> = None;
    let mut cell: Option<ReadCell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event().unwrap() {
            Event::Empty(e) if e.name().as_ref() == b"dimension" => {
                dimension = attribute(&e, b"ref").unwrap();
            }
            Event::Start(e) if e.name().as_ref() == b"row" => {
                row = Some(start_row(&e));
            }
            Event::Empty(e) if e.name().as_ref() == b"row" => {
                rows.push(start_row(&e));
            }
            Event::End(e) if e.name().as_ref() == b"row" => {
                rows.extend(row.take());
            }
            Event::Start(e) if e.name().as_ref() == b"c" => {
                let t = attribute(&e, b"t");
                let style = attribute(&e, b"s").map(|s| s.parse().unwrap());
                cell = Some(ReadCell {
                    reference: attribute(&e, b"r").unwrap(),
                    cell_type: cell_type(t.as_deref(), style, cell_xfs),
                    value: String::new(),
                });
            }
            Event::End(e) if e.name().as_ref() == b"c" => {
                let mut done = cell.take().unwrap();
                done.value = decode_ooxml(&done.value);
                let current = row.as_mut().unwrap();
                let mut expected = String::new();
                push_coordinate(&mut expected, current.number, current.cells.len() as u32 + 1);
                assert_eq!(done.reference, expected, "cell reference out of place");
                current.cells.push(done);
            }
            Event::Start(e) if matches!(e.name().as_ref(), b"v" | b"t") => in_value = true,
            Event::End(e) if matches!(e.name().as_ref(), b"v" | b"t") => in_value = false,
            Event::Text(t) if in_value => {
                cell.as_mut().unwrap().value.push_str(&t.unescape().unwrap());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    (dimension, rows)
}

fn start_row(e: &BytesStart<'_>) -> ReadRow {
    ReadRow {
        number: attribute(e, b"r").unwrap().parse().unwrap(),
        style: attribute(e, b"s").map(|s| s.parse().unwrap()),
        cells: Vec::new(),
    }
}

/// Decode `_xHHHH_` escapes.
pub fn decode_ooxml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let bytes = candidate.as_bytes();
        let is_escape = bytes.len() >= 7
            && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
            && bytes[6] == b'_';
        if is_escape {
            let code = u32::from_str_radix(&candidate[2..6], 16).unwrap();
            out.push(char::from_u32(code).unwrap());
            rest = &candidate[7..];
        } else {
            out.push_str("_x");
            rest = &candidate[2..];
        }
    }
    out.push_str(rest);
    out
}
