#![no_main]

//! Streams arbitrary text through the writer and checks every worksheet part
//! is well-formed XML holding exactly the rows and cells that were written.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quick_xml::events::Event;
use std::io::{Cursor, Read};
use streamxl_core::{CellType, StreamError, StreamFileBuilder};
use zip::ZipArchive;

const MAX_SHEETS: usize = 4;
const MAX_COLUMNS: usize = 8;
const MAX_ROWS: usize = 32;

#[derive(Debug, Arbitrary)]
struct FuzzSheet {
    name: String,
    header: Vec<String>,
    numeric_first_column: bool,
    rows: Vec<Vec<String>>,
    typed: bool,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sheets: Vec<FuzzSheet>,
}

fn count_rows_and_cells(xml: &str) -> (usize, usize) {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let (mut rows, mut cells) = (0, 0);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"row" => rows += 1,
                b"c" => cells += 1,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                t.unescape().expect("cell text must unescape");
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("worksheet is not well-formed: {e}\n{xml}"),
        }
    }
    (rows, cells)
}

fuzz_target!(|input: FuzzInput| {
    let mut builder = StreamFileBuilder::new(Cursor::new(Vec::new()));
    let mut accepted = Vec::new();

    for sheet in input.sheets.into_iter().take(MAX_SHEETS) {
        let header: Vec<String> = sheet.header.into_iter().take(MAX_COLUMNS).collect();
        let types = sheet
            .numeric_first_column
            .then(|| vec![Some(CellType::Numeric)])
            .filter(|_| !header.is_empty());
        match builder.add_sheet(sheet.name, header.clone(), types) {
            Ok(()) => accepted.push((header.len(), sheet.rows, sheet.typed)),
            Err(StreamError::DuplicateSheetName(_)) | Err(StreamError::InvalidSheetName { .. }) => {}
            Err(e) => panic!("unexpected registration error: {e}"),
        }
    }

    let mut file = match builder.build() {
        Ok(file) => file,
        Err(StreamError::NoWorksheets) => return,
        Err(e) => panic!("unexpected build error: {e}"),
    };

    let mut expected = Vec::new();
    for (i, (width, rows, typed)) in accepted.iter().enumerate() {
        let mut written = 0;
        for row in rows.iter().take(MAX_ROWS) {
            let result = if *typed {
                file.write_row_with_default_types(row)
            } else {
                file.write_row(row)
            };
            match result {
                Ok(()) => written += 1,
                Err(StreamError::WrongRowLength { .. }) => assert_ne!(row.len(), *width),
                Err(e) => panic!("unexpected write error: {e}"),
            }
        }
        expected.push((1 + written, (1 + written) * width));
        if i + 1 < accepted.len() {
            file.next_sheet().expect("next sheet");
        }
    }

    let bytes = file.into_inner().expect("close").into_inner();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    for (i, (rows, cells)) in expected.into_iter().enumerate() {
        let mut xml = String::new();
        archive
            .by_name(&format!("xl/worksheets/sheet{}.xml", i + 1))
            .expect("sheet part")
            .read_to_string(&mut xml)
            .expect("utf-8 sheet part");
        assert_eq!(count_rows_and_cells(&xml), (rows, cells));
    }
});
