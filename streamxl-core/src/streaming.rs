//! Streaming write phase: rows go out sheet by sheet, forward only.
//!
//! A [`StreamFile`] is produced by
//! [`StreamFileBuilder::build`](crate::builder::StreamFileBuilder::build) with
//! the first registered sheet active. Rows of the active sheet are rendered
//! as they arrive and spilled to an anonymous temporary file, so memory use
//! does not grow with the row count. When the sheet is left (by
//! [`StreamFile::next_sheet`] or [`StreamFile::close`]) the spilled rows are
//! copied into the package behind the final dimension. Sheets can never be
//! revisited.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};

use crate::builder::SheetSpec;
use crate::cell::{resolve, ResolvedCell};
use crate::error::{Result, StreamError};
use crate::package::{Package, WriterOptions};
use crate::style::{StyleSignature, StyleTable};
use crate::utils::{dimension_ref, MAX_ROW};
use crate::xml::{push_cell, push_row_end, push_row_start};

const SPILL_BUFFER_SIZE: usize = 64 * 1024;

/// The sheet currently accepting rows.
struct ActiveSheet {
    index: usize,
    style_id: u32,
    /// Rows rendered so far, header included.
    rows: u32,
    spill: BufWriter<File>,
    /// Scratch space for the row being rendered.
    row_buf: String,
}

enum State<W: Write + Seek> {
    Open {
        package: Package<W>,
        active: ActiveSheet,
    },
    Closed(W),
    /// A sink error escaped; nothing more can be written.
    Failed,
}

impl<W: Write + Seek> State<W> {
    fn unavailable(&self) -> StreamError {
        match self {
            State::Failed => StreamError::Failed,
            _ => StreamError::Closed,
        }
    }
}

/// A write-only workbook whose sheets were fixed by a
/// [`StreamFileBuilder`](crate::builder::StreamFileBuilder).
///
/// Calling `close` a second time, or writing after `close`, fails with
/// [`StreamError::Closed`]. An I/O or zip error from the sink is returned
/// once and leaves the stream file in a failed state where every later call
/// returns [`StreamError::Failed`]; partially written output is not undone.
pub struct StreamFile<W: Write + Seek> {
    sheets: Vec<SheetSpec>,
    styles: StyleTable,
    state: State<W>,
}

impl<W: Write + Seek> StreamFile<W> {
    pub(crate) fn new(writer: W, options: &WriterOptions, sheets: Vec<SheetSpec>) -> Result<Self> {
        let mut styles = StyleTable::new();
        let active = start_sheet(0, &sheets[0], &mut styles)?;
        Ok(StreamFile {
            state: State::Open {
                package: Package::new(writer, options),
                active,
            },
            sheets,
            styles,
        })
    }

    /// Write a row of text cells to the active sheet.
    ///
    /// Column default types are not applied; every cell is written as an
    /// inline string.
    pub fn write_row<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        self.write(values, false)
    }

    /// Write a row to the active sheet, typing each cell by its column default.
    ///
    /// A cell whose value does not parse under its column's default type is
    /// written as an inline string.
    pub fn write_row_with_default_types<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        self.write(values, true)
    }

    /// Write several rows with [`write_row`](Self::write_row).
    pub fn write_all<I, R, S>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        for row in rows {
            self.write(row.as_ref(), false)?;
        }
        Ok(())
    }

    /// Write several rows with
    /// [`write_row_with_default_types`](Self::write_row_with_default_types).
    pub fn write_all_with_default_types<I, R, S>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        for row in rows {
            self.write(row.as_ref(), true)?;
        }
        Ok(())
    }

    fn write<S: AsRef<str>>(&mut self, values: &[S], use_declared_types: bool) -> Result<()> {
        let active = match &mut self.state {
            State::Open { active, .. } => active,
            other => return Err(other.unavailable()),
        };
        let sheet = &self.sheets[active.index];

        if values.len() != sheet.width() {
            return Err(StreamError::WrongRowLength {
                expected: sheet.width(),
                actual: values.len(),
            });
        }
        if active.rows >= MAX_ROW {
            return Err(StreamError::RowLimitExceeded(sheet.name().to_string()));
        }

        let row = active.rows + 1;
        active.row_buf.clear();
        push_row_start(&mut active.row_buf, row, sheet.width(), Some(active.style_id));
        for (col, (value, declared)) in values.iter().zip(sheet.column_types()).enumerate() {
            let cell = resolve(value.as_ref(), *declared, use_declared_types);
            push_cell(&mut active.row_buf, row, col as u32 + 1, &cell);
        }
        push_row_end(&mut active.row_buf);
        if let Err(e) = active.spill.write_all(active.row_buf.as_bytes()) {
            self.state = State::Failed;
            return Err(e.into());
        }
        active.rows = row;

        log::trace!("wrote row {} of sheet '{}'", row, sheet.name());
        Ok(())
    }

    /// Finish the active sheet and make the next registered sheet active.
    pub fn next_sheet(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Failed) {
            State::Open {
                mut package,
                active,
            } => {
                let next = active.index + 1;
                if next >= self.sheets.len() {
                    self.state = State::Open { package, active };
                    return Err(StreamError::AlreadyOnLastSheet);
                }
                finish_sheet(&mut package, &self.sheets[active.index], active)?;
                let active = start_sheet(next, &self.sheets[next], &mut self.styles)?;
                self.state = State::Open { package, active };
                Ok(())
            }
            other => {
                let err = other.unavailable();
                self.state = other;
                Err(err)
            }
        }
    }

    /// Finish the active sheet and every sheet after it, then write the style
    /// sheet and workbook parts and finish the package.
    ///
    /// Sheets that were never made active are written with their header only.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Failed) {
            State::Open {
                mut package,
                active,
            } => {
                let mut index = active.index;
                finish_sheet(&mut package, &self.sheets[index], active)?;
                while index + 1 < self.sheets.len() {
                    index += 1;
                    let pending = start_sheet(index, &self.sheets[index], &mut self.styles)?;
                    finish_sheet(&mut package, &self.sheets[index], pending)?;
                }

                let names: Vec<String> = self.sheets.iter().map(|s| s.name().to_string()).collect();
                let writer = package.finish(&names, &self.styles)?;
                log::debug!(
                    "closed stream file: {} sheets, {} cell styles",
                    names.len(),
                    self.styles.style_count()
                );
                self.state = State::Closed(writer);
                Ok(())
            }
            other => {
                let err = other.unavailable();
                self.state = other;
                Err(err)
            }
        }
    }

    /// Close the stream file if needed and return the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        if let State::Open { .. } = self.state {
            self.close()?;
        }
        match self.state {
            State::Closed(writer) => Ok(writer),
            other => Err(other.unavailable()),
        }
    }

    /// The registered sheets, in order.
    pub fn sheets(&self) -> &[SheetSpec] {
        &self.sheets
    }

    /// Index of the sheet accepting rows, or `None` once closed or failed.
    pub fn current_sheet_index(&self) -> Option<usize> {
        match &self.state {
            State::Open { active, .. } => Some(active.index),
            _ => None,
        }
    }

    /// The sheet accepting rows, or `None` once closed or failed.
    pub fn current_sheet(&self) -> Option<&SheetSpec> {
        self.current_sheet_index().map(|i| &self.sheets[i])
    }

    /// Data rows written to the active sheet, header excluded.
    pub fn rows_written(&self) -> Option<u32> {
        match &self.state {
            State::Open { active, .. } => Some(active.rows - 1),
            _ => None,
        }
    }

    /// Style id of the active sheet's data rows.
    pub fn current_style_id(&self) -> Option<u32> {
        match &self.state {
            State::Open { active, .. } => Some(active.style_id),
            _ => None,
        }
    }

    /// The style table accumulated so far.
    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed(_))
    }
}

/// Make sheet `index` active: assign its style id and render its header row.
fn start_sheet(index: usize, sheet: &SheetSpec, styles: &mut StyleTable) -> Result<ActiveSheet> {
    let signature = StyleSignature::from_column_types(sheet.column_types());
    let style_id = styles.get_or_add(&signature);

    let mut row_buf = String::with_capacity(256);
    push_row_start(&mut row_buf, 1, sheet.width(), None);
    for (col, label) in sheet.header().iter().enumerate() {
        let cell = resolve(label, None, false);
        push_cell(&mut row_buf, 1, col as u32 + 1, &cell);
    }
    push_row_end(&mut row_buf);

    let mut spill = BufWriter::with_capacity(SPILL_BUFFER_SIZE, tempfile::tempfile()?);
    spill.write_all(row_buf.as_bytes())?;

    log::debug!("sheet '{}' active with style {}", sheet.name(), style_id);
    Ok(ActiveSheet {
        index,
        style_id,
        rows: 1,
        spill,
        row_buf,
    })
}

/// Copy a completed sheet's spilled rows into its part.
fn finish_sheet<W: Write + Seek>(
    package: &mut Package<W>,
    sheet: &SheetSpec,
    active: ActiveSheet,
) -> Result<()> {
    let dimension = dimension_ref(active.rows, sheet.width() as u32);
    let mut rows = active.spill.into_inner().map_err(|e| e.into_error())?;
    rows.seek(SeekFrom::Start(0))?;
    package.write_worksheet(active.index + 1, &dimension, &mut rows)?;
    log::debug!(
        "finished sheet '{}': {} data rows, dimension {}",
        sheet.name(),
        active.rows - 1,
        dimension
    );
    Ok(())
}

/// Resolve a row the way [`StreamFile::write_row_with_default_types`] would,
/// without a stream file. Useful for inspecting how values will be typed.
pub fn resolve_row<'a, S: AsRef<str>>(sheet: &SheetSpec, values: &'a [S]) -> Vec<ResolvedCell<'a>> {
    values
        .iter()
        .zip(sheet.column_types())
        .map(|(value, declared)| resolve(value.as_ref(), *declared, true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StreamFileBuilder;
    use crate::cell::CellType;
    use crate::style::INITIAL_MAX_STYLE_ID;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn sheet_xml(bytes: &[u8], number: usize) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive
            .by_name(&format!("xl/worksheets/sheet{}.xml", number))
            .unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    fn two_sheet_file() -> StreamFile<Cursor<Vec<u8>>> {
        let mut builder = StreamFileBuilder::new(Cursor::new(Vec::new()));
        builder
            .add_sheet(
                "Sheet 1",
                ["Token", "Name", "Price", "SKU"],
                Some(vec![Some(CellType::Numeric), None, Some(CellType::Numeric)]),
            )
            .unwrap();
        builder.add_sheet("Sheet 2", ["Header3", "Header4"], None).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_first_sheet_is_active_after_build() {
        let file = two_sheet_file();
        assert_eq!(file.current_sheet_index(), Some(0));
        assert_eq!(file.current_sheet().unwrap().name(), "Sheet 1");
        assert_eq!(file.rows_written(), Some(0));
        assert_eq!(file.current_style_id(), Some(INITIAL_MAX_STYLE_ID + 1));
    }

    #[test]
    fn test_write_row_checks_width() {
        let mut file = two_sheet_file();
        let err = file.write_row(&["123", "Taco", "300", "0000000123", "asdf"]).unwrap_err();
        assert!(matches!(err, StreamError::WrongRowLength { expected: 4, actual: 5 }));
        let err = file.write_row(&["123", "Taco", "300"]).unwrap_err();
        assert!(matches!(err, StreamError::WrongRowLength { expected: 4, actual: 3 }));

        // A rejected row leaves the sheet usable.
        file.write_row(&["123", "Taco", "300", "0000000123"]).unwrap();
        assert_eq!(file.rows_written(), Some(1));
    }

    #[test]
    fn test_rows_spill_out_of_memory() {
        let mut file = two_sheet_file();
        for i in 0..20_000 {
            file.write_row(&[i.to_string(), "Taco".into(), "300".into(), "0000000123".into()])
                .unwrap();
        }
        match &file.state {
            State::Open { active, .. } => {
                assert!(active.row_buf.capacity() < 1024);
                assert!(active.spill.buffer().len() <= SPILL_BUFFER_SIZE);
                let spilled = active.spill.get_ref().metadata().unwrap().len();
                assert!(spilled > 1_000_000, "only {spilled} bytes spilled");
            }
            _ => panic!("stream file should still be open"),
        }

        let bytes = file.into_inner().unwrap().into_inner();
        let xml = sheet_xml(&bytes, 1);
        assert!(xml.contains(r#"<dimension ref="A1:D20001"/>"#));
        assert!(xml.contains(r#"<c r="A20001" t="inlineStr"><is><t>19999</t></is></c>"#));
        assert!(xml.ends_with("</sheetData>\n<pageMargins left=\"0.75\" right=\"0.75\" top=\"1\" bottom=\"1\" header=\"0.5\" footer=\"0.5\"/>\n</worksheet>"));
    }

    #[test]
    fn test_next_sheet_moves_forward_only() {
        let mut file = two_sheet_file();
        file.next_sheet().unwrap();
        assert_eq!(file.current_sheet_index(), Some(1));
        assert!(matches!(file.next_sheet(), Err(StreamError::AlreadyOnLastSheet)));
        assert_eq!(file.current_sheet_index(), Some(1));
        file.write_row(&["a", "b"]).unwrap();
        file.close().unwrap();
    }

    #[test]
    fn test_close_twice_and_write_after_close() {
        let mut file = two_sheet_file();
        file.close().unwrap();
        assert!(file.is_closed());
        assert!(matches!(file.close(), Err(StreamError::Closed)));
        assert!(matches!(file.write_row(&["a", "b", "c", "d"]), Err(StreamError::Closed)));
        assert!(matches!(file.next_sheet(), Err(StreamError::Closed)));
        assert_eq!(file.current_sheet_index(), None);
        assert!(file.into_inner().is_ok());
    }

    #[test]
    fn test_typed_row_xml() {
        let mut file = two_sheet_file();
        file.write_row_with_default_types(&["123", "Taco", "variable", "0000000123"])
            .unwrap();
        file.write_row(&["456", "Salsa", "200", "0346"]).unwrap();
        let bytes = file.into_inner().unwrap().into_inner();

        let xml = sheet_xml(&bytes, 1);
        assert!(xml.contains(r#"<dimension ref="A1:D3"/>"#));
        assert!(xml.contains(r#"<c r="A2"><v>123</v></c>"#));
        assert!(xml.contains(r#"<c r="C2" t="inlineStr"><is><t>variable</t></is></c>"#));
        assert!(xml.contains(r#"<c r="D2" t="inlineStr"><is><t>0000000123</t></is></c>"#));
        // Untyped writes ignore the column defaults.
        assert!(xml.contains(r#"<c r="A3" t="inlineStr"><is><t>456</t></is></c>"#));

        let second = sheet_xml(&bytes, 2);
        assert!(second.contains(r#"<dimension ref="A1:B1"/>"#));
        assert!(second.contains("<t>Header4</t>"));
    }

    #[test]
    fn test_close_flushes_unvisited_sheets() {
        let mut builder = StreamFileBuilder::new(Cursor::new(Vec::new()));
        builder.add_sheet("One", ["A"], None).unwrap();
        builder.add_sheet("Two", ["B", "C"], Some(vec![Some(CellType::Date)])).unwrap();
        builder.add_sheet("Three", Vec::<String>::new(), None).unwrap();
        let mut file = builder.build().unwrap();
        file.close().unwrap();

        assert_eq!(file.styles().len(), 3);
        let bytes = file.into_inner().unwrap().into_inner();
        assert!(sheet_xml(&bytes, 2).contains("<t>C</t>"));
        assert!(sheet_xml(&bytes, 3).contains(r#"<dimension ref="A1"/>"#));
        assert!(sheet_xml(&bytes, 3).contains(r#"<row r="1"></row>"#));
    }

    #[test]
    fn test_resolve_row_applies_defaults() {
        let file = two_sheet_file();
        let cells = resolve_row(&file.sheets()[0], &["123", "Taco", "variable", "9"]);
        let types: Vec<CellType> = cells.iter().map(|c| c.cell_type).collect();
        assert_eq!(
            types,
            vec![
                CellType::Numeric,
                CellType::InlineString,
                CellType::InlineString,
                CellType::InlineString
            ]
        );
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for BrokenSink {
        fn seek(&mut self, _pos: std::io::SeekFrom) -> std::io::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_sink_failure_is_fatal() {
        let mut builder = StreamFileBuilder::new(BrokenSink);
        builder.add_sheet("One", ["A"], None).unwrap();
        builder.add_sheet("Two", ["B"], None).unwrap();
        let mut file = builder.build().unwrap();
        file.write_row(&["x"]).unwrap();

        let err = file.next_sheet().unwrap_err();
        assert!(err.is_sink_failure());
        assert!(matches!(file.write_row(&["y"]), Err(StreamError::Failed)));
        assert!(matches!(file.close(), Err(StreamError::Failed)));
    }
}
