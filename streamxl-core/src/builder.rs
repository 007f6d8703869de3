//! Sheet registration before any row is streamed.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::cell::CellType;
use crate::error::{Result, StreamError};
use crate::package::WriterOptions;
use crate::streaming::StreamFile;
use crate::utils::MAX_COLUMN;

/// Longest sheet name a workbook accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const INVALID_SHEET_NAME_CHARS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

/// A registered sheet: its name, header row and per-column default types.
#[derive(Clone, Debug, PartialEq)]
pub struct SheetSpec {
    name: String,
    header: Vec<String>,
    column_types: Vec<Option<CellType>>,
}

impl SheetSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Default type of every column, `None` where the column has none.
    /// Always as long as the header.
    pub fn column_types(&self) -> &[Option<CellType>] {
        &self.column_types
    }

    /// Number of cells every row of this sheet must have.
    pub fn width(&self) -> usize {
        self.header.len()
    }
}

struct Registration<W> {
    writer: W,
    options: WriterOptions,
    sheets: Vec<SheetSpec>,
}

/// Collects the sheets of a stream file, then turns into a [`StreamFile`].
///
/// Every sheet has to be registered before the first row is written; `build`
/// moves the sink and the sheet list into the stream file, after which the
/// builder rejects every call with [`StreamError::BuilderAlreadyBuilt`].
///
/// # Example
/// ```no_run
/// use std::io::Cursor;
/// use streamxl_core::{CellType, StreamFileBuilder};
///
/// let mut builder = StreamFileBuilder::new(Cursor::new(Vec::new()));
/// builder.add_sheet("Prices", ["Token", "Price"], Some(vec![None, Some(CellType::Numeric)])).unwrap();
/// builder.add_sheet("Notes", ["Note"], None).unwrap();
///
/// let mut file = builder.build().unwrap();
/// file.write_row_with_default_types(&["123", "300"]).unwrap();
/// file.next_sheet().unwrap();
/// file.write_row(&["call back"]).unwrap();
/// file.close().unwrap();
/// ```
pub struct StreamFileBuilder<W: Write + Seek> {
    registration: Option<Registration<W>>,
}

impl StreamFileBuilder<BufWriter<File>> {
    /// Create a builder that writes to a new file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_options(path, WriterOptions::default())
    }

    /// Create a builder that writes to a new file at `path` with `options`.
    pub fn create_with_options<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let file = File::create(path.as_ref()).map_err(|e| {
            StreamError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create file '{}': {}", path.as_ref().display(), e),
            ))
        })?;
        let writer = BufWriter::with_capacity(1024 * 1024, file);
        Ok(Self::with_options(writer, options))
    }
}

impl<W: Write + Seek> StreamFileBuilder<W> {
    /// Create a builder writing to `writer` with default options.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, WriterOptions::default())
    }

    pub fn with_options(writer: W, options: WriterOptions) -> Self {
        StreamFileBuilder {
            registration: Some(Registration {
                writer,
                options,
                sheets: Vec::new(),
            }),
        }
    }

    /// Register a sheet.
    ///
    /// `header` is written as the first row and fixes how many cells every
    /// later row must have. `column_types` gives default types for the
    /// leading columns; it may be shorter than the header but not longer.
    pub fn add_sheet<I, S>(
        &mut self,
        name: impl Into<String>,
        header: I,
        column_types: Option<Vec<Option<CellType>>>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registration = self
            .registration
            .as_mut()
            .ok_or(StreamError::BuilderAlreadyBuilt)?;

        let name = name.into();
        if registration.sheets.iter().any(|s| s.name == name) {
            return Err(StreamError::DuplicateSheetName(name));
        }
        validate_sheet_name(&name)?;

        let header: Vec<String> = header.into_iter().map(Into::into).collect();
        if header.len() > MAX_COLUMN as usize {
            return Err(StreamError::TooManyColumns {
                sheet: name,
                columns: header.len(),
            });
        }

        let mut column_types = column_types.unwrap_or_default();
        if column_types.len() > header.len() {
            return Err(StreamError::TooManyColumnTypes {
                sheet: name,
                types: column_types.len(),
                columns: header.len(),
            });
        }
        column_types.resize(header.len(), None);

        log::debug!(
            "registered sheet '{}' with {} columns ({} typed)",
            name,
            header.len(),
            column_types.iter().filter(|t| t.is_some()).count()
        );
        registration.sheets.push(SheetSpec {
            name,
            header,
            column_types,
        });
        Ok(())
    }

    /// Names registered so far, in order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.registration
            .iter()
            .flat_map(|r| r.sheets.iter().map(|s| s.name()))
            .collect()
    }

    /// Freeze the registered sheets and start writing the first one.
    pub fn build(&mut self) -> Result<StreamFile<W>> {
        let registration = self
            .registration
            .take()
            .ok_or(StreamError::BuilderAlreadyBuilt)?;

        if registration.sheets.is_empty() {
            self.registration = Some(registration);
            return Err(StreamError::NoWorksheets);
        }

        log::debug!("building stream file with {} sheets", registration.sheets.len());
        StreamFile::new(
            registration.writer,
            &registration.options,
            registration.sheets,
        )
    }
}

fn validate_sheet_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "sheet name cannot be empty"
    } else if name.chars().count() > MAX_SHEET_NAME_LEN {
        "sheet name must be 31 or fewer characters long"
    } else if name.contains(&INVALID_SHEET_NAME_CHARS[..]) {
        "sheet name cannot contain any of : \\ / ? * [ ]"
    } else if name.contains(char::is_control) {
        "sheet name cannot contain control characters"
    } else if name.starts_with('\'') || name.ends_with('\'') {
        "sheet name cannot start or end with an apostrophe"
    } else {
        return Ok(());
    };

    Err(StreamError::InvalidSheetName {
        name: name.to_string(),
        reason,
    })
}
