//! Forward-only streaming writer for Excel xlsx packages.
//!
//! Sheets are declared up front on a [`StreamFileBuilder`], each with a
//! header row and optional per-column default types. [`StreamFileBuilder::build`]
//! returns a [`StreamFile`] positioned on the first sheet; rows are written
//! to the active sheet, [`StreamFile::next_sheet`] moves forward, and
//! [`StreamFile::close`] finishes every remaining sheet and the package.
//!
//! ```no_run
//! use streamxl_core::{CellType, StreamFileBuilder};
//!
//! let mut builder = StreamFileBuilder::create("report.xlsx")?;
//! builder.add_sheet(
//!     "Prices",
//!     ["Token", "Name", "Price"],
//!     Some(vec![Some(CellType::Numeric), None, Some(CellType::Numeric)]),
//! )?;
//! builder.add_sheet("Notes", ["Note"], None)?;
//!
//! let mut file = builder.build()?;
//! file.write_row_with_default_types(&["123", "Taco", "300"])?;
//! file.next_sheet()?;
//! file.write_row(&["prices are per unit"])?;
//! file.close()?;
//! # Ok::<(), streamxl_core::StreamError>(())
//! ```

pub mod builder;
pub mod cell;
pub mod error;
pub mod package;
pub mod streaming;
pub mod style;
pub mod utils;
pub mod xml;

pub use builder::{SheetSpec, StreamFileBuilder, MAX_SHEET_NAME_LEN};
pub use cell::{resolve, CellType, ResolvedCell, ERROR_LITERALS};
pub use error::{Result, StreamError};
pub use package::{CompressionLevel, WriterOptions};
pub use streaming::{resolve_row, StreamFile};
pub use style::{StyleSignature, StyleTable, BUILTIN_STYLE_COUNT};
pub use utils::{column_to_letter, MAX_COLUMN, MAX_ROW};
