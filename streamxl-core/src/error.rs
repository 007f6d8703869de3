//! Error types for the streaming writer.

use thiserror::Error;

use crate::utils::{MAX_COLUMN, MAX_ROW};

/// Errors raised while registering sheets or streaming rows.
#[derive(Error, Debug)]
pub enum StreamError {
    /// A sheet with this exact name was already registered.
    #[error("duplicate sheet name '{0}'.")]
    DuplicateSheetName(String),

    /// The sheet name cannot be stored in a workbook.
    #[error("invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: &'static str },

    /// More default column types than header columns.
    #[error("sheet '{sheet}' declares {types} column types but its header has {columns} columns")]
    TooManyColumnTypes {
        sheet: String,
        types: usize,
        columns: usize,
    },

    /// Header wider than a worksheet allows.
    #[error("sheet '{sheet}' has {columns} columns, the maximum is {max}", max = MAX_COLUMN)]
    TooManyColumns { sheet: String, columns: usize },

    /// A written row does not have the same width as the sheet header.
    #[error("invalid number of cells passed to write: expected {expected}, got {actual}")]
    WrongRowLength { expected: usize, actual: usize },

    /// The active sheet already holds the maximum number of rows.
    #[error("sheet '{0}' already has {max} rows", max = MAX_ROW)]
    RowLimitExceeded(String),

    /// `next_sheet` was called while the last registered sheet is active.
    #[error("cannot advance: already on the last sheet")]
    AlreadyOnLastSheet,

    /// The builder was used after `build`.
    #[error("stream file builder has already been built")]
    BuilderAlreadyBuilt,

    /// `build` was called before any sheet was registered.
    #[error("workbook has no sheets")]
    NoWorksheets,

    /// The stream file was used after `close`.
    #[error("stream file is closed")]
    Closed,

    /// An earlier I/O or zip failure left the package unusable.
    #[error("stream file is unusable after an earlier write failure")]
    Failed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl StreamError {
    /// Whether this error came from the output sink rather than from the caller.
    pub fn is_sink_failure(&self) -> bool {
        matches!(self, StreamError::Io(_) | StreamError::Zip(_))
    }
}

/// Result type for streaming writer operations.
pub type Result<T> = std::result::Result<T, StreamError>;
