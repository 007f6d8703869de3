//! Cell types and the resolution of raw text into typed cell values.
//!
//! A column may declare a default [`CellType`]. The default is a hint: each
//! value is checked against it individually and falls back to an inline
//! string when it does not parse, so one column can mix typed and textual
//! cells.

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime};

/// The cell types a streamed value can be written as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellType {
    /// Text. Written as an inline string; kept distinct so callers can declare it.
    String,
    /// A finite floating point number.
    Numeric,
    /// A boolean, written as `1` or `0`.
    Bool,
    /// A date stored as a 1900-system serial number with a date format.
    Date,
    /// One of the spreadsheet error literals such as `#N/A`.
    Error,
    /// Text stored inside the cell element.
    InlineString,
}

/// Error literals accepted for [`CellType::Error`].
pub const ERROR_LITERALS: [&str; 7] = [
    "#NULL!", "#DIV/0!", "#VALUE!", "#REF!", "#NAME?", "#NUM!", "#N/A",
];

impl CellType {
    /// The type used for style signatures: `String` and `InlineString`
    /// encode identically, so both map to `InlineString`.
    pub fn canonical(self) -> CellType {
        match self {
            CellType::String => CellType::InlineString,
            other => other,
        }
    }

    /// The value of the `t` attribute for this type, if any.
    pub fn type_attribute(self) -> Option<&'static str> {
        match self {
            CellType::String | CellType::InlineString => Some("inlineStr"),
            CellType::Bool => Some("b"),
            CellType::Error => Some("e"),
            CellType::Numeric | CellType::Date => None,
        }
    }

    /// Interpret `value` under this type, returning its encoded form.
    pub fn coerce(self, value: &str) -> Option<Cow<'_, str>> {
        match self {
            CellType::String | CellType::InlineString => Some(Cow::Borrowed(value)),
            CellType::Numeric => parse_number(value).map(|_| Cow::Borrowed(value)),
            CellType::Bool => parse_bool(value).map(|b| Cow::Borrowed(if b { "1" } else { "0" })),
            CellType::Date => match parse_number(value) {
                Some(serial) => is_date_serial(serial).then_some(Cow::Borrowed(value)),
                None => parse_date_serial(value)
                    .filter(|serial| is_date_serial(*serial))
                    .map(|serial| Cow::Owned(format_serial(serial))),
            },
            CellType::Error => ERROR_LITERALS
                .iter()
                .find(|lit| **lit == value)
                .map(|lit| Cow::Borrowed(*lit)),
        }
    }
}

/// A value ready to be written: its effective type and encoded text.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedCell<'a> {
    pub cell_type: CellType,
    pub value: Cow<'a, str>,
}

/// Decide how a raw value is written.
///
/// Without a declared type, with a declared string type, or when
/// `use_declared_type` is false, the value is an inline string. Otherwise the
/// declared type is used if this particular value parses under it; a value
/// that does not parse falls back to an inline string.
pub fn resolve(raw: &str, declared: Option<CellType>, use_declared_type: bool) -> ResolvedCell<'_> {
    let inline = ResolvedCell {
        cell_type: CellType::InlineString,
        value: Cow::Borrowed(raw),
    };

    let declared = match declared {
        Some(t) if use_declared_type && t.canonical() != CellType::InlineString => t,
        _ => return inline,
    };

    match declared.coerce(raw) {
        Some(value) => ResolvedCell {
            cell_type: declared,
            value,
        },
        None => inline,
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Serial of 9999-12-31, the last date the 1900 system can show, plus one.
const DATE_SERIAL_END: f64 = 2_958_466.0;

fn is_date_serial(serial: f64) -> bool {
    (0.0..DATE_SERIAL_END).contains(&serial)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Convert an ISO 8601 date or date-time to a 1900-system serial number.
///
/// Serials before 1900-03-01 are shifted by one day because the 1900 system
/// counts a nonexistent 1900-02-29. Dates before 1900-01-01 have no serial.
pub fn parse_date_serial(value: &str) -> Option<f64> {
    let datetime = match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => date.and_hms_opt(0, 0, 0)?,
        Err(_) => DATE_TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())?,
    };

    let first_day = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    if datetime < first_day {
        return None;
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let leap_bug_end = NaiveDate::from_ymd_opt(1900, 3, 1)?.and_hms_opt(0, 0, 0)?;

    let millis = (datetime - epoch).num_milliseconds() as f64;
    let mut serial = millis / 86_400_000.0;
    if datetime < leap_bug_end {
        serial -= 1.0;
    }
    Some(serial)
}

fn format_serial(serial: f64) -> String {
    if serial.fract() == 0.0 && serial.abs() < i64::MAX as f64 {
        let mut buf = itoa::Buffer::new();
        buf.format(serial as i64).to_string()
    } else {
        let mut buf = ryu::Buffer::new();
        buf.format_finite(serial).to_string()
    }
}
