//! Coordinate helpers for cell references and dimension ranges.

/// Maximum column number in Excel (XFD = 16384).
pub const MAX_COLUMN: u32 = 16384;
/// Maximum row number in Excel.
pub const MAX_ROW: u32 = 1_048_576;

/// Append the letters of a 1-indexed column (1 -> "A", 28 -> "AB") to `out`.
pub fn push_column_letters(out: &mut String, column: u32) {
    let mut letters = [0u8; 3];
    let mut len = 0;
    let mut col = column;

    while col > 0 && len < letters.len() {
        col -= 1;
        letters[len] = b'A' + (col % 26) as u8;
        len += 1;
        col /= 26;
    }

    for &b in letters[..len].iter().rev() {
        out.push(b as char);
    }
}

/// Convert column number (1-indexed) to letters (e.g., 1 -> "A", 28 -> "AB").
pub fn column_to_letter(column: u32) -> String {
    let mut result = String::with_capacity(3);
    push_column_letters(&mut result, column);
    result
}

/// Append a cell reference such as "C12" to `out`.
pub fn push_coordinate(out: &mut String, row: u32, column: u32) {
    push_column_letters(out, column);
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(row));
}

/// The used range of a sheet anchored at A1, as written in `<dimension ref="..."/>`.
///
/// A sheet with no columns, or a single cell, collapses to `"A1"`.
pub fn dimension_ref(last_row: u32, last_column: u32) -> String {
    if last_column == 0 || last_row == 0 || (last_row == 1 && last_column == 1) {
        return "A1".to_string();
    }
    let mut result = String::from("A1:");
    push_coordinate(&mut result, last_row, last_column);
    result
}
