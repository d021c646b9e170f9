//! A1 notation: column letters and cell references.

use std::fmt;

/// Last addressable column (`ZZZ`).
pub const MAX_COLUMN: u32 = 18_278;

/// Last addressable row.
pub const MAX_ROW: u32 = 100_000;

/// Convert a 1-based column number to its letters (1 → `A`, 27 → `AA`).
///
/// Column 0 has no letters and yields the empty string.
pub fn column_letter(column: u32) -> String {
    let mut letters = Vec::new();
    let mut n = column;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert column letters to a 1-based column number. Case-insensitive.
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// A single cell position, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub column: u32,
}

impl CellRef {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Parse a cell or the start cell of a range.
    ///
    /// Accepts `B3`, `b3`, `$B$3`, `B3:D9` and `Sheet1!B3:D9`. Cells beyond
    /// [`MAX_COLUMN`] or [`MAX_ROW`] are rejected.
    pub fn parse(input: &str) -> Option<Self> {
        let without_sheet = input.rsplit('!').next().unwrap_or(input);
        let start = without_sheet.split(':').next().unwrap_or("").trim();
        let start: String = start.chars().filter(|c| *c != '$').collect();

        let split = start.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = start.split_at(split);
        let column = column_number(letters)?;
        let row: u32 = digits.parse().ok()?;
        Self::checked(row, column)
    }

    /// The cell at `row`, `column` when it lies inside the addressable sheet.
    pub fn checked(row: u32, column: u32) -> Option<Self> {
        if row == 0 || column == 0 || row > MAX_ROW || column > MAX_COLUMN {
            return None;
        }
        Some(Self { row, column })
    }

    /// Bottom-right cell of a block of `rows` × `columns` starting here, or
    /// `None` when the block runs past the addressable sheet.
    pub fn span_end(&self, rows: u32, columns: u32) -> Option<CellRef> {
        let row = self.row.checked_add(rows.saturating_sub(1))?;
        let column = self.column.checked_add(columns.saturating_sub(1))?;
        Self::checked(row, column)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letter(self.column), self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "");
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(702), "ZZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_column_number_inverts_letter() {
        for n in [1, 2, 26, 27, 52, 53, 702, 703, 16384] {
            assert_eq!(column_number(&column_letter(n)), Some(n));
        }
        assert_eq!(column_number("ab"), Some(28));
        assert_eq!(column_number(""), None);
        assert_eq!(column_number("A1"), None);
    }

    #[test]
    fn test_parse_cell_refs() {
        assert_eq!(CellRef::parse("A1"), Some(CellRef::new(1, 1)));
        assert_eq!(CellRef::parse("c10"), Some(CellRef::new(10, 3)));
        assert_eq!(CellRef::parse("$B$3"), Some(CellRef::new(3, 2)));
        assert_eq!(CellRef::parse("B3:D9"), Some(CellRef::new(3, 2)));
        assert_eq!(CellRef::parse("Data!AA2"), Some(CellRef::new(2, 27)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(CellRef::parse(""), None);
        assert_eq!(CellRef::parse("A"), None);
        assert_eq!(CellRef::parse("12"), None);
        assert_eq!(CellRef::parse("A0"), None);
        assert_eq!(CellRef::parse("A1B"), None);
    }

    #[test]
    fn test_parse_rejects_cells_past_sheet_limits() {
        assert_eq!(CellRef::parse("ZZZ100000"), Some(CellRef::new(MAX_ROW, MAX_COLUMN)));
        assert_eq!(CellRef::parse("A100001"), None);
        assert_eq!(CellRef::parse("AAAA1"), None);
        assert_eq!(CellRef::parse("A200000000"), None);
        assert_eq!(CellRef::parse("A4294967295"), None);
        assert_eq!(CellRef::parse("A99999999999"), None);
    }

    #[test]
    fn test_span_end() {
        let start = CellRef::new(1, 1);
        assert_eq!(start.span_end(4, 3).unwrap().to_string(), "C4");
        assert_eq!(CellRef::new(2, 2).span_end(1, 1).unwrap().to_string(), "B2");
    }

    #[test]
    fn test_span_end_past_limits_is_none() {
        assert_eq!(CellRef::new(MAX_ROW, 1).span_end(2, 1), None);
        assert_eq!(CellRef::new(1, MAX_COLUMN).span_end(1, 2), None);
        assert_eq!(CellRef::new(u32::MAX, 1).span_end(2, 1), None);
        assert_eq!(CellRef::new(1, 1).span_end(u32::MAX, 1), None);
        assert!(CellRef::new(MAX_ROW, MAX_COLUMN).span_end(1, 1).is_some());
    }
}
