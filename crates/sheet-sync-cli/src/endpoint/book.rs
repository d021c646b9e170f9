//! In-memory spreadsheets backing the reference endpoint.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tokio::sync::RwLock;

use sheet_sync::{column_letter, CellRef, Cell, DEFAULT_SHEET_NAME};

/// Errors raised while writing to or reading from the book.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("Spreadsheet not found: {0}")]
    UnknownSpreadsheet(String),

    #[error("Sheet not found: {0}")]
    UnknownSheet(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Data must contain at least one row with at least one cell")]
    EmptyGrid,
}

/// One tab of a spreadsheet. Rows may be ragged.
#[derive(Debug, Clone, Default)]
struct Sheet {
    name: String,
    values: Vec<Vec<Cell>>,
}

impl Sheet {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: Vec::new(),
        }
    }

    /// Overwrite the block starting at `start`, growing the sheet as needed.
    fn write_block(&mut self, start: CellRef, rows: &[Vec<Cell>]) {
        let top = start.row as usize - 1;
        let left = start.column as usize - 1;

        if self.values.len() < top + rows.len() {
            self.values.resize_with(top + rows.len(), Vec::new);
        }
        for (offset, row) in rows.iter().enumerate() {
            let target = &mut self.values[top + offset];
            if target.len() < left + row.len() {
                target.resize_with(left + row.len(), Cell::empty);
            }
            for (col, cell) in row.iter().enumerate() {
                target[left + col] = cell.clone();
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Spreadsheet {
    sheets: Vec<Sheet>,
}

impl Spreadsheet {
    /// The named sheet, created when absent. Without a name, the first sheet,
    /// created as `Sheet1` when the spreadsheet has none.
    fn sheet_mut(&mut self, name: Option<&str>) -> &mut Sheet {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let index = match name {
            Some(name) => self.sheets.iter().position(|s| s.name == name),
            None => (!self.sheets.is_empty()).then_some(0),
        };
        let index = match index {
            Some(i) => i,
            None => {
                self.sheets
                    .push(Sheet::named(name.unwrap_or(DEFAULT_SHEET_NAME)));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }
}

/// Result of a successful block write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSummary {
    pub sheet_name: String,
    pub updated_range: String,
    pub rows_updated: usize,
    pub columns_updated: usize,
}

/// All spreadsheets known to the endpoint.
///
/// In strict mode only the spreadsheet ids given at construction exist;
/// otherwise spreadsheets are created on first write.
pub struct SheetBook {
    strict: bool,
    spreadsheets: RwLock<HashMap<String, Spreadsheet>>,
}

impl SheetBook {
    /// A book creating spreadsheets on demand.
    pub fn open() -> Self {
        Self {
            strict: false,
            spreadsheets: RwLock::new(HashMap::new()),
        }
    }

    /// A book that only knows `ids`.
    pub fn strict<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let known: HashSet<String> = ids.into_iter().map(Into::into).collect();
        Self {
            strict: true,
            spreadsheets: RwLock::new(
                known
                    .into_iter()
                    .map(|id| (id, Spreadsheet::default()))
                    .collect(),
            ),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Write `rows` into a sheet with its top-left cell at the start of `range`.
    ///
    /// The whole block, including any row wider than the first, must fit
    /// inside the addressable sheet; nothing is written otherwise.
    pub async fn write(
        &self,
        spreadsheet_id: &str,
        sheet_name: Option<&str>,
        range: &str,
        rows: Vec<Vec<Cell>>,
    ) -> Result<WriteSummary, BookError> {
        let start = CellRef::parse(range).ok_or_else(|| BookError::InvalidRange(range.to_string()))?;
        let columns = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || columns == 0 {
            return Err(BookError::EmptyGrid);
        }
        let widest = rows.iter().map(Vec::len).max().unwrap_or(columns);
        let out_of_range = || BookError::InvalidRange(range.to_string());
        let span = |height: usize, width: usize| {
            let height = u32::try_from(height).ok()?;
            let width = u32::try_from(width).ok()?;
            start.span_end(height, width)
        };
        span(rows.len(), widest).ok_or_else(out_of_range)?;
        let end = span(rows.len(), columns).ok_or_else(out_of_range)?;

        let mut spreadsheets = self.spreadsheets.write().await;
        let spreadsheet = if self.strict {
            spreadsheets
                .get_mut(spreadsheet_id)
                .ok_or_else(|| BookError::UnknownSpreadsheet(spreadsheet_id.to_string()))?
        } else {
            spreadsheets.entry(spreadsheet_id.to_string()).or_default()
        };

        let sheet = spreadsheet.sheet_mut(sheet_name);
        sheet.write_block(start, &rows);

        Ok(WriteSummary {
            updated_range: format!(
                "{}!{start}:{}{}",
                sheet.name,
                column_letter(end.column),
                end.row
            ),
            sheet_name: sheet.name.clone(),
            rows_updated: rows.len(),
            columns_updated: columns,
        })
    }

    /// Current values of a sheet.
    pub async fn read(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<Vec<Vec<Cell>>, BookError> {
        let spreadsheets = self.spreadsheets.read().await;
        let spreadsheet = spreadsheets
            .get(spreadsheet_id)
            .ok_or_else(|| BookError::UnknownSpreadsheet(spreadsheet_id.to_string()))?;
        spreadsheet
            .sheets
            .iter()
            .find(|s| s.name == sheet_name)
            .map(|s| s.values.clone())
            .ok_or_else(|| BookError::UnknownSheet(sheet_name.to_string()))
    }

    /// Sheet names of a spreadsheet, in creation order.
    pub async fn sheet_names(&self, spreadsheet_id: &str) -> Option<Vec<String>> {
        let spreadsheets = self.spreadsheets.read().await;
        spreadsheets
            .get(spreadsheet_id)
            .map(|s| s.sheets.iter().map(|sheet| sheet.name.clone()).collect())
    }
}

impl Default for SheetBook {
    fn default() -> Self {
        Self::open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(rows: &[&[&str]]) -> Vec<Vec<Cell>> {
        rows.iter()
            .map(|r| r.iter().map(|c| Cell::from(*c)).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_write_reports_range() {
        let book = SheetBook::open();
        let summary = book
            .write("s1", Some("Log"), "A1", cells(&[&["a", "b"], &["1", "2"]]))
            .await
            .unwrap();
        assert_eq!(summary.updated_range, "Log!A1:B2");
        assert_eq!(summary.rows_updated, 2);
        assert_eq!(summary.columns_updated, 2);
        assert_eq!(book.read("s1", "Log").await.unwrap(), cells(&[&["a", "b"], &["1", "2"]]));
    }

    #[tokio::test]
    async fn test_write_at_offset_pads_with_empty_cells() {
        let book = SheetBook::open();
        let summary = book
            .write("s1", Some("Log"), "Log!B2:Z99", cells(&[&["x", "y", "z"]]))
            .await
            .unwrap();
        assert_eq!(summary.updated_range, "Log!B2:D2");

        let values = book.read("s1", "Log").await.unwrap();
        assert_eq!(values.len(), 2);
        assert!(values[0].is_empty());
        assert_eq!(values[1], cells(&[&["", "x", "y", "z"]])[0]);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_cells_outside_block() {
        let book = SheetBook::open();
        book.write("s1", None, "A1", cells(&[&["a", "b", "c"]])).await.unwrap();
        book.write("s1", None, "B1", cells(&[&["X"]])).await.unwrap();
        assert_eq!(book.read("s1", "Sheet1").await.unwrap(), cells(&[&["a", "X", "c"]]));
    }

    #[tokio::test]
    async fn test_unnamed_sheet_is_first_sheet() {
        let book = SheetBook::open();
        book.write("s1", Some("Data"), "A1", cells(&[&["d"]])).await.unwrap();
        let summary = book.write("s1", None, "A2", cells(&[&["e"]])).await.unwrap();
        assert_eq!(summary.sheet_name, "Data");
        assert_eq!(book.sheet_names("s1").await.unwrap(), vec!["Data".to_string()]);

        book.write("s2", Some("  "), "A1", cells(&[&["f"]])).await.unwrap();
        assert_eq!(book.sheet_names("s2").await.unwrap(), vec!["Sheet1".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_empty_grid_and_bad_range() {
        let book = SheetBook::open();
        assert_eq!(book.write("s1", None, "A1", vec![]).await, Err(BookError::EmptyGrid));
        assert_eq!(book.write("s1", None, "A1", vec![vec![]]).await, Err(BookError::EmptyGrid));
        assert_eq!(
            book.write("s1", None, "nowhere", cells(&[&["a"]])).await,
            Err(BookError::InvalidRange("nowhere".into()))
        );
        assert!(book.sheet_names("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_blocks_past_sheet_limits() {
        let book = SheetBook::open();
        for range in ["A200000000", "A4294967295", "AAAA1"] {
            assert_eq!(
                book.write("s1", None, range, cells(&[&["a"]])).await,
                Err(BookError::InvalidRange(range.into()))
            );
        }

        // Start fits, but the second row runs past the last row.
        assert_eq!(
            book.write("s1", None, "A100000", cells(&[&["a"], &["b"]])).await,
            Err(BookError::InvalidRange("A100000".into()))
        );

        // A ragged row wider than the header runs past the last column.
        assert_eq!(
            book.write("s1", None, "ZZY1", cells(&[&["a"], &["b", "c", "d"]])).await,
            Err(BookError::InvalidRange("ZZY1".into()))
        );
        assert!(book.sheet_names("s1").await.is_none());

        let summary = book.write("s1", None, "ZZZ100000", cells(&[&["z"]])).await.unwrap();
        assert_eq!(summary.updated_range, "Sheet1!ZZZ100000:ZZZ100000");
    }

    #[tokio::test]
    async fn test_strict_book_rejects_unknown_ids() {
        let book = SheetBook::strict(["known"]);
        assert!(book.is_strict());
        assert_eq!(
            book.write("other", None, "A1", cells(&[&["a"]])).await,
            Err(BookError::UnknownSpreadsheet("other".into()))
        );
        book.write("known", None, "A1", cells(&[&["a"]])).await.unwrap();
        assert_eq!(
            book.read("known", "Missing").await,
            Err(BookError::UnknownSheet("Missing".into()))
        );
    }
}
