//! Core data types: cells, grids, sync targets, endpoint replies and errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sheet name used when the caller does not name one.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Top-left cell used when the caller does not give a range.
pub const DEFAULT_RANGE: &str = "A1";

/// A single spreadsheet value.
///
/// Serialized untagged, so a grid goes over the wire as plain JSON scalars.
/// An empty cell is the empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Cell {
    /// The empty cell (`""`).
    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    /// Convert a JSON value into a cell.
    ///
    /// `null` becomes the empty cell; arrays and objects are carried as
    /// their JSON text.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Cell::empty(),
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::Number(n.clone()),
            Value::String(s) => Cell::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Cell::Text(value.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Text(s) if s.is_empty())
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n.into())
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Rows of cells, the wire format for spreadsheet writes.
///
/// Rows are not padded. The first row's length is the declared column count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Cell>> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column count declared by the first row; 0 for a grid with no rows.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// True when there is nothing a spreadsheet could be given: no rows, or
    /// a first row without cells.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0 || self.column_count() == 0
    }
}

/// Where a record is read from and where its grid is written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTarget {
    /// Store path of the record.
    pub path: String,
    /// Spreadsheet identifier.
    pub sheet_id: String,
    /// Sheet (tab) name inside the spreadsheet.
    pub sheet_name: String,
    /// Range whose top-left cell receives the grid.
    pub range: String,
}

impl SyncTarget {
    pub fn new(path: impl Into<String>, sheet_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet_id: sheet_id.into(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            range: DEFAULT_RANGE.to_string(),
        }
    }

    pub fn with_sheet_name(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = sheet_name.into();
        self
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = range.into();
        self
    }
}

/// JSON body posted to the spreadsheet endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub sheet_id: String,
    pub sheet_name: String,
    pub range: String,
    pub data: Grid,
}

/// A successful endpoint reply. Keeps the whole response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointReply {
    body: Value,
}

impl EndpointReply {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    /// Range written, in `Sheet!A1:C4` notation, when the endpoint reports it.
    pub fn updated_range(&self) -> Option<&str> {
        self.body.get("updatedRange").and_then(Value::as_str)
    }

    pub fn rows_updated(&self) -> Option<u64> {
        self.body.get("rowsUpdated").and_then(Value::as_u64)
    }

    pub fn columns_updated(&self) -> Option<u64> {
        self.body.get("columnsUpdated").and_then(Value::as_u64)
    }
}

/// Liveness payload served by an endpoint on GET.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Uniform `{success, result | error}` view of a sync or send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error kind name, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl SyncOutcome {
    pub fn from_result(result: &SyncResult<EndpointReply>) -> Self {
        match result {
            Ok(reply) => Self {
                success: true,
                result: Some(reply.body().clone()),
                error: None,
                kind: None,
            },
            Err(e) => Self {
                success: false,
                result: None,
                error: Some(e.outcome_message()),
                kind: Some(e.kind().to_string()),
            },
        }
    }
}

impl From<SyncResult<EndpointReply>> for SyncOutcome {
    fn from(result: SyncResult<EndpointReply>) -> Self {
        Self::from_result(&result)
    }
}

/// Errors that can occur while syncing a record to a spreadsheet.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("No data to send")]
    EmptyData,

    #[error("No spreadsheet id given")]
    MissingSheetId,

    #[error("Endpoint rejected the write: {0}")]
    RemoteRejected(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Store read failed: {0}")]
    StoreFailure(String),

    #[error("Sync interval must be greater than zero")]
    InvalidInterval,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::EmptyData => "EmptyData",
            SyncError::MissingSheetId => "MissingSheetId",
            SyncError::RemoteRejected(_) => "RemoteRejected",
            SyncError::TransportFailure(_) => "TransportFailure",
            SyncError::StoreFailure(_) => "StoreFailure",
            SyncError::InvalidInterval => "InvalidInterval",
            SyncError::Config(_) => "Config",
        }
    }

    /// The `error` string of a [`SyncOutcome`]: the kind name for local
    /// precondition failures, the underlying message otherwise.
    pub fn outcome_message(&self) -> String {
        match self {
            SyncError::EmptyData | SyncError::MissingSheetId | SyncError::InvalidInterval => {
                self.kind().to_string()
            }
            SyncError::RemoteRejected(msg)
            | SyncError::TransportFailure(msg)
            | SyncError::StoreFailure(msg)
            | SyncError::Config(msg) => msg.clone(),
        }
    }
}

/// Convenience result type.
pub type SyncResult<T> = Result<T, SyncError>;
