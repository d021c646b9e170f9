//! Record to grid formatting.
//!
//! A record is classified once into a [`RecordShape`], then rendered. Every
//! JSON value has a shape, so formatting never fails; rejecting empty input
//! is the sender's job.

use serde_json::{Map, Value};

use crate::types::{Cell, Grid};

/// The four record layouts the formatter understands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordShape<'a> {
    /// Already a sequence of rows.
    Rows(&'a [Value]),
    /// Object whose values are columns of historical values.
    Columnar(&'a Map<String, Value>),
    /// Object of scalar fields.
    Flat(&'a Map<String, Value>),
    /// Anything else.
    Scalar(&'a Value),
}

impl<'a> RecordShape<'a> {
    /// Decide the shape of a record.
    ///
    /// An object is columnar as soon as one of its values is an array; the
    /// empty object is flat.
    pub fn classify(record: &'a Value) -> Self {
        match record {
            Value::Array(rows) => RecordShape::Rows(rows),
            Value::Object(map) if map.values().any(Value::is_array) => RecordShape::Columnar(map),
            Value::Object(map) => RecordShape::Flat(map),
            other => RecordShape::Scalar(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordShape::Rows(_) => "rows",
            RecordShape::Columnar(_) => "columnar",
            RecordShape::Flat(_) => "flat",
            RecordShape::Scalar(_) => "scalar",
        }
    }

    pub fn into_grid(self) -> Grid {
        match self {
            RecordShape::Rows(rows) => Grid::new(rows.iter().map(row_from_value).collect()),
            RecordShape::Columnar(map) => columnar_grid(map),
            RecordShape::Flat(map) => {
                let headers = map.keys().map(|k| Cell::from(k.as_str())).collect();
                let values = map.values().map(Cell::from_value).collect();
                Grid::new(vec![headers, values])
            }
            RecordShape::Scalar(value) => Grid::new(vec![vec![Cell::from_value(value)]]),
        }
    }
}

/// Formats records into grids.
pub struct DataFormatter;

impl DataFormatter {
    /// Convert a record into a grid ready for a spreadsheet write.
    pub fn format(record: &Value) -> Grid {
        let shape = RecordShape::classify(record);
        tracing::debug!("formatting {} record", shape.name());
        shape.into_grid()
    }
}

/// A row element that is not an array becomes a one-cell row.
fn row_from_value(value: &Value) -> Vec<Cell> {
    match value {
        Value::Array(cells) => cells.iter().map(Cell::from_value).collect(),
        other => vec![Cell::from_value(other)],
    }
}

fn columnar_grid(map: &Map<String, Value>) -> Grid {
    let column_len = |v: &Value| match v {
        Value::Array(items) => items.len(),
        _ => 1,
    };
    let height = map.values().map(column_len).max().unwrap_or(0);

    let mut rows = Vec::with_capacity(height + 1);
    rows.push(map.keys().map(|k| Cell::from(k.as_str())).collect());

    for i in 0..height {
        let row = map
            .values()
            .map(|column| match column {
                Value::Array(items) => items.get(i).map(Cell::from_value).unwrap_or_else(Cell::empty),
                scalar if i == 0 => Cell::from_value(scalar),
                _ => Cell::empty(),
            })
            .collect();
        rows.push(row);
    }

    Grid::new(rows)
}
