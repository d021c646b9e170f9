//! Printing results: compact JSON for scripts, pretty JSON or tables for people.

use std::io::Write;

use serde::Serialize;

use sheet_sync::Grid;

#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Render `value` as one JSON line, or pretty-printed.
    pub fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        Ok(if self.json {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        })
    }

    pub fn print<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let text = self.render(value)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{text}")?;
        Ok(())
    }

    /// Print a grid: JSON rows, or one tab-separated line per row.
    pub fn print_grid(&self, grid: &Grid) -> anyhow::Result<()> {
        if self.json {
            return self.print(grid);
        }
        let mut out = std::io::stdout().lock();
        write!(out, "{}", grid_table(grid))?;
        Ok(())
    }
}

/// Tab-separated rendering of a grid, one line per row.
pub fn grid_table(grid: &Grid) -> String {
    let mut text = String::new();
    for row in grid.rows() {
        let line: Vec<String> = row.iter().map(ToString::to_string).collect();
        text.push_str(&line.join("\t"));
        text.push('\n');
    }
    text
}
