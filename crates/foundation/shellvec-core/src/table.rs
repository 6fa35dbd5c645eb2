//! Headerless, left-aligned table renderer.

use crate::{Error, Result};

/// Fixed-width table of text cells.
///
/// ```text
/// +------+---+
/// | root | 1 |
/// | www  | 2 |
/// +------+---+
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    columns: usize,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row; its width must match the table's column count.
    pub fn add_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns {
            return Err(Error::Format(format!(
                "row {} has {} cells, table has {} columns",
                self.rows.len() + 1,
                row.len(),
                self.columns
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut widths = vec![0usize; self.columns];
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let rule: String = widths
            .iter()
            .map(|w| format!("+{}", "-".repeat(w + 2)))
            .collect::<String>()
            + "+";

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(rule.clone());
        for row in &self.rows {
            let mut line = String::new();
            for (cell, width) in row.iter().zip(&widths) {
                let pad = width - cell.chars().count();
                line.push_str("| ");
                line.push_str(cell);
                line.push_str(&" ".repeat(pad + 1));
            }
            line.push('|');
            lines.push(line);
        }
        lines.push(rule);

        lines.join("\n")
    }
}
