//! Result formatter
//!
//! Turns a [`ResultValue`] into the string shown on the terminal.

use shellvec_core::{Error, Result, ResultValue, Scalar, Table};

fn cells(row: &[Scalar]) -> Vec<String> {
    row.iter().map(Scalar::to_string).collect()
}

/// Render `value` for display.
///
/// Blank values give an empty string. Row widths must be consistent: the
/// first row (or first keyed entry) fixes the column count and any other
/// width is a format error rather than being padded or truncated.
pub fn stringify(value: &ResultValue) -> Result<String> {
    if value.is_blank() {
        return Ok(String::new());
    }

    let table = match value {
        ResultValue::Empty => return Ok(String::new()),
        ResultValue::Scalar(scalar) => return Ok(scalar.to_string()),
        ResultValue::FlatRow(row) => {
            let mut table = Table::new(1);
            for cell in row {
                table.add_row(vec![cell.to_string()])?;
            }
            table
        }
        ResultValue::RowMatrix(rows) => {
            let mut table = Table::new(rows[0].len());
            for row in rows {
                table.add_row(cells(row))?;
            }
            table
        }
        ResultValue::KeyedRows(rows) => {
            let expected = rows[0].1.len();
            let mut table = Table::new(expected + 1);
            for (key, row) in rows {
                let mut line = vec![key.clone()];
                line.extend(cells(row));
                table.add_row(line).map_err(|_| {
                    Error::Format(format!(
                        "entry '{}' has {} values, expected {}",
                        key,
                        row.len(),
                        expected
                    ))
                })?;
            }
            table
        }
        ResultValue::KeyedScalars(rows) => {
            let mut table = Table::new(2);
            for (key, cell) in rows {
                table.add_row(vec![key.clone(), cell.to_string()])?;
            }
            table
        }
    };

    Ok(table.render())
}
