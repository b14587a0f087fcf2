//! Whitespace-delimited numeric tables.
//!
//! This is the format every simulation output and every combined file uses:
//! - one row per line, columns separated by any whitespace
//! - lines starting with `#` (after leading whitespace) and blank lines are skipped
//! - every data row must have the same number of columns
//!
//! Errors name the file and the 1-based line so the offending input can be found.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Series;
use crate::error::AppError;

/// Parsed table, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub path: PathBuf,
    pub rows: Vec<Vec<f64>>,
    pub n_cols: usize,
}

impl Table {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of column `idx`.
    pub fn column(&self, idx: usize) -> Result<Vec<f64>, AppError> {
        if idx >= self.n_cols && !self.is_empty() {
            return Err(AppError::input(format!(
                "'{}' has {} columns; column {idx} was requested.",
                self.path.display(),
                self.n_cols
            )));
        }
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Require at least `n` columns (no-op on an empty table).
    pub fn require_columns(&self, n: usize) -> Result<(), AppError> {
        if !self.is_empty() && self.n_cols < n {
            return Err(AppError::input(format!(
                "'{}' has {} columns, expected at least {n}.",
                self.path.display(),
                self.n_cols
            )));
        }
        Ok(())
    }

    /// Interpret columns 0, 1, 2 as `(x, y, err)`.
    pub fn to_series(&self) -> Result<Series, AppError> {
        self.require_columns(3)?;
        Series::new(self.column(0)?, self.column(1)?, self.column(2)?)
    }

    /// Sort rows by column `idx` with `f64::total_cmp` (stable; a parsed `nan` sorts last).
    pub fn sort_by_column(&mut self, idx: usize) {
        self.rows.sort_by(|a, b| a[idx].total_cmp(&b[idx]));
    }
}

/// Parse table text; `path` is only used in error messages.
pub fn parse_table(text: &str, path: &Path) -> Result<Table, AppError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut n_cols = 0usize;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let row = trimmed
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| {
                    AppError::input(format!(
                        "{}:{line_no}: cannot parse '{tok}' as a number.",
                        path.display()
                    ))
                })
            })
            .collect::<Result<Vec<f64>, AppError>>()?;

        if rows.is_empty() {
            n_cols = row.len();
        } else if row.len() != n_cols {
            return Err(AppError::input(format!(
                "{}:{line_no}: expected {n_cols} columns, found {}.",
                path.display(),
                row.len()
            )));
        }
        rows.push(row);
    }

    Ok(Table {
        path: path.to_path_buf(),
        rows,
        n_cols,
    })
}

/// Read and parse a table file.
pub fn read_table(path: &Path) -> Result<Table, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::input(format!("Failed to read '{}': {e}", path.display())))?;
    parse_table(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# header\n\n 1 2 3\n  # indented comment\n4\t5   6\n";
        let t = parse_table(text, Path::new("a.sd")).unwrap();
        assert_eq!(t.rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(t.n_cols, 3);
        let s = t.to_series().unwrap();
        assert_eq!(s.err, vec![3.0, 6.0]);
    }

    #[test]
    fn ragged_row_names_file_and_line() {
        let err = parse_table("1 2 3\n1 2\n", Path::new("run_1/x.sd")).unwrap_err();
        assert!(err.is_input());
        assert!(err.message().contains("run_1/x.sd:2"), "{}", err.message());
    }

    #[test]
    fn scientific_notation_parses() {
        let t = parse_table("1.0000e-02\t-3.5000e+00\n", Path::new("f")).unwrap();
        assert_eq!(t.rows[0], vec![0.01, -3.5]);
    }

    #[test]
    fn garbage_is_input_error() {
        assert!(parse_table("1 abc\n", Path::new("f")).unwrap_err().is_input());
    }

    #[test]
    fn sorts_unsorted_rows() {
        let mut t = parse_table("3 30\n1 10\n2 20\n", Path::new("f.sq")).unwrap();
        t.sort_by_column(0);
        assert_eq!(t.column(0).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(t.column(1).unwrap(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn nan_key_sorts_last_without_scrambling_the_rest() {
        let mut t = parse_table("3 30\nnan 0\n1 10\n2 20\n0.5 5\n", Path::new("f.sq")).unwrap();
        t.sort_by_column(0);
        let keys = t.column(0).unwrap();
        assert_eq!(keys[..4], [0.5, 1.0, 2.0, 3.0]);
        assert!(keys[4].is_nan());
        assert_eq!(t.column(1).unwrap(), vec![5.0, 10.0, 20.0, 30.0, 0.0]);
    }
}
