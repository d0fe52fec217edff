//! Typed comparison of actual results against fixture expectations.
//!
//! Cells compare with [`TypedCell`] equality, so an integer never matches a
//! double and a number never matches its string rendering.

use crate::fixtures::TestEntry;
use mongosql_core::{ColumnMeta, Row, TypedCell};
use std::fmt;
use thiserror::Error;

pub const COLUMN_NULLABLE: &str = "columnNullable";
pub const COLUMN_NO_NULLS: &str = "columnNoNulls";

/// A difference between what a fixture expects and what the server returned
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Mismatch {
    #[error("metadata mismatch{}: expected {attribute} {expected}, got {actual}", column_suffix(.column))]
    MetadataMismatch {
        /// Zero-based column, or `None` when the column count differs
        column: Option<usize>,
        attribute: &'static str,
        expected: String,
        actual: String,
    },

    #[error("row count mismatch: expected {expected}, got {actual}")]
    RowCountMismatch { expected: usize, actual: usize },

    #[error(
        "cell mismatch at row {row}, column {column}: expected {}, got {}",
        CellDisplay(.expected.as_ref()),
        CellDisplay(.actual.as_ref())
    )]
    CellMismatch {
        row: usize,
        column: usize,
        expected: Option<TypedCell>,
        actual: Option<TypedCell>,
    },
}

fn column_suffix(column: &Option<usize>) -> String {
    column
        .map(|c| format!(" in column {}", c))
        .unwrap_or_default()
}

struct CellDisplay<'a>(Option<&'a TypedCell>);

impl fmt::Display for CellDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(cell) => write!(f, "{} ({})", cell, cell.bson_type()),
            None => f.write_str("<missing>"),
        }
    }
}

/// Nullability as fixtures spell it
pub fn nullability(column: &ColumnMeta) -> &'static str {
    if column.nullable {
        COLUMN_NULLABLE
    } else {
        COLUMN_NO_NULLS
    }
}

/// Column attribute a fixture can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Label,
    BsonType,
    SqlType,
    Catalog,
    Nullability,
}

impl Attribute {
    const ALL: [Attribute; 5] = [
        Attribute::Label,
        Attribute::BsonType,
        Attribute::SqlType,
        Attribute::Catalog,
        Attribute::Nullability,
    ];

    fn name(self) -> &'static str {
        match self {
            Attribute::Label => "column label",
            Attribute::BsonType => "bson type",
            Attribute::SqlType => "sql type",
            Attribute::Catalog => "catalog name",
            Attribute::Nullability => "nullability",
        }
    }

    fn expected(self, entry: &TestEntry) -> Option<&Vec<String>> {
        match self {
            Attribute::Label => entry.expected_column_label.as_ref(),
            Attribute::BsonType => entry.expected_bson_type.as_ref(),
            Attribute::SqlType => entry.expected_sql_type.as_ref(),
            Attribute::Catalog => entry.expected_catalog_name.as_ref(),
            Attribute::Nullability => entry.expected_is_nullable.as_ref(),
        }
    }

    /// SQL type names are case-insensitive, everything else is exact
    fn matches(self, expected: &str, actual: &str) -> bool {
        match self {
            Attribute::SqlType => expected.eq_ignore_ascii_case(actual),
            _ => expected == actual,
        }
    }

    fn actual(self, column: &ColumnMeta) -> String {
        match self {
            Attribute::Label => column.name.clone(),
            Attribute::BsonType => column.bson_type.name().to_string(),
            Attribute::SqlType => column.sql_type().name().to_string(),
            Attribute::Catalog => column.catalog.clone(),
            Attribute::Nullability => nullability(column).to_string(),
        }
    }
}

/// Check every metadata list the entry declares against the result columns
///
/// Each list is checked for length first, then column by column in order.
pub fn compare_metadata(entry: &TestEntry, columns: &[ColumnMeta]) -> Result<(), Mismatch> {
    for attribute in Attribute::ALL {
        let Some(expected) = attribute.expected(entry) else {
            continue;
        };

        if expected.len() != columns.len() {
            return Err(Mismatch::MetadataMismatch {
                column: None,
                attribute: attribute.name(),
                expected: format!("for {} columns", expected.len()),
                actual: format!("{} columns", columns.len()),
            });
        }

        for (index, (want, column)) in expected.iter().zip(columns).enumerate() {
            let actual = attribute.actual(column);
            if !attribute.matches(want, &actual) {
                return Err(Mismatch::MetadataMismatch {
                    column: Some(index),
                    attribute: attribute.name(),
                    expected: want.clone(),
                    actual,
                });
            }
        }
    }
    Ok(())
}

/// Check a row count against `row_count`, as a lower bound when `row_count_gte` is set
pub fn compare_row_count(entry: &TestEntry, actual: usize) -> Result<(), Mismatch> {
    let Some(expected) = entry.row_count else {
        return Ok(());
    };
    let ok = if entry.row_count_gte.unwrap_or(false) {
        actual >= expected
    } else {
        actual == expected
    };
    if ok {
        Ok(())
    } else {
        Err(Mismatch::RowCountMismatch { expected, actual })
    }
}

/// Index of the first cell where two rows differ
pub fn first_difference(expected: &Row, actual: &Row) -> Option<usize> {
    let width = expected.len().max(actual.len());
    (0..width).find(|&i| expected.get(i) != actual.get(i))
}

fn equal_cells(expected: &Row, actual: &Row) -> usize {
    expected
        .cells
        .iter()
        .zip(&actual.cells)
        .filter(|(a, b)| a == b)
        .count()
}

fn cell_mismatch(row: usize, expected: &Row, actual: &Row) -> Mismatch {
    let column = first_difference(expected, actual).unwrap_or(0);
    Mismatch::CellMismatch {
        row,
        column,
        expected: expected.get(column).cloned(),
        actual: actual.get(column).cloned(),
    }
}

/// Compare expected and actual rows
///
/// Ordered comparison is pairwise. Unordered comparison treats the expected
/// rows as a multiset: each actual row consumes one equal expected row, and
/// the first actual row without a match is reported against its closest
/// remaining candidate.
pub fn compare_rows(expected: &[Row], actual: &[Row], ordered: bool) -> Result<(), Mismatch> {
    if expected.len() != actual.len() {
        return Err(Mismatch::RowCountMismatch {
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    if ordered {
        return match expected
            .iter()
            .zip(actual)
            .position(|(want, got)| want != got)
        {
            Some(row) => Err(cell_mismatch(row, &expected[row], &actual[row])),
            None => Ok(()),
        };
    }

    let mut remaining: Vec<&Row> = expected.iter().collect();
    for (row, got) in actual.iter().enumerate() {
        if let Some(pos) = remaining.iter().position(|want| *want == got) {
            remaining.swap_remove(pos);
            continue;
        }

        let closest = remaining
            .iter()
            .copied()
            .max_by_key(|want| equal_cells(want, got));
        return Err(match closest {
            Some(want) => cell_mismatch(row, want, got),
            None => Mismatch::RowCountMismatch {
                expected: expected.len(),
                actual: actual.len(),
            },
        });
    }
    Ok(())
}
