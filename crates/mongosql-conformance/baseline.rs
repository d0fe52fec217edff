//! Baseline fixture generation from live results.
//!
//! A baseline captures what the server returned for an entry so it can be
//! reviewed and checked in as the entry's expectations.

use crate::compare::nullability;
use crate::fixtures::{FixtureFile, TestEntry};
use mongosql_core::{ColumnMeta, ResultSet};
use mongosql_driver::cells::cell_to_extjson;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("failed to write baseline {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize baseline: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to render cell: {0}")]
    Cell(#[from] mongosql_core::MongoSqlError),
}

/// File name for an entry's baseline: its description with every
/// character outside `[A-Za-z0-9_-]` replaced by `_`
pub fn baseline_file_name(description: &str) -> String {
    let stem: String = description
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.yaml", stem)
}

/// Expectations for `entry` taken from an actual result
pub fn baseline_entry(entry: &TestEntry, result: &ResultSet) -> Result<TestEntry, BaselineError> {
    let expected_result = result
        .rows
        .iter()
        .map(|row| row.cells.iter().map(cell_to_extjson).collect())
        .collect::<mongosql_core::Result<Vec<Vec<serde_json::Value>>>>()?;

    let columns = &result.columns;
    let collect = |f: fn(&ColumnMeta) -> String| -> Option<Vec<String>> {
        Some(columns.iter().map(f).collect())
    };

    Ok(TestEntry {
        description: entry.description.clone(),
        db: entry.db.clone(),
        sql: entry.sql.clone(),
        row_count: Some(result.row_count()),
        row_count_gte: entry.row_count_gte,
        ordered: entry.ordered,
        expected_result: Some(expected_result),
        expected_bson_type: collect(|c| c.bson_type.name().to_string()),
        expected_sql_type: collect(|c| c.sql_type().name().to_string()),
        expected_column_label: collect(|c| c.name.clone()),
        expected_catalog_name: collect(|c| c.catalog.clone()),
        expected_is_nullable: collect(|c| nullability(c).to_string()),
        ..Default::default()
    })
}

/// Write a baseline fixture for `entry` into `out_dir`
///
/// The directory is created if needed, and an existing baseline with the
/// same name is replaced.
pub fn generate_baseline(
    entry: &TestEntry,
    result: &ResultSet,
    out_dir: &Path,
) -> Result<PathBuf, BaselineError> {
    let file = FixtureFile {
        tests: vec![baseline_entry(entry, result)?],
    };
    let yaml = serde_yaml::to_string(&file)?;
    let path = out_dir.join(baseline_file_name(&entry.description));

    let io_err = |source| BaselineError::Io {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(out_dir).map_err(io_err)?;
    std::fs::write(&path, yaml).map_err(io_err)?;

    tracing::info!(path = %path.display(), rows = result.row_count(), "wrote baseline");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{compare_metadata, compare_rows};
    use crate::fixtures::read_fixture_file;
    use mongosql_core::{BsonType, Row, TypedCell};
    use pretty_assertions::assert_eq;

    fn result() -> ResultSet {
        let mut a = ColumnMeta::new("", "a", BsonType::Int);
        a.catalog = "integration_test".to_string();
        let mut b = ColumnMeta::new("t", "b", BsonType::Double);
        b.nullable = true;
        b.ordinal = 1;
        b.catalog = "integration_test".to_string();
        ResultSet::new(
            vec![a, b],
            vec![
                Row::from(vec![TypedCell::Int32(1), TypedCell::Double(2.5)]),
                Row::from(vec![TypedCell::Int64(5_000_000_000), TypedCell::Null]),
            ],
        )
    }

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(
            baseline_file_name("select a, b from t/1"),
            "select_a__b_from_t_1.yaml"
        );
    }

    #[test]
    fn test_baseline_entry_captures_metadata() {
        let entry = TestEntry::new("two columns", "integration_test", "SELECT a, b FROM t");
        let baseline = baseline_entry(&entry, &result()).unwrap();

        assert_eq!(baseline.row_count, Some(2));
        assert_eq!(baseline.expected_column_label, Some(vec!["a".into(), "b".into()]));
        assert_eq!(baseline.expected_bson_type, Some(vec!["int".into(), "double".into()]));
        assert_eq!(baseline.expected_sql_type, Some(vec!["INTEGER".into(), "DOUBLE".into()]));
        assert_eq!(
            baseline.expected_is_nullable,
            Some(vec!["columnNoNulls".into(), "columnNullable".into()])
        );
    }

    #[test]
    fn test_generated_baseline_passes_against_its_result() {
        let dir = tempfile::tempdir().unwrap();
        let entry = TestEntry::new("two columns", "integration_test", "SELECT a, b FROM t");
        let result = result();

        let path = generate_baseline(&entry, &result, &dir.path().join("generated")).unwrap();
        assert!(path.ends_with("two_columns.yaml"));

        let reloaded = read_fixture_file(&path).unwrap().tests.remove(0);
        assert_eq!(reloaded.sql, entry.sql);
        assert_eq!(compare_metadata(&reloaded, &result.columns), Ok(()));

        let rows = reloaded.expected_rows().unwrap().unwrap();
        assert_eq!(compare_rows(&rows, &result.rows, true), Ok(()));
        assert!(matches!(rows[0].cells[1], TypedCell::Double(_)));
    }
}
