//! Fixture model and loader for declarative SQL conformance tests.
//!
//! A fixture file holds a list of test entries under a `tests` key. Each
//! entry names a database and a SQL statement, and declares what the
//! statement should return: column metadata, a row count, and the rows
//! themselves as extended JSON cells.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mongosql_conformance::fixtures::load_fixtures;
//!
//! let fixtures = load_fixtures("fixtures/integration");
//! for entry in fixtures.iter() {
//!     let entry = entry?;
//!     println!("{}", entry.description);
//! }
//! ```
//!
//! Files are walked in name order each time [`Fixtures::iter`] is called,
//! so a set can be enumerated more than once without caching anything.

use mongosql_core::{Row, TypedCell};
use mongosql_driver::cells::cell_from_extjson;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Reason reported for entries that call catalog metadata functions
pub const META_FUNCTION_SKIP_REASON: &str = "catalog metadata functions are not supported";

/// Error raised while reading a fixture file
#[derive(Error, Debug)]
#[error("failed to load fixture {path}: {source}")]
pub struct FixtureLoadError {
    pub path: PathBuf,
    #[source]
    pub source: FixtureSourceError,
}

/// Underlying cause of a [`FixtureLoadError`]
#[derive(Error, Debug)]
pub enum FixtureSourceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Contents of one fixture file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureFile {
    pub tests: Vec<TestEntry>,
}

/// A single declarative test case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestEntry {
    pub description: String,
    #[serde(default)]
    pub db: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Catalog metadata call in place of a statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_function: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Treat `row_count` as a lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count_gte: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicated_columns_names: Option<Vec<String>>,
    /// Rows of extended JSON cells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<Vec<Vec<serde_json::Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_bson_type: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_sql_type: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_column_label: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_catalog_name: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_is_nullable: Option<Vec<String>>,
}

impl TestEntry {
    /// Create an entry running `sql` against `db`
    pub fn new(description: impl Into<String>, db: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            db: db.into(),
            sql: Some(sql.into()),
            ..Default::default()
        }
    }

    /// Why this entry must not run, if it must not
    pub fn skip_reason(&self) -> Option<&str> {
        if let Some(reason) = &self.skip_reason {
            return Some(reason);
        }
        self.meta_function
            .as_ref()
            .map(|_| META_FUNCTION_SKIP_REASON)
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason().is_some()
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered.unwrap_or(false)
    }

    /// Whether the entry declares any column metadata
    pub fn declares_metadata(&self) -> bool {
        self.expected_column_label.is_some()
            || self.expected_bson_type.is_some()
            || self.expected_sql_type.is_some()
            || self.expected_catalog_name.is_some()
            || self.expected_is_nullable.is_some()
    }

    /// Expected rows decoded into typed cells
    pub fn expected_rows(&self) -> mongosql_core::Result<Option<Vec<Row>>> {
        let Some(rows) = &self.expected_result else {
            return Ok(None);
        };
        rows.iter()
            .map(|row| {
                row.iter()
                    .cloned()
                    .map(cell_from_extjson)
                    .collect::<mongosql_core::Result<Vec<TypedCell>>>()
                    .map(Row::from)
            })
            .collect::<mongosql_core::Result<Vec<Row>>>()
            .map(Some)
    }
}

/// Lazily enumerated fixture set rooted at a directory
#[derive(Debug, Clone)]
pub struct Fixtures {
    root: PathBuf,
}

/// Open the fixture set under `dir`
///
/// Nothing is read until the set is iterated. A directory that does not
/// exist yields an empty set.
pub fn load_fixtures(dir: impl AsRef<Path>) -> Fixtures {
    Fixtures {
        root: dir.as_ref().to_path_buf(),
    }
}

impl Fixtures {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and yield every entry of every fixture file
    ///
    /// Each call starts a fresh walk. A file that cannot be read or parsed
    /// yields one error in place of its entries.
    pub fn iter(&self) -> impl Iterator<Item = Result<TestEntry, FixtureLoadError>> + use<> {
        let walker = if self.root.exists() {
            Some(WalkDir::new(&self.root).sort_by_file_name())
        } else {
            tracing::debug!(root = %self.root.display(), "fixture directory does not exist");
            None
        };

        walker
            .into_iter()
            .flatten()
            .filter_map(|item| match item {
                Ok(dir_entry) if dir_entry.file_type().is_file() => {
                    is_fixture_file(dir_entry.path()).then(|| read_fixture_file(dir_entry.path()))
                }
                Ok(_) => None,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    Some(Err(FixtureLoadError {
                        path,
                        source: err.into(),
                    }))
                }
            })
            .flat_map(|file| match file {
                Ok(file) => file.tests.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(err)],
            })
    }

    /// Load every entry, failing on the first unreadable file
    pub fn collect(&self) -> Result<Vec<TestEntry>, FixtureLoadError> {
        self.iter().collect()
    }
}

fn is_fixture_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml" | "yaml" | "json")
    )
}

/// Read and parse a single fixture file
pub fn read_fixture_file(path: &Path) -> Result<FixtureFile, FixtureLoadError> {
    let wrap = |source: FixtureSourceError| FixtureLoadError {
        path: path.to_path_buf(),
        source,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| wrap(e.into()))?;
    let file = if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
        serde_json::from_str(&contents).map_err(|e| wrap(e.into()))?
    } else {
        serde_yaml::from_str(&contents).map_err(|e| wrap(e.into()))?
    };

    tracing::debug!(path = %path.display(), "loaded fixture file");
    Ok(file)
}
