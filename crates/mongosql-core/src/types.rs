//! Typed values, column metadata and result sets

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::MongoSqlError;

/// A single typed result cell
///
/// Equality is type-aware: `Int32` and `Int64` form one integer class and
/// compare by value, but no integer ever equals a `Double`, and no cell
/// equals its string rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedCell {
    Null,
    Undefined,
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    /// Decimal128 in its canonical string form
    Decimal128(String),
    Boolean(bool),
    /// Milliseconds since the Unix epoch
    DateTime(i64),
    Timestamp {
        time: u32,
        increment: u32,
    },
    Binary {
        subtype: u8,
        bytes: Vec<u8>,
    },
    /// Hex encoded 12-byte identifier
    ObjectId(String),
    Regex {
        pattern: String,
        options: String,
    },
    JavaScript(String),
    JavaScriptWithScope {
        code: String,
        scope: Vec<(String, TypedCell)>,
    },
    Symbol(String),
    DbPointer {
        namespace: String,
        id: String,
    },
    MinKey,
    MaxKey,
    Array(Vec<TypedCell>),
    Document(Vec<(String, TypedCell)>),
}

impl TypedCell {
    /// BSON type of this cell
    pub fn bson_type(&self) -> BsonType {
        match self {
            TypedCell::Null => BsonType::Null,
            TypedCell::Undefined => BsonType::Undefined,
            TypedCell::String(_) => BsonType::String,
            TypedCell::Int32(_) => BsonType::Int,
            TypedCell::Int64(_) => BsonType::Long,
            TypedCell::Double(_) => BsonType::Double,
            TypedCell::Decimal128(_) => BsonType::Decimal,
            TypedCell::Boolean(_) => BsonType::Bool,
            TypedCell::DateTime(_) => BsonType::Date,
            TypedCell::Timestamp { .. } => BsonType::Timestamp,
            TypedCell::Binary { .. } => BsonType::BinData,
            TypedCell::ObjectId(_) => BsonType::ObjectId,
            TypedCell::Regex { .. } => BsonType::Regex,
            TypedCell::JavaScript(_) => BsonType::Javascript,
            TypedCell::JavaScriptWithScope { .. } => BsonType::JavascriptWithScope,
            TypedCell::Symbol(_) => BsonType::Symbol,
            TypedCell::DbPointer { .. } => BsonType::DbPointer,
            TypedCell::MinKey => BsonType::MinKey,
            TypedCell::MaxKey => BsonType::MaxKey,
            TypedCell::Array(_) => BsonType::Array,
            TypedCell::Document(_) => BsonType::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedCell::Null)
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            TypedCell::Int32(v) => Some(i64::from(*v)),
            TypedCell::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

fn sorted_options(options: &str) -> Vec<char> {
    let mut chars: Vec<char> = options.chars().collect();
    chars.sort_unstable();
    chars
}

impl PartialEq for TypedCell {
    fn eq(&self, other: &Self) -> bool {
        use TypedCell::*;

        if let (Some(a), Some(b)) = (self.as_integer(), other.as_integer()) {
            return a == b;
        }

        match (self, other) {
            (Null, Null) | (Undefined, Undefined) | (MinKey, MinKey) | (MaxKey, MaxKey) => true,
            (String(a), String(b)) | (Symbol(a), Symbol(b)) | (JavaScript(a), JavaScript(b)) => {
                a == b
            }
            (Double(a), Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Decimal128(a), Decimal128(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (
                Timestamp {
                    time: ta,
                    increment: ia,
                },
                Timestamp {
                    time: tb,
                    increment: ib,
                },
            ) => ta == tb && ia == ib,
            (
                Binary {
                    subtype: sa,
                    bytes: ba,
                },
                Binary {
                    subtype: sb,
                    bytes: bb,
                },
            ) => sa == sb && ba == bb,
            (ObjectId(a), ObjectId(b)) => a.eq_ignore_ascii_case(b),
            (
                Regex {
                    pattern: pa,
                    options: oa,
                },
                Regex {
                    pattern: pb,
                    options: ob,
                },
            ) => pa == pb && sorted_options(oa) == sorted_options(ob),
            (
                JavaScriptWithScope {
                    code: ca,
                    scope: sa,
                },
                JavaScriptWithScope {
                    code: cb,
                    scope: sb,
                },
            ) => ca == cb && sa == sb,
            (
                DbPointer {
                    namespace: na,
                    id: ia,
                },
                DbPointer {
                    namespace: nb,
                    id: ib,
                },
            ) => na == nb && ia.eq_ignore_ascii_case(ib),
            (Array(a), Array(b)) => a == b,
            (Document(a), Document(b)) => a == b,
            _ => false,
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[(String, TypedCell)]) -> fmt::Result {
    f.write_str("{")?;
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{:?}: {}", key, value)?;
    }
    f.write_str("}")
}

impl fmt::Display for TypedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedCell::Null => f.write_str("null"),
            TypedCell::Undefined => f.write_str("undefined"),
            TypedCell::String(s) => write!(f, "{:?}", s),
            TypedCell::Int32(v) => write!(f, "{} (int)", v),
            TypedCell::Int64(v) => write!(f, "{} (long)", v),
            TypedCell::Double(v) => write!(f, "{:?} (double)", v),
            TypedCell::Decimal128(v) => write!(f, "{} (decimal)", v),
            TypedCell::Boolean(v) => write!(f, "{}", v),
            TypedCell::DateTime(ms) => match chrono::DateTime::from_timestamp_millis(*ms) {
                Some(dt) => write!(f, "Date({})", dt.to_rfc3339()),
                None => write!(f, "Date({}ms)", ms),
            },
            TypedCell::Timestamp { time, increment } => {
                write!(f, "Timestamp({}, {})", time, increment)
            }
            TypedCell::Binary { subtype, bytes } => {
                write!(f, "BinData({}, {})", subtype, BASE64.encode(bytes))
            }
            TypedCell::ObjectId(hex) => write!(f, "ObjectId({:?})", hex),
            TypedCell::Regex { pattern, options } => write!(f, "/{}/{}", pattern, options),
            TypedCell::JavaScript(code) => write!(f, "Code({:?})", code),
            TypedCell::JavaScriptWithScope { code, scope } => {
                write!(f, "Code({:?}, ", code)?;
                write_fields(f, scope)?;
                f.write_str(")")
            }
            TypedCell::Symbol(s) => write!(f, "Symbol({:?})", s),
            TypedCell::DbPointer { namespace, id } => {
                write!(f, "DBPointer({:?}, ObjectId({:?}))", namespace, id)
            }
            TypedCell::MinKey => f.write_str("MinKey"),
            TypedCell::MaxKey => f.write_str("MaxKey"),
            TypedCell::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            TypedCell::Document(fields) => write_fields(f, fields),
        }
    }
}

/// BSON type names as reported by result schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BsonType {
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "binData")]
    BinData,
    #[serde(rename = "undefined")]
    Undefined,
    #[serde(rename = "objectId")]
    ObjectId,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "regex")]
    Regex,
    #[serde(rename = "dbPointer")]
    DbPointer,
    #[serde(rename = "javascript")]
    Javascript,
    #[serde(rename = "symbol")]
    Symbol,
    #[serde(rename = "javascriptWithScope")]
    JavascriptWithScope,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "timestamp")]
    Timestamp,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "minKey")]
    MinKey,
    #[serde(rename = "maxKey")]
    MaxKey,
    /// Catch-all for columns whose values may have any type
    #[serde(rename = "bson")]
    Bson,
}

impl BsonType {
    pub const ALL: [BsonType; 22] = [
        BsonType::Double,
        BsonType::String,
        BsonType::Object,
        BsonType::Array,
        BsonType::BinData,
        BsonType::Undefined,
        BsonType::ObjectId,
        BsonType::Bool,
        BsonType::Date,
        BsonType::Null,
        BsonType::Regex,
        BsonType::DbPointer,
        BsonType::Javascript,
        BsonType::Symbol,
        BsonType::JavascriptWithScope,
        BsonType::Int,
        BsonType::Timestamp,
        BsonType::Long,
        BsonType::Decimal,
        BsonType::MinKey,
        BsonType::MaxKey,
        BsonType::Bson,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BsonType::Double => "double",
            BsonType::String => "string",
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::BinData => "binData",
            BsonType::Undefined => "undefined",
            BsonType::ObjectId => "objectId",
            BsonType::Bool => "bool",
            BsonType::Date => "date",
            BsonType::Null => "null",
            BsonType::Regex => "regex",
            BsonType::DbPointer => "dbPointer",
            BsonType::Javascript => "javascript",
            BsonType::Symbol => "symbol",
            BsonType::JavascriptWithScope => "javascriptWithScope",
            BsonType::Int => "int",
            BsonType::Timestamp => "timestamp",
            BsonType::Long => "long",
            BsonType::Decimal => "decimal",
            BsonType::MinKey => "minKey",
            BsonType::MaxKey => "maxKey",
            BsonType::Bson => "bson",
        }
    }

    /// SQL type reported for columns of this BSON type
    pub fn sql_type(&self) -> SqlType {
        match self {
            BsonType::Double => SqlType::Double,
            BsonType::String => SqlType::LongVarchar,
            BsonType::BinData => SqlType::Binary,
            BsonType::Bool => SqlType::Boolean,
            BsonType::Date => SqlType::Timestamp,
            BsonType::Null => SqlType::Null,
            BsonType::Int => SqlType::Integer,
            BsonType::Long => SqlType::Bigint,
            BsonType::Decimal => SqlType::Decimal,
            _ => SqlType::Other,
        }
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BsonType {
    type Err = MongoSqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BsonType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| MongoSqlError::Configuration(format!("Unknown BSON type: {}", s)))
    }
}

/// SQL type names as exposed through result metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Double,
    LongVarchar,
    Other,
    Binary,
    Boolean,
    Timestamp,
    Null,
    Integer,
    Bigint,
    Decimal,
}

impl SqlType {
    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Double => "DOUBLE",
            SqlType::LongVarchar => "LONGVARCHAR",
            SqlType::Other => "OTHER",
            SqlType::Binary => "BINARY",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Null => "NULL",
            SqlType::Integer => "INTEGER",
            SqlType::Bigint => "BIGINT",
            SqlType::Decimal => "DECIMAL",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SqlType {
    type Err = MongoSqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        [
            SqlType::Double,
            SqlType::LongVarchar,
            SqlType::Other,
            SqlType::Binary,
            SqlType::Boolean,
            SqlType::Timestamp,
            SqlType::Null,
            SqlType::Integer,
            SqlType::Bigint,
            SqlType::Decimal,
        ]
        .into_iter()
        .find(|t| t.name() == upper)
        .ok_or_else(|| MongoSqlError::Configuration(format!("Unknown SQL type: {}", s)))
    }
}

/// Column metadata information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Datasource (table alias) the column belongs to; empty for computed columns
    #[serde(default)]
    pub datasource: String,
    /// Column name, which is also its label
    pub name: String,
    pub bson_type: BsonType,
    #[serde(default)]
    pub nullable: bool,
    pub ordinal: usize,
    /// Database the query ran against
    #[serde(default)]
    pub catalog: String,
}

impl ColumnMeta {
    pub fn new(datasource: impl Into<String>, name: impl Into<String>, bson_type: BsonType) -> Self {
        Self {
            datasource: datasource.into(),
            name: name.into(),
            bson_type,
            nullable: false,
            ordinal: 0,
            catalog: String::new(),
        }
    }

    pub fn sql_type(&self) -> SqlType {
        self.bson_type.sql_type()
    }
}

/// A row of typed cells in column order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<TypedCell>,
}

impl Row {
    pub fn new(cells: Vec<TypedCell>) -> Self {
        Self { cells }
    }

    pub fn get(&self, index: usize) -> Option<&TypedCell> {
        self.cells.get(index)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Vec<TypedCell>> for Row {
    fn from(cells: Vec<TypedCell>) -> Self {
        Self::new(cells)
    }
}

/// Result of executing a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    /// Unique identifier for this result
    pub id: Uuid,
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self {
            id: Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
