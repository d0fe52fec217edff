//! Result set schema derivation
//!
//! `sqlGetResultSchema` describes a result as a JSON schema whose top-level
//! properties are datasources, each an object schema whose properties are
//! the columns. Result documents follow the same shape:
//! `{datasource: {field: value}}`.

use crate::cells::bson_to_cell;
use bson::{Bson, Document};
use mongosql_core::{BsonType, ColumnMeta, MongoSqlError, Result, Row, TypedCell};
use std::str::FromStr;
use tracing::debug;

/// Column layout of a query result, in select order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSchema {
    columns: Vec<ColumnMeta>,
}

impl ResultSchema {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self { columns }
    }

    /// Build the column list from a `sqlGetResultSchema` reply
    ///
    /// A `selectOrder` list of `[datasource, field]` pairs fixes the column
    /// order. Without one, datasources are sorted and the fields of each
    /// datasource are sorted.
    pub fn from_command_response(reply: &Document, catalog: &str) -> Result<Self> {
        let json_schema = reply
            .get_document("schema")
            .and_then(|schema| schema.get_document("jsonSchema"))
            .map_err(|_| MongoSqlError::Response("missing schema.jsonSchema".to_string()))?;
        let datasources = datasource_properties(json_schema)?;

        let addresses = match select_order(reply)? {
            Some(order) if !order.is_empty() => order,
            _ => {
                let mut addresses = Vec::new();
                let mut names: Vec<&String> = datasources.keys().collect();
                names.sort();
                for datasource in names {
                    let fields =
                        datasource_properties(datasource_schema(datasources, datasource)?)?;
                    let mut field_names: Vec<&String> = fields.keys().collect();
                    field_names.sort();
                    addresses.extend(
                        field_names
                            .into_iter()
                            .map(|field| (datasource.clone(), field.clone())),
                    );
                }
                addresses
            }
        };

        let mut columns = Vec::with_capacity(addresses.len());
        for (ordinal, (datasource, field)) in addresses.into_iter().enumerate() {
            let ds_schema = datasource_schema(datasources, &datasource)?;
            let fields = datasource_properties(ds_schema)?;
            let required = ds_schema
                .get_array("required")
                .map(|r| r.iter().any(|v| v.as_str() == Some(field.as_str())))
                .unwrap_or(false);

            let (bson_type, nullable) = match fields.get_document(&field) {
                Ok(field_schema) => column_type(field_schema),
                Err(_) => (BsonType::Bson, true),
            };

            let mut column = ColumnMeta::new(datasource, field, bson_type);
            column.nullable = nullable || !required;
            column.ordinal = ordinal;
            column.catalog = catalog.to_string();
            columns.push(column);
        }

        debug!(columns = columns.len(), "derived result schema");
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<ColumnMeta> {
        self.columns
    }

    /// Map a result document into a row in column order
    ///
    /// A field absent from the document reads as `Null`.
    pub fn row_from_document(&self, doc: &Document) -> Row {
        self.columns
            .iter()
            .map(|column| {
                let value = match doc.get_document(&column.datasource) {
                    Ok(source) => source.get(&column.name),
                    // computed columns may arrive unnested
                    Err(_) if column.datasource.is_empty() => doc.get(&column.name),
                    Err(_) => None,
                };
                value.map(bson_to_cell).unwrap_or(TypedCell::Null)
            })
            .collect::<Vec<_>>()
            .into()
    }
}

/// Derive a column's BSON type and whether it admits null
///
/// A single `bsonType` names the type. An `anyOf` (or a `bsonType` list)
/// with exactly one non-null branch takes that branch's type and is
/// nullable if a null branch is present. Everything else is `bson`.
pub fn column_type(schema: &Document) -> (BsonType, bool) {
    match schema.get("bsonType") {
        Some(Bson::String(name)) => {
            let ty = parse_type(name);
            return (ty, ty == BsonType::Null || ty == BsonType::Bson);
        }
        Some(Bson::Array(names)) => {
            let names: Vec<&str> = names.iter().filter_map(Bson::as_str).collect();
            return collapse(names.iter().map(|n| parse_type(n)));
        }
        _ => {}
    }

    if let Ok(branches) = schema.get_array("anyOf") {
        let types = branches.iter().map(|branch| match branch {
            Bson::Document(branch) => column_type(branch).0,
            _ => BsonType::Bson,
        });
        return collapse(types);
    }

    (BsonType::Bson, true)
}

fn collapse(types: impl Iterator<Item = BsonType>) -> (BsonType, bool) {
    let mut has_null = false;
    let mut non_null = Vec::new();
    for ty in types {
        if ty == BsonType::Null {
            has_null = true;
        } else if !non_null.contains(&ty) {
            non_null.push(ty);
        }
    }

    match non_null.as_slice() {
        [single] if *single != BsonType::Bson => (*single, has_null),
        [] if has_null => (BsonType::Null, true),
        _ => (BsonType::Bson, true),
    }
}

fn parse_type(name: &str) -> BsonType {
    BsonType::from_str(name).unwrap_or(BsonType::Bson)
}

fn select_order(reply: &Document) -> Result<Option<Vec<(String, String)>>> {
    let Ok(order) = reply.get_array("selectOrder") else {
        return Ok(None);
    };

    order
        .iter()
        .map(|entry| {
            let pair = entry.as_array().map(|pair| {
                (
                    pair.first().and_then(Bson::as_str),
                    pair.get(1).and_then(Bson::as_str),
                )
            });
            match pair {
                Some((Some(datasource), Some(field))) => {
                    Ok((datasource.to_string(), field.to_string()))
                }
                _ => Err(MongoSqlError::Response(format!(
                    "selectOrder entries must be [datasource, field] pairs, found {}",
                    entry
                ))),
            }
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn datasource_schema<'a>(datasources: &'a Document, name: &str) -> Result<&'a Document> {
    datasources.get_document(name).map_err(|_| {
        MongoSqlError::Response(format!("result schema has no datasource '{}'", name))
    })
}

fn datasource_properties(schema: &Document) -> Result<&Document> {
    schema.get_document("properties").map_err(|_| {
        MongoSqlError::Response(
            "result set json schema must be object with properties".to_string(),
        )
    })
}
