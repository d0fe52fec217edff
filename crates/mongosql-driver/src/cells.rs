//! Conversion between BSON values and typed cells
//!
//! Extended JSON is the interchange format for fixtures, so both relaxed
//! and canonical forms are accepted on the way in, and relaxed form is
//! produced on the way out.

use bson::spec::BinarySubtype;
use bson::oid::ObjectId;
use bson::{Binary, Bson, Document, JavaScriptCodeWithScope, Regex, Timestamp};
use mongosql_core::{MongoSqlError, Result, TypedCell};
use serde_json::json;

/// Convert a BSON value into a typed cell
pub fn bson_to_cell(value: &Bson) -> TypedCell {
    match value {
        Bson::Null => TypedCell::Null,
        Bson::Undefined => TypedCell::Undefined,
        Bson::String(s) => TypedCell::String(s.clone()),
        Bson::Int32(i) => TypedCell::Int32(*i),
        Bson::Int64(i) => TypedCell::Int64(*i),
        Bson::Double(d) => TypedCell::Double(*d),
        Bson::Decimal128(d) => TypedCell::Decimal128(d.to_string()),
        Bson::Boolean(b) => TypedCell::Boolean(*b),
        Bson::DateTime(dt) => TypedCell::DateTime(dt.timestamp_millis()),
        Bson::Timestamp(ts) => TypedCell::Timestamp {
            time: ts.time,
            increment: ts.increment,
        },
        Bson::Binary(bin) => TypedCell::Binary {
            subtype: u8::from(bin.subtype),
            bytes: bin.bytes.clone(),
        },
        Bson::ObjectId(oid) => TypedCell::ObjectId(oid.to_hex()),
        Bson::RegularExpression(re) => TypedCell::Regex {
            pattern: re.pattern.clone(),
            options: re.options.clone(),
        },
        Bson::JavaScriptCode(code) => TypedCell::JavaScript(code.clone()),
        Bson::JavaScriptCodeWithScope(code) => TypedCell::JavaScriptWithScope {
            code: code.code.clone(),
            scope: document_fields(&code.scope),
        },
        Bson::Symbol(sym) => TypedCell::Symbol(sym.clone()),
        Bson::MinKey => TypedCell::MinKey,
        Bson::MaxKey => TypedCell::MaxKey,
        Bson::Array(items) => TypedCell::Array(items.iter().map(bson_to_cell).collect()),
        Bson::Document(doc) => TypedCell::Document(document_fields(doc)),
        // DbPointer keeps its fields private; extended JSON is the only way in
        Bson::DbPointer(_) => {
            let ext = value.clone().into_relaxed_extjson();
            let pointer = &ext["$dbPointer"];
            TypedCell::DbPointer {
                namespace: pointer["$ref"].as_str().unwrap_or_default().to_string(),
                id: pointer["$id"]["$oid"].as_str().unwrap_or_default().to_string(),
            }
        }
    }
}

/// Convert a typed cell back into BSON
pub fn cell_to_bson(cell: &TypedCell) -> Result<Bson> {
    let value = match cell {
        TypedCell::Null => Bson::Null,
        TypedCell::Undefined => Bson::Undefined,
        TypedCell::String(s) => Bson::String(s.clone()),
        TypedCell::Int32(i) => Bson::Int32(*i),
        TypedCell::Int64(i) => Bson::Int64(*i),
        TypedCell::Double(d) => Bson::Double(*d),
        TypedCell::Decimal128(d) => from_extjson(json!({ "$numberDecimal": d }))?,
        TypedCell::Boolean(b) => Bson::Boolean(*b),
        TypedCell::DateTime(ms) => Bson::DateTime(bson::DateTime::from_millis(*ms)),
        TypedCell::Timestamp { time, increment } => Bson::Timestamp(Timestamp {
            time: *time,
            increment: *increment,
        }),
        TypedCell::Binary { subtype, bytes } => Bson::Binary(Binary {
            subtype: BinarySubtype::from(*subtype),
            bytes: bytes.clone(),
        }),
        TypedCell::ObjectId(hex) => Bson::ObjectId(parse_object_id(hex)?),
        TypedCell::Regex { pattern, options } => Bson::RegularExpression(Regex {
            pattern: pattern.clone(),
            options: options.clone(),
        }),
        TypedCell::JavaScript(code) => Bson::JavaScriptCode(code.clone()),
        TypedCell::JavaScriptWithScope { code, scope } => {
            Bson::JavaScriptCodeWithScope(JavaScriptCodeWithScope {
                code: code.clone(),
                scope: fields_to_document(scope)?,
            })
        }
        TypedCell::Symbol(sym) => Bson::Symbol(sym.clone()),
        TypedCell::DbPointer { namespace, id } => from_extjson(json!({
            "$dbPointer": { "$ref": namespace, "$id": { "$oid": id } }
        }))?,
        TypedCell::MinKey => Bson::MinKey,
        TypedCell::MaxKey => Bson::MaxKey,
        TypedCell::Array(items) => Bson::Array(
            items
                .iter()
                .map(cell_to_bson)
                .collect::<Result<Vec<_>>>()?,
        ),
        TypedCell::Document(fields) => Bson::Document(fields_to_document(fields)?),
    };
    Ok(value)
}

/// Parse a relaxed or canonical extended JSON value into a typed cell
pub fn cell_from_extjson(value: serde_json::Value) -> Result<TypedCell> {
    from_extjson(value).map(|bson| bson_to_cell(&bson))
}

/// Render a typed cell as relaxed extended JSON
pub fn cell_to_extjson(cell: &TypedCell) -> Result<serde_json::Value> {
    cell_to_bson(cell).map(Bson::into_relaxed_extjson)
}

fn from_extjson(value: serde_json::Value) -> Result<Bson> {
    Bson::try_from(value)
        .map_err(|e| MongoSqlError::Configuration(format!("Invalid extended JSON: {}", e)))
}

fn parse_object_id(hex: &str) -> Result<ObjectId> {
    ObjectId::parse_str(hex)
        .map_err(|e| MongoSqlError::Configuration(format!("Invalid ObjectId {}: {}", hex, e)))
}

fn document_fields(doc: &Document) -> Vec<(String, TypedCell)> {
    doc.iter()
        .map(|(k, v)| (k.clone(), bson_to_cell(v)))
        .collect()
}

fn fields_to_document(fields: &[(String, TypedCell)]) -> Result<Document> {
    let mut doc = Document::new();
    for (key, cell) in fields {
        doc.insert(key.clone(), cell_to_bson(cell)?);
    }
    Ok(doc)
}
