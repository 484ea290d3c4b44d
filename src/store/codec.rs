//! Firestore REST typed-value codec.
//!
//! The REST API wraps every field in a single-key object naming its type
//! (`{"stringValue": "..."}`, `{"mapValue": {"fields": {...}}}`, ...). The
//! pipeline works with plain JSON, so documents are unwrapped on read and
//! wrapped again on write.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::StoreError;

/// One document as returned by `GET .../documents/{collection}/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDocument {
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl FirestoreDocument {
    /// Trailing path segment of the resource name.
    pub fn id(&self) -> &str {
        document_id(&self.name)
    }

    /// Document body as plain JSON.
    pub fn body(&self) -> Result<Value, StoreError> {
        decode_fields(&self.fields)
    }
}

/// One page of `GET .../documents/{collection}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsPage {
    #[serde(default)]
    pub documents: Vec<FirestoreDocument>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// One element of the `:runAggregationQuery` response stream. Elements
/// that only carry progress (`readTime`) have no `result`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResponse {
    #[serde(default)]
    pub result: Option<AggregationResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    #[serde(default)]
    pub aggregate_fields: Map<String, Value>,
}

pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Value, StoreError> {
    let mut out = Map::with_capacity(fields.len());
    for (key, value) in fields {
        out.insert(key.clone(), decode_value(value)?);
    }
    Ok(Value::Object(out))
}

/// Unwrap a single typed value.
pub fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let obj = value
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| StoreError::Decode("typed value must be a single-key object".into()))?;
    let (kind, inner) = obj.iter().next().ok_or_else(|| StoreError::Decode("empty typed value".into()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
        "integerValue" => decode_integer(inner),
        "doubleValue" => Ok(inner.clone()),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(inner.clone()),
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => decode_fields(fields),
            None => Ok(Value::Object(Map::new())),
        },
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        other => Err(StoreError::Decode(format!("unsupported value type {other}"))),
    }
}

// int64 travels as a decimal string
fn decode_integer(inner: &Value) -> Result<Value, StoreError> {
    match inner {
        Value::String(s) => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| StoreError::Decode(format!("invalid integerValue {s:?}"))),
        Value::Number(_) => Ok(inner.clone()),
        _ => Err(StoreError::Decode("integerValue must be a string".into())),
    }
}

/// Wrap plain JSON as a typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Wrap a plain JSON object as a document `fields` map.
pub fn encode_fields(map: &Map<String, Value>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}
