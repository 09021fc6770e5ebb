//! Conversion between plain JSON and Firestore's typed value encoding
//! (`{"stringValue": "..."}`, `{"integerValue": "3"}`, ...)

use serde_json::{json, Map, Number, Value};

use super::{Fields, StoreError};

/// Encode plain fields as a Firestore `fields` object
pub fn encode_fields(fields: &Fields) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(encoded)
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // int64 travels as a decimal string
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Decode a Firestore `fields` object into plain fields
pub fn decode_fields(raw: &Map<String, Value>) -> Result<Fields, StoreError> {
    raw.iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

pub fn decode_value(raw: &Value) -> Result<Value, StoreError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| StoreError::Decode(format!("value is not an object: {}", raw)))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| StoreError::Decode("empty value".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| bad(kind, inner)),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| bad(kind, inner))
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            // NaN and infinities have no JSON form
            Ok(parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| bad(kind, inner)),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<Result<Vec<_>, _>>()?,
                _ => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            _ => Ok(Value::Object(Map::new())),
        },
        other => Err(StoreError::Decode(format!("unsupported value type '{}'", other))),
    }
}

fn bad(kind: &str, inner: &Value) -> StoreError {
    StoreError::Decode(format!("malformed {}: {}", kind, inner))
}
