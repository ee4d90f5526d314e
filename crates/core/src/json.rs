// Diagnostic JSON rendering: sorted keys, four-space indent.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};

pub fn to_pretty_string<T: Serialize + ?Sized>(value: &T) -> String {
    let value = match serde_json::to_value(value) {
        Ok(value) => sort_keys(value),
        Err(error) => return format!("<unserializable: {error}>"),
    };
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    if let Err(error) = value.serialize(&mut serializer) {
        return format!("<unserializable: {error}>");
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Whole numbers without a fractional part, everything else as is.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Rebuild every object with its keys in lexicographic order.
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let sorted: Map<String, Value> =
                entries.into_iter().map(|(key, value)| (key, sort_keys(value))).collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
