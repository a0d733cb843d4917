use std::fmt;

use chrono::DateTime;
use serde_json::Value;

use crate::source::RawRecord;

/// Shape of a JSON value, used when reporting fields that had to be degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Bool,
            Value::Number(_) => JsonKind::Number,
            Value::String(_) => JsonKind::String,
            Value::Array(_) => JsonKind::Array,
            Value::Object(_) => JsonKind::Object,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JsonKind::Null => "null",
            JsonKind::Bool => "bool",
            JsonKind::Number => "number",
            JsonKind::String => "string",
            JsonKind::Array => "array",
            JsonKind::Object => "object",
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field that was present but had a shape the schema cannot hold.
/// The field was degraded (emptied or omitted) rather than failing the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAnomaly {
    pub field: &'static str,
    pub found: JsonKind,
}

/// Canonical record plus whatever had to be dropped to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub record: T,
    pub anomalies: Vec<FieldAnomaly>,
}

/// Scalar-or-array-or-absent → array.
///
/// Absent (or `null`) becomes `[]`, a scalar becomes `[scalar]`, an array is
/// returned unchanged. Objects cannot be stored in a text array and come back
/// as `Err` carrying the offending kind.
pub fn wrap_polymorphic(value: Option<&Value>) -> Result<Vec<Value>, JsonKind> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(obj @ Value::Object(_)) => Err(JsonKind::of(obj)),
        Some(scalar) => Ok(vec![scalar.clone()]),
    }
}

/// Rank-style fields: a string is wrapped, an array passes through, anything
/// else is `[]`. Present-but-wrong shapes are reported as `Err`.
pub fn wrap_string_or_array(value: Option<&Value>) -> Result<Vec<Value>, JsonKind> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![Value::String(s.clone())]),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(JsonKind::of(other)),
    }
}

/// Unix seconds → `YYYY-MM-DDTHH:MM:SS+00:00`.
pub fn unix_to_iso8601(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.format("%Y-%m-%dT%H:%M:%S+00:00").to_string())
}

/// Best-effort field accessor that records every degradation it makes.
pub(crate) struct FieldReader<'a> {
    raw: &'a RawRecord,
    anomalies: Vec<FieldAnomaly>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(raw: &'a RawRecord) -> Self {
        Self {
            raw,
            anomalies: Vec::new(),
        }
    }

    fn flag(&mut self, field: &'static str, found: JsonKind) {
        self.anomalies.push(FieldAnomaly { field, found });
    }

    pub(crate) fn array(&mut self, field: &'static str) -> Vec<Value> {
        let raw = self.raw;
        wrap_polymorphic(raw.get(field)).unwrap_or_else(|found| {
            self.flag(field, found);
            Vec::new()
        })
    }

    pub(crate) fn string_or_array(&mut self, field: &'static str) -> Vec<Value> {
        let raw = self.raw;
        wrap_string_or_array(raw.get(field)).unwrap_or_else(|found| {
            self.flag(field, found);
            Vec::new()
        })
    }

    pub(crate) fn text(&mut self, field: &'static str) -> Option<String> {
        let raw = self.raw;
        match raw.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => {
                self.flag(field, JsonKind::of(other));
                None
            }
        }
    }

    pub(crate) fn number(&mut self, field: &'static str) -> Option<f64> {
        let raw = self.raw;
        match raw.get(field)? {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    self.flag(field, JsonKind::String);
                    None
                }
            },
            other => {
                self.flag(field, JsonKind::of(other));
                None
            }
        }
    }

    pub(crate) fn boolean(&mut self, field: &'static str) -> Option<bool> {
        let raw = self.raw;
        match raw.get(field)? {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            other => {
                self.flag(field, JsonKind::of(other));
                None
            }
        }
    }

    /// Integer seconds plus their ISO date; accepts integral floats and
    /// numeric strings. Values chrono cannot place on the calendar are
    /// dropped with an anomaly so the pair is always complete or absent.
    pub(crate) fn unix_timestamp(&mut self, field: &'static str) -> Option<(i64, String)> {
        let raw = self.raw;
        let value = raw.get(field)?;
        let secs = match value {
            Value::Null => return None,
            Value::Number(n) => n.as_i64().or_else(|| {
                // i64::MAX as f64 rounds up to 2^63, hence the strict bound
                let in_range = |f: &f64| *f >= i64::MIN as f64 && *f < i64::MAX as f64;
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && in_range(f))
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let stamped = secs.and_then(|secs| unix_to_iso8601(secs).map(|date| (secs, date)));
        if stamped.is_none() {
            self.flag(field, JsonKind::of(value));
        }
        stamped
    }

    pub(crate) fn finish(self) -> Vec<FieldAnomaly> {
        self.anomalies
    }
}
