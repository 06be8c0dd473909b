use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Rewrites every timestamp-shaped value in a document to an RFC 3339 UTC
/// string, recursing through objects and arrays.
///
/// Two shapes are recognized: `{seconds, nanos}` maps (also accepted with a
/// `nanoseconds` key, the form native timestamps serialize to) and strings
/// that already parse as RFC 3339.
pub fn normalize_dates(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(ts) = timestamp_from_parts(map) {
                *value = Value::String(ts);
                return;
            }
            for (_, entry) in map.iter_mut() {
                normalize_dates(entry);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize_dates(item);
            }
        }
        Value::String(s) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                *s = parsed
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Millis, true);
            }
        }
        _ => {}
    }
}

fn timestamp_from_parts(map: &serde_json::Map<String, Value>) -> Option<String> {
    if map.len() != 2 {
        return None;
    }
    let seconds = map.get("seconds")?.as_i64()?;
    let nanos = map
        .get("nanos")
        .or_else(|| map.get("nanoseconds"))?
        .as_i64()?;
    let nanos = u32::try_from(nanos).ok()?;
    let parsed = Utc.timestamp_opt(seconds, nanos).single()?;
    Some(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}
