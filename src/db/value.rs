//! Normalization of driver-native values into JSON-safe values.
//!
//! The contract is lossless transport: binary that is valid text
//! becomes a string, other binary becomes a tagged base64 payload, and
//! timestamps are rendered in one fixed, timezone-aware, nanosecond
//! format regardless of driver.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::{json, Value};

/// Valid UTF-8 passes through as a string; anything else is tagged so
/// no byte is silently dropped or corrupted.
pub fn bytes_to_json(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => json!({
            "type": "bytes",
            "base64": BASE64.encode(bytes),
        }),
    }
}

pub fn datetime_to_json(dt: DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Drivers hand back wall-clock timestamps without an offset; Business
/// One stores server-local values which we surface as UTC.
pub fn naive_datetime_to_json(ndt: NaiveDateTime) -> Value {
    datetime_to_json(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
}

pub fn date_to_json(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

pub fn time_to_json(time: NaiveTime) -> Value {
    Value::String(time.format("%H:%M:%S%.9f").to_string())
}

/// NaN/infinity have no JSON representation and map to null.
pub fn f64_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_bytes_become_strings() {
        assert_eq!(
            bytes_to_json("warehouse 01".as_bytes()),
            Value::String("warehouse 01".to_string())
        );
    }

    #[test]
    fn non_utf8_bytes_become_tagged_base64() {
        let raw = [0xffu8, 0xfe, 0x01];
        let value = bytes_to_json(&raw);
        assert_eq!(value["type"], "bytes");
        assert_eq!(value["base64"], BASE64.encode(raw));
    }

    #[test]
    fn timestamps_render_with_nanosecond_utc() {
        let ndt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_nano_opt(10, 30, 0, 5)
            .unwrap();
        assert_eq!(
            naive_datetime_to_json(ndt),
            Value::String("2024-01-15T10:30:00.000000005Z".to_string())
        );
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(f64_to_json(f64::NAN), Value::Null);
        assert_eq!(f64_to_json(2.5), json!(2.5));
    }
}
