//! Telemetry payload returned by the eGain indoor API.
//!
//! Decoding is deliberately lenient: unknown fields are ignored and
//! missing fields take their zero value, so an empty object decodes
//! successfully. Callers must check [`Reading::is_valid`] before
//! publishing anything derived from it.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single decoded reading for one sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Reading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    pub installed: bool,
    /// Capture time reported by the upstream source. `None` when the
    /// payload left it out, empty, or at the zero instant.
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Passed through uninterpreted.
    pub external_temperatures: Vec<serde_json::Value>,
    /// Auxiliary sub-readings, in upstream order. Not interpreted.
    pub values: Vec<SubReading>,
}

/// One entry of the `values` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubReading {
    pub value: f64,
    pub unit: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Reading {
    /// Decode a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// A reading without a capture time is syntactically fine but
    /// carries no data; it must never overwrite published values.
    pub fn is_valid(&self) -> bool {
        self.timestamp.is_some()
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

/// Accepts RFC 3339 strings, `null` and `""`. The zero instant
/// (`0001-01-01T00:00:00Z`) some upstreams emit for "unset" maps to
/// `None` as well.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    let raw = match raw.as_deref().map(str::trim) {
        None | Some("") => return Ok(None),
        Some(s) => s,
    };

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(serde::de::Error::custom)?
        .with_timezone(&Utc);

    if is_zero_instant(&parsed) {
        return Ok(None);
    }
    Ok(Some(parsed))
}

fn is_zero_instant(ts: &DateTime<Utc>) -> bool {
    ts.year() == 1 && ts.ordinal() == 1 && ts.num_seconds_from_midnight() == 0
}
