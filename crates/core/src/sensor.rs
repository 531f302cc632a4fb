//! Configured sensors and the registry that holds them.
//!
//! The registry is built once at startup and never changes shape. The
//! only mutable part of a [`Sensor`] is the capture time of its last
//! accepted reading, which the poller records after each valid fetch.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;

/// A remote eGain indoor sensor.
#[derive(Debug)]
pub struct Sensor {
    id: String,
    location: String,
    last_reading: RwLock<Option<DateTime<Utc>>>,
}

/// Point-in-time view of a sensor, suitable for JSON responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub id: String,
    pub location: String,
    pub last_reading: Option<DateTime<Utc>>,
}

impl Sensor {
    pub fn new(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            last_reading: RwLock::new(None),
        }
    }

    /// Opaque upstream identifier, used as the URL path segment.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Free-text location label. May be empty.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Capture time of the last reading accepted for this sensor.
    pub fn last_reading(&self) -> Option<DateTime<Utc>> {
        *self
            .last_reading
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the capture time of a newly accepted reading.
    pub fn record_reading(&self, captured_at: DateTime<Utc>) {
        let mut guard = self
            .last_reading
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(captured_at);
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            id: self.id.clone(),
            location: self.location.clone(),
            last_reading: self.last_reading(),
        }
    }
}

/// Immutable, ordered list of configured sensors with unique ids.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    sensors: Vec<Arc<Sensor>>,
}

impl SensorRegistry {
    /// Build a registry from `(id, location)` pairs, preserving order.
    ///
    /// Fails if the list is empty, an id is blank, or an id repeats.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut sensors = Vec::new();

        for (id, location) in entries {
            let id: String = id.into();
            let location: String = location.into();
            let id = id.trim().to_string();

            if id.is_empty() {
                return Err(CoreError::EmptySensorId(location));
            }
            if !seen.insert(id.clone()) {
                return Err(CoreError::DuplicateSensor(id));
            }

            sensors.push(Arc::new(Sensor::new(id, location.trim())));
        }

        if sensors.is_empty() {
            return Err(CoreError::NoSensors);
        }

        Ok(Self { sensors })
    }

    /// Parse the `id=location,id2=location2` syntax used by `--sensors`.
    ///
    /// An entry without `=` is a bare id with an empty location. Blank
    /// entries (e.g. a trailing comma) are ignored.
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        let entries = spec
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once('=') {
                Some((id, location)) => (id.to_string(), location.to_string()),
                None => (entry.to_string(), String::new()),
            })
            .collect::<Vec<_>>();

        Self::from_entries(entries)
    }

    pub fn sensors(&self) -> &[Arc<Sensor>] {
        &self.sensors
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Sensor>> {
        self.sensors.iter().find(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn snapshot(&self) -> Vec<SensorSnapshot> {
        self.sensors.iter().map(|s| s.snapshot()).collect()
    }
}
