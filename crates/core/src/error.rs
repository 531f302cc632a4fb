/// Errors raised while building the sensor registry or exporter
/// configuration. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No sensors configured: pass a comma-separated list of `id=location` entries with --sensors or the SENSORS environment variable")]
    NoSensors,

    #[error("Sensor entry with location {0:?} has an empty id")]
    EmptySensorId(String),

    #[error("Sensor id {0:?} is configured more than once")]
    DuplicateSensor(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
