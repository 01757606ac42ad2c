use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use typed_builder::TypedBuilder;

use crate::time::Timestamp;

/// Ambient water conditions as entered on the instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct Environment {
    /// Degrees Celsius
    #[builder(default)]
    pub temperature: f64,
    /// Meters
    #[builder(default)]
    pub depth: f64,
    /// pH
    #[builder(default)]
    pub acidity: f64,
    /// PSU
    #[builder(default)]
    pub salinity: f64,
    /// Meters per second
    #[builder(default)]
    pub sound_speed: f64,
    #[builder(default, setter(strip_option))]
    pub water_level_draft: Option<f64>,
    #[serde(flatten)]
    #[builder(default)]
    pub extra: Map<String, Value>,
}

/// The most recent [Environment] seen, replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    current: Option<(Timestamp, Environment)>,
}

impl EnvironmentSnapshot {
    pub fn replace(&mut self, timestamp: Timestamp, environment: Environment) {
        self.current = Some((timestamp, environment));
    }

    #[must_use]
    pub fn get(&self) -> Option<&Environment> {
        self.current.as_ref().map(|(_, env)| env)
    }

    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.current.as_ref().map(|(ts, _)| *ts)
    }
}
