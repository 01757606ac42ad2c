use std::{
    borrow::Borrow,
    collections::{BTreeMap, HashSet},
    fmt::Display,
    io,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::datagram::{ConfigurationDatagram, Datagram};
use crate::time::Timestamp;
use crate::{Error, Result};

/// Identifies one transducer channel, e.g., `WBT 545612-15 ES38-7_ES`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Static, per-channel instrument metadata from the configuration datagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct ChannelDescriptor {
    #[builder(setter(into))]
    pub channel_id: ChannelId,
    #[builder(default, setter(into))]
    pub transducer_name: String,
    #[builder(default, setter(into))]
    pub serial_number: String,
    #[builder(default, setter(into))]
    pub application_name: String,
    #[builder(default, setter(into))]
    pub application_version: String,
    #[builder(default, setter(into))]
    pub transceiver_software_version: String,
    /// Nominal frequency (Hz)
    #[builder(default)]
    pub transducer_frequency: f64,
    #[builder(default)]
    pub transducer_frequency_minimum: f64,
    #[builder(default)]
    pub transducer_frequency_maximum: f64,
    #[builder(default)]
    pub beam_width_alongship: f64,
    #[builder(default)]
    pub beam_width_athwartship: f64,
    #[builder(default)]
    pub transducer_alpha_x: f64,
    #[builder(default)]
    pub transducer_alpha_y: f64,
    #[builder(default)]
    pub transducer_alpha_z: f64,
    #[builder(default)]
    pub angle_offset_alongship: f64,
    #[builder(default)]
    pub angle_offset_athwartship: f64,
    #[builder(default)]
    pub angle_sensitivity_alongship: f64,
    #[builder(default)]
    pub angle_sensitivity_athwartship: f64,
    #[builder(default)]
    pub transducer_offset_x: f64,
    #[builder(default)]
    pub transducer_offset_y: f64,
    #[builder(default)]
    pub transducer_offset_z: f64,
    #[builder(default)]
    pub equivalent_beam_angle: f64,
    /// Gain table, one entry per supported pulse duration
    #[builder(default)]
    pub gain: Vec<f64>,
    /// Vendor fields not modeled above
    #[serde(flatten)]
    #[builder(default)]
    pub extra: Map<String, Value>,
}

impl ChannelDescriptor {
    /// A channel is broadband when its transducer covers a frequency band rather than a
    /// single frequency.
    #[must_use]
    pub fn is_broadband(&self) -> bool {
        self.transducer_frequency_minimum != self.transducer_frequency_maximum
    }
}

/// Channel layout of one file, read from its leading configuration datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub timestamp: Timestamp,
    channels: Vec<ChannelId>,
    descriptors: BTreeMap<ChannelId, ChannelDescriptor>,
}

impl Configuration {
    /// Pull exactly one datagram from `source` and build a [Configuration] from it.
    ///
    /// # Errors
    /// [Error::EmptyStream] if the source is already exhausted,
    /// [Error::MissingConfiguration] if the datagram is of any other type, any
    /// validation error from [Configuration::from_datagram], or the source's own
    /// error.
    pub fn load<I>(source: &mut I) -> Result<Self>
    where
        I: Iterator<Item = io::Result<Datagram>>,
    {
        match source.next() {
            None => Err(Error::EmptyStream),
            Some(Err(err)) => Err(Error::Io(err)),
            Some(Ok(Datagram::Configuration(dg))) => Self::from_datagram(dg),
            Some(Ok(other)) => Err(Error::MissingConfiguration {
                found: other.tag().to_string(),
            }),
        }
    }

    /// Channel order is the order channels appear in the datagram.
    ///
    /// # Errors
    /// [Error::NoChannels], [Error::DuplicateChannel], or [Error::MissingField] if a
    /// channel has an empty id.
    pub fn from_datagram(dg: ConfigurationDatagram) -> Result<Self> {
        if dg.channels.is_empty() {
            return Err(Error::NoChannels);
        }
        let mut seen = HashSet::new();
        let mut channels = Vec::with_capacity(dg.channels.len());
        let mut descriptors = BTreeMap::new();
        for desc in dg.channels {
            if desc.channel_id.as_str().is_empty() {
                return Err(Error::MissingField {
                    datagram: "configuration",
                    field: "channel_id",
                });
            }
            if !seen.insert(desc.channel_id.clone()) {
                return Err(Error::DuplicateChannel(desc.channel_id));
            }
            channels.push(desc.channel_id.clone());
            descriptors.insert(desc.channel_id.clone(), desc);
        }

        let config = Configuration {
            timestamp: Timestamp::normalize(&dg.timestamp),
            channels,
            descriptors,
        };
        debug!(channels = ?config.channels, timestamp = %config.timestamp, "loaded configuration");
        Ok(config)
    }

    /// Channel ids in cycle order.
    #[must_use]
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn descriptor(&self, channel: &str) -> Option<&ChannelDescriptor> {
        self.descriptors.get(channel)
    }

    /// Descriptors in cycle order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.channels
            .iter()
            .filter_map(|id| self.descriptors.get(id))
    }
}
