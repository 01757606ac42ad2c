//! Typed records produced by an external datagram tokenizer.
//!
//! Byte-level decoding of raw files is not done here; a tokenizer yields a sequence of
//! `std::io::Result<Datagram>` and signals the end of the stream by returning `None`.
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::config::{ChannelDescriptor, ChannelId};
use crate::environment::Environment;

/// One decoded datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Datagram {
    Configuration(ConfigurationDatagram),
    Environment(EnvironmentDatagram),
    Parameter(ParameterDatagram),
    Sample(SampleDatagram),
    Position(PositionDatagram),
    Motion(MotionDatagram),
    Filter(FilterDatagram),
    /// Any datagram type the demultiplexer does not handle, including annotation
    /// datagrams. These are skipped.
    Unrecognized {
        tag: String,
        timestamp: DateTime<Utc>,
    },
}

impl Datagram {
    /// Tags of the variants that decode to something other than
    /// [Datagram::Unrecognized].
    pub const KNOWN_TAGS: [&'static str; 7] = [
        "configuration",
        "environment",
        "parameter",
        "sample",
        "position",
        "motion",
        "filter",
    ];

    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Datagram::Configuration(_) => "configuration",
            Datagram::Environment(_) => "environment",
            Datagram::Parameter(_) => "parameter",
            Datagram::Sample(_) => "sample",
            Datagram::Position(_) => "position",
            Datagram::Motion(_) => "motion",
            Datagram::Filter(_) => "filter",
            Datagram::Unrecognized { tag, .. } => tag,
        }
    }

    /// Time as reported by the tokenizer, before normalization.
    #[must_use]
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Datagram::Configuration(dg) => &dg.timestamp,
            Datagram::Environment(dg) => &dg.timestamp,
            Datagram::Parameter(dg) => &dg.timestamp,
            Datagram::Sample(dg) => &dg.timestamp,
            Datagram::Position(dg) => &dg.timestamp,
            Datagram::Motion(dg) => &dg.timestamp,
            Datagram::Filter(dg) => &dg.timestamp,
            Datagram::Unrecognized { timestamp, .. } => timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDatagram {
    pub timestamp: DateTime<Utc>,
    /// Channels in the order they appear in the datagram payload.
    pub channels: Vec<ChannelDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDatagram {
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
}

/// Transmit settings for the sample datagram that follows it.
///
/// Exactly one of `frequency` or the `frequency_start`/`frequency_end` pair is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct ParameterDatagram {
    #[builder(setter(into))]
    pub channel_id: ChannelId,
    pub timestamp: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub frequency: Option<f64>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub frequency_start: Option<f64>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub frequency_end: Option<f64>,
    pub pulse_duration: f64,
    /// 0 for CW, 1 for FM
    #[builder(default)]
    pub pulse_form: u8,
    pub sample_interval: f64,
    #[builder(default)]
    pub slope: f64,
    pub transmit_power: f64,
}

/// Sample payload for one channel and one ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct SampleDatagram {
    #[builder(setter(into))]
    pub channel_id: ChannelId,
    pub timestamp: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub power: Option<Array1<i16>>,
    /// Electrical angles, one `[alongship, athwartship]` row per sample
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub angle: Option<Array2<i8>>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub complex: Option<ComplexSamples>,
}

/// Complex samples, one row per sample and one column per transducer sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexSamples {
    pub real: Array2<f32>,
    pub imag: Array2<f32>,
}

impl ComplexSamples {
    #[must_use]
    pub fn num_samples(&self) -> usize {
        self.real.nrows()
    }

    #[must_use]
    pub fn num_sectors(&self) -> usize {
        self.real.ncols()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDatagram {
    pub timestamp: DateTime<Utc>,
    /// Positioning sentence, forwarded undecoded
    pub sentence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionDatagram {
    pub timestamp: DateTime<Utc>,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub heave: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct FilterDatagram {
    #[builder(setter(into))]
    pub channel_id: ChannelId,
    pub timestamp: DateTime<Utc>,
    pub stage: u16,
    /// Complex coefficients as `[real, imag]` pairs
    #[builder(default)]
    pub coefficients: Vec<[f32; 2]>,
    pub decimation_factor: u16,
}
