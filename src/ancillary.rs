//! Channel-independent ancillary streams and per-channel filter coefficients.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ChannelId;
use crate::time::Timestamp;

/// One inertial motion reference sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub timestamp: Timestamp,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub heave: f32,
}

/// Motion samples in arrival order. No validation or deduplication is performed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MotionBuffer {
    samples: Vec<MotionSample>,
}

impl MotionBuffer {
    pub fn push(&mut self, sample: MotionSample) {
        self.samples.push(sample);
    }

    #[must_use]
    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A positioning sentence and the time it was logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub timestamp: Timestamp,
    pub sentence: String,
}

impl PositionEntry {
    /// Three character sentence formatter, e.g., `GGA` for `$GPGGA,...`.
    ///
    /// Only the address field is inspected; returns `None` if it is not a
    /// `$`/`!`-prefixed 5 character talker+formatter address.
    #[must_use]
    pub fn message_type(&self) -> Option<&str> {
        let sentence = self.sentence.trim_start();
        let rest = sentence
            .strip_prefix('$')
            .or_else(|| sentence.strip_prefix('!'))?;
        let address = rest.split(',').next()?;
        if address.len() != 5 || !address.is_ascii() {
            return None;
        }
        Some(&address[2..])
    }
}

/// Positioning sentences in arrival order. Sentences are not decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionLog {
    entries: Vec<PositionEntry>,
}

impl PositionLog {
    pub fn push(&mut self, entry: PositionEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[PositionEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose [PositionEntry::message_type] is in `types`.
    pub fn with_message_types<'a>(
        &'a self,
        types: &'a [&'a str],
    ) -> impl Iterator<Item = &'a PositionEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.message_type().is_some_and(|t| types.contains(&t)))
    }
}

/// Filter stage of a transceiver's signal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum FilterStage {
    /// Wideband transceiver filter (stage 1)
    Transceiver,
    /// Pulse compression filter (stage 2)
    PulseCompression,
    Other(u16),
}

impl From<u16> for FilterStage {
    fn from(value: u16) -> Self {
        match value {
            1 => FilterStage::Transceiver,
            2 => FilterStage::PulseCompression,
            v => FilterStage::Other(v),
        }
    }
}

impl From<FilterStage> for u16 {
    fn from(value: FilterStage) -> Self {
        match value {
            FilterStage::Transceiver => 1,
            FilterStage::PulseCompression => 2,
            FilterStage::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCoefficients {
    pub timestamp: Timestamp,
    /// Complex coefficients as `[real, imag]` pairs
    pub coefficients: Vec<[f32; 2]>,
    pub decimation_factor: u16,
}

/// Filter coefficients by channel and stage. A later set for the same channel and stage
/// replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterTable {
    filters: BTreeMap<ChannelId, BTreeMap<FilterStage, FilterCoefficients>>,
}

impl FilterTable {
    /// Insert `coefficients`, returning the set it replaced, if any.
    pub fn upsert(
        &mut self,
        channel: &ChannelId,
        stage: FilterStage,
        coefficients: FilterCoefficients,
    ) -> Option<FilterCoefficients> {
        match self.filters.get_mut(channel) {
            Some(stages) => stages.insert(stage, coefficients),
            None => {
                self.filters
                    .insert(channel.clone(), BTreeMap::from([(stage, coefficients)]));
                None
            }
        }
    }

    #[must_use]
    pub fn get(&self, channel: &str, stage: FilterStage) -> Option<&FilterCoefficients> {
        self.filters.get(channel)?.get(&stage)
    }

    #[must_use]
    pub fn transceiver(&self, channel: &str) -> Option<&FilterCoefficients> {
        self.get(channel, FilterStage::Transceiver)
    }

    #[must_use]
    pub fn pulse_compression(&self, channel: &str) -> Option<&FilterCoefficients> {
        self.get(channel, FilterStage::PulseCompression)
    }

    /// All filters as `(channel, stage, coefficients)`, ordered by channel id then stage.
    pub fn iter(&self) -> impl Iterator<Item = (&ChannelId, FilterStage, &FilterCoefficients)> {
        self.filters.iter().flat_map(|(channel, stages)| {
            stages
                .iter()
                .map(move |(stage, coeffs)| (channel, *stage, coeffs))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
