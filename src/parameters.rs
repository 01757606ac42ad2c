use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ChannelId;
use crate::datagram::ParameterDatagram;
use crate::time::Timestamp;
use crate::{Error, Result};

/// Transmit frequency in whole hertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Continuous wave
    Single(u32),
    /// Frequency modulated sweep
    Sweep { start: u32, end: u32 },
}

impl Frequency {
    /// A datagram without `frequency_start` is single frequency, otherwise it is a sweep
    /// and must also have `frequency_end`. Values are truncated to whole hertz.
    ///
    /// # Errors
    /// [Error::MissingField] if the fields required by the chosen form are absent, or
    /// [Error::InvalidField] if a value is outside `0..=u32::MAX` hertz or not finite.
    pub fn from_datagram(dg: &ParameterDatagram) -> Result<Self> {
        match dg.frequency_start {
            None => {
                let freq = dg.frequency.ok_or(Error::MissingField {
                    datagram: "parameter",
                    field: "frequency",
                })?;
                Ok(Frequency::Single(whole_hertz(freq, "frequency")?))
            }
            Some(start) => {
                let end = dg.frequency_end.ok_or(Error::MissingField {
                    datagram: "parameter",
                    field: "frequency_end",
                })?;
                Ok(Frequency::Sweep {
                    start: whole_hertz(start, "frequency_start")?,
                    end: whole_hertz(end, "frequency_end")?,
                })
            }
        }
    }

    /// Center frequency of the transmit pulse
    #[must_use]
    pub fn center(&self) -> f64 {
        match self {
            Frequency::Single(f) => f64::from(*f),
            Frequency::Sweep { start, end } => (f64::from(*start) + f64::from(*end)) / 2.0,
        }
    }
}

fn whole_hertz(value: f64, field: &'static str) -> Result<u32> {
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(Error::InvalidField {
            datagram: "parameter",
            field,
        });
    }
    // in range, so the cast only drops the fraction
    Ok(value as u32)
}

/// Transmit settings for one channel and one ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub timestamp: Timestamp,
    pub frequency: Frequency,
    pub pulse_duration: f64,
    pub pulse_form: u8,
    pub sample_interval: f64,
    pub slope: f64,
    pub transmit_power: f64,
}

impl ParameterRecord {
    /// # Errors
    /// See [Frequency::from_datagram].
    pub fn from_datagram(dg: &ParameterDatagram, timestamp: Timestamp) -> Result<Self> {
        Ok(ParameterRecord {
            timestamp,
            frequency: Frequency::from_datagram(dg)?,
            pulse_duration: dg.pulse_duration,
            pulse_form: dg.pulse_form,
            sample_interval: dg.sample_interval,
            slope: dg.slope,
            transmit_power: dg.transmit_power,
        })
    }
}

/// Append-only parameter history for a single channel. Index `i` holds the settings of
/// the channel's `i`th ping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelParameters {
    records: Vec<ParameterRecord>,
}

impl ChannelParameters {
    #[must_use]
    pub fn records(&self) -> &[ParameterRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn frequencies(&self) -> impl Iterator<Item = Frequency> + '_ {
        self.records.iter().map(|r| r.frequency)
    }

    pub fn pulse_durations(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.pulse_duration)
    }

    pub fn transmit_powers(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.transmit_power)
    }

    pub fn sample_intervals(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.sample_interval)
    }

    pub fn slopes(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.slope)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.records.iter().map(|r| r.timestamp)
    }

    /// True when pulse duration, transmit power, and sample interval are the same for
    /// every ping, i.e., they can be exported once per channel rather than per ping.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        let Some(first) = self.records.first() else {
            return true;
        };
        self.records.iter().all(|r| {
            r.pulse_duration == first.pulse_duration
                && r.transmit_power == first.transmit_power
                && r.sample_interval == first.sample_interval
        })
    }
}

/// Per-channel parameter histories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterTable {
    channels: BTreeMap<ChannelId, ChannelParameters>,
}

impl ParameterTable {
    /// Make sure `channel` has an entry, even if it never receives a record.
    pub fn register(&mut self, channel: &ChannelId) {
        if !self.channels.contains_key(channel) {
            self.channels
                .insert(channel.clone(), ChannelParameters::default());
        }
    }

    /// Append a record to the history of `channel`. Channel membership is not checked.
    pub fn append(&mut self, channel: &ChannelId, record: ParameterRecord) {
        match self.channels.get_mut(channel) {
            Some(params) => params.records.push(record),
            None => {
                self.channels.insert(
                    channel.clone(),
                    ChannelParameters {
                        records: vec![record],
                    },
                );
            }
        }
    }

    #[must_use]
    pub fn get(&self, channel: &str) -> Option<&ChannelParameters> {
        self.channels.get(channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelId, &ChannelParameters)> {
        self.channels.iter()
    }

    /// Total number of records across all channels.
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.channels.values().map(ChannelParameters::len).sum()
    }
}
