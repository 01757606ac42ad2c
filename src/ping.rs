use std::collections::HashMap;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::ChannelId;
use crate::datagram::{ComplexSamples, SampleDatagram};
use crate::time::Timestamp;

/// Which sample arrays a [DataRecord] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Empty,
    Power,
    Angle,
    PowerAngle,
    Complex,
}

/// Samples for one channel and one ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub channel_id: ChannelId,
    pub timestamp: Timestamp,
    pub power: Option<Array1<i16>>,
    pub angle: Option<Array2<i8>>,
    pub complex: Option<ComplexSamples>,
}

impl DataRecord {
    #[must_use]
    pub fn from_datagram(dg: SampleDatagram, timestamp: Timestamp) -> Self {
        DataRecord {
            channel_id: dg.channel_id,
            timestamp,
            power: dg.power,
            angle: dg.angle,
            complex: dg.complex,
        }
    }

    #[must_use]
    pub fn kind(&self) -> SampleKind {
        match (&self.power, &self.angle, &self.complex) {
            (_, _, Some(_)) => SampleKind::Complex,
            (Some(_), Some(_), None) => SampleKind::PowerAngle,
            (Some(_), None, None) => SampleKind::Power,
            (None, Some(_), None) => SampleKind::Angle,
            (None, None, None) => SampleKind::Empty,
        }
    }

    #[must_use]
    pub fn num_samples(&self) -> usize {
        if let Some(power) = &self.power {
            power.len()
        } else if let Some(angle) = &self.angle {
            angle.nrows()
        } else if let Some(complex) = &self.complex {
            complex.num_samples()
        } else {
            0
        }
    }
}

/// One synchronized transmit/receive cycle with samples from every configured channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingRecord {
    /// Time of the cycle's first channel
    pub timestamp: Timestamp,
    channels: Vec<DataRecord>,
}

impl PingRecord {
    /// Records in cycle order.
    #[must_use]
    pub fn channels(&self) -> &[DataRecord] {
        &self.channels
    }

    #[must_use]
    pub fn get(&self, channel: &str) -> Option<&DataRecord> {
        self.channels.iter().find(|r| r.channel_id.as_str() == channel)
    }

    #[must_use]
    pub fn into_channels(self) -> Vec<DataRecord> {
        self.channels
    }
}

/// End of stream was reached part way through a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    /// Channels buffered for the discarded cycle, in arrival order
    pub buffered: Vec<ChannelId>,
    /// Number of channels a complete cycle requires
    pub expected: usize,
}

/// Collects [DataRecord]s until every configured channel has contributed exactly one in
/// cycle order, then produces a [PingRecord].
///
/// A record for the first channel always starts a new cycle. A record for any other
/// channel must be the next one expected in cycle order; if it is not, the buffered
/// cycle can no longer complete and is dropped along with the record. The channels of
/// a broken cycle are remembered until the next first-channel record so that
/// [PingAssembler::finish] still reports it.
#[derive(Debug)]
pub struct PingAssembler {
    order: Vec<ChannelId>,
    buffer: Vec<DataRecord>,
    broken: Option<Vec<ChannelId>>,
    kinds: HashMap<ChannelId, SampleKind>,
    discarded: usize,
}

impl PingAssembler {
    /// `order` must not be empty.
    #[must_use]
    pub fn new(order: Vec<ChannelId>) -> Self {
        PingAssembler {
            order,
            buffer: Vec::default(),
            broken: None,
            kinds: HashMap::default(),
            discarded: 0,
        }
    }

    /// True when no cycle is in progress, broken or otherwise.
    #[must_use]
    pub fn is_awaiting_start(&self) -> bool {
        self.buffer.is_empty() && self.broken.is_none()
    }

    /// Configured cycle order.
    #[must_use]
    pub fn order(&self) -> &[ChannelId] {
        &self.order
    }

    /// Channels buffered for the cycle in progress.
    pub fn buffered(&self) -> impl Iterator<Item = &ChannelId> {
        self.buffer.iter().map(|r| &r.channel_id)
    }

    /// Number of records dropped without being committed, not counting any still buffered.
    #[must_use]
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Add a record, returning a [PingRecord] if it completes the current cycle.
    pub fn push(&mut self, record: DataRecord) -> Option<PingRecord> {
        self.check_kind(&record);

        let is_first = self.order.first() == Some(&record.channel_id);
        if is_first {
            self.broken = None;
            if !self.buffer.is_empty() {
                warn!(
                    channel = %record.channel_id,
                    buffered = self.buffer.len(),
                    expected = self.order.len(),
                    "new cycle started before previous completed; dropping"
                );
                self.drop_buffer();
            }
        } else if self.buffer.is_empty()
            || self.order.get(self.buffer.len()) != Some(&record.channel_id)
        {
            if self.broken.is_none() {
                let mut ids: Vec<ChannelId> = self.buffered().cloned().collect();
                ids.push(record.channel_id.clone());
                warn!(
                    channel = %record.channel_id,
                    buffered = self.buffer.len(),
                    "record out of cycle order; dropping cycle"
                );
                self.broken = Some(ids);
            } else {
                debug!(channel = %record.channel_id, "dropping record of broken cycle");
            }
            self.drop_buffer();
            self.discarded += 1;
            return None;
        }

        self.buffer.push(record);

        if self.buffer.len() == self.order.len()
            && self
                .buffer
                .iter()
                .map(|r| &r.channel_id)
                .eq(self.order.iter())
        {
            let channels = std::mem::take(&mut self.buffer);
            let ping = PingRecord {
                timestamp: channels[0].timestamp,
                channels,
            };
            trace!(timestamp = %ping.timestamp, "committed ping");
            return Some(ping);
        }
        None
    }

    /// Finish assembly, reporting a [Truncation] if a cycle was in progress, including
    /// one that was already broken. The partial cycle is discarded.
    pub fn finish(&mut self) -> Option<Truncation> {
        let buffered = if self.buffer.is_empty() {
            self.broken.take()?
        } else {
            self.broken = None;
            self.buffered().cloned().collect()
        };
        self.drop_buffer();
        Some(Truncation {
            buffered,
            expected: self.order.len(),
        })
    }

    fn drop_buffer(&mut self) {
        self.discarded += self.buffer.len();
        self.buffer.clear();
    }

    fn check_kind(&mut self, record: &DataRecord) {
        let kind = record.kind();
        if let Some(prev) = self.kinds.insert(record.channel_id.clone(), kind) {
            if prev != kind {
                warn!(channel = %record.channel_id, previous = ?prev, current = ?kind, "sample representation changed");
            }
        }
    }
}
