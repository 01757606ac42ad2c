use std::collections::BTreeMap;
use std::io;

use crossbeam::channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, span, trace, warn, Level};

use crate::ancillary::{
    FilterCoefficients, FilterStage, FilterTable, MotionBuffer, MotionSample, PositionEntry,
    PositionLog,
};
use crate::config::{ChannelId, Configuration};
use crate::datagram::Datagram;
use crate::environment::EnvironmentSnapshot;
use crate::parameters::{ParameterRecord, ParameterTable};
use crate::ping::{DataRecord, PingAssembler, PingRecord, Truncation};
use crate::time::Timestamp;
use crate::{Error, Result};

/// Counts of what has been processed, across all files.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of files (configuration datagrams) processed
    pub files: usize,
    /// Datagram count by tag, including skipped tags
    pub datagrams: BTreeMap<String, usize>,
    /// Datagrams skipped because they are not handled
    pub skipped: usize,
    pub pings: usize,
    /// Sample datagrams dropped because their cycle never completed
    pub discarded_samples: usize,
    /// Files that ended part way through a cycle
    pub truncated: usize,
    /// Files whose channel order differed from the file before it
    pub channel_order_changes: usize,
}

impl Summary {
    fn add(&mut self, tag: &str) {
        match self.datagrams.get_mut(tag) {
            Some(count) => *count += 1,
            None => {
                self.datagrams.insert(tag.to_string(), 1);
            }
        }
    }

    /// Total datagrams processed, not counting configuration datagrams that start a file.
    #[must_use]
    pub fn total(&self) -> usize {
        self.datagrams.values().sum()
    }
}

/// Result of processing one file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Pings committed while processing this file
    pub pings: usize,
    /// Set when the stream ended part way through a cycle. This is advisory; all
    /// committed pings are valid.
    pub truncation: Option<Truncation>,
    /// Set when processing was halted by a stop signal before the end of the stream
    pub cancelled: bool,
}

impl Outcome {
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
}

/// Everything accumulated by a [Demultiplexer].
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accumulators {
    /// Configuration of the most recent file
    pub configuration: Option<Configuration>,
    pub pings: Vec<PingRecord>,
    pub parameters: ParameterTable,
    pub motion: MotionBuffer,
    pub positions: PositionLog,
    pub filters: FilterTable,
    pub environment: EnvironmentSnapshot,
}

/// State that does not carry over from one file to the next.
struct FileState {
    assembler: PingAssembler,
    last_parameter: Option<ChannelId>,
}

/// Splits a datagram stream into per-type accumulators and assembles per-channel samples
/// into [PingRecord]s.
///
/// Each call to [Demultiplexer::process] handles one file, which must begin with a
/// configuration datagram. Accumulators persist across calls, so the files of one
/// recording session can be processed in order by the same demultiplexer.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use ekdemux::{ChannelDescriptor, Datagram, Demultiplexer};
/// use ekdemux::datagram::ConfigurationDatagram;
///
/// let config = Datagram::Configuration(ConfigurationDatagram {
///     timestamp: Utc.with_ymd_and_hms(2019, 8, 22, 16, 12, 21).unwrap(),
///     channels: vec![ChannelDescriptor::builder().channel_id("38k").build()],
/// });
///
/// let mut demux = Demultiplexer::new();
/// let outcome = demux.process(vec![Ok(config)]).unwrap();
/// assert_eq!(outcome.pings, 0);
/// assert_eq!(demux.configuration().unwrap().num_channels(), 1);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demultiplexer {
    acc: Accumulators,
    summary: Summary,
}

impl Demultiplexer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one file's datagrams until `source` is exhausted.
    ///
    /// # Errors
    /// A format error if the first datagram is not a valid configuration datagram or a
    /// parameter datagram has missing or invalid frequency fields,
    /// [Error::UnknownChannel] if a sample datagram names a channel the configuration
    /// does not declare, [Error::ChannelMismatch] if a sample datagram is not for the
    /// channel of the parameter datagram before it, or the source's own error. Processing stops at the first error; everything
    /// accumulated before it remains available.
    pub fn process<I>(&mut self, source: I) -> Result<Outcome>
    where
        I: IntoIterator<Item = io::Result<Datagram>>,
    {
        self.run(source.into_iter(), None)
    }

    /// Like [Demultiplexer::process], but checks `stop` before pulling each datagram and
    /// halts if a stop message has been sent. Any partially assembled cycle is dropped.
    ///
    /// # Errors
    /// See [Demultiplexer::process].
    pub fn process_until<I>(&mut self, source: I, stop: &Receiver<()>) -> Result<Outcome>
    where
        I: IntoIterator<Item = io::Result<Datagram>>,
    {
        self.run(source.into_iter(), Some(stop))
    }

    fn run<I>(&mut self, mut source: I, stop: Option<&Receiver<()>>) -> Result<Outcome>
    where
        I: Iterator<Item = io::Result<Datagram>>,
    {
        let config = Configuration::load(&mut source)?;
        let span = span!(Level::DEBUG, "file", index = self.summary.files);
        let _guard = span.enter();

        let mut file = FileState {
            assembler: PingAssembler::new(config.channels().to_vec()),
            last_parameter: None,
        };
        self.install(config);

        let mut outcome = Outcome::default();
        loop {
            if stop.is_some_and(|stop| stop.try_recv().is_ok()) {
                debug!("stop requested");
                outcome.cancelled = true;
                break;
            }
            let Some(datagram) = source.next() else {
                break;
            };
            if let Some(ping) = self.dispatch(datagram?, &mut file)? {
                self.acc.pings.push(ping);
                self.summary.pings += 1;
                outcome.pings += 1;
            }
        }

        if let Some(truncation) = file.assembler.finish() {
            if outcome.cancelled {
                debug!(
                    buffered = truncation.buffered.len(),
                    "dropping partial ping after stop"
                );
            } else {
                warn!(
                    buffered = truncation.buffered.len(),
                    expected = truncation.expected,
                    "stream ended part way through a cycle; dropping partial ping"
                );
                self.summary.truncated += 1;
                outcome.truncation = Some(truncation);
            }
        }
        self.summary.discarded_samples += file.assembler.discarded();

        debug!(
            pings = outcome.pings,
            discarded = file.assembler.discarded(),
            "finished file"
        );
        Ok(outcome)
    }

    fn install(&mut self, config: Configuration) {
        if let Some(prev) = &self.acc.configuration {
            if prev.channels() != config.channels() {
                warn!(
                    previous = ?prev.channels(),
                    current = ?config.channels(),
                    "channel order changed between files"
                );
                self.summary.channel_order_changes += 1;
            }
        }
        for channel in config.channels() {
            self.acc.parameters.register(channel);
        }
        self.acc.configuration = Some(config);
        self.summary.files += 1;
    }

    /// Route a single datagram to its accumulator, returning a ping if the datagram
    /// completed one.
    fn dispatch(
        &mut self,
        datagram: Datagram,
        file: &mut FileState,
    ) -> Result<Option<PingRecord>> {
        let timestamp = Timestamp::normalize(datagram.timestamp());
        self.summary.add(datagram.tag());
        trace!(tag = datagram.tag(), %timestamp, "datagram");

        match datagram {
            Datagram::Environment(dg) => {
                self.acc.environment.replace(timestamp, dg.environment);
            }
            Datagram::Parameter(dg) => {
                let record = ParameterRecord::from_datagram(&dg, timestamp)?;
                self.acc.parameters.append(&dg.channel_id, record);
                file.last_parameter = Some(dg.channel_id);
            }
            Datagram::Sample(dg) => {
                if !file.assembler.order().contains(&dg.channel_id) {
                    return Err(Error::UnknownChannel(dg.channel_id));
                }
                if file.last_parameter.as_ref() != Some(&dg.channel_id) {
                    return Err(Error::ChannelMismatch {
                        expected: file.last_parameter.clone(),
                        found: dg.channel_id,
                    });
                }
                return Ok(file
                    .assembler
                    .push(DataRecord::from_datagram(dg, timestamp)));
            }
            Datagram::Position(dg) => {
                self.acc.positions.push(PositionEntry {
                    timestamp,
                    sentence: dg.sentence,
                });
            }
            Datagram::Motion(dg) => {
                self.acc.motion.push(MotionSample {
                    timestamp,
                    heading: dg.heading,
                    pitch: dg.pitch,
                    roll: dg.roll,
                    heave: dg.heave,
                });
            }
            Datagram::Filter(dg) => {
                self.acc.filters.upsert(
                    &dg.channel_id,
                    FilterStage::from(dg.stage),
                    FilterCoefficients {
                        timestamp,
                        coefficients: dg.coefficients,
                        decimation_factor: dg.decimation_factor,
                    },
                );
            }
            // Only the first configuration datagram of a file is meaningful
            Datagram::Configuration(_) => {
                debug!("skipping repeated configuration datagram");
                self.summary.skipped += 1;
            }
            Datagram::Unrecognized { tag, .. } => {
                debug!(tag = %tag, "skipping unrecognized datagram");
                self.summary.skipped += 1;
            }
        }
        Ok(None)
    }

    /// Configuration of the most recently processed file.
    #[must_use]
    pub fn configuration(&self) -> Option<&Configuration> {
        self.acc.configuration.as_ref()
    }

    /// Committed pings in the order they were completed.
    #[must_use]
    pub fn pings(&self) -> &[PingRecord] {
        &self.acc.pings
    }

    pub fn ping_times(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.acc.pings.iter().map(|p| p.timestamp)
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterTable {
        &self.acc.parameters
    }

    #[must_use]
    pub fn motion(&self) -> &MotionBuffer {
        &self.acc.motion
    }

    #[must_use]
    pub fn positions(&self) -> &PositionLog {
        &self.acc.positions
    }

    #[must_use]
    pub fn filters(&self) -> &FilterTable {
        &self.acc.filters
    }

    #[must_use]
    pub fn environment(&self) -> &EnvironmentSnapshot {
        &self.acc.environment
    }

    #[must_use]
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    #[must_use]
    pub fn accumulators(&self) -> &Accumulators {
        &self.acc
    }

    #[must_use]
    pub fn into_accumulators(self) -> Accumulators {
        self.acc
    }
}

/// Process a single file with a new [Demultiplexer].
///
/// # Errors
/// See [Demultiplexer::process].
pub fn demultiplex<I>(source: I) -> Result<(Accumulators, Outcome)>
where
    I: IntoIterator<Item = io::Result<Datagram>>,
{
    let mut demux = Demultiplexer::new();
    let outcome = demux.process(source)?;
    Ok((demux.into_accumulators(), outcome))
}
