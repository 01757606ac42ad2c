#![doc = include_str!("../README.md")]

mod error;

pub mod ancillary;
pub mod config;
pub mod datagram;
pub mod demux;
pub mod environment;
pub mod parameters;
pub mod ping;
pub mod source;
pub mod time;

pub use config::{ChannelDescriptor, ChannelId, Configuration};
pub use datagram::Datagram;
pub use demux::{demultiplex, Accumulators, Demultiplexer, Outcome, Summary};
pub use error::{Error, ErrorKind, Result};
pub use ping::{DataRecord, PingRecord, Truncation};
pub use time::Timestamp;
