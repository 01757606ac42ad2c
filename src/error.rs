use crate::config::ChannelId;

/// Broad classification of an [Error].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural violation at the stream boundary or in a record's field set.
    Format,
    /// The stream lost its parameter/data pairing.
    Protocol,
    /// Fault raised by the record source itself.
    Stream,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// IO or tokenizer error produced by the record source
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("stream ended before a configuration datagram was read")]
    EmptyStream,

    #[error("expected a configuration datagram first; got {found}")]
    MissingConfiguration {
        /// Tag of the datagram found instead
        found: String,
    },

    #[error("configuration declares no channels")]
    NoChannels,

    #[error("channel {0} declared more than once in configuration")]
    DuplicateChannel(ChannelId),

    #[error("{datagram} datagram is missing field {field}")]
    MissingField {
        datagram: &'static str,
        field: &'static str,
    },

    /// A sample datagram does not belong to the channel of the parameter datagram
    /// that preceded it.
    #[error("sample datagram for channel {found} does not follow its parameter datagram (last parameter channel: {expected:?})")]
    ChannelMismatch {
        /// Channel of the most recent parameter datagram, if any
        expected: Option<ChannelId>,
        /// Channel of the offending sample datagram
        found: ChannelId,
    },

    /// A sample datagram names a channel that is not part of the configured cycle.
    #[error("sample datagram for channel {0} which is not in the configuration")]
    UnknownChannel(ChannelId),

    #[error("{datagram} datagram field {field} is not a valid value")]
    InvalidField {
        datagram: &'static str,
        field: &'static str,
    },
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Stream,
            Error::ChannelMismatch { .. } | Error::UnknownChannel(_) => ErrorKind::Protocol,
            Error::EmptyStream
            | Error::MissingConfiguration { .. }
            | Error::NoChannels
            | Error::DuplicateChannel(_)
            | Error::MissingField { .. }
            | Error::InvalidField { .. } => ErrorKind::Format,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
