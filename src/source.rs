//! Datagram sources.
//!
//! A source is any `Iterator<Item = std::io::Result<Datagram>>`; returning `None` marks
//! the end of the stream. The adapters here cover running a tokenizer on its own thread
//! and reading datagrams that have been rendered as newline-delimited JSON.
use std::io::{self, BufRead, Write};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, IntoIter};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::datagram::Datagram;

/// Default number of datagrams buffered between a background tokenizer and its consumer.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Run `datagrams` on a background thread, buffering up to `buffer` datagrams ahead of
/// the consumer.
///
/// The returned iterator blocks until the next datagram is available and ends when
/// `datagrams` is exhausted. The first error from `datagrams` is forwarded and ends the
/// stream. Dropping the returned iterator stops the background thread at its next send.
///
/// The thread reads up to `buffer + 1` datagrams from `datagrams` before the consumer
/// asks for them. If the consumer stops early, for example through
/// [Demultiplexer::process_until](crate::Demultiplexer::process_until), those
/// datagrams have been taken from `datagrams` and are lost with the iterator. Use a
/// `buffer` of 0 when the underlying reader must not run ahead of the consumer by more
/// than one datagram.
///
/// # Errors
/// If the background thread cannot be spawned.
pub fn spawn_source<I>(datagrams: I, buffer: usize) -> io::Result<IntoIter<io::Result<Datagram>>>
where
    I: IntoIterator<Item = io::Result<Datagram>> + Send + 'static,
{
    let (tx, rx) = bounded(buffer);
    thread::Builder::new()
        .name("datagram_source".into())
        .spawn(move || {
            for (idx, datagram) in datagrams.into_iter().enumerate() {
                let failed = datagram.is_err();
                if tx.send(datagram).is_err() {
                    debug!(sent = idx, "source consumer went away");
                    return;
                }
                if failed {
                    return;
                }
            }
            trace!("source exhausted");
        })?;
    Ok(rx.into_iter())
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    tag: String,
    timestamp: DateTime<Utc>,
}

/// Decode one JSON object into a [Datagram].
///
/// Objects with a `"type"` that is not a known datagram tag decode to
/// [Datagram::Unrecognized], so they only need `type` and `timestamp`.
///
/// # Errors
/// If the text is not valid JSON or does not match the datagram it claims to be.
pub fn decode_json(text: &str) -> serde_json::Result<Datagram> {
    let value: Value = serde_json::from_str(text)?;
    let envelope = Envelope::deserialize(&value)?;
    let tag = envelope.tag.as_str();
    if Datagram::KNOWN_TAGS.contains(&tag) || tag == "unrecognized" {
        serde_json::from_value(value)
    } else {
        Ok(Datagram::Unrecognized {
            tag: envelope.tag,
            timestamp: envelope.timestamp,
        })
    }
}

/// Iterator over datagrams stored one JSON object per line. Blank lines are skipped.
pub struct JsonLines<R> {
    lines: io::Lines<R>,
    line: usize,
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = io::Result<Datagram>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(err) => return Some(Err(err)),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            let line = self.line;
            return Some(decode_json(&text).map_err(|err| {
                io::Error::new(io::ErrorKind::InvalidData, format!("line {line}: {err}"))
            }));
        }
    }
}

#[must_use]
pub fn read_json_lines<R: BufRead>(reader: R) -> JsonLines<R> {
    JsonLines {
        lines: reader.lines(),
        line: 0,
    }
}

/// Write `datagram` as a single line of JSON.
///
/// # Errors
/// Any error writing to `writer`.
pub fn write_json_line<W: Write>(mut writer: W, datagram: &Datagram) -> io::Result<()> {
    serde_json::to_writer(&mut writer, datagram)?;
    writer.write_all(b"\n")
}
