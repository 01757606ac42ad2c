mod common;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use ekdemux::source::{read_json_lines, spawn_source, write_json_line, DEFAULT_BUFFER_SIZE};
use ekdemux::{ChannelId, Demultiplexer, Error, ErrorKind, Timestamp};
use md5::{Digest, Md5};
use test_case::test_case;

use common::{config, environment, param, sample, time, StreamGenerator};

#[test]
fn one_complete_cycle() {
    let stream = vec![
        config(&["A", "B"]),
        param("A", 1),
        sample("A", 1),
        param("B", 2),
        sample("B", 2),
    ];

    let mut demux = Demultiplexer::new();
    let outcome = demux.process(stream).unwrap();

    assert_eq!(outcome.pings, 1);
    assert!(outcome.truncation.is_none());
    let pings = demux.pings();
    assert_eq!(pings.len(), 1);
    let ids: Vec<&str> = pings[0]
        .channels()
        .iter()
        .map(|r| r.channel_id.as_str())
        .collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[test]
fn incomplete_cycle_at_end_of_stream() {
    let stream = vec![config(&["A", "B"]), param("A", 1), sample("A", 1), param("B", 2)];

    let mut demux = Demultiplexer::new();
    let outcome = demux.process(stream).unwrap();

    assert_eq!(outcome.pings, 0);
    assert!(demux.pings().is_empty());
    assert!(outcome.is_truncated());
}

#[test]
fn sample_for_wrong_channel() {
    let stream = vec![
        config(&["A", "B"]),
        param("A", 1),
        sample("A", 1),
        param("B", 2),
        sample("A", 2),
    ];

    let mut demux = Demultiplexer::new();
    let err = demux.process(stream).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(matches!(err, Error::ChannelMismatch { .. }));
    let a = demux.parameters().get("A").unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a.records()[0].timestamp, Timestamp::normalize(&time(1)));
    assert!(demux.pings().is_empty());
}

#[test_case(&["38k"], 10, 1)]
#[test_case(&["18k", "38k"], 25, 2)]
#[test_case(&["18k", "38k", "70k", "120k", "200k"], 40, 3)]
fn ping_count_matches_cycles(channels: &[&str], pings: usize, seed: u64) {
    let stream = StreamGenerator::new(seed).generate(channels, pings);
    let num_samples = stream
        .iter()
        .filter(|dg| matches!(dg, Ok(ekdemux::Datagram::Sample(_))))
        .count();

    let mut demux = Demultiplexer::new();
    let outcome = demux.process(stream).unwrap();

    assert_eq!(num_samples, channels.len() * pings);
    assert_eq!(outcome.pings, num_samples / channels.len());
    assert_eq!(demux.pings().len(), pings);
    assert!(!outcome.is_truncated());
    assert_eq!(demux.summary().discarded_samples, 0);
    for channel in channels {
        assert_eq!(
            demux.parameters().get(channel).unwrap().len(),
            pings,
            "parameter count for {channel}"
        );
    }
}

#[test]
fn pings_preserve_arrival_order() {
    let channels = ["18k", "38k", "120k"];
    let stream = StreamGenerator::new(7).generate(&channels, 30);
    let base = Timestamp::normalize(&time(0)).millis();

    let mut demux = Demultiplexer::new();
    demux.process(stream).unwrap();

    let mut last = i64::MIN;
    for ping in demux.pings() {
        assert_eq!(ping.timestamp, ping.channels()[0].timestamp);
        for (record, channel) in ping.channels().iter().zip(channels) {
            assert_eq!(record.channel_id, ChannelId::from(channel));
            let millis = record.timestamp.millis();
            assert!(millis > last, "records out of arrival order");
            last = millis;
            // samples are tagged with the time they were generated at
            let power = record.power.as_ref().unwrap();
            assert_eq!(i64::from(power[0]), millis - base);
        }
    }
}

fn digest(demux: &Demultiplexer) -> String {
    let json = serde_json::to_vec(demux).unwrap();
    hex::encode(Md5::digest(json))
}

#[test]
fn repeat_runs_are_identical() {
    let channels = ["18k", "38k", "70k"];
    let first = StreamGenerator::new(42).generate(&channels, 20);
    let second = StreamGenerator::new(42).generate(&channels, 20);

    let mut a = Demultiplexer::new();
    a.process(first).unwrap();
    let mut b = Demultiplexer::new();
    b.process(second).unwrap();

    assert_eq!(a, b);
    assert_eq!(digest(&a), digest(&b));
}

#[test]
fn environment_reflects_last_datagram() {
    let stream = vec![
        config(&["A"]),
        Ok(environment(1, 4.0)),
        param("A", 2),
        Ok(environment(3, 5.0)),
        sample("A", 2),
        Ok(environment(4, 6.0)),
    ];

    let mut demux = Demultiplexer::new();
    demux.process(stream).unwrap();

    let env = demux.environment().get().unwrap();
    assert_eq!(env.temperature, 6.0);
    assert_eq!(
        demux.environment().timestamp(),
        Some(Timestamp::normalize(&time(4)))
    );
}

#[test]
fn mismatch_after_committed_pings() {
    let channels = ["18k", "38k"];
    let mut stream = StreamGenerator::new(11).generate(&channels, 5);
    stream.push(param("18k", 100_000));
    stream.push(sample("18k", 100_000));
    stream.push(param("38k", 100_001));
    stream.push(sample("18k", 100_001));
    stream.push(param("38k", 100_002));
    stream.push(sample("38k", 100_002));

    let mut demux = Demultiplexer::new();
    let err = demux.process(stream).unwrap_err();

    assert!(matches!(err, Error::ChannelMismatch { .. }));
    assert_eq!(demux.pings().len(), 5);
    assert_eq!(demux.parameters().get("38k").unwrap().len(), 6);
}

#[test]
fn session_over_json_lines_files() {
    let channels = ["18k", "38k"];
    let tmpdir = tempfile::tempdir().unwrap();
    let mut generator = StreamGenerator::new(3);
    let mut paths = Vec::default();
    for (idx, pings) in [12, 8].into_iter().enumerate() {
        let path = tmpdir.path().join(format!("D20190822-T16122{idx}.jsonl"));
        let mut writer = BufWriter::new(File::create(&path).unwrap());
        for dg in generator.generate(&channels, pings) {
            write_json_line(&mut writer, &dg.unwrap()).unwrap();
        }
        writer.flush().unwrap();
        paths.push(path);
    }

    let mut demux = Demultiplexer::new();
    let mut committed = 0;
    for path in &paths {
        let reader = BufReader::new(File::open(path).unwrap());
        let outcome = demux.process(read_json_lines(reader)).unwrap();
        assert!(!outcome.is_truncated());
        committed += outcome.pings;
    }

    assert_eq!(committed, 20);
    assert_eq!(demux.pings().len(), 20);
    assert_eq!(demux.summary().files, 2);
    assert_eq!(demux.parameters().get("38k").unwrap().len(), 20);
}

#[test]
fn spawned_source_matches_direct_source() {
    let channels = ["18k", "38k", "70k", "120k"];
    let direct = StreamGenerator::new(5).generate(&channels, 50);
    let threaded = StreamGenerator::new(5).generate(&channels, 50);

    let mut a = Demultiplexer::new();
    a.process(direct).unwrap();
    let mut b = Demultiplexer::new();
    b.process(spawn_source(threaded, DEFAULT_BUFFER_SIZE).unwrap())
        .unwrap();

    assert_eq!(b.pings().len(), 50);
    assert_eq!(a, b);
}

#[test]
fn stop_signal_keeps_committed_pings() {
    let channels = ["18k", "38k"];
    let stream = StreamGenerator::new(9).generate(&channels, 10);
    let (stop_tx, stop_rx) = crossbeam::channel::bounded(1);
    stop_tx.send(()).unwrap();

    let mut demux = Demultiplexer::new();
    let outcome = demux.process_until(stream, &stop_rx).unwrap();

    // configuration is always read; the stop is seen before the next datagram
    assert!(outcome.cancelled);
    assert_eq!(outcome.pings, 0);
    assert_eq!(demux.summary().files, 1);
    assert!(demux.configuration().is_some());
}
