use std::io;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use ekdemux::datagram::{
    ConfigurationDatagram, EnvironmentDatagram, FilterDatagram, MotionDatagram,
    ParameterDatagram, PositionDatagram, SampleDatagram,
};
use ekdemux::environment::Environment;
use ekdemux::{ChannelDescriptor, Datagram};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub type Stream = Vec<io::Result<Datagram>>;

pub fn time(millis: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 8, 22, 16, 12, 21).unwrap() + TimeDelta::milliseconds(millis)
}

pub fn config(ids: &[&str]) -> io::Result<Datagram> {
    Ok(Datagram::Configuration(ConfigurationDatagram {
        timestamp: time(0),
        channels: ids
            .iter()
            .map(|id| {
                ChannelDescriptor::builder()
                    .channel_id(*id)
                    .transducer_name("ES38-7")
                    .transducer_frequency(38000.0)
                    .transducer_frequency_minimum(38000.0)
                    .transducer_frequency_maximum(38000.0)
                    .build()
            })
            .collect(),
    }))
}

pub fn param(channel: &str, millis: i64) -> io::Result<Datagram> {
    Ok(Datagram::Parameter(
        ParameterDatagram::builder()
            .channel_id(channel)
            .timestamp(time(millis))
            .frequency(38000.0)
            .pulse_duration(0.001024)
            .sample_interval(2.56e-5)
            .transmit_power(2000.0)
            .build(),
    ))
}

/// Power samples are tagged with `millis` so records can be told apart.
pub fn sample(channel: &str, millis: i64) -> io::Result<Datagram> {
    Ok(Datagram::Sample(
        SampleDatagram::builder()
            .channel_id(channel)
            .timestamp(time(millis))
            .power(Array1::from_elem(8, millis as i16))
            .build(),
    ))
}

pub fn environment(millis: i64, temperature: f64) -> Datagram {
    Datagram::Environment(EnvironmentDatagram {
        timestamp: time(millis),
        environment: Environment::builder()
            .temperature(temperature)
            .sound_speed(1480.0)
            .build(),
    })
}

/// Generates well-formed streams: `pings` complete cycles over `channels`, with motion,
/// position, filter, environment, and unrecognized datagrams mixed in at random.
pub struct StreamGenerator {
    rng: StdRng,
    clock: i64,
}

impl StreamGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            clock: 0,
        }
    }

    fn tick(&mut self) -> i64 {
        self.clock += self.rng.gen_range(1..50);
        self.clock
    }

    fn ancillary(&mut self, channels: &[&str], stream: &mut Stream) {
        while self.rng.gen_bool(0.3) {
            let t = self.tick();
            let dg = match self.rng.gen_range(0..5) {
                0 => Datagram::Motion(MotionDatagram {
                    timestamp: time(t),
                    heading: self.rng.gen_range(0.0..360.0),
                    pitch: self.rng.gen_range(-5.0..5.0),
                    roll: self.rng.gen_range(-5.0..5.0),
                    heave: self.rng.gen_range(-1.0..1.0),
                }),
                1 => Datagram::Position(PositionDatagram {
                    timestamp: time(t),
                    sentence: format!("$GPGGA,{t},4736.2,N,12220.1,W"),
                }),
                2 => Datagram::Filter(
                    FilterDatagram::builder()
                        .channel_id(channels[self.rng.gen_range(0..channels.len())])
                        .timestamp(time(t))
                        .stage(self.rng.gen_range(1..=2))
                        .coefficients(vec![[self.rng.gen(), self.rng.gen()]; 4])
                        .decimation_factor(self.rng.gen_range(1..8))
                        .build(),
                ),
                3 => environment(t, self.rng.gen_range(0.0..20.0)),
                _ => Datagram::Unrecognized {
                    tag: "TAG0".to_string(),
                    timestamp: time(t),
                },
            };
            stream.push(Ok(dg));
        }
    }

    pub fn generate(&mut self, channels: &[&str], pings: usize) -> Stream {
        let mut stream = vec![config(channels)];
        for _ in 0..pings {
            for channel in channels {
                self.ancillary(channels, &mut stream);
                let t = self.tick();
                stream.push(param(channel, t));
                stream.push(sample(channel, t));
            }
        }
        self.ancillary(channels, &mut stream);
        stream
    }
}
