//! Outbound metric writers.
//!
//! Two time-series backends are supported: an InfluxDB v1 endpoint written
//! over HTTP in line protocol, and a dogstatsd-style UDP gauge sink. Both
//! take the same per-request batch and online-viewer snapshot that the
//! schedulers flush.

pub mod influx;
pub mod statsd;

pub use influx::{InfluxClient, InfluxConfig};
pub use statsd::StatsdClient;
