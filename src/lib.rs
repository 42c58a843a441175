//! Core library for the streamsight syslog collector.
//!
//! Streaming-server access logs arrive as syslog datagrams, get parsed
//! against a configurable column template, enriched with GeoIP/ASN data,
//! and fan out through a bounded three-stage worker pool into two
//! interval-flushed aggregators feeding the time-series sinks.

pub mod cli;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod listener;
pub mod logging;
pub mod online;
pub mod parser;
pub mod pool;
pub mod shutdown;
pub mod sinks;
pub mod stream;
pub mod template;

pub use config::Config;
pub use errors::{ConfigError, RecordError};
pub use parser::{Log, RawRecord, SplitUri, SyslogParser};
pub use pool::{Pool, PoolConfig, Receiver};
pub use template::Template;
