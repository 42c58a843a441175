use std::path::PathBuf;
use thiserror::Error;

/// Startup-time failures. Every one of these is fatal: the process refuses
/// to accept records until its configuration is sound.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("template file not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("template file could not be read: {}: {source}", .path.display())]
    TemplateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open GeoIP database {}: {reason}", .path.display())]
    GeoDatabase { path: PathBuf, reason: String },

    #[error("failed to bind syslog listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metrics sink unreachable at {addr}: {reason}")]
    SinkConnect { addr: String, reason: String },
}

/// Per-record failures. These are routed to the pool's error stage and
/// logged; the record is dropped and the pipeline keeps running.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unrecognized log record: {0}")]
    Malformed(String),

    #[error("request uri matches no streaming shape: {0}")]
    UnrecognizedUri(String),

    #[error("geo lookup failed for {addr}: {reason}")]
    Enrichment { addr: String, reason: String },

    #[error("metrics write failed: {0}")]
    Sink(String),
}
