//! UDP syslog transport.
//!
//! Receives RFC3164 datagrams from the streaming servers and hands the
//! decoded key/value records to the ingestion pool. Parsing is tolerant: a
//! datagram that does not look like syslog at all still becomes a record
//! whose content is the whole payload, so the pipeline's own error path
//! decides what to drop.

use std::io::ErrorKind;
use std::net::UdpSocket;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::errors::ConfigError;
use crate::parser::RawRecord;
use crate::pool::Pool;
use crate::shutdown::SignalHandler;

/// Largest datagram we accept; RFC3164 messages are far smaller, but some
/// transports pad generously.
const MAX_DATAGRAM: usize = 64 * 1024;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

pub struct SyslogListener {
    socket: UdpSocket,
    rfc3164: Regex,
}

impl SyslogListener {
    pub fn bind(addr: &str) -> Result<Self, ConfigError> {
        let socket = UdpSocket::bind(addr).map_err(|source| ConfigError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .map_err(|source| ConfigError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        let rfc3164 = Regex::new(
            r"^(?:<(\d{1,3})>)?(\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})\s+(\S+)\s+([^:\[\s]+)(?:\[(\d+)\])?\s*:\s*(.*)$",
        )
        .expect("RFC3164 regex is valid");

        Ok(Self { socket, rfc3164 })
    }

    /// Receive datagrams and submit them to the pool until the process is
    /// told to terminate or the pool shuts down.
    pub fn run(&self, pool: &Pool) -> Result<()> {
        let local = self
            .socket
            .local_addr()
            .context("listener socket has no local address")?;
        info!(%local, "syslog listener started");

        let mut buf = [0u8; MAX_DATAGRAM];

        loop {
            if SignalHandler::should_terminate() {
                info!("syslog listener stopping");
                return Ok(());
            }

            let (len, peer) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "syslog receive failed");
                    continue;
                }
            };

            let payload = String::from_utf8_lossy(&buf[..len]);
            let record =
                self.parse_datagram(payload.trim_end_matches(&['\r', '\n'][..]), &peer.to_string());

            if pool.submit(record).is_err() {
                // Pool shut down underneath us; nothing left to feed.
                return Ok(());
            }
        }
    }

    /// Decode one datagram into the transport record shape. Unmatched
    /// payloads keep their full content and empty syslog metadata.
    fn parse_datagram(&self, payload: &str, client: &str) -> RawRecord {
        match self.rfc3164.captures(payload) {
            Some(captures) => RawRecord {
                client: client.to_string(),
                hostname: captures
                    .get(3)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                tag: captures
                    .get(4)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                content: captures
                    .get(6)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            },
            None => RawRecord {
                client: client.to_string(),
                hostname: String::new(),
                tag: String::new(),
                content: payload.to_string(),
            },
        }
    }
}
