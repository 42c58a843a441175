//! InfluxDB v1 line-protocol sink.
//!
//! Points are rendered into line protocol locally and shipped in one HTTP
//! write per flush. Only rendering is visible to tests; the HTTP client is
//! a thin blocking wrapper around it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::errors::{ConfigError, RecordError};
use crate::online::ChannelConnections;
use crate::stream::StreamPoint;

const PING_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://127.0.0.1:8086`.
    pub url: String,
    pub database: String,
    /// Measurement for per-request traffic points.
    pub measurement: String,
    /// Measurement for online-viewer gauges.
    pub measurement_online: String,
}

pub struct InfluxClient {
    http: reqwest::blocking::Client,
    write_url: String,
    ping_url: String,
    measurement: String,
    measurement_online: String,
}

impl InfluxClient {
    /// Build the client and ping the server once. An unreachable sink at
    /// startup is a configuration problem, not a per-record one.
    pub fn connect(config: InfluxConfig) -> Result<Self, ConfigError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(WRITE_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::SinkConnect {
                addr: config.url.clone(),
                reason: e.to_string(),
            })?;

        let client = Self {
            http,
            write_url: format!(
                "{}/write?db={}&precision=s",
                config.url.trim_end_matches('/'),
                config.database
            ),
            ping_url: format!("{}/ping", config.url.trim_end_matches('/')),
            measurement: config.measurement,
            measurement_online: config.measurement_online,
        };

        client.ping().map_err(|reason| ConfigError::SinkConnect {
            addr: config.url.clone(),
            reason,
        })?;

        Ok(client)
    }

    fn ping(&self) -> Result<(), String> {
        let response = self
            .http
            .get(&self.ping_url)
            .timeout(PING_TIMEOUT)
            .send()
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("ping returned {}", response.status()))
        }
    }

    /// One batched write for a flush worth of per-request points.
    pub fn write_points(&self, points: &[StreamPoint]) -> Result<(), RecordError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = points
            .iter()
            .map(|point| render_point(&self.measurement, point))
            .collect::<Vec<_>>()
            .join("\n");

        debug!(points = points.len(), "writing stream batch to influx");
        self.post(body)
    }

    /// One gauge point per channel with its unique-viewer count.
    pub fn write_online(
        &self,
        channels: &HashMap<String, ChannelConnections>,
    ) -> Result<(), RecordError> {
        if channels.is_empty() {
            return Ok(());
        }

        let now = Utc::now().timestamp();
        let body = channels
            .iter()
            .map(|(channel, connections)| {
                render_online_point(&self.measurement_online, channel, connections.count(), now)
            })
            .collect::<Vec<_>>()
            .join("\n");

        debug!(channels = channels.len(), "writing online counts to influx");
        self.post(body)
    }

    fn post(&self, body: String) -> Result<(), RecordError> {
        let response = self
            .http
            .post(&self.write_url)
            .body(body)
            .send()
            .map_err(|e| RecordError::Sink(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RecordError::Sink(format!(
                "influx write returned {}",
                response.status()
            )))
        }
    }
}

fn render_point(measurement: &str, point: &StreamPoint) -> String {
    format!(
        "{},country_name={},asn_number={},asn_org={},channel={},streaming_server={},host={},quality={} bytes_sent={}i {}",
        escape_measurement(measurement),
        escape_tag(&point.country),
        point.asn_number,
        escape_tag(&point.asn_org),
        escape_tag(&point.channel),
        escape_tag(&point.streaming_server),
        escape_tag(&point.host),
        escape_tag(&point.quality),
        point.bytes_sent,
        point.time.timestamp(),
    )
}

fn render_online_point(measurement: &str, channel: &str, count: usize, timestamp: i64) -> String {
    format!(
        "{},channel={} value={}i {}",
        escape_measurement(measurement),
        escape_tag(channel),
        count,
        timestamp,
    )
}

/// Line-protocol tag escaping: commas, spaces and equals signs.
fn escape_tag(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn escape_measurement(value: &str) -> String {
    value.replace('\\', "\\\\").replace(',', "\\,").replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_point() -> StreamPoint {
        StreamPoint {
            country: "RU".to_string(),
            asn_number: 12389,
            asn_org: "Rostelecom".to_string(),
            channel: "karusel".to_string(),
            streaming_server: "10.0.0.1".to_string(),
            host: "edge-01.example.org".to_string(),
            quality: "vh1w".to_string(),
            bytes_sent: 404,
            time: Utc.timestamp_opt(1_597_143_692, 0).unwrap(),
        }
    }

    #[test]
    fn test_render_point_line_protocol() {
        let line = render_point("streaming_traffic", &sample_point());

        let expected = concat!(
            "streaming_traffic,country_name=RU,asn_number=12389,asn_org=Rostelecom,",
            "channel=karusel,streaming_server=10.0.0.1,host=edge-01.example.org,",
            "quality=vh1w bytes_sent=404i 1597143692",
        );
        assert_eq!(line, expected);
    }

    #[test]
    fn test_render_online_point() {
        let line = render_online_point("online_viewers", "karusel", 42, 1_597_143_692);

        assert_eq!(line, "online_viewers,channel=karusel value=42i 1597143692");
    }

    #[test]
    fn test_tag_escaping() {
        assert_eq!(escape_tag("a b"), "a\\ b");
        assert_eq!(escape_tag("a,b"), "a\\,b");
        assert_eq!(escape_tag("a=b"), "a\\=b");
        assert_eq!(escape_tag("plain"), "plain");
    }

    #[test]
    fn test_org_with_spaces_stays_one_tag() {
        let mut point = sample_point();
        point.asn_org = "Example Net LLC".to_string();

        let line = render_point("m", &point);
        assert!(line.contains("asn_org=Example\\ Net\\ LLC"));
    }
}
