//! Dogstatsd-style UDP gauge sink.
//!
//! Renders `name:value|g|#tag:value,...` datagrams. No delivery guarantee
//! is expected from a statsd transport; send errors surface as recoverable
//! sink failures and the flush moves on.

use std::collections::HashMap;
use std::net::UdpSocket;

use crate::errors::{ConfigError, RecordError};
use crate::online::ChannelConnections;
use crate::stream::StreamPoint;

pub struct StatsdClient {
    socket: UdpSocket,
    measurement: String,
    measurement_online: String,
}

impl StatsdClient {
    pub fn connect(
        addr: &str,
        measurement: String,
        measurement_online: String,
    ) -> Result<Self, ConfigError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|source| ConfigError::Bind {
            addr: "0.0.0.0:0".to_string(),
            source,
        })?;

        socket.connect(addr).map_err(|e| ConfigError::SinkConnect {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            socket,
            measurement,
            measurement_online,
        })
    }

    /// One gauge datagram per point.
    pub fn write_points(&self, points: &[StreamPoint]) -> Result<(), RecordError> {
        for point in points {
            let datagram = render_gauge(
                &self.measurement,
                point.bytes_sent as f64,
                &point_tags(point),
            );
            self.send(&datagram)?;
        }
        Ok(())
    }

    /// One gauge datagram per channel with its unique-viewer count.
    pub fn write_online(
        &self,
        channels: &HashMap<String, ChannelConnections>,
    ) -> Result<(), RecordError> {
        for (channel, connections) in channels {
            let tags = vec![format!("channel:{}", channel)];
            let datagram = render_gauge(
                &self.measurement_online,
                connections.count() as f64,
                &tags,
            );
            self.send(&datagram)?;
        }
        Ok(())
    }

    fn send(&self, datagram: &str) -> Result<(), RecordError> {
        self.socket
            .send(datagram.as_bytes())
            .map_err(|e| RecordError::Sink(e.to_string()))?;
        Ok(())
    }
}

fn point_tags(point: &StreamPoint) -> Vec<String> {
    vec![
        format!("country_name:{}", point.country),
        format!("asn_number:{}", point.asn_number),
        format!("asn_org:{}", point.asn_org),
        format!("channel:{}", point.channel),
        format!("streaming_server:{}", point.streaming_server),
        format!("host:{}", point.host),
        format!("quality:{}", point.quality),
    ]
}

fn render_gauge(name: &str, value: f64, tags: &[String]) -> String {
    if tags.is_empty() {
        format!("{}:{}|g", name, value)
    } else {
        format!("{}:{}|g|#{}", name, value, tags.join(","))
    }
}
