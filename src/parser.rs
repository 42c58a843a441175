//! Record parsing.
//!
//! Turns the transport's raw key/value record into a typed [`Log`]. The log
//! line itself is a single delimiter-joined string whose column layout is
//! described by the configured [`Template`]; the request URI is further
//! split on `/` and classified into one of the known streaming shapes.
//!
//! Parsing is deliberately permissive: a single malformed record must never
//! stop the stream. The only hard failure is empty content — everything
//! else degrades to the `unknown` sentinel or a zero count.

use tracing::debug;

use crate::errors::RecordError;
use crate::template::Template;

/// Sentinel for fields that could not be determined during parsing.
pub const UNKNOWN: &str = "unknown";

/// Placeholder the streaming server emits when a value is absent.
pub const EMPTY_VALUE: &str = "-";

/// Default delimiter between fields of a log line.
pub const PARTS_DELIM: &str = "|";

/// Delimiter between segments of a request path.
pub const STREAM_DELIM: &str = "/";

// Segment counts selecting a streaming-URI shape, matched in this order.
// e.g. /streaming/muztv/324/vl2w/segment-1597220444-01972046.ts
const TRANSCODER_QUALITY_SEGMENTS: usize = 6;
// e.g. /streaming/karusel/324/variable.m3u8
const TRANSCODER_MULTIBITRATE_SEGMENTS: usize = 5;
// e.g. /domashniy/tracks-v1a1/2020/08/13/11/38/56-06000.ts
const SEGMENTED_MEDIA_SEGMENTS: usize = 9;
// e.g. /karusel/tracks-v1a1/mono.m3u8
const PLAYLIST_QUALITY_SEGMENTS: usize = 4;
// e.g. /karusel/index.m3u8
const PLAYLIST_MULTIBITRATE_SEGMENTS: usize = 3;

/// Raw key/value record handed over by the syslog transport.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// Source socket address, optionally `ip:port`.
    pub client: String,
    /// The delimiter-joined log line.
    pub content: String,
    pub tag: String,
    pub hostname: String,
}

/// Classified structure of a streaming request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitUri {
    pub prefix: String,
    pub channel: String,
    pub quality: String,
    pub index: String,
}

impl Default for SplitUri {
    fn default() -> Self {
        Self {
            prefix: UNKNOWN.to_string(),
            channel: UNKNOWN.to_string(),
            quality: UNKNOWN.to_string(),
            index: UNKNOWN.to_string(),
        }
    }
}

/// What the final path segment points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Playlist,
    MediaSegment,
    Other,
}

impl SplitUri {
    /// Classify URI segments by count, per the shape table. Unmatched
    /// counts yield the all-`unknown` default.
    fn classify(segments: &[&str]) -> Self {
        match segments.len() {
            TRANSCODER_QUALITY_SEGMENTS => Self {
                prefix: segments[1].to_string(),
                channel: segments[2].to_string(),
                quality: segments[4].to_string(),
                index: segments[5].to_string(),
            },
            TRANSCODER_MULTIBITRATE_SEGMENTS => Self {
                prefix: UNKNOWN.to_string(),
                channel: segments[2].to_string(),
                quality: UNKNOWN.to_string(),
                index: segments[4].to_string(),
            },
            SEGMENTED_MEDIA_SEGMENTS => Self {
                prefix: segments[1].to_string(),
                channel: segments[1].to_string(),
                quality: quality_suffix(segments[2]),
                index: segments[8].to_string(),
            },
            PLAYLIST_QUALITY_SEGMENTS => Self {
                prefix: UNKNOWN.to_string(),
                channel: segments[1].to_string(),
                quality: quality_suffix(segments[2]),
                index: segments[3].to_string(),
            },
            PLAYLIST_MULTIBITRATE_SEGMENTS => Self {
                prefix: UNKNOWN.to_string(),
                channel: segments[1].to_string(),
                quality: UNKNOWN.to_string(),
                index: segments[2].to_string(),
            },
            _ => Self::default(),
        }
    }

    /// Whether the URI matched any known streaming shape.
    pub fn is_recognized(&self) -> bool {
        self.channel != UNKNOWN
    }

    pub fn index_kind(&self) -> IndexKind {
        if self.index.ends_with(".m3u8") {
            IndexKind::Playlist
        } else if self.index.ends_with(".ts") {
            IndexKind::MediaSegment
        } else {
            IndexKind::Other
        }
    }
}

/// One parsed access-log record. Every field is always populated: string
/// fields fall back to [`UNKNOWN`], counters to zero.
#[derive(Debug, Clone, Default)]
pub struct Log {
    // client identity
    pub remote_addr: String,
    pub client: String,
    pub tag: String,
    pub hostname: String,
    pub user_agent: String,

    // request
    pub host: String,
    pub uri: String,
    pub split_uri: SplitUri,

    // response
    pub bytes_sent: u64,
    pub connection_requests: u64,
    pub connection: String,

    // http metadata
    pub referer: String,
    pub via: String,
    pub x_forwarded_for: String,
    pub sent_http_x_profile: String,
}

impl Log {
    pub fn channel(&self) -> &str {
        &self.split_uri.channel
    }

    pub fn quality(&self) -> &str {
        &self.split_uri.quality
    }

    /// The streaming server that produced the record.
    pub fn streaming_server(&self) -> &str {
        &self.host
    }

    pub fn has_recognized_uri(&self) -> bool {
        self.split_uri.is_recognized()
    }

    /// Host part of the transport client address, without the port.
    pub fn client_addr(&self) -> &str {
        if self.client.is_empty() {
            return UNKNOWN;
        }

        match self.client.split(':').next() {
            Some("") | None => UNKNOWN,
            Some(host) => host,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub parts_delim: String,
    pub stream_delim: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            parts_delim: PARTS_DELIM.to_string(),
            stream_delim: STREAM_DELIM.to_string(),
        }
    }
}

/// Template-driven parser for delimited access-log records.
pub struct SyslogParser {
    config: ParserConfig,
    template: Template,
}

impl SyslogParser {
    pub fn new(template: Template, config: ParserConfig) -> Self {
        Self { config, template }
    }

    /// Parse one raw record into a [`Log`].
    ///
    /// Fails only on empty content. Fields whose column is missing from the
    /// record resolve to empty and take the `unknown` default where the
    /// defaulting rule applies; numeric fields parse best-effort to zero.
    pub fn parse(&self, record: &RawRecord) -> Result<Log, RecordError> {
        if record.content.is_empty() {
            return Err(RecordError::Malformed(format!(
                "empty content from client {:?}",
                record.client
            )));
        }

        let fields: Vec<&str> = record.content.split(&self.config.parts_delim).collect();

        for (pos, value) in fields.iter().enumerate() {
            debug!(pos, value = %value, "log field");
        }

        let value_of = |name: &str| self.template.value_of(name, &fields).unwrap_or("");

        let uri = value_of("uri");
        let segments: Vec<&str> = uri.split(&self.config.stream_delim).collect();

        Ok(Log {
            remote_addr: value_of("remote_addr").to_string(),
            client: record.client.clone(),
            tag: record.tag.clone(),
            hostname: record.hostname.clone(),
            user_agent: get_or_unknown(value_of("http_user_agent")),

            host: value_of("host").to_string(),
            uri: uri.to_string(),
            split_uri: SplitUri::classify(&segments),

            bytes_sent: parse_count(value_of("bytes_sent")),
            connection_requests: parse_count(value_of("connection_requests")),
            connection: value_of("connection").to_string(),

            referer: get_or_unknown(value_of("http_referer")),
            via: get_or_unknown(value_of("http_via")),
            x_forwarded_for: get_or_unknown(value_of("http_x_forwarded_for")),
            sent_http_x_profile: get_or_unknown(value_of("sent_http_x_profile")),
        })
    }
}

/// Empty-or-placeholder defaulting rule for string fields.
fn get_or_unknown(value: &str) -> String {
    if value.is_empty() || value == EMPTY_VALUE {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

/// Best-effort numeric conversion; anything unparsable counts as zero.
fn parse_count(value: &str) -> u64 {
    value.parse().unwrap_or(0)
}

/// Quality encoded as the suffix of a `name-suffix` segment. Anything that
/// is not exactly two `-`-joined parts is unknown.
fn quality_suffix(segment: &str) -> String {
    let parts: Vec<&str> = segment.split('-').collect();
    if parts.len() == 2 {
        parts[1].to_string()
    } else {
        UNKNOWN.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "$time_local|$msec|$remote_addr|$server_protocol|$request_method|$host|$uri|$args|$status|$body_bytes_sent|$request_time|$upstream_response_time|$upstream_addr|$upstream_status|$http_referer|$http_via|$http_x_forwarded_for|$http_user_agent|$sent_http_x_profile|$connection|$connection_requests|$bytes_sent";

    fn parser() -> SyslogParser {
        SyslogParser::new(Template::parse(TEMPLATE, "|"), ParserConfig::default())
    }

    fn sample_record() -> RawRecord {
        let content = [
            "11/Aug/2020:14:01:32 +0300",
            "1597143692.596",
            "127.0.0.1",
            "HTTP/1.1",
            "GET",
            "syslog-server.local",
            "/streaming/domashniy/324/vh1w/playlist.m3u8",
            "-",
            "404",
            "209",
            "0.000",
            "-",
            "-",
            "-",
            "-",
            "-",
            "-",
            "Mozilla/5.0 (X11; Linux x86_64)",
            "-",
            "3",
            "84",
            "404",
        ]
        .join("|");

        RawRecord {
            client: "127.0.0.1:38001".to_string(),
            content,
            tag: "nginx".to_string(),
            hostname: "edge-01".to_string(),
        }
    }

    #[test]
    fn test_empty_content_is_malformed() {
        let record = RawRecord::default();

        assert!(matches!(
            parser().parse(&record),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_full_record() {
        let log = parser().parse(&sample_record()).unwrap();

        assert_eq!(log.remote_addr, "127.0.0.1");
        assert_eq!(log.host, "syslog-server.local");
        assert_eq!(log.uri, "/streaming/domashniy/324/vh1w/playlist.m3u8");
        assert_eq!(log.user_agent, "Mozilla/5.0 (X11; Linux x86_64)");
        assert_eq!(log.bytes_sent, 404);
        assert_eq!(log.connection_requests, 84);
        assert_eq!(log.connection, "3");
        assert_eq!(log.tag, "nginx");
        assert_eq!(log.hostname, "edge-01");
    }

    #[test]
    fn test_placeholder_fields_default_to_unknown() {
        let log = parser().parse(&sample_record()).unwrap();

        assert_eq!(log.referer, UNKNOWN);
        assert_eq!(log.via, UNKNOWN);
        assert_eq!(log.x_forwarded_for, UNKNOWN);
        assert_eq!(log.sent_http_x_profile, UNKNOWN);
    }

    #[test]
    fn test_non_placeholder_value_passes_through() {
        assert_eq!(get_or_unknown("203.0.113.7"), "203.0.113.7");
        assert_eq!(get_or_unknown(""), UNKNOWN);
        assert_eq!(get_or_unknown("-"), UNKNOWN);
    }

    #[test]
    fn test_short_record_defaults_missing_columns() {
        // Record carries fewer columns than the template knows about.
        let record = RawRecord {
            client: "10.0.0.1:514".to_string(),
            content: "11/Aug/2020:14:01:32 +0300|1597143692.596|127.0.0.1".to_string(),
            tag: String::new(),
            hostname: String::new(),
        };

        let log = parser().parse(&record).unwrap();
        assert_eq!(log.remote_addr, "127.0.0.1");
        assert_eq!(log.host, "");
        assert_eq!(log.user_agent, UNKNOWN);
        assert_eq!(log.bytes_sent, 0);
        assert_eq!(log.split_uri, SplitUri::default());
    }

    #[test]
    fn test_unparsable_counter_is_zero() {
        assert_eq!(parse_count("404"), 404);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("abc"), 0);
        assert_eq!(parse_count("-1"), 0);
    }

    #[test]
    fn test_client_addr_strips_port() {
        let log = parser().parse(&sample_record()).unwrap();
        assert_eq!(log.client_addr(), "127.0.0.1");
    }

    #[test]
    fn test_client_addr_empty_is_unknown() {
        let log = Log::default();
        assert_eq!(log.client_addr(), UNKNOWN);
    }

    #[test]
    fn test_transcoder_uri_with_quality() {
        let log = parser().parse(&sample_record()).unwrap();

        assert_eq!(log.channel(), "domashniy");
        assert_eq!(log.quality(), "vh1w");
        assert_eq!(log.split_uri.index, "playlist.m3u8");
        assert_eq!(log.split_uri.prefix, "streaming");
        assert_eq!(log.split_uri.index_kind(), IndexKind::Playlist);
    }

    #[test]
    fn test_transcoder_multibitrate_uri() {
        let segments: Vec<&str> = "/streaming/karusel/324/variable.m3u8".split('/').collect();
        let split = SplitUri::classify(&segments);

        assert_eq!(split.channel, "karusel");
        assert_eq!(split.quality, UNKNOWN);
        assert_eq!(split.index, "variable.m3u8");
        assert_eq!(split.prefix, UNKNOWN);
    }

    #[test]
    fn test_segmented_media_uri() {
        let segments: Vec<&str> = "/domashniy/tracks-v1a1/2020/08/13/11/38/56-06000.ts"
            .split('/')
            .collect();
        let split = SplitUri::classify(&segments);

        assert_eq!(split.channel, "domashniy");
        assert_eq!(split.prefix, "domashniy");
        assert_eq!(split.quality, "v1a1");
        assert_eq!(split.index, "56-06000.ts");
        assert_eq!(split.index_kind(), IndexKind::MediaSegment);
    }

    #[test]
    fn test_playlist_uri_with_quality() {
        let segments: Vec<&str> = "/karusel/tracks-v1a1/mono.m3u8".split('/').collect();
        let split = SplitUri::classify(&segments);

        assert_eq!(split.channel, "karusel");
        assert_eq!(split.quality, "v1a1");
        assert_eq!(split.index, "mono.m3u8");
    }

    #[test]
    fn test_playlist_multibitrate_uri() {
        let segments: Vec<&str> = "/karusel/index.m3u8".split('/').collect();
        let split = SplitUri::classify(&segments);

        assert_eq!(split.channel, "karusel");
        assert_eq!(split.quality, UNKNOWN);
        assert_eq!(split.index, "index.m3u8");
    }

    #[test]
    fn test_unmatched_segment_counts_are_unrecognized() {
        for uri in ["", "/", "/a/b/c/d/e/f/g", "plain-text", "/a/b/c/d/e/f/g/h/i/j"] {
            let segments: Vec<&str> = uri.split('/').collect();
            let split = SplitUri::classify(&segments);

            assert_eq!(split, SplitUri::default(), "uri {:?}", uri);
            assert!(!split.is_recognized());
        }
    }

    #[test]
    fn test_quality_suffix_requires_exactly_two_parts() {
        assert_eq!(quality_suffix("tracks-v1a1"), "v1a1");
        assert_eq!(quality_suffix("tracks"), UNKNOWN);
        assert_eq!(quality_suffix("a-b-c"), UNKNOWN);
        assert_eq!(quality_suffix(""), UNKNOWN);
    }
}
