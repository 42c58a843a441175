use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "streamsight")]
#[command(about = "Syslog collector for streaming-server access logs")]
#[command(version)]
pub struct Cli {
    /// IP and port for the syslog UDP listener, e.g. 0.0.0.0:514
    #[arg(long = "bind-address", help_heading = "Listener Options")]
    pub bind_address: String,

    /// Log file; stderr when not set
    #[arg(long = "log", help_heading = "Logging Options")]
    pub log: Option<PathBuf>,

    /// Verbose diagnostics, including per-field parse echo
    #[arg(long = "debug", help_heading = "Logging Options")]
    pub debug: bool,

    /// MaxMind GeoIP2 city database (.mmdb)
    #[arg(
        long = "maxmind",
        default_value = "./GeoLite2-City.mmdb",
        help_heading = "Enrichment Options"
    )]
    pub maxmind: PathBuf,

    /// MaxMind GeoIP2 ASN database (.mmdb)
    #[arg(
        long = "maxmind-asn",
        default_value = "./GeoLite2-ASN.mmdb",
        help_heading = "Enrichment Options"
    )]
    pub maxmind_asn: PathBuf,

    /// Template describing the log_format column layout
    #[arg(
        long = "nginx-template",
        default_value = "./template.conf",
        help_heading = "Parsing Options"
    )]
    pub nginx_template: PathBuf,

    /// InfluxDB connection URL, e.g. http://127.0.0.1:8086
    #[arg(long = "influx-url", help_heading = "Sink Options")]
    pub influx_url: String,

    /// InfluxDB database name
    #[arg(long = "influx-db", help_heading = "Sink Options")]
    pub influx_db: String,

    /// Measurement for per-request traffic points
    #[arg(long = "influx-measurement", help_heading = "Sink Options")]
    pub influx_measurement: String,

    /// Measurement for online-viewer gauges
    #[arg(long = "influx-measurement-online", help_heading = "Sink Options")]
    pub influx_measurement_online: String,

    /// Optional dogstatsd address receiving the same gauges, e.g. 127.0.0.1:8125
    #[arg(long = "statsd-address", help_heading = "Sink Options")]
    pub statsd_address: Option<String>,

    /// Seconds between unique-viewer flushes
    #[arg(
        long = "online-duration",
        default_value_t = 300,
        help_heading = "Scheduling Options"
    )]
    pub online_duration: u64,

    /// Seconds between batched traffic flushes
    #[arg(
        long = "stream-duration",
        default_value_t = 60,
        help_heading = "Scheduling Options"
    )]
    pub stream_duration: u64,

    /// Raw-record queue capacity; full means backpressure on the listener
    #[arg(
        long = "task-queue-size",
        default_value_t = 4096,
        help_heading = "Pipeline Options"
    )]
    pub task_queue_size: usize,

    /// Enriched-record queue capacity
    #[arg(
        long = "send-queue-size",
        default_value_t = 4096,
        help_heading = "Pipeline Options"
    )]
    pub send_queue_size: usize,

    /// Failure queue capacity
    #[arg(
        long = "error-queue-size",
        default_value_t = 1024,
        help_heading = "Pipeline Options"
    )]
    pub error_queue_size: usize,

    /// Parse/enrich worker threads
    #[arg(
        long = "worker-count",
        default_value_t = num_cpus::get(),
        help_heading = "Pipeline Options"
    )]
    pub worker_count: usize,

    /// Sink delivery threads
    #[arg(
        long = "sender-count",
        default_value_t = num_cpus::get(),
        help_heading = "Pipeline Options"
    )]
    pub sender_count: usize,

    /// Error handler threads
    #[arg(
        long = "error-handler-count",
        default_value_t = 1,
        help_heading = "Pipeline Options"
    )]
    pub error_handler_count: usize,
}
