//! Runtime configuration assembled from the CLI surface.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::cli::Cli;
use crate::sinks::InfluxConfig;

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub task_queue_size: usize,
    pub send_queue_size: usize,
    pub error_queue_size: usize,
    pub worker_count: usize,
    pub sender_count: usize,
    pub error_handler_count: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub template_path: PathBuf,
    pub maxmind_city: PathBuf,
    pub maxmind_asn: PathBuf,
    pub influx: InfluxConfig,
    pub statsd_address: Option<String>,
    pub online_interval: Duration,
    pub stream_interval: Duration,
    pub pool: PoolSettings,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.online_duration == 0 || cli.stream_duration == 0 {
            bail!("flush intervals must be at least one second");
        }

        if cli.worker_count == 0 || cli.sender_count == 0 || cli.error_handler_count == 0 {
            bail!("every pipeline stage needs at least one worker");
        }

        if cli.task_queue_size == 0 || cli.send_queue_size == 0 || cli.error_queue_size == 0 {
            bail!("queue capacities must be positive");
        }

        Ok(Self {
            bind_address: cli.bind_address,
            debug: cli.debug,
            log_file: cli.log,
            template_path: cli.nginx_template,
            maxmind_city: cli.maxmind,
            maxmind_asn: cli.maxmind_asn,
            influx: InfluxConfig {
                url: cli.influx_url,
                database: cli.influx_db,
                measurement: cli.influx_measurement,
                measurement_online: cli.influx_measurement_online,
            },
            statsd_address: cli.statsd_address,
            online_interval: Duration::from_secs(cli.online_duration),
            stream_interval: Duration::from_secs(cli.stream_duration),
            pool: PoolSettings {
                task_queue_size: cli.task_queue_size,
                send_queue_size: cli.send_queue_size,
                error_queue_size: cli.error_queue_size,
                worker_count: cli.worker_count,
                sender_count: cli.sender_count,
                error_handler_count: cli.error_handler_count,
            },
        })
    }
}
