use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossbeam_channel::bounded;
use tracing::{error, info, warn};

use streamsight::cli::Cli;
use streamsight::config::Config;
use streamsight::enrich::GeoFinder;
use streamsight::errors::RecordError;
use streamsight::listener::SyslogListener;
use streamsight::logging;
use streamsight::online::{top_channels, Online, UniqueIdentity};
use streamsight::parser::{ParserConfig, SyslogParser, PARTS_DELIM};
use streamsight::pool::{ErrorFn, ListenerFn, Pool, PoolConfig, Receiver, ReceiverFn};
use streamsight::shutdown::{Closers, ExitCode, SignalHandler};
use streamsight::sinks::{InfluxClient, StatsdClient};
use streamsight::stream::{StreamPoint, StreamQueue};
use streamsight::template::Template;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        ExitCode::GeneralError.exit();
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(cli)?;

    let _log_guard = logging::init(config.debug, config.log_file.as_deref());
    info!(version = VERSION, "streamsight starting");

    // Startup dependencies; any failure here is fatal before the first
    // record is accepted.
    let template =
        Template::load(&config.template_path, PARTS_DELIM).context("loading log template")?;
    info!(fields = template.len(), path = %config.template_path.display(), "log template loaded");

    let parser = Arc::new(SyslogParser::new(template, ParserConfig::default()));

    let finder = Arc::new(
        GeoFinder::open(&config.maxmind_city, &config.maxmind_asn)
            .context("opening GeoIP databases")?,
    );

    let influx =
        Arc::new(InfluxClient::connect(config.influx.clone()).context("connecting to InfluxDB")?);
    info!(url = %config.influx.url, db = %config.influx.database, "influx sink ready");

    let statsd = match &config.statsd_address {
        Some(addr) => {
            let client = StatsdClient::connect(
                addr,
                config.influx.measurement.clone(),
                config.influx.measurement_online.clone(),
            )
            .context("connecting to statsd")?;
            info!(addr = %addr, "statsd sink ready");
            Some(Arc::new(client))
        }
        None => None,
    };

    let online = Arc::new(Online::new());
    let stream_queue = Arc::new(StreamQueue::new());

    // Task stage: parse, filter non-streaming URIs, enrich.
    let receiver_fn: ReceiverFn = {
        let parser = Arc::clone(&parser);
        let finder = Arc::clone(&finder);

        Arc::new(move |raw| {
            let log = parser.parse(&raw)?;

            if !log.has_recognized_uri() {
                return Err(RecordError::UnrecognizedUri(log.uri));
            }

            let geo = finder.find(&log.remote_addr)?;
            Ok(Receiver { log, geo })
        })
    };

    // Send stage: feed both aggregators.
    let listener_fn: ListenerFn = {
        let online = Arc::clone(&online);
        let stream_queue = Arc::clone(&stream_queue);

        Arc::new(move |receiver: Receiver| {
            stream_queue.add(StreamPoint {
                country: receiver.geo.country_code.clone(),
                asn_number: receiver.geo.asn_number,
                asn_org: receiver.geo.asn_org.clone(),
                channel: receiver.log.channel().to_string(),
                streaming_server: receiver.log.client_addr().to_string(),
                host: receiver.log.streaming_server().to_string(),
                quality: receiver.log.quality().to_string(),
                bytes_sent: receiver.log.bytes_sent,
                time: Utc::now(),
            });

            online.peek(&UniqueIdentity {
                channel: receiver.log.channel().to_string(),
                ip: receiver.log.remote_addr.clone(),
                user_agent: receiver.log.user_agent.clone(),
            });

            Ok(())
        })
    };

    let error_fn: ErrorFn = Arc::new(|err| warn!(error = %err, "record dropped"));

    let pool = Pool::run(PoolConfig {
        task_queue_size: config.pool.task_queue_size,
        send_queue_size: config.pool.send_queue_size,
        error_queue_size: config.pool.error_queue_size,
        worker_count: config.pool.worker_count,
        sender_count: config.pool.sender_count,
        error_handler_count: config.pool.error_handler_count,
        receiver_fn,
        listener_fn,
        error_fn,
    });
    info!(
        workers = config.pool.worker_count,
        senders = config.pool.sender_count,
        "ingestion pool running"
    );

    // Flush loops for both aggregators.
    let (online_stop_tx, online_stop_rx) = bounded(1);
    let _online_scheduler = online.schedule(config.online_interval, online_stop_rx, {
        let influx = Arc::clone(&influx);
        let statsd = statsd.clone();

        move |online| {
            let channels = online.flush();
            let total: usize = channels.values().map(|c| c.count()).sum();

            if let Err(err) = influx.write_online(&channels) {
                error!(error = %err, "online flush failed");
            }
            if let Some(statsd) = &statsd {
                if let Err(err) = statsd.write_online(&channels) {
                    error!(error = %err, "statsd online flush failed");
                }
            }

            info!(
                channels = channels.len(),
                viewers = total,
                top = ?top_channels(&channels, 10),
                "flushed online viewers"
            );
        }
    });

    let (stream_stop_tx, stream_stop_rx) = bounded(1);
    let _stream_scheduler = stream_queue.schedule(config.stream_interval, stream_stop_rx, {
        let influx = Arc::clone(&influx);
        let statsd = statsd.clone();

        move |queue| {
            let points = queue.flush();

            if let Err(err) = influx.write_points(&points) {
                error!(error = %err, "stream flush failed");
            }
            if let Some(statsd) = &statsd {
                if let Err(err) = statsd.write_points(&points) {
                    error!(error = %err, "statsd stream flush failed");
                }
            }

            info!(points = points.len(), "flushed stream batch");
        }
    });

    // Everything the signal thread must release, in order.
    let mut closers = Closers::new();
    closers.register("online scheduler", move || {
        let _ = online_stop_tx.send(());
    });
    closers.register("stream scheduler", move || {
        let _ = stream_stop_tx.send(());
    });
    {
        let finder = Arc::clone(&finder);
        closers.register("maxmind databases", move || drop(finder));
    }
    {
        let influx = Arc::clone(&influx);
        closers.register("influx client", move || drop(influx));
    }
    if let Some(statsd) = statsd.clone() {
        closers.register("statsd client", move || drop(statsd));
    }
    SignalHandler::install(closers).context("installing signal handler")?;

    let listener =
        SyslogListener::bind(&config.bind_address).context("binding syslog listener")?;
    listener.run(&pool)?;

    // Reached when termination was requested before the signal thread
    // finished the job, or the pool went away; drain and leave cleanly.
    pool.shutdown();

    Ok(())
}
