//! Three-stage ingestion pool.
//!
//! Raw records move through three bounded queues, each served by its own
//! set of worker threads:
//!
//! - **task** workers run the caller-supplied `receiver_fn` (parse and
//!   enrich) and forward the produced [`Receiver`] to the send queue;
//! - **send** workers run `listener_fn` (hand the record to the sinks and
//!   aggregators);
//! - **error** workers run `error_fn` for every failure the other two
//!   stages produced.
//!
//! The task queue's capacity is the backpressure control: when it fills
//! up, [`Pool::submit`] blocks the transport instead of growing memory.
//! A failure in any record is routed to the error stage and never reaches
//! the caller of `submit`.

mod worker;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, SendError};

use crate::enrich::GeoInfo;
use crate::errors::RecordError;
use crate::parser::{Log, RawRecord};

use worker::{error_worker, send_worker, task_worker};

/// A parsed record paired with its enrichment, owned by the pipeline until
/// handed to the sink.
#[derive(Debug, Clone)]
pub struct Receiver {
    pub log: Log,
    pub geo: GeoInfo,
}

/// Parse-and-enrich callback run by the task stage.
pub type ReceiverFn = Arc<dyn Fn(RawRecord) -> Result<Receiver, RecordError> + Send + Sync>;

/// Delivery callback run by the send stage.
pub type ListenerFn = Arc<dyn Fn(Receiver) -> Result<(), RecordError> + Send + Sync>;

/// Failure handler run by the error stage; must not itself fail.
pub type ErrorFn = Arc<dyn Fn(RecordError) + Send + Sync>;

pub struct PoolConfig {
    /// Capacity of the raw-record queue; full means backpressure on submit.
    pub task_queue_size: usize,
    /// Capacity of the enriched-record queue feeding the send stage.
    pub send_queue_size: usize,
    /// Capacity of the failure queue feeding the error stage.
    pub error_queue_size: usize,
    pub worker_count: usize,
    pub sender_count: usize,
    pub error_handler_count: usize,
    pub receiver_fn: ReceiverFn,
    pub listener_fn: ListenerFn,
    pub error_fn: ErrorFn,
}

/// Running pipeline. Dropping or shutting down the pool closes the task
/// queue; the stages then drain in order and their threads exit.
pub struct Pool {
    task_tx: crossbeam_channel::Sender<RawRecord>,
    handles: Vec<JoinHandle<()>>,
}

impl Pool {
    /// Spawn all stage workers and return the running pool.
    pub fn run(config: PoolConfig) -> Self {
        let (task_tx, task_rx) = bounded::<RawRecord>(config.task_queue_size);
        let (send_tx, send_rx) = bounded::<Receiver>(config.send_queue_size);
        let (error_tx, error_rx) = bounded::<RecordError>(config.error_queue_size);

        let mut handles =
            Vec::with_capacity(config.worker_count + config.sender_count + config.error_handler_count);

        for id in 0..config.worker_count {
            let task_rx = task_rx.clone();
            let send_tx = send_tx.clone();
            let error_tx = error_tx.clone();
            let receiver_fn = Arc::clone(&config.receiver_fn);

            handles.push(
                thread::Builder::new()
                    .name(format!("pool-task-{}", id))
                    .spawn(move || task_worker(task_rx, send_tx, error_tx, receiver_fn))
                    .expect("failed to spawn task worker"),
            );
        }

        for id in 0..config.sender_count {
            let send_rx = send_rx.clone();
            let error_tx = error_tx.clone();
            let listener_fn = Arc::clone(&config.listener_fn);

            handles.push(
                thread::Builder::new()
                    .name(format!("pool-send-{}", id))
                    .spawn(move || send_worker(send_rx, error_tx, listener_fn))
                    .expect("failed to spawn send worker"),
            );
        }

        for id in 0..config.error_handler_count {
            let error_rx = error_rx.clone();
            let error_fn = Arc::clone(&config.error_fn);

            handles.push(
                thread::Builder::new()
                    .name(format!("pool-error-{}", id))
                    .spawn(move || error_worker(error_rx, error_fn))
                    .expect("failed to spawn error worker"),
            );
        }

        // The workers hold the only senders that keep downstream stages
        // alive; dropping the locals here lets shutdown cascade stage by
        // stage once the task queue closes.
        drop(task_rx);
        drop(send_tx);
        drop(send_rx);
        drop(error_tx);
        drop(error_rx);

        Self { task_tx, handles }
    }

    /// Enqueue one raw record. Blocks while the task queue is full; errors
    /// only when the pool has shut down.
    pub fn submit(&self, record: RawRecord) -> Result<(), SendError<RawRecord>> {
        self.task_tx.send(record)
    }

    /// Close the task queue and wait for every stage to drain.
    pub fn shutdown(self) {
        drop(self.task_tx);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn record(content: &str) -> RawRecord {
        RawRecord {
            client: "10.0.0.1:514".to_string(),
            content: content.to_string(),
            tag: "nginx".to_string(),
            hostname: "edge-01".to_string(),
        }
    }

    fn passthrough_receiver() -> ReceiverFn {
        Arc::new(|raw: RawRecord| {
            if raw.content == "bad" {
                return Err(RecordError::Malformed(raw.content));
            }
            Ok(Receiver {
                log: Log {
                    uri: raw.content,
                    ..Log::default()
                },
                geo: GeoInfo::default(),
            })
        })
    }

    fn pool_config(
        received: Arc<Mutex<Vec<String>>>,
        errors: Arc<AtomicUsize>,
    ) -> PoolConfig {
        PoolConfig {
            task_queue_size: 16,
            send_queue_size: 16,
            error_queue_size: 16,
            worker_count: 2,
            sender_count: 2,
            error_handler_count: 1,
            receiver_fn: passthrough_receiver(),
            listener_fn: Arc::new(move |receiver: Receiver| {
                received.lock().unwrap().push(receiver.log.uri);
                Ok(())
            }),
            error_fn: Arc::new(move |_err| {
                errors.fetch_add(1, Ordering::SeqCst);
            }),
        }
    }

    #[test]
    fn test_successful_records_reach_the_listener() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(AtomicUsize::new(0));
        let pool = Pool::run(pool_config(Arc::clone(&received), Arc::clone(&errors)));

        for i in 0..10 {
            pool.submit(record(&format!("record-{}", i))).unwrap();
        }
        pool.shutdown();

        let mut seen = received.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[0], "record-0");
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_records_route_to_error_stage() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(AtomicUsize::new(0));
        let pool = Pool::run(pool_config(Arc::clone(&received), Arc::clone(&errors)));

        pool.submit(record("bad")).unwrap();
        pool.submit(record("good")).unwrap();
        pool.shutdown();

        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_failure_routes_to_error_stage() {
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_for_handler = Arc::clone(&errors);

        let pool = Pool::run(PoolConfig {
            task_queue_size: 4,
            send_queue_size: 4,
            error_queue_size: 4,
            worker_count: 1,
            sender_count: 1,
            error_handler_count: 1,
            receiver_fn: passthrough_receiver(),
            listener_fn: Arc::new(|_receiver| Err(RecordError::Sink("down".to_string()))),
            error_fn: Arc::new(move |_err| {
                errors_for_handler.fetch_add(1, Ordering::SeqCst);
            }),
        });

        pool.submit(record("good")).unwrap();
        pool.shutdown();

        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_drains_pending_records() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(AtomicUsize::new(0));
        let pool = Pool::run(pool_config(Arc::clone(&received), errors));

        for i in 0..100 {
            pool.submit(record(&format!("record-{}", i))).unwrap();
        }
        pool.shutdown();

        // Everything submitted before shutdown is processed, not dropped.
        assert_eq!(received.lock().unwrap().len(), 100);
    }
}
