//! Batched per-request metrics.
//!
//! Every record that survives the pipeline contributes one [`StreamPoint`].
//! Points accumulate in a locked buffer and are emitted as a single batched
//! write on every scheduler tick, bounding write amplification to the sink
//! at the flush interval rather than per request.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{select, tick, Receiver};

/// Tag/field snapshot of one request, ready for the time-series sink.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPoint {
    pub country: String,
    pub asn_number: u32,
    pub asn_org: String,
    pub channel: String,
    pub streaming_server: String,
    pub host: String,
    pub quality: String,
    pub bytes_sent: u64,
    pub time: DateTime<Utc>,
}

/// Thread-safe append-only buffer of pending metric points.
#[derive(Default)]
pub struct StreamQueue {
    internal: Mutex<Vec<StreamPoint>>,
}

impl StreamQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, point: StreamPoint) {
        self.internal.lock().unwrap().push(point);
    }

    /// Copy of the current buffer, in append order.
    pub fn all(&self) -> Vec<StreamPoint> {
        self.internal.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.internal.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.lock().unwrap().is_empty()
    }

    /// Swap the buffer for an empty one and return the drained points. The
    /// lock is released before the caller emits anything, so writers never
    /// wait on the sink.
    pub fn flush(&self) -> Vec<StreamPoint> {
        std::mem::take(&mut *self.internal.lock().unwrap())
    }

    /// Spawn the flush loop; the callback drains the queue on every tick.
    pub fn schedule<F>(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: Receiver<()>,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: Fn(&StreamQueue) + Send + 'static,
    {
        let queue = Arc::clone(self);
        let ticker = tick(interval);

        thread::spawn(move || loop {
            select! {
                recv(ticker) -> _ => callback(&queue),
                recv(shutdown) -> _ => break,
            }
        })
    }
}
