//! Unique-viewer aggregation.
//!
//! Counts concurrent viewers per channel. A viewer is identified by a
//! stable fingerprint over remote IP and user agent, so the same player
//! re-requesting segments within a flush window is counted once. State
//! accumulates under a read/write lock and is drained atomically on every
//! scheduler tick.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, Receiver};
use xxhash_rust::xxh3::xxh3_64;

/// One viewer on one channel, as seen by the aggregator.
#[derive(Debug, Clone)]
pub struct UniqueIdentity {
    pub channel: String,
    pub ip: String,
    pub user_agent: String,
}

impl UniqueIdentity {
    /// Stable fingerprint deduplicating a viewer across requests.
    fn fingerprint(&self) -> u64 {
        let mut combined = String::with_capacity(self.ip.len() + self.user_agent.len());
        combined.push_str(&self.ip);
        combined.push_str(&self.user_agent);
        xxh3_64(combined.as_bytes())
    }
}

/// Viewer fingerprints accumulated for a single channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelConnections {
    connections: HashSet<u64>,
}

impl ChannelConnections {
    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

struct OnlineState {
    connections: HashMap<String, ChannelConnections>,
    flushed_at: Instant,
}

/// Thread-safe per-channel unique-viewer counter.
pub struct Online {
    state: RwLock<OnlineState>,
}

impl Online {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(OnlineState {
                connections: HashMap::new(),
                flushed_at: Instant::now(),
            }),
        }
    }

    /// Record a viewer if not already present for the channel. Idempotent:
    /// re-peeking the same viewer leaves the count unchanged.
    pub fn peek(&self, identity: &UniqueIdentity) {
        if !self.contains(identity) {
            self.add(identity);
        }
    }

    pub fn contains(&self, identity: &UniqueIdentity) -> bool {
        let state = self.state.read().unwrap();
        state
            .connections
            .get(&identity.channel)
            .map(|channel| channel.connections.contains(&identity.fingerprint()))
            .unwrap_or(false)
    }

    fn add(&self, identity: &UniqueIdentity) {
        let mut state = self.state.write().unwrap();
        state
            .connections
            .entry(identity.channel.clone())
            .or_default()
            .connections
            .insert(identity.fingerprint());
    }

    /// Point-in-time copy of the channel map. Concurrent writers may add
    /// viewers the moment this returns.
    pub fn connections(&self) -> HashMap<String, ChannelConnections> {
        self.state.read().unwrap().connections.clone()
    }

    /// Number of channels with at least one viewer.
    pub fn count(&self) -> usize {
        self.state.read().unwrap().connections.len()
    }

    /// Total viewers across all channels.
    pub fn total(&self) -> usize {
        let state = self.state.read().unwrap();
        state.connections.values().map(|c| c.count()).sum()
    }

    /// The `n` busiest channels, most viewers first.
    pub fn top(&self, n: usize) -> Vec<(String, usize)> {
        let snapshot = self.connections();
        top_channels(&snapshot, n)
    }

    /// Atomically replace the accumulated state with an empty map, stamp the
    /// flush time, and hand back the drained snapshot. Swapping under the
    /// exclusive lock means a concurrent `peek` lands in exactly one period.
    pub fn flush(&self) -> HashMap<String, ChannelConnections> {
        let mut state = self.state.write().unwrap();
        state.flushed_at = Instant::now();
        std::mem::take(&mut state.connections)
    }

    pub fn last_flushed_at(&self) -> Instant {
        self.state.read().unwrap().flushed_at
    }

    /// Spawn the flush loop: every `interval` the callback receives the
    /// aggregator and is expected to drain it via [`Online::flush`]. The
    /// loop ends when the shutdown channel fires or closes.
    pub fn schedule<F>(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: Receiver<()>,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: Fn(&Online) + Send + 'static,
    {
        let online = Arc::clone(self);
        let ticker = tick(interval);

        thread::spawn(move || loop {
            select! {
                recv(ticker) -> _ => callback(&online),
                recv(shutdown) -> _ => break,
            }
        })
    }
}

impl Default for Online {
    fn default() -> Self {
        Self::new()
    }
}

/// The `n` busiest channels of a snapshot, most viewers first. Always sorts
/// a point-in-time copy, never the live structure.
pub fn top_channels(
    channels: &HashMap<String, ChannelConnections>,
    n: usize,
) -> Vec<(String, usize)> {
    let mut sorted: Vec<(String, usize)> = channels
        .iter()
        .map(|(channel, c)| (channel.clone(), c.count()))
        .collect();

    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted.truncate(n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer(channel: &str, ip: &str) -> UniqueIdentity {
        UniqueIdentity {
            channel: channel.to_string(),
            ip: ip.to_string(),
            user_agent: "Mozilla/5.0".to_string(),
        }
    }

    #[test]
    fn test_peek_is_idempotent() {
        let online = Online::new();
        let identity = viewer("karusel", "203.0.113.7");

        online.peek(&identity);
        online.peek(&identity);

        assert_eq!(online.total(), 1);
        assert!(online.contains(&identity));
    }

    #[test]
    fn test_distinct_viewers_accumulate() {
        let online = Online::new();

        online.peek(&viewer("karusel", "203.0.113.7"));
        online.peek(&viewer("karusel", "203.0.113.8"));
        online.peek(&viewer("domashniy", "203.0.113.7"));

        assert_eq!(online.count(), 2);
        assert_eq!(online.total(), 3);
    }

    #[test]
    fn test_same_ip_different_agent_is_a_new_viewer() {
        let online = Online::new();
        let mut identity = viewer("karusel", "203.0.113.7");

        online.peek(&identity);
        identity.user_agent = "VLC/3.0.11".to_string();
        online.peek(&identity);

        assert_eq!(online.total(), 2);
    }

    #[test]
    fn test_flush_drains_and_readmits() {
        let online = Online::new();
        let identity = viewer("karusel", "203.0.113.7");

        online.peek(&identity);
        let drained = online.flush();

        assert_eq!(drained.get("karusel").unwrap().count(), 1);
        assert_eq!(online.count(), 0);
        assert!(!online.contains(&identity));

        // Previously-seen viewer counts as new after the flush.
        online.peek(&identity);
        assert_eq!(online.total(), 1);
    }

    #[test]
    fn test_flush_stamps_time() {
        let online = Online::new();
        let before = online.last_flushed_at();

        online.flush();
        assert!(online.last_flushed_at() >= before);
    }

    #[test]
    fn test_top_orders_by_viewer_count() {
        let online = Online::new();

        for i in 0..3 {
            online.peek(&viewer("karusel", &format!("10.0.0.{}", i)));
        }
        online.peek(&viewer("domashniy", "10.0.1.1"));

        let top = online.top(10);
        assert_eq!(top[0], ("karusel".to_string(), 3));
        assert_eq!(top[1], ("domashniy".to_string(), 1));

        assert_eq!(online.top(1).len(), 1);
    }

    #[test]
    fn test_concurrent_peeks_lose_no_insert() {
        let online = Arc::new(Online::new());
        let workers = 8;
        let per_worker = 50;

        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let online = Arc::clone(&online);
                thread::spawn(move || {
                    for i in 0..per_worker {
                        online.peek(&viewer("karusel", &format!("10.{}.0.{}", w, i)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(online.total(), workers * per_worker);
    }

    #[test]
    fn test_scheduler_invokes_callback_and_stops() {
        let online = Arc::new(Online::new());
        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let handle = online.schedule(Duration::from_millis(10), shutdown_rx, move |o| {
            let _ = fired_tx.send(o.flush());
        });

        let drained = fired_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("scheduler never fired");
        assert!(drained.is_empty());

        shutdown_tx.send(()).unwrap();
        handle.join().unwrap();
    }
}
