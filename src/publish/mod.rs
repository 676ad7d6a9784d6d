//! Batching publisher (spec §4.7, §5): a small fixed-size worker pool that
//! drains harvested measurements onto the wire, chunked to `batch_size` and
//! submitted with bounded backpressure.
//!
//! Grounded in `metrics-exporter-dogstatsd/src/forwarder/sync.rs`'s
//! channel-fed worker loop, generalized from a single forwarder thread to a
//! pool and from fire-and-forget UDP to retrying HTTP POSTs.

mod batch;
mod client;

pub use batch::{decode_batch, encode_batch, DecodedRecord};
pub use client::{ClientConfig, PublishClient};

use crate::config::Config;
use crate::measurement::Measurement;
use crate::registry::Registry;
use crossbeam_channel::{bounded, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::warn;

/// Owns the worker pool that turns harvested batches into HTTP publishes.
pub struct Publisher {
    sender: Sender<Vec<Measurement>>,
    workers: Vec<JoinHandle<()>>,
    drain_timeout: Duration,
}

impl Publisher {
    /// Starts `config.num_threads` worker threads pulling from a channel of
    /// depth `2 * num_threads` (spec §5 "submit blocks once the pool is
    /// saturated" -- a bounded channel gives that for free).
    pub fn new(registry: &Registry, config: &Config) -> Self {
        let (sender, receiver) = bounded::<Vec<Measurement>>(config.num_threads.max(1) * 2);
        let client = Arc::new(PublishClient::new(
            registry,
            ClientConfig {
                uri: config.uri.clone(),
                connect_timeout: config.connect_timeout,
                read_timeout: config.read_timeout,
                initial_backoff: config.initial_backoff,
                step: config.step,
                max_attempts: config.max_attempts,
            },
        ));

        let batch_size = config.batch_size;
        let mut workers = Vec::with_capacity(config.num_threads);
        for index in 0..config.num_threads.max(1) {
            let receiver = receiver.clone();
            let client = Arc::clone(&client);
            let handle = std::thread::Builder::new()
                .name(format!("metrics-publish-{index}"))
                .spawn(move || publish_loop(receiver, client, batch_size))
                .expect("failed to spawn publish worker thread");
            workers.push(handle);
        }

        Publisher { sender, workers, drain_timeout: config.drain_timeout }
    }

    /// Hands one harvest tick's measurements to the pool. Blocks if every
    /// worker is currently busy (spec §5 backpressure), rather than
    /// buffering unboundedly.
    pub fn submit(&self, measurements: Vec<Measurement>) {
        if measurements.is_empty() {
            return;
        }
        if self.sender.send(measurements).is_err() {
            warn!("publish channel closed, dropping a harvest tick's measurements");
        }
    }

    /// Closes the submission channel and waits up to `drain_timeout` for
    /// in-flight work to finish, then abandons whatever remains (spec §5
    /// "Cancellation": bounded drain, then discard).
    pub fn shutdown(self) {
        drop(self.sender);

        let (done_tx, done_rx) = bounded(self.workers.len());
        let worker_count = self.workers.len();
        for handle in self.workers {
            let done_tx = done_tx.clone();
            std::thread::spawn(move || {
                let _ = handle.join();
                let _ = done_tx.send(());
            });
        }
        drop(done_tx);

        let deadline = Instant::now() + self.drain_timeout;
        for _ in 0..worker_count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || done_rx.recv_timeout(remaining).is_err() {
                warn!("publisher drain timeout exceeded, abandoning in-flight publishes");
                return;
            }
        }
    }
}

fn publish_loop(receiver: crossbeam_channel::Receiver<Vec<Measurement>>, client: Arc<PublishClient>, batch_size: usize) {
    while let Ok(measurements) = receiver.recv() {
        for chunk in measurements.chunks(batch_size.max(1)) {
            let payload = encode_batch(chunk);
            let _ = client.send(&payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::id::Id;
    use crate::measurement::Statistic;

    #[test]
    fn submit_of_empty_batch_is_a_no_op() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let config = Config::builder().uri("http://127.0.0.1:0/publish").num_threads(1).build().unwrap();
        let publisher = Publisher::new(&registry, &config);
        publisher.submit(Vec::new());
        publisher.shutdown();
    }

    #[test]
    fn shutdown_drains_within_timeout_when_endpoint_is_unreachable() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let config = Config::builder()
            .uri("http://127.0.0.1:1/publish")
            .num_threads(1)
            .max_attempts(1)
            .drain_timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let publisher = Publisher::new(&registry, &config);
        publisher.submit(vec![Measurement::new(Id::new("x"), 0, 1.0, Statistic::Count)]);
        publisher.shutdown();
    }
}
