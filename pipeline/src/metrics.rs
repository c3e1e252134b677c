use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::trace;

/// Point-in-time view over the pipeline's rolling statistics. Throughput is
/// delta-based (since the previous snapshot), not a lifetime average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetricsSnapshot {
    pub throughput_per_second: f64,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub error_rate: f64,
    pub total_processed: u64,
    pub samples_in_window: usize,
}

#[derive(Debug, Clone, Copy)]
struct MetricsEvent {
    latency: Duration,
    success: bool,
}

#[derive(Debug)]
struct MetricsState {
    samples: VecDeque<Duration>,
    window_size: usize,
    total_processed: u64,
    total_errors: u64,
    last_snapshot_at: Instant,
    processed_at_last_snapshot: u64,
}

/// Consumes per-transaction timing/outcome events off the hot path and
/// maintains the rolling window. The only state in the system shared across
/// concurrent pipeline runs.
pub struct MetricsAggregator {
    state: Arc<Mutex<MetricsState>>,
    sender: mpsc::UnboundedSender<MetricsEvent>,
}

/// Cheap clonable handle the hot path records through. The send never
/// blocks and never applies backpressure to the pipeline.
#[derive(Clone)]
pub struct MetricsRecorder {
    sender: mpsc::UnboundedSender<MetricsEvent>,
}

impl MetricsRecorder {
    /// `success` is false for degraded runs, which are the pipeline's error
    /// signal; the run itself still completes.
    pub fn record(&self, latency: Duration, success: bool) {
        // A dropped aggregator just means the event goes nowhere.
        let _ = self.sender.send(MetricsEvent { latency, success });
    }
}

impl MetricsAggregator {
    /// Spawns the consumer task; must be called within a tokio runtime.
    pub fn new(window_size: usize) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<MetricsEvent>();
        let state = Arc::new(Mutex::new(MetricsState {
            samples: VecDeque::with_capacity(window_size),
            window_size,
            total_processed: 0,
            total_errors: 0,
            last_snapshot_at: Instant::now(),
            processed_at_last_snapshot: 0,
        }));

        let worker_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                {
                    let mut state = lock_state(&worker_state);
                    state.total_processed += 1;
                    if !event.success {
                        state.total_errors += 1;
                    }
                    // Bounded ring: once full, the oldest sample is
                    // silently evicted (FIFO, no resampling).
                    if state.samples.len() == state.window_size {
                        state.samples.pop_front();
                    }
                    state.samples.push_back(event.latency);
                }

                histogram!("pipeline_processing_seconds").record(event.latency.as_secs_f64());
                counter!("pipeline_processed_total").increment(1);
                if !event.success {
                    counter!("pipeline_errors_total").increment(1);
                }
            }
            trace!("Metrics channel closed, aggregator worker exiting");
        });

        Self { state, sender }
    }

    pub fn recorder(&self) -> MetricsRecorder {
        MetricsRecorder {
            sender: self.sender.clone(),
        }
    }

    /// Lifetime processed count; does not advance the throughput window.
    pub fn total_processed(&self) -> u64 {
        lock_state(&self.state).total_processed
    }

    /// Safe to call concurrently with ongoing recording; per-field
    /// consistency, not linearizability.
    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        let mut state = lock_state(&self.state);

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_snapshot_at).as_secs_f64();
        let processed_delta = state.total_processed - state.processed_at_last_snapshot;
        let throughput_per_second = if elapsed > 0.0 {
            processed_delta as f64 / elapsed
        } else {
            0.0
        };
        state.last_snapshot_at = now;
        state.processed_at_last_snapshot = state.total_processed;

        let mean_latency_ms = if state.samples.is_empty() {
            0.0
        } else {
            state
                .samples
                .iter()
                .map(|d| d.as_secs_f64() * 1000.0)
                .sum::<f64>()
                / state.samples.len() as f64
        };

        PipelineMetricsSnapshot {
            throughput_per_second,
            mean_latency_ms,
            p95_latency_ms: percentile_ms(&state.samples, 0.95),
            error_rate: if state.total_processed == 0 {
                0.0
            } else {
                state.total_errors as f64 / state.total_processed as f64
            },
            total_processed: state.total_processed,
            samples_in_window: state.samples.len(),
        }
    }
}

fn lock_state(state: &Mutex<MetricsState>) -> std::sync::MutexGuard<'_, MetricsState> {
    match state.lock() {
        Ok(guard) => guard,
        // A panic while holding the lock cannot leave the counters in a
        // torn state, so a poisoned lock is still usable.
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn percentile_ms(samples: &VecDeque<Duration>, quantile: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<Duration> = samples.iter().copied().collect();
    sorted.sort_unstable();
    let rank = (sorted.len() as f64 * quantile).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);

    sorted[index].as_secs_f64() * 1000.0
}
