//! Diagnostics telemetry collector.
//!
//! The collector keeps a bounded history of [`MetricEvent`]s plus a broadcast
//! stream, and tracks per-cycle processing latency and validity counters.
//! One collector is owned by each `TrackerHandle`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ErrorCode;

pub mod events;

pub use events::MetricEvent;

/// Rolling processing latency over the last cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub avg_ms: f64,
    pub max_ms: f64,
    pub sample_count: usize,
}

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub cycles: u64,
    pub valid_outputs: u64,
    pub latency: LatencyStats,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
    cycles: AtomicU64,
    valid_outputs: AtomicU64,
    latency: Mutex<LatencyTracker>,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize, latency_window: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            valid_outputs: AtomicU64::new(0),
            latency: Mutex::new(LatencyTracker::new(latency_window)),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if self.history_capacity > 0 {
            let mut history = lock_or_recover(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    /// Account for one processed sample
    pub fn record_cycle(&self, elapsed: Duration, valid: bool) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if valid {
            self.valid_outputs.fetch_add(1, Ordering::Relaxed);
        }
        lock_or_recover(&self.latency).observe(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_transform_failure(&self, message: impl Into<String>) {
        self.publish(MetricEvent::TransformFailure {
            message: message.into(),
        });
    }

    /// Publish a typed error as an `Error` event
    pub fn record_error<E: ErrorCode>(&self, err: &E, context: impl Into<String>) {
        self.publish(MetricEvent::Error {
            code: err.code(),
            context: context.into(),
        });
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = lock_or_recover(&self.history).iter().cloned().collect();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            valid_outputs: self.valid_outputs.load(Ordering::Relaxed),
            latency: lock_or_recover(&self.latency).stats(),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

/// Telemetry must keep flowing after a panicking publisher
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Latency tracker maintains a rolling window to compute avg/max latency.
struct LatencyTracker {
    samples: VecDeque<f64>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    fn observe(&mut self, value_ms: f64) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value_ms.abs());
    }

    fn stats(&self) -> LatencyStats {
        let count = self.samples.len();
        if count == 0 {
            return LatencyStats::default();
        }
        let sum: f64 = self.samples.iter().sum();
        let max = self.samples.iter().copied().fold(0.0_f64, f64::max);
        LatencyStats {
            avg_ms: sum / count as f64,
            max_ms: max,
            sample_count: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3, 4);
        collector.publish(MetricEvent::TaskSelected { id: 1 });
        collector.publish(MetricEvent::TaskSelected { id: 2 });
        collector.publish(MetricEvent::DefinitionsDumped { count: 5 });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert_eq!(snapshot.recent[0], MetricEvent::TaskSelected { id: 1 });
        assert!(matches!(
            snapshot.recent[2],
            MetricEvent::DefinitionsDumped { count: 5 }
        ));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2, 4);
        for id in 0..3 {
            collector.publish(MetricEvent::TaskSelected { id });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.recent[0], MetricEvent::TaskSelected { id: 1 });
    }

    #[test]
    fn subscribers_receive_published_events() {
        let collector = TelemetryCollector::default();
        let mut rx = collector.subscribe();
        collector.record_transform_failure("boom");
        assert_eq!(
            rx.try_recv().unwrap(),
            MetricEvent::TransformFailure {
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn record_error_uses_error_code() {
        let collector = TelemetryCollector::default();
        collector.record_error(&RegistryError::UnknownTask { id: 9 }, "set_task");
        assert_eq!(
            collector.snapshot().recent,
            vec![MetricEvent::Error {
                code: 1004,
                context: "set_task".to_string()
            }]
        );
    }

    #[test]
    fn cycles_track_latency_window() {
        let collector = TelemetryCollector::new(8, 8, 2);
        collector.record_cycle(Duration::from_millis(1), true);
        collector.record_cycle(Duration::from_millis(3), false);
        collector.record_cycle(Duration::from_millis(5), true);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.cycles, 3);
        assert_eq!(snapshot.valid_outputs, 2);
        assert_eq!(snapshot.latency.sample_count, 2);
        assert!((snapshot.latency.avg_ms - 4.0).abs() < 1e-9);
        assert!((snapshot.latency.max_ms - 5.0).abs() < 1e-9);
    }

    #[test]
    fn event_serializes_with_tag() {
        let json = serde_json::to_value(MetricEvent::IngressDropped { total: 3 }).unwrap();
        assert_eq!(json["type"], "ingress_dropped");
        assert_eq!(json["payload"]["total"], 3);
    }
}
