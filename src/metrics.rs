//! Metrics and observability for soma_photo

use crate::outcome::{OutcomeStatus, UploadOutcome};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global metrics collector
#[derive(Default)]
pub struct Metrics {
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub total_latency_ms: AtomicU64,

    // Per-operation counters
    pub metadata_count: AtomicU64,
    pub ingest_count: AtomicU64,
    pub route_count: AtomicU64,
    pub delete_count: AtomicU64,

    // Per-outcome counters
    pub uploads_success: AtomicU64,
    pub uploads_missing_location: AtomicU64,
    pub uploads_missing_time: AtomicU64,
    pub uploads_missing_both: AtomicU64,
    pub uploads_rejected: AtomicU64,
    pub uploads_duplicate: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, op: &str, success: bool, latency_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        let counter = match op {
            "photo.metadata" => &self.metadata_count,
            "photo.ingest" => &self.ingest_count,
            "photo.route" => &self.route_count,
            "photo.delete" => &self.delete_count,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload(&self, outcome: &UploadOutcome) {
        let counter = match outcome.status {
            OutcomeStatus::Success => &self.uploads_success,
            OutcomeStatus::MissingLocation => &self.uploads_missing_location,
            OutcomeStatus::MissingTime => &self.uploads_missing_time,
            OutcomeStatus::MissingBoth => &self.uploads_missing_both,
            OutcomeStatus::Rejected(_) => &self.uploads_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if outcome.is_duplicate() {
            self.uploads_duplicate.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            error_rate: if total > 0 { failed as f64 / total as f64 } else { 0.0 },
            avg_latency_ms: if total > 0 { total_latency / total } else { 0 },
            operations: OperationMetrics {
                photo_metadata: self.metadata_count.load(Ordering::Relaxed),
                photo_ingest: self.ingest_count.load(Ordering::Relaxed),
                photo_route: self.route_count.load(Ordering::Relaxed),
                photo_delete: self.delete_count.load(Ordering::Relaxed),
            },
            uploads: UploadMetrics {
                success: self.uploads_success.load(Ordering::Relaxed),
                missing_location: self.uploads_missing_location.load(Ordering::Relaxed),
                missing_time: self.uploads_missing_time.load(Ordering::Relaxed),
                missing_both: self.uploads_missing_both.load(Ordering::Relaxed),
                rejected: self.uploads_rejected.load(Ordering::Relaxed),
                duplicates: self.uploads_duplicate.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub avg_latency_ms: u64,
    pub operations: OperationMetrics,
    pub uploads: UploadMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub photo_metadata: u64,
    pub photo_ingest: u64,
    pub photo_route: u64,
    pub photo_delete: u64,
}

/// Upload outcomes by status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadMetrics {
    pub success: u64,
    pub missing_location: u64,
    pub missing_time: u64,
    pub missing_both: u64,
    pub rejected: u64,
    /// Subset of `rejected`
    pub duplicates: u64,
}

/// Timer for tracking operation latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
