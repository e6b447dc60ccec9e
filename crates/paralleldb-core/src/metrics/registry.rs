//! Validation metrics registry.
//!
//! Collects counters for tuples, batches and violations and exports them as a
//! plain snapshot or in Prometheus text format.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use crate::constraint::{Violation, ViolationKind};

/// Per-relation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationStats {
    /// Tuples accepted.
    pub accepted: u64,
    /// Tuples rejected.
    pub rejected: u64,
}

/// Point-in-time copy of [`ValidationMetrics`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub tuples_validated: u64,
    pub tuples_accepted: u64,
    pub tuples_rejected: u64,
    pub batches: u64,
    pub batches_cancelled: u64,
    /// Violation counts keyed by [`ViolationKind::as_str`].
    pub violations: BTreeMap<&'static str, u64>,
    pub by_relation: HashMap<String, RelationStats>,
}

/// Registry for validation metrics.
///
/// All recording methods take `&self` and may be called from rayon workers.
pub struct ValidationMetrics {
    started_at: Instant,

    tuples_validated: AtomicU64,
    tuples_accepted: AtomicU64,
    tuples_rejected: AtomicU64,

    batches: AtomicU64,
    batches_cancelled: AtomicU64,

    violations: [AtomicU64; ViolationKind::ALL.len()],
    by_relation: DashMap<String, RelationStats>,
}

impl ValidationMetrics {
    /// Create a new registry.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            tuples_validated: AtomicU64::new(0),
            tuples_accepted: AtomicU64::new(0),
            tuples_rejected: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            batches_cancelled: AtomicU64::new(0),
            violations: std::array::from_fn(|_| AtomicU64::new(0)),
            by_relation: DashMap::new(),
        }
    }

    /// Record the outcome of one tuple. An empty slice means accepted.
    pub fn record_tuple(&self, relation: &str, violations: &[Violation]) {
        self.tuples_validated.fetch_add(1, Ordering::Relaxed);

        let mut stats = self.by_relation.entry(relation.to_string()).or_default();
        if violations.is_empty() {
            self.tuples_accepted.fetch_add(1, Ordering::Relaxed);
            stats.accepted += 1;
        } else {
            self.tuples_rejected.fetch_add(1, Ordering::Relaxed);
            stats.rejected += 1;
        }
        drop(stats);

        for violation in violations {
            self.violations[violation.kind() as usize].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a finished batch.
    pub fn record_batch(&self, cancelled: bool) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        if cancelled {
            self.batches_cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Getters

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Get total tuples validated.
    pub fn tuples_validated(&self) -> u64 {
        self.tuples_validated.load(Ordering::Relaxed)
    }

    /// Get tuples accepted.
    pub fn tuples_accepted(&self) -> u64 {
        self.tuples_accepted.load(Ordering::Relaxed)
    }

    /// Get tuples rejected.
    pub fn tuples_rejected(&self) -> u64 {
        self.tuples_rejected.load(Ordering::Relaxed)
    }

    /// Get the number of violations of one kind.
    pub fn violations(&self, kind: ViolationKind) -> u64 {
        self.violations[kind as usize].load(Ordering::Relaxed)
    }

    /// Get rejection rate (0.0 - 1.0).
    pub fn rejection_rate(&self) -> f64 {
        let total = self.tuples_validated() as f64;
        if total > 0.0 {
            self.tuples_rejected() as f64 / total
        } else {
            0.0
        }
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tuples_validated: self.tuples_validated(),
            tuples_accepted: self.tuples_accepted(),
            tuples_rejected: self.tuples_rejected(),
            batches: self.batches.load(Ordering::Relaxed),
            batches_cancelled: self.batches_cancelled.load(Ordering::Relaxed),
            violations: ViolationKind::ALL
                .iter()
                .map(|&kind| (kind.as_str(), self.violations(kind)))
                .collect(),
            by_relation: self
                .by_relation
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }

    /// Export to Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP paralleldb_uptime_seconds Validator uptime in seconds\n");
        out.push_str("# TYPE paralleldb_uptime_seconds gauge\n");
        out.push_str(&format!("paralleldb_uptime_seconds {}\n\n", self.uptime_secs()));

        out.push_str("# HELP paralleldb_tuples_validated_total Tuples validated\n");
        out.push_str("# TYPE paralleldb_tuples_validated_total counter\n");
        out.push_str(&format!(
            "paralleldb_tuples_validated_total {}\n\n",
            self.tuples_validated()
        ));

        out.push_str("# HELP paralleldb_tuples_rejected_total Tuples rejected\n");
        out.push_str("# TYPE paralleldb_tuples_rejected_total counter\n");
        out.push_str(&format!(
            "paralleldb_tuples_rejected_total {}\n\n",
            self.tuples_rejected()
        ));

        out.push_str("# HELP paralleldb_batches_total Batches validated\n");
        out.push_str("# TYPE paralleldb_batches_total counter\n");
        out.push_str(&format!(
            "paralleldb_batches_total {}\n\n",
            self.batches.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP paralleldb_violations_total Violations by kind\n");
        out.push_str("# TYPE paralleldb_violations_total counter\n");
        for kind in ViolationKind::ALL {
            out.push_str(&format!(
                "paralleldb_violations_total{{kind=\"{}\"}} {}\n",
                kind.as_str(),
                self.violations(kind)
            ));
        }

        out
    }

    /// Reset all metrics (for testing).
    pub fn reset(&self) {
        self.tuples_validated.store(0, Ordering::Relaxed);
        self.tuples_accepted.store(0, Ordering::Relaxed);
        self.tuples_rejected.store(0, Ordering::Relaxed);
        self.batches.store(0, Ordering::Relaxed);
        self.batches_cancelled.store(0, Ordering::Relaxed);
        for counter in &self.violations {
            counter.store(0, Ordering::Relaxed);
        }
        self.by_relation.clear();
    }
}

impl Default for ValidationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValidationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationMetrics")
            .field("tuples_validated", &self.tuples_validated())
            .field("tuples_rejected", &self.tuples_rejected())
            .finish_non_exhaustive()
    }
}

/// Shared metrics handle.
pub type SharedValidationMetrics = Arc<ValidationMetrics>;

/// Create a new shared metrics registry.
pub fn new_shared_metrics() -> SharedValidationMetrics {
    Arc::new(ValidationMetrics::new())
}
