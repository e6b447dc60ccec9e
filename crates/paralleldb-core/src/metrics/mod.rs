//! Metrics collection for validation.
//!
//! # Usage
//!
//! ```ignore
//! use paralleldb_core::metrics::new_shared_metrics;
//!
//! let metrics = new_shared_metrics();
//! let validator = ConstraintValidator::new().with_metrics(metrics.clone());
//!
//! // ... validate tuples and batches ...
//!
//! let snapshot = metrics.snapshot();
//! let prometheus_text = metrics.to_prometheus();
//! ```

mod registry;

pub use registry::{
    new_shared_metrics, MetricsSnapshot, RelationStats, SharedValidationMetrics, ValidationMetrics,
};
