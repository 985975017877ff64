//! Per-workload value classification.
//!
//! Classifiers consume a workload's full value vector each tick. The
//! registry dispatches by workload; a workload without a registered
//! classifier gets the configured default model, which is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use mview_types::WorkloadId;

/// A detector family. The registry builds the default variant for
/// workloads nobody configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierModel {
    #[default]
    Noop,
    Threshold,
}

/// Consumes one workload's value vector per scrape tick.
pub trait Classifier: Send + Sync {
    fn classify(&self, workload: &WorkloadId, values: &[f64]);
}

/// Accepts everything silently.
pub struct NoopClassifier;

impl Classifier for NoopClassifier {
    fn classify(&self, _workload: &WorkloadId, _values: &[f64]) {}
}

/// Flags any value at or above a fixed threshold.
pub struct ThresholdClassifier {
    threshold: f64,
    anomalies: AtomicU64,
}

impl ThresholdClassifier {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            anomalies: AtomicU64::new(0),
        }
    }

    /// Total values flagged so far.
    pub fn anomalies(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }
}

impl Classifier for ThresholdClassifier {
    fn classify(&self, workload: &WorkloadId, values: &[f64]) {
        let flagged = values.iter().filter(|&&v| v >= self.threshold).count() as u64;
        if flagged > 0 {
            self.anomalies.fetch_add(flagged, Ordering::Relaxed);
            tracing::warn!(
                workload = %workload,
                flagged,
                threshold = self.threshold,
                "values over threshold"
            );
        }
    }
}

fn build(model: ClassifierModel) -> Arc<dyn Classifier> {
    match model {
        ClassifierModel::Noop => Arc::new(NoopClassifier),
        ClassifierModel::Threshold => Arc::new(ThresholdClassifier::new(f64::MAX)),
    }
}

/// Workload-keyed classifier dispatch.
pub struct ClassifierRegistry {
    default: Arc<dyn Classifier>,
    by_workload: DashMap<WorkloadId, Arc<dyn Classifier>>,
}

impl ClassifierRegistry {
    pub fn new(default_model: ClassifierModel) -> Self {
        Self {
            default: build(default_model),
            by_workload: DashMap::new(),
        }
    }

    pub fn register(&self, workload: WorkloadId, classifier: Arc<dyn Classifier>) {
        self.by_workload.insert(workload, classifier);
    }

    pub fn classify(&self, workload: &WorkloadId, values: &[f64]) {
        match self.by_workload.get(workload) {
            Some(classifier) => classifier.classify(workload, values),
            None => self.default.classify(workload, values),
        }
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new(ClassifierModel::Noop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_counts_flagged_values() {
        let classifier = ThresholdClassifier::new(100.0);
        classifier.classify(&"web".into(), &[1.0, 150.0, 99.9, 100.0]);
        assert_eq!(classifier.anomalies(), 2);
        classifier.classify(&"web".into(), &[0.0]);
        assert_eq!(classifier.anomalies(), 2);
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = ClassifierRegistry::default();
        let threshold = Arc::new(ThresholdClassifier::new(10.0));
        registry.register("hot".into(), threshold.clone());

        registry.classify(&"hot".into(), &[50.0]);
        registry.classify(&"cold".into(), &[50.0]);
        assert_eq!(threshold.anomalies(), 1);
    }

    #[test]
    fn test_unregistered_workload_is_noop() {
        let registry = ClassifierRegistry::default();
        // No panic, no effect.
        registry.classify(&"unknown".into(), &[1.0, 2.0]);
    }

    #[test]
    fn test_model_serde() {
        assert_eq!(
            serde_json::from_str::<ClassifierModel>("\"threshold\"").unwrap(),
            ClassifierModel::Threshold
        );
        assert_eq!(ClassifierModel::default(), ClassifierModel::Noop);
    }
}
