use serde::{Deserialize, Serialize};

/// Identifier for a co-located workload (a pod, container, or process)
/// that owns one page of metrics in the shared pool.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadId(pub String);

impl WorkloadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for WorkloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WorkloadId({})", self.0)
    }
}

impl std::fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkloadId {
    fn from(val: String) -> Self {
        Self(val)
    }
}

impl From<&str> for WorkloadId {
    fn from(val: &str) -> Self {
        Self(val.to_string())
    }
}
