//! Serialization statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Receives counters from the PDX engine.
///
/// Purely observational: no engine behavior depends on it.
pub trait StatisticsCollector: Send + Sync {
    /// Records one full deserialization into a concrete object.
    fn increment_deserialization_count(&self);

    /// Records the time spent in one full deserialization.
    fn add_deserialization_time(&self, elapsed: Duration);

    /// Records one serialization of a concrete object.
    fn increment_serialization_count(&self) {}

    /// Records one `PdxInstance` created through a factory.
    fn increment_instance_creation_count(&self) {}
}

/// Lock-free `StatisticsCollector` backed by atomic counters.
#[derive(Debug, Default)]
pub struct PdxStatistics {
    deserializations: AtomicU64,
    deserialization_nanos: AtomicU64,
    serializations: AtomicU64,
    instances_created: AtomicU64,
}

impl PdxStatistics {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of full deserializations.
    pub fn deserialization_count(&self) -> u64 {
        self.deserializations.load(Ordering::Relaxed)
    }

    /// Returns the total time spent in full deserializations.
    pub fn deserialization_time(&self) -> Duration {
        Duration::from_nanos(self.deserialization_nanos.load(Ordering::Relaxed))
    }

    /// Returns the number of object serializations.
    pub fn serialization_count(&self) -> u64 {
        self.serializations.load(Ordering::Relaxed)
    }

    /// Returns the number of instances created through factories.
    pub fn instance_creation_count(&self) -> u64 {
        self.instances_created.load(Ordering::Relaxed)
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.deserializations.store(0, Ordering::Relaxed);
        self.deserialization_nanos.store(0, Ordering::Relaxed);
        self.serializations.store(0, Ordering::Relaxed);
        self.instances_created.store(0, Ordering::Relaxed);
    }
}

impl StatisticsCollector for PdxStatistics {
    fn increment_deserialization_count(&self) {
        self.deserializations.fetch_add(1, Ordering::Relaxed);
    }

    fn add_deserialization_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.deserialization_nanos
            .fetch_add(nanos, Ordering::Relaxed);
    }

    fn increment_serialization_count(&self) {
        self.serializations.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_instance_creation_count(&self) {
        self.instances_created.fetch_add(1, Ordering::Relaxed);
    }
}
