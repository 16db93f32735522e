//! Planner counters
//!
//! Monotonic counters shared across queries. Relaxed ordering: the values
//! are exact once all writers are done but are never used for coordination.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for planning and teardown
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_planned: AtomicU64,
    blocks_loaded: AtomicU64,
    blocks_planned: AtomicU64,
    plan_failures: AtomicU64,
    max_key_degradations: AtomicU64,
    teardown_failures: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_planned(&self) {
        self.queries_planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_blocks_loaded(&self, count: u64) {
        self.blocks_loaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_blocks_planned(&self) {
        self.blocks_planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plan_failures(&self) {
        self.plan_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_max_key_degradations(&self) {
        self.max_key_degradations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_teardown_failures(&self) {
        self.teardown_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_planned: self.queries_planned.load(Ordering::Relaxed),
            blocks_loaded: self.blocks_loaded.load(Ordering::Relaxed),
            blocks_planned: self.blocks_planned.load(Ordering::Relaxed),
            plan_failures: self.plan_failures.load(Ordering::Relaxed),
            max_key_degradations: self.max_key_degradations.load(Ordering::Relaxed),
            teardown_failures: self.teardown_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub queries_planned: u64,
    pub blocks_loaded: u64,
    pub blocks_planned: u64,
    pub plan_failures: u64,
    pub max_key_degradations: u64,
    pub teardown_failures: u64,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_registry_is_zero() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.queries_planned, 0);
        assert_eq!(snapshot.teardown_failures, 0);
    }

    #[test]
    fn test_counters() {
        let registry = MetricsRegistry::new();
        registry.increment_queries_planned();
        registry.add_blocks_loaded(3);
        registry.increment_blocks_planned();
        registry.increment_blocks_planned();
        registry.increment_max_key_degradations();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.queries_planned, 1);
        assert_eq!(snapshot.blocks_loaded, 3);
        assert_eq!(snapshot.blocks_planned, 2);
        assert_eq!(snapshot.max_key_degradations, 1);

        let parsed: serde_json::Value = serde_json::from_str(&snapshot.to_json()).unwrap();
        assert_eq!(parsed["blocks_loaded"], 3);
    }

    #[test]
    fn test_concurrent_increments() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        registry.increment_blocks_planned();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.snapshot().blocks_planned, 800);
    }
}
