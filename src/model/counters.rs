/// Per-cycle tallies reported in the orchestrator's summary log line and
/// mirrored onto the `relay_containers_*_total` counters (spec.md §5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounters {
    pub checked: u64,
    pub updated: u64,
    pub failed: u64,
}

impl CycleCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_checked(&mut self) {
        self.checked += 1;
    }

    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// `updated + failed <= checked` always holds: every container is
    /// checked, and at most one of updated/failed is recorded for it.
    pub fn is_consistent(&self) -> bool {
        self.updated + self.failed <= self.checked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let c = CycleCounters::new();
        assert_eq!(c, CycleCounters { checked: 0, updated: 0, failed: 0 });
        assert!(c.is_consistent());
    }

    #[test]
    fn invariant_holds_across_recordings() {
        let mut c = CycleCounters::new();
        c.record_checked();
        c.record_updated();
        c.record_checked();
        c.record_failed();
        c.record_checked();
        assert_eq!(c, CycleCounters { checked: 3, updated: 1, failed: 1 });
        assert!(c.is_consistent());
    }
}
