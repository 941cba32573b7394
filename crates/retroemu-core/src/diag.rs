//! Access-fault diagnostics: counters and a last-fault record.

use std::cell::Cell;

use crate::fault::{Fault, FaultKind};

/// Monotonic fault counters owned by an address space.
///
/// Interior mutability keeps recording possible from `&self` read paths, so
/// inspector-side reads observe faults the same way CPU-side reads do.
#[derive(Debug, Default)]
pub struct Diagnostics {
    counts: [Cell<u64>; FaultKind::COUNT],
    last_fault: Cell<Option<Fault>>,
}

impl Diagnostics {
    /// Creates a zeroed diagnostics block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `fault`.
    pub fn record(&self, fault: Fault) {
        let counter = &self.counts[fault.kind().index()];
        counter.set(counter.get().wrapping_add(1));
        self.last_fault.set(Some(fault));
    }

    /// Occurrences recorded for `kind`.
    #[must_use]
    pub fn count(&self, kind: FaultKind) -> u64 {
        self.counts[kind.index()].get()
    }

    /// Total occurrences across all fault kinds.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(Cell::get).sum()
    }

    /// The most recently recorded fault, if any.
    #[must_use]
    pub fn last_fault(&self) -> Option<Fault> {
        self.last_fault.get()
    }

    /// Zeroes every counter and clears the last-fault record.
    pub fn clear(&self) {
        for counter in &self.counts {
            counter.set(0);
        }
        self.last_fault.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::Diagnostics;
    use crate::fault::{Fault, FaultKind};

    #[test]
    fn record_bumps_only_the_matching_counter() {
        let diag = Diagnostics::new();
        diag.record(Fault::UnmappedRead { addr: 0x10 });
        diag.record(Fault::UnmappedRead { addr: 0x11 });
        diag.record(Fault::ReadOnlyWrite { addr: 0xF800 });

        assert_eq!(diag.count(FaultKind::UnmappedRead), 2);
        assert_eq!(diag.count(FaultKind::ReadOnlyWrite), 1);
        assert_eq!(diag.count(FaultKind::UnmappedWrite), 0);
        assert_eq!(diag.total(), 3);
    }

    #[test]
    fn last_fault_tracks_the_most_recent_record() {
        let diag = Diagnostics::new();
        assert_eq!(diag.last_fault(), None);

        diag.record(Fault::UnmappedWrite { addr: 0x2000 });
        diag.record(Fault::UnknownRegionId);
        assert_eq!(diag.last_fault(), Some(Fault::UnknownRegionId));
    }

    #[test]
    fn clear_zeroes_everything() {
        let diag = Diagnostics::new();
        diag.record(Fault::UnmappedRead { addr: 0 });
        diag.clear();
        assert_eq!(diag.total(), 0);
        assert_eq!(diag.last_fault(), None);
    }
}
