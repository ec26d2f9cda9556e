//! Resource leak ledger
//!
//! Every OS and graphics handle the bootstrap acquires is registered here,
//! and unregistered at the matching destroy call. At process exit
//! [`LeakLedger::report`] lists everything still outstanding. The ledger is
//! an auditing side channel: it never frees anything itself, and a
//! bookkeeping anomaly (double free, unknown handle) is logged but never
//! escalated: an anomaly means a defect in the bootstrap's pairing, not a
//! live resource hazard.
//!
//! The scan is O(n) under one ledger-wide lock. Entry counts here are tens,
//! not thousands; this is a diagnostic tool, not a hot path.

use std::panic::Location;
use std::sync::Mutex;

/// What kind of resource a ledger entry tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Plain heap allocation
    Heap,
    /// Graphics-API object (context, program, vertex array)
    Graphics,
    /// Operating-system handle (window, device context, display)
    OsHandle,
    /// Anything else
    Custom,
}

impl ResourceKind {
    fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Heap => "HEAP",
            ResourceKind::Graphics => "GRAPHICS",
            ResourceKind::OsHandle => "OS-HANDLE",
            ResourceKind::Custom => "CUSTOM",
        }
    }
}

#[derive(Debug)]
struct LedgerEntry {
    handle: usize,
    kind: ResourceKind,
    site: &'static Location<'static>,
    desc: &'static str,
    freed: bool,
}

/// Append-only registry of acquired-resource records.
///
/// All operations take the ledger lock for the duration of the scan or
/// append, so `register`/`unregister` may race from different threads.
#[derive(Default)]
pub struct LeakLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl LeakLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the acquisition of `handle`. Never fails.
    ///
    /// The caller's file and line are captured as the origin site.
    #[track_caller]
    pub fn register(&self, handle: usize, kind: ResourceKind, desc: &'static str) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(LedgerEntry {
            handle,
            kind,
            site: Location::caller(),
            desc,
            freed: false,
        });
    }

    /// Mark the first unfreed entry matching `handle` as freed.
    ///
    /// Returns `false` (after logging a diagnostic) when no such entry
    /// exists; either the handle was never registered or it has already
    /// been unregistered. The process continues either way.
    pub fn unregister(&self, handle: usize) -> bool {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.handle == handle && !entry.freed {
                entry.freed = true;
                return true;
            }
        }

        log::warn!(
            "leak ledger: failed to unregister handle {:#x}; it was never registered or has already been freed",
            handle
        );
        false
    }

    /// Emit one diagnostic per still-unfreed entry and return the count.
    ///
    /// Logs a clean-summary line when nothing leaked.
    pub fn report(&self) -> usize {
        let entries = self.entries.lock().unwrap();

        let mut leaked = 0;
        for entry in entries.iter() {
            if !entry.freed {
                leaked += 1;
                log::warn!(
                    "leak detected: handle {:#x}, kind {}, acquired at {}:{}, desc: {}",
                    entry.handle,
                    entry.kind.as_str(),
                    entry.site.file(),
                    entry.site.line(),
                    entry.desc
                );
            }
        }

        if leaked == 0 {
            log::info!("leak ledger: no leaked handles");
        }

        leaked
    }

    /// Handles that are currently registered and unfreed, in registration
    /// order.
    pub fn outstanding(&self) -> Vec<usize> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .filter(|e| !e.freed)
            .map(|e| e.handle)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_report_lists_exactly_the_unfreed_handles() {
        let ledger = LeakLedger::new();
        ledger.register(0x10, ResourceKind::Graphics, "probe context");
        ledger.register(0x20, ResourceKind::Heap, "arena");
        ledger.register(0x30, ResourceKind::OsHandle, "window");

        assert!(ledger.unregister(0x10));
        assert!(ledger.unregister(0x30));

        assert_eq!(ledger.outstanding(), vec![0x20]);
        assert_eq!(ledger.report(), 1);
    }

    #[test]
    fn test_unregister_order_does_not_matter_for_unrelated_handles() {
        let ledger = LeakLedger::new();
        ledger.register(1, ResourceKind::OsHandle, "a");
        ledger.register(2, ResourceKind::OsHandle, "b");
        ledger.register(3, ResourceKind::OsHandle, "c");

        assert!(ledger.unregister(2));
        assert!(ledger.unregister(3));
        assert!(ledger.unregister(1));

        assert_eq!(ledger.report(), 0);
    }

    #[test]
    fn test_double_unregister_is_an_anomaly_not_an_unflag() {
        let ledger = LeakLedger::new();
        ledger.register(0x42, ResourceKind::Graphics, "program");

        assert!(ledger.unregister(0x42));
        assert!(!ledger.unregister(0x42));

        // The first match stays freed.
        assert_eq!(ledger.report(), 0);
    }

    #[test]
    fn test_unknown_handle_is_an_anomaly() {
        let ledger = LeakLedger::new();
        assert!(!ledger.unregister(0xdead));
        assert_eq!(ledger.report(), 0);
    }

    #[test]
    fn test_reused_handle_values_match_the_earliest_unfreed_entry() {
        // The same numeric value can be handed out twice by the OS once the
        // first incarnation is released.
        let ledger = LeakLedger::new();
        ledger.register(0x7, ResourceKind::OsHandle, "first incarnation");
        assert!(ledger.unregister(0x7));

        ledger.register(0x7, ResourceKind::OsHandle, "second incarnation");
        assert_eq!(ledger.outstanding(), vec![0x7]);
        assert!(ledger.unregister(0x7));
        assert_eq!(ledger.report(), 0);
    }

    #[test]
    fn test_probe_context_freed_before_persistent_registered() {
        // Mirrors the two-phase bring-up: the probe context must be fully
        // released before the persistent one ever appears in the ledger.
        let ledger = LeakLedger::new();

        ledger.register(0xaaaa, ResourceKind::Graphics, "probe context");
        assert!(ledger.unregister(0xaaaa));
        assert!(ledger.outstanding().is_empty());

        ledger.register(0xbbbb, ResourceKind::Graphics, "persistent context");
        assert_eq!(ledger.outstanding(), vec![0xbbbb]);

        assert!(ledger.unregister(0xbbbb));
        assert_eq!(ledger.report(), 0);
    }

    #[test]
    fn test_concurrent_register_unregister() {
        let ledger = Arc::new(LeakLedger::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let handle = t * 1000 + i;
                        ledger.register(handle, ResourceKind::Custom, "thread handle");
                        assert!(ledger.unregister(handle));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.report(), 0);
    }
}
