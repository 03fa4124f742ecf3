//! The change-log: tag-and-revert for directory mutations.
//!
//! While enabled, every mutation that commits through the pipeline gets
//! an event appended: a monotonically increasing revision, a summary of
//! the forward operation, and the reverse operation sufficient to restore
//! the prior state. A caller tags the current revision before a block of
//! mutations and reverts to the tag afterwards; test harnesses lean on
//! this to restore fixture state between tests.
//!
//! A single writer mutex guards the revision allocator and the event
//! list. Replay itself happens in `DirectoryService::revert`, which
//! re-enters the pipeline under `BYPASS_ALL` so the replayed operations
//! are not themselves recorded.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use oxidir_types::Dn;

use crate::context::Operation;

/// A reverse operation ready to re-enter the pipeline.
#[derive(Clone, Debug)]
pub struct RecordedOp {
    pub dn: Dn,
    pub operation: Operation,
}

/// What the forward operation was, for inspection and export.
#[derive(Clone, Debug, Serialize)]
pub struct ChangeSummary {
    pub kind: String,
    pub dn: String,
}

#[derive(Clone, Debug)]
pub struct ChangeLogEvent {
    pub revision: u64,
    pub forward: ChangeSummary,
    /// `None` when the pre-operation state was unavailable; reverting
    /// past such an event fails with `unrevertable`.
    pub reverse: Option<RecordedOp>,
}

#[derive(Default)]
struct State {
    enabled: bool,
    revision: u64,
    events: Vec<ChangeLogEvent>,
}

#[derive(Default)]
pub struct ChangeLog {
    state: Mutex<State>,
}

impl ChangeLog {
    pub fn new() -> ChangeLog {
        ChangeLog::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// The revision of the most recent event; the value to tag with.
    pub fn current_revision(&self) -> u64 {
        self.state.lock().revision
    }

    /// Append an event, allocating the next revision.
    pub fn append(&self, forward: ChangeSummary, reverse: Option<RecordedOp>) -> u64 {
        let mut state = self.state.lock();
        state.revision += 1;
        let revision = state.revision;
        debug!(revision, kind = %forward.kind, dn = %forward.dn, "recorded change");
        state.events.push(ChangeLogEvent {
            revision,
            forward,
            reverse,
        });
        revision
    }

    /// Events strictly after `revision`, oldest first.
    pub fn events_after(&self, revision: u64) -> Vec<ChangeLogEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| e.revision > revision)
            .cloned()
            .collect()
    }

    /// Drop everything after `revision` and rewind the allocator to it.
    /// Called once the reverse operations have been replayed.
    pub fn truncate_after(&self, revision: u64) {
        let mut state = self.state.lock();
        state.events.retain(|e| e.revision <= revision);
        state.revision = revision;
    }

    /// JSON rendering of the event list for inspection.
    pub fn export_json(&self) -> String {
        #[derive(Serialize)]
        struct Exported<'a> {
            revision: u64,
            kind: &'a str,
            dn: &'a str,
            revertible: bool,
        }

        let state = self.state.lock();
        let exported: Vec<Exported<'_>> = state
            .events
            .iter()
            .map(|e| Exported {
                revision: e.revision,
                kind: &e.forward.kind,
                dn: &e.forward.dn,
                revertible: e.reverse.is_some(),
            })
            .collect();
        serde_json::to_string_pretty(&exported).expect("event export serializes")
    }
}
