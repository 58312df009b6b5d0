//! Process-wide counters for the session engine.
//! Relaxed atomics only; values are diagnostic, never used for control flow.
use std::sync::atomic::{AtomicU64, Ordering};

static LINES_RENDERED: AtomicU64 = AtomicU64::new(0);
static DROPPED_STALE: AtomicU64 = AtomicU64::new(0);
static DROPPED_PRIVATE: AtomicU64 = AtomicU64::new(0);
static DROPPED_DUPLICATE: AtomicU64 = AtomicU64::new(0);
static DROPPED_FOREIGN_ROOM: AtomicU64 = AtomicU64::new(0);
static COMMANDS_DISPATCHED: AtomicU64 = AtomicU64::new(0);
static SUBMISSIONS_FAILED: AtomicU64 = AtomicU64::new(0);
static PLAYBACK_STARTS: AtomicU64 = AtomicU64::new(0);
static PLAYBACK_ERRORS: AtomicU64 = AtomicU64::new(0);

/// Why an inbound room message was not rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Stale,
    Private,
    Duplicate,
    ForeignRoom,
}

pub fn inc_lines_rendered() {
    LINES_RENDERED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_drop(reason: DropReason) {
    let counter = match reason {
        DropReason::Stale => &DROPPED_STALE,
        DropReason::Private => &DROPPED_PRIVATE,
        DropReason::Duplicate => &DROPPED_DUPLICATE,
        DropReason::ForeignRoom => &DROPPED_FOREIGN_ROOM,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_commands_dispatched() {
    COMMANDS_DISPATCHED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_submissions_failed() {
    SUBMISSIONS_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_playback_starts() {
    PLAYBACK_STARTS.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_playback_errors() {
    PLAYBACK_ERRORS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub lines_rendered: u64,
    pub dropped_stale: u64,
    pub dropped_private: u64,
    pub dropped_duplicate: u64,
    pub dropped_foreign_room: u64,
    pub commands_dispatched: u64,
    pub submissions_failed: u64,
    pub playback_starts: u64,
    pub playback_errors: u64,
}

impl Snapshot {
    pub fn dropped_total(&self) -> u64 {
        self.dropped_stale + self.dropped_private + self.dropped_duplicate + self.dropped_foreign_room
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        lines_rendered: LINES_RENDERED.load(Ordering::Relaxed),
        dropped_stale: DROPPED_STALE.load(Ordering::Relaxed),
        dropped_private: DROPPED_PRIVATE.load(Ordering::Relaxed),
        dropped_duplicate: DROPPED_DUPLICATE.load(Ordering::Relaxed),
        dropped_foreign_room: DROPPED_FOREIGN_ROOM.load(Ordering::Relaxed),
        commands_dispatched: COMMANDS_DISPATCHED.load(Ordering::Relaxed),
        submissions_failed: SUBMISSIONS_FAILED.load(Ordering::Relaxed),
        playback_starts: PLAYBACK_STARTS.load(Ordering::Relaxed),
        playback_errors: PLAYBACK_ERRORS.load(Ordering::Relaxed),
    }
}
