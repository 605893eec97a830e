//! Lock/archive transition guard.
//!
//! Discord reports `locked` and `archived` as a joint pair on thread
//! update, while GitHub sets them through independent lock/unlock and
//! close/reopen calls. Any state change the engine performs is echoed back
//! as a thread-update shortly afterwards, and archiving a locked thread
//! makes Discord emit a spurious unlock-then-archive burst. The guard is a
//! per-thread state machine that decides which of those signals to
//! propagate; archive reactions are always deferred through a debounce
//! timer owned by the runtime.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Enumerates the per-thread guard phases.
pub enum GuardPhase {
    /// No transition in flight.
    #[default]
    Settled,
    /// The engine changed the chat-side lock state itself; the next lock
    /// signal from chat is its echo and must not round-trip back.
    LockPending,
    /// A lock change was observed while the thread was archived; the next
    /// deferred archive reaction is part of the unlock-then-archive burst
    /// and must be cancelled.
    ArchiveDeferred,
}

impl GuardPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settled => "settled",
            Self::LockPending => "lock_pending",
            Self::ArchiveDeferred => "archive_deferred",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What to do with an incoming chat-side lock signal.
pub enum LockReaction {
    /// Propagate the new lock state to the tracker.
    Propagate { locked: bool },
    /// Echo or in-flight engine change; do nothing.
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What to do when the archive debounce timer fires.
pub enum ArchiveReaction {
    /// Propagate the new archived state to the tracker.
    Propagate { archived: bool },
    /// The deferred reaction belonged to a lock/archive burst; drop it.
    Cancelled,
}

/// Marks an engine-initiated chat-side lock change so the echo that
/// Discord delivers afterwards is absorbed instead of re-propagated.
pub fn begin_engine_lock(_phase: GuardPhase) -> GuardPhase {
    GuardPhase::LockPending
}

/// Reacts to the lock half of a chat thread-update.
///
/// A signal equal to the recorded state is an echo and settles a pending
/// engine lock. A genuine change observed while the thread is archived is
/// propagated but flags the thread, because Discord follows it with a
/// spurious archive flip that the timer must swallow.
pub fn react_to_lock_signal(
    phase: GuardPhase,
    current_locked: bool,
    incoming_locked: bool,
    currently_archived: bool,
) -> (GuardPhase, LockReaction) {
    if incoming_locked == current_locked {
        let next = match phase {
            GuardPhase::LockPending => GuardPhase::Settled,
            other => other,
        };
        return (next, LockReaction::Suppressed);
    }
    if phase == GuardPhase::LockPending {
        // The engine's own change is still settling; this flip is its echo.
        return (GuardPhase::Settled, LockReaction::Suppressed);
    }
    let next = if currently_archived {
        GuardPhase::ArchiveDeferred
    } else {
        phase
    };
    (
        next,
        LockReaction::Propagate {
            locked: incoming_locked,
        },
    )
}

/// Reacts to the archive debounce timer firing with the signal that
/// scheduled it.
pub fn react_to_archive_timer(
    phase: GuardPhase,
    incoming_archived: bool,
) -> (GuardPhase, ArchiveReaction) {
    if phase == GuardPhase::ArchiveDeferred {
        return (GuardPhase::Settled, ArchiveReaction::Cancelled);
    }
    (
        phase,
        ArchiveReaction::Propagate {
            archived: incoming_archived,
        },
    )
}
