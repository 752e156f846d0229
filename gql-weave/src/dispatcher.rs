//! Change dispatcher.
//!
//! Decides, per filesystem change, whether a regeneration round is needed.
//! Two states: `Idle` and `Regenerating`. Relevant changes that arrive while
//! a round is in flight collapse into a single follow-up round.

use crate::pattern::ResolvedPatterns;
use std::path::{Path, PathBuf};

/// A changed path. Carries no diff, only "something changed here".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Dispatcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// No round in flight.
    Idle,
    /// A round is in flight; `rerun` records that another is owed after it.
    Regenerating { rerun: bool },
}

/// What the dispatcher decided for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Path is outside the schema patterns.
    Ignored,
    /// Caller must start a round now.
    Start,
    /// Folded into the follow-up of the round in flight.
    Coalesced,
}

/// What happens after a round completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Back to idle.
    Idle,
    /// Changes arrived mid-round; caller must start exactly one more.
    Rerun,
}

/// Counters for the current dispatcher lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub rounds: u64,
    pub coalesced: u64,
    pub ignored: u64,
}

/// Owns the decision of when regeneration runs.
#[derive(Debug)]
pub struct ChangeDispatcher {
    patterns: ResolvedPatterns,
    state: DispatcherState,
    stats: DispatchStats,
}

impl ChangeDispatcher {
    /// Create an idle dispatcher for the anchored schema patterns.
    pub fn new(patterns: ResolvedPatterns) -> Self {
        Self {
            patterns,
            state: DispatcherState::Idle,
            stats: DispatchStats::default(),
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Whether a change at `path` affects the schema.
    pub fn is_relevant(&self, path: &Path) -> bool {
        self.patterns.matches(path)
    }

    /// Entry point for one filesystem change.
    pub fn on_schema_changed(&mut self, event: &ChangeEvent) -> Dispatch {
        if !self.is_relevant(&event.path) {
            self.stats.ignored += 1;
            tracing::debug!(path = %event.path.display(), "ignoring change outside schema patterns");
            return Dispatch::Ignored;
        }

        match self.state {
            DispatcherState::Idle => {
                tracing::debug!(path = %event.path.display(), "schema change, starting regeneration");
                self.begin();
                Dispatch::Start
            }
            DispatcherState::Regenerating { .. } => {
                tracing::trace!(path = %event.path.display(), "schema change during regeneration");
                self.state = DispatcherState::Regenerating { rerun: true };
                self.stats.coalesced += 1;
                Dispatch::Coalesced
            }
        }
    }

    /// Mark a round as started without an event (the initial build).
    pub fn begin(&mut self) {
        self.state = DispatcherState::Regenerating { rerun: false };
        self.stats.rounds += 1;
    }

    /// Report that the round in flight finished, successfully or not.
    pub fn complete(&mut self) -> Completion {
        match self.state {
            DispatcherState::Regenerating { rerun: true } => {
                tracing::debug!("changes arrived mid-round, scheduling one more regeneration");
                self.begin();
                Completion::Rerun
            }
            DispatcherState::Regenerating { rerun: false } | DispatcherState::Idle => {
                self.state = DispatcherState::Idle;
                Completion::Idle
            }
        }
    }
}
