//! Run state for reentrancy control.
//!
//! Committing a date notifies listeners, and a listener may ask the same
//! engine to run again while it is still running. The state value lives in
//! a `Cell` owned by the engine, and `RunGuard` restores it on every exit
//! path, including early returns through `?`.

use std::cell::Cell;

/// Whether an engine is inside a run, and how deeply nested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running {
        depth: usize,
    },
}

impl RunState {
    pub fn is_running(self) -> bool {
        matches!(self, RunState::Running { .. })
    }

    pub fn depth(self) -> usize {
        match self {
            RunState::Idle => 0,
            RunState::Running { depth } => depth,
        }
    }

    fn entered(self) -> Self {
        RunState::Running {
            depth: self.depth() + 1,
        }
    }

    fn left(self) -> Self {
        match self.depth() {
            0 | 1 => RunState::Idle,
            depth => RunState::Running { depth: depth - 1 },
        }
    }
}

/// Scope of one (possibly nested) run. Dropping it leaves the run.
#[derive(Debug)]
pub struct RunGuard<'a> {
    state: &'a Cell<RunState>,
}

impl<'a> RunGuard<'a> {
    /// Start an outermost run. `None` when a run is already in progress.
    pub fn try_enter(state: &'a Cell<RunState>) -> Option<Self> {
        if state.get().is_running() {
            return None;
        }
        Some(Self::enter(state))
    }

    /// Enter a run, nesting inside one already in progress.
    pub fn enter(state: &'a Cell<RunState>) -> Self {
        state.set(state.get().entered());
        Self { state }
    }

    /// Nesting depth of this guard's run (1 for the outermost).
    pub fn depth(&self) -> usize {
        self.state.get().depth()
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.set(self.state.get().left());
    }
}
