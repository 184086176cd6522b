//! Bounded undo/redo history of image states.
//!
//! DESIGN
//! ======
//! A capped `VecDeque` plus a cursor. The cursor always points at the state
//! currently shown on the canvas, so `0 <= index < len <= MAX_HISTORY_SIZE`
//! holds after every operation. Committing after an undo discards the redo
//! tail; overflowing the cap drops the oldest state.
//!
//! Persistence is the caller's job: `undo`/`redo`/`commit` return the state to
//! republish and never fail, so a storage failure cannot roll history back.

use std::collections::VecDeque;

pub const MAX_HISTORY_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStack<T> {
    states: VecDeque<T>,
    index: usize,
}

impl<T> HistoryStack<T> {
    /// Start a history containing only `initial`.
    pub fn new(initial: T) -> Self {
        let mut states = VecDeque::with_capacity(MAX_HISTORY_SIZE);
        states.push_back(initial);
        Self { states, index: 0 }
    }

    /// Drop all states and start over from `initial`.
    pub fn reset(&mut self, initial: T) {
        self.states.clear();
        self.states.push_back(initial);
        self.index = 0;
    }

    /// Push a new current state, discarding any redo tail and the oldest
    /// state when the cap is exceeded. Returns the new current state.
    pub fn commit(&mut self, state: T) -> &T {
        self.states.truncate(self.index + 1);
        self.states.push_back(state);
        while self.states.len() > MAX_HISTORY_SIZE {
            self.states.pop_front();
        }
        self.index = self.states.len() - 1;
        &self.states[self.index]
    }

    /// Step back one state. `None` when already at the oldest state.
    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.states.get(self.index)
    }

    /// Step forward one state. `None` when already at the newest state.
    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.states.get(self.index)
    }

    #[must_use]
    pub fn current(&self) -> &T {
        &self.states[self.index]
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.states.len()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always `false`: a history holds at least one state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
