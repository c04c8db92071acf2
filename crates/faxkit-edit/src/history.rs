// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded undo/redo history with an explicit cursor.
//
// Entries below the cursor are states to return to on undo (oldest first).
// Entries at or above the cursor are states to return to on redo. Undo and
// redo swap the live state with the entry at the cursor, so no state is ever
// cloned on the way back and forth.

/// Snapshot history for a value of type `T`.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: Vec<T>,
    cursor: usize,
    limit: usize,
}

impl<T> History<T> {
    /// A history that keeps at most `limit` snapshots (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record `before` (the state prior to an edit about to be applied).
    ///
    /// Discards the redo branch. When the history is full the oldest snapshot
    /// is dropped and the cursor rebased.
    pub fn commit(&mut self, before: T) {
        self.entries.truncate(self.cursor);
        self.entries.push(before);
        self.cursor += 1;
        if self.entries.len() > self.limit {
            self.entries.remove(0);
            self.cursor -= 1;
        }
    }

    /// Withdraw the most recent commit without touching the live state.
    ///
    /// Only valid at the tip; returns the withdrawn snapshot.
    pub fn retract(&mut self) -> Option<T> {
        if self.cursor == 0 || self.cursor != self.entries.len() {
            return None;
        }
        self.cursor -= 1;
        self.entries.pop()
    }

    /// Step back: `live` becomes the previous state. Returns false at the start.
    pub fn undo(&mut self, live: &mut T) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        std::mem::swap(live, &mut self.entries[self.cursor]);
        true
    }

    /// Step forward: `live` becomes the next state. Returns false at the tip.
    pub fn redo(&mut self, live: &mut T) -> bool {
        if self.cursor >= self.entries.len() {
            return false;
        }
        std::mem::swap(live, &mut self.entries[self.cursor]);
        self.cursor += 1;
        true
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Apply `edit` to `live`, recording the prior state.
    fn edit(history: &mut History<Vec<u32>>, live: &mut Vec<u32>, value: u32) {
        history.commit(live.clone());
        live.push(value);
    }

    #[test]
    fn undo_then_redo_restores_state() {
        let mut history = History::new(50);
        let mut live = Vec::new();
        for n in 1..=6 {
            edit(&mut history, &mut live, n);
        }
        let after_edits = live.clone();

        for _ in 0..6 {
            assert!(history.undo(&mut live));
        }
        assert!(live.is_empty());
        assert!(!history.undo(&mut live));

        for _ in 0..6 {
            assert!(history.redo(&mut live));
        }
        assert_eq!(live, after_edits);
        assert!(!history.redo(&mut live));
    }

    #[test]
    fn commit_after_undo_discards_redo_branch() {
        let mut history = History::new(50);
        let mut live = Vec::new();
        edit(&mut history, &mut live, 1);
        edit(&mut history, &mut live, 2);
        history.undo(&mut live);
        assert!(history.can_redo());

        edit(&mut history, &mut live, 3);
        assert!(!history.can_redo());
        assert_eq!(live, vec![1, 3]);
        assert_eq!(history.cursor(), history.len());
    }

    #[test]
    fn overflow_drops_oldest_and_rebases_cursor() {
        let mut history = History::new(3);
        let mut live = Vec::new();
        for n in 1..=5 {
            edit(&mut history, &mut live, n);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 3);

        while history.undo(&mut live) {}
        // Two oldest steps were forgotten.
        assert_eq!(live, vec![1, 2]);
        assert!(history.cursor() <= history.len());
    }

    #[test]
    fn retract_only_at_tip() {
        let mut history = History::new(10);
        let mut live = Vec::new();
        edit(&mut history, &mut live, 1);
        history.commit(live.clone());
        assert_eq!(history.retract(), Some(vec![1]));
        assert_eq!(history.len(), 1);

        history.undo(&mut live);
        assert_eq!(history.retract(), None);
    }
}
