//! Edit history: snapshot log with undo/redo cursor.
//!
//! Each committed edit stores a full sheet snapshot. The cursor points at
//! the current state; undo moves it back, redo forward. Committing while
//! the cursor sits mid-log truncates the redo branch, so history is always
//! a single line.

use crate::sheet::Sheet;

#[derive(Debug, Clone)]
struct Snapshot {
    sheet: Sheet,
    token: u64,
}

#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Snapshot>,
    /// Index of the current snapshot.
    cursor: usize,
    next_token: u64,
}

impl History {
    /// Start a history log whose baseline is `initial` (usually the empty
    /// sheet, or the state right after a load).
    pub fn new(initial: Sheet) -> Self {
        Self {
            snapshots: vec![Snapshot {
                sheet: initial,
                token: 0,
            }],
            cursor: 0,
            next_token: 1,
        }
    }

    /// Reset the log to a single baseline snapshot. Used after bulk load,
    /// which is not an undoable edit.
    pub fn reset(&mut self, baseline: Sheet) {
        self.snapshots = vec![Snapshot {
            sheet: baseline,
            token: self.next_token,
        }];
        self.cursor = 0;
        self.next_token += 1;
    }

    /// Commit a new state after a successful edit. Discards any redo branch
    /// beyond the cursor. Returns the token identifying this state.
    pub fn commit(&mut self, sheet: Sheet) -> u64 {
        self.snapshots.truncate(self.cursor + 1);
        let token = self.next_token;
        self.next_token += 1;
        self.snapshots.push(Snapshot { sheet, token });
        self.cursor += 1;
        token
    }

    /// Step back one state. Returns the restored sheet and its token, or
    /// `None` when already at the baseline.
    pub fn undo(&mut self) -> Option<(Sheet, u64)> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        let snap = &self.snapshots[self.cursor];
        Some((snap.sheet.clone(), snap.token))
    }

    /// Step forward one state. Returns the restored sheet and its token, or
    /// `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<(Sheet, u64)> {
        if self.cursor + 1 >= self.snapshots.len() {
            return None;
        }
        self.cursor += 1;
        let snap = &self.snapshots[self.cursor];
        Some((snap.sheet.clone(), snap.token))
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Token of the current state.
    pub fn current_token(&self) -> u64 {
        self.snapshots[self.cursor].token
    }

    /// Number of stored snapshots, baseline included.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        false // there is always at least the baseline
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(Sheet::default())
    }
}
