use crate::types::ActionRecord;
use serde::{Deserialize, Serialize};

/// Accepted actions of a session plus the actions undone since.
///
/// Pushing a new action does not clear `redo_stack`; clients rely on being
/// able to redo past a fresh stroke.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    actions: Vec<ActionRecord>,
    redo_stack: Vec<ActionRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: ActionRecord) {
        self.actions.push(action);
    }

    /// Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        if let Some(action) = self.actions.pop() {
            self.redo_stack.push(action);
            true
        } else {
            false
        }
    }

    pub fn redo(&mut self) -> bool {
        if let Some(action) = self.redo_stack.pop() {
            self.actions.push(action);
            true
        } else {
            false
        }
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    /// Most recently undone action last.
    pub fn redo_stack(&self) -> &[ActionRecord] {
        &self.redo_stack
    }
}
