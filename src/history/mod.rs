//! Command-pattern undo/redo.
//!
//! Every mutation publishes both `history.undo.changed` and
//! `history.redo.changed` so bound views never go stale. Executing a new
//! action always clears the redo stack.

pub mod action;

pub use action::{Action, FnAction};

use std::error::Error as StdError;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::bus::event::now_ms;
use crate::bus::{EventBus, lock};
use crate::config::HistoryConfig;
use crate::events::{
    self, ActionPerformed, PerformedKind, RedoChanged, UndoChanged, to_payload,
};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// An action failed. The stacks are left as they were before the call.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("action '{name}' failed to execute: {source}")]
    Execute { name: String, source: BoxError },

    #[error("action '{name}' failed to undo: {source}")]
    Undo { name: String, source: BoxError },

    #[error("action '{name}' failed to redo: {source}")]
    Redo { name: String, source: BoxError },
}

/// Name and record time of a stacked action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub name: String,
    /// Milliseconds since the Unix epoch at which the action entered history.
    pub timestamp: u64,
}

struct Entry {
    action: Box<dyn Action>,
    timestamp: u64,
}

impl Entry {
    fn new(action: Box<dyn Action>) -> Self {
        Self {
            action,
            timestamp: now_ms(),
        }
    }
}

#[derive(Default)]
struct Stacks {
    undo: Vec<Entry>,
    redo: Vec<Entry>,
}

pub struct HistoryManager {
    bus: Arc<EventBus>,
    stacks: Mutex<Stacks>,
    max_history_size: usize,
}

impl HistoryManager {
    pub fn new(bus: Arc<EventBus>, max_history_size: usize) -> Self {
        Self {
            bus,
            stacks: Mutex::new(Stacks::default()),
            max_history_size,
        }
    }

    pub fn from_config(bus: Arc<EventBus>, config: &HistoryConfig) -> Self {
        Self::new(bus, config.max_history_size)
    }

    /// Run `action` and record it. On failure nothing is recorded.
    pub fn execute<A: Action + 'static>(&self, action: A) -> Result<(), HistoryError> {
        self.execute_boxed(Box::new(action))
    }

    pub fn execute_boxed(&self, mut action: Box<dyn Action>) -> Result<(), HistoryError> {
        let name = action.name().to_string();
        action.execute().map_err(|e| HistoryError::Execute {
            name: name.clone(),
            source: e.into(),
        })?;

        {
            let mut stacks = lock(&self.stacks);
            stacks.undo.push(Entry::new(action));
            stacks.redo.clear();
            if stacks.undo.len() > self.max_history_size {
                let excess = stacks.undo.len() - self.max_history_size;
                stacks.undo.drain(..excess);
            }
        }
        debug!(action = %name, "executed");
        self.notify();
        Ok(())
    }

    /// Undo the most recent action. `Ok(false)` when there is nothing to undo.
    pub fn undo(&self) -> Result<bool, HistoryError> {
        let popped = lock(&self.stacks).undo.pop();
        let Some(mut entry) = popped else {
            return Ok(false);
        };
        let name = entry.action.name().to_string();
        if let Err(e) = entry.action.undo() {
            lock(&self.stacks).undo.push(entry);
            return Err(HistoryError::Undo {
                name,
                source: e.into(),
            });
        }

        lock(&self.stacks).redo.push(entry);
        debug!(action = %name, "undone");
        self.notify();
        self.performed(PerformedKind::Undo, name);
        Ok(true)
    }

    /// Re-execute the most recently undone action. `Ok(false)` when there
    /// is nothing to redo.
    pub fn redo(&self) -> Result<bool, HistoryError> {
        let popped = lock(&self.stacks).redo.pop();
        let Some(mut entry) = popped else {
            return Ok(false);
        };
        let name = entry.action.name().to_string();
        if let Err(e) = entry.action.execute() {
            lock(&self.stacks).redo.push(entry);
            return Err(HistoryError::Redo {
                name,
                source: e.into(),
            });
        }

        {
            let mut stacks = lock(&self.stacks);
            stacks.undo.push(entry);
            if stacks.undo.len() > self.max_history_size {
                stacks.undo.remove(0);
            }
        }
        debug!(action = %name, "redone");
        self.notify();
        self.performed(PerformedKind::Redo, name);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !lock(&self.stacks).undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !lock(&self.stacks).redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        lock(&self.stacks).undo.len()
    }

    pub fn redo_len(&self) -> usize {
        lock(&self.stacks).redo.len()
    }

    /// The undo stack, oldest first.
    pub fn undo_items(&self) -> Vec<HistoryItem> {
        items(&lock(&self.stacks).undo)
    }

    /// The redo stack, oldest first (the next redo is last).
    pub fn redo_items(&self) -> Vec<HistoryItem> {
        items(&lock(&self.stacks).redo)
    }

    pub fn undo_names(&self) -> Vec<String> {
        self.undo_items().into_iter().map(|i| i.name).collect()
    }

    pub fn redo_names(&self) -> Vec<String> {
        self.redo_items().into_iter().map(|i| i.name).collect()
    }

    /// Drop both stacks.
    pub fn clear(&self) {
        let dropped = {
            let mut stacks = lock(&self.stacks);
            std::mem::take(&mut *stacks)
        };
        drop(dropped);
        self.notify();
    }

    fn notify(&self) {
        let (undo, redo) = {
            let stacks = lock(&self.stacks);
            (stacks.undo.len(), stacks.redo.len())
        };
        self.bus.publish(
            events::HISTORY_UNDO_CHANGED,
            to_payload(&UndoChanged {
                size: undo,
                can_undo: undo > 0,
            }),
        );
        self.bus.publish(
            events::HISTORY_REDO_CHANGED,
            to_payload(&RedoChanged {
                size: redo,
                can_redo: redo > 0,
            }),
        );
    }

    fn performed(&self, kind: PerformedKind, action_name: String) {
        self.bus.publish(
            events::HISTORY_ACTION_PERFORMED,
            to_payload(&ActionPerformed { kind, action_name }),
        );
    }
}

fn items(entries: &[Entry]) -> Vec<HistoryItem> {
    entries
        .iter()
        .map(|e| HistoryItem {
            name: e.action.name().to_string(),
            timestamp: e.timestamp,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &'static str) -> impl Action + 'static {
        FnAction::new(name, || Ok(()), || Ok(()))
    }

    fn manager(limit: usize) -> HistoryManager {
        HistoryManager::new(Arc::new(EventBus::default()), limit)
    }

    #[test]
    fn empty_history_cannot_undo_or_redo() {
        let history = manager(10);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.undo().unwrap());
        assert!(!history.redo().unwrap());
    }

    #[test]
    fn execute_enables_undo() {
        let history = manager(10);
        history.execute(noop("a")).unwrap();
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn respects_max_depth() {
        let history = manager(3);
        for name in ["1", "2", "3", "4", "5"] {
            history.execute(noop(name)).unwrap();
        }
        assert_eq!(history.undo_names(), vec!["3", "4", "5"]);

        let mut undo_count = 0;
        while history.undo().unwrap() {
            undo_count += 1;
        }
        assert_eq!(undo_count, 3);
    }

    #[test]
    fn failed_execute_records_nothing() {
        let history = manager(10);
        history.execute(noop("a")).unwrap();
        history.undo().unwrap();

        let err = history
            .execute(FnAction::new("bad", || anyhow::bail!("boom"), || Ok(())))
            .unwrap_err();
        assert!(matches!(err, HistoryError::Execute { ref name, .. } if name == "bad"));
        assert_eq!(err.to_string(), "action 'bad' failed to execute: boom");
        assert_eq!(history.undo_len(), 0);
        // The redo stack survives a failed execute.
        assert_eq!(history.redo_len(), 1);
    }

    #[test]
    fn failed_undo_keeps_action_on_undo_stack() {
        let history = manager(10);
        history
            .execute(FnAction::new("stuck", || Ok(()), || anyhow::bail!("locked")))
            .unwrap();
        assert!(matches!(history.undo(), Err(HistoryError::Undo { .. })));
        assert_eq!(history.undo_names(), vec!["stuck"]);
        assert!(!history.can_redo());
    }

    #[test]
    fn items_carry_record_time() {
        let history = manager(10);
        history.execute(noop("a")).unwrap();
        let items = history.undo_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "a");
        assert!(items[0].timestamp > 0);
    }

    #[test]
    fn clear_empties_both_stacks() {
        let history = manager(10);
        history.execute(noop("a")).unwrap();
        history.execute(noop("b")).unwrap();
        history.undo().unwrap();
        history.clear();
        assert_eq!(history.undo_len(), 0);
        assert_eq!(history.redo_len(), 0);
    }
}
