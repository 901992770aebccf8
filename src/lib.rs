//! In-process event bus with wildcard routing, priority ordering and
//! middleware, plus the reactive state built on it: node selection and
//! command-pattern undo/redo.
//!
//! Construction order is explicit. Build the [`EventBus`](bus::EventBus)
//! first and hand an `Arc` of it to the
//! [`SelectionManager`](selection::SelectionManager) and
//! [`HistoryManager`](history::HistoryManager).

pub mod banner;
pub mod bindings;
pub mod bus;
pub mod commands;
pub mod config;
pub mod consts;
pub mod events;
pub mod history;
pub mod observable;
pub mod selection;
