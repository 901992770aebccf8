//! Tracks which graph items are selected.
//!
//! The canvas publishes low-level `graph.node.*` requests; the manager
//! applies them to its own state and republishes normalized
//! `node.selected` / `node.deselected` / `selection.changed` events.
//! Callers only ever see snapshots of the selection.

use anyhow::Context;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};
use tracing::trace;

use crate::bus::event::now_ms;
use crate::bus::{EventBus, MetadataOverrides, SubscribeOptions, SubscriptionId, lock};
use crate::config::SelectionConfig;
use crate::events::{
    self, DeselectionPayload, SelectionChanged, SelectionPayload, to_payload,
};

/// Options for [`SelectionManager::select_node`].
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Add to the selection instead of replacing it.
    pub multi: bool,
    pub source: Option<String>,
}

impl SelectOptions {
    pub fn multi() -> Self {
        Self {
            multi: true,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Point-in-time copy of the selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Node,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionAction {
    Select,
    Deselect,
    Clear,
}

/// One line of the diagnostic selection log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    #[serde(rename = "type")]
    pub kind: TraceKind,
    /// `None` for a clear.
    pub item_id: Option<String>,
    pub item_type: ItemType,
    pub action: SelectionAction,
    pub timestamp: u64,
}

/// Edges are carried in the state but have no selection operations yet.
#[derive(Debug, Default)]
struct SelectionState {
    nodes: IndexSet<String>,
    edges: IndexSet<String>,
}

pub struct SelectionManager {
    bus: Arc<EventBus>,
    state: Mutex<SelectionState>,
    trace: Mutex<VecDeque<TraceEntry>>,
    max_history_size: usize,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl SelectionManager {
    /// Create a manager and start listening for `graph.*` selection requests.
    pub fn new(bus: Arc<EventBus>, max_history_size: usize) -> Arc<Self> {
        let manager = Arc::new(Self {
            bus,
            state: Mutex::new(SelectionState::default()),
            trace: Mutex::new(VecDeque::with_capacity(max_history_size)),
            max_history_size,
            subscriptions: Mutex::new(Vec::new()),
        });
        manager.listen();
        manager
    }

    pub fn from_config(bus: Arc<EventBus>, config: &SelectionConfig) -> Arc<Self> {
        Self::new(bus, config.max_history_size)
    }

    fn listen(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let on_select = self.bus.subscribe(
            events::GRAPH_NODE_SELECTED,
            move |event, _| {
                let Some(manager) = weak.upgrade() else {
                    return Ok(());
                };
                let request: SelectionPayload = serde_json::from_value(event.payload.clone())
                    .context("malformed node selection request")?;
                let source = request.source.or_else(|| event.metadata.source.clone());
                manager.select_node(
                    &request.node_id,
                    SelectOptions {
                        multi: request.multi_select,
                        source,
                    },
                );
                Ok(())
            },
            SubscribeOptions::default(),
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_deselect = self.bus.subscribe(
            events::GRAPH_NODE_DESELECTED,
            move |event, _| {
                let Some(manager) = weak.upgrade() else {
                    return Ok(());
                };
                let request: DeselectionPayload = serde_json::from_value(event.payload.clone())
                    .context("malformed node deselection request")?;
                let source = request.source.or_else(|| event.metadata.source.clone());
                manager.deselect_node(&request.node_id, source.as_deref());
                Ok(())
            },
            SubscribeOptions::default(),
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        let on_clear = self.bus.subscribe(
            events::GRAPH_SELECTION_CLEARED,
            move |event, _| {
                let Some(manager) = weak.upgrade() else {
                    return Ok(());
                };
                let source = event
                    .payload_str("source")
                    .map(str::to_string)
                    .or_else(|| event.metadata.source.clone());
                manager.clear_selection(source.as_deref());
                Ok(())
            },
            SubscribeOptions::default(),
        );

        lock(&self.subscriptions).extend([on_select, on_deselect, on_clear]);
    }

    /// Select `node_id`. Without `multi`, every currently selected node is
    /// deselected first. Returns whether the node was newly inserted.
    pub fn select_node(&self, node_id: &str, options: SelectOptions) -> bool {
        if !options.multi {
            for prior in self.node_ids() {
                self.deselect_node(&prior, options.source.as_deref());
            }
        }

        let inserted = lock(&self.state).nodes.insert(node_id.to_string());
        if !inserted {
            return false;
        }
        self.log(Some(node_id), SelectionAction::Select);
        trace!(node = node_id, multi = options.multi, "node selected");

        self.emit(
            events::NODE_SELECTED,
            to_payload(&SelectionPayload {
                node_id: node_id.to_string(),
                multi_select: options.multi,
                source: options.source.clone(),
            }),
            options.source.as_deref(),
        );
        self.emit(
            events::SELECTION_CHANGED,
            to_payload(&SelectionChanged {
                selected_ids: self.node_ids(),
                previous_selection: None,
                node_id: Some(node_id.to_string()),
                source: options.source.clone(),
            }),
            options.source.as_deref(),
        );
        true
    }

    /// Remove `node_id` if selected. Returns whether it was.
    pub fn deselect_node(&self, node_id: &str, source: Option<&str>) -> bool {
        let removed = lock(&self.state).nodes.shift_remove(node_id);
        if !removed {
            return false;
        }
        self.log(Some(node_id), SelectionAction::Deselect);
        trace!(node = node_id, "node deselected");

        self.emit(
            events::NODE_DESELECTED,
            to_payload(&DeselectionPayload {
                node_id: node_id.to_string(),
                source: source.map(str::to_string),
            }),
            source,
        );
        true
    }

    /// Deselect everything, then publish one `selection.changed` carrying
    /// the pre-clear selection, even when nothing was selected.
    pub fn clear_selection(&self, source: Option<&str>) {
        let previous = self.node_ids();
        for node_id in &previous {
            self.deselect_node(node_id, source);
        }
        self.log(None, SelectionAction::Clear);

        self.emit(
            events::SELECTION_CHANGED,
            to_payload(&SelectionChanged {
                selected_ids: Vec::new(),
                previous_selection: Some(previous),
                node_id: None,
                source: source.map(str::to_string),
            }),
            source,
        );
    }

    pub fn get_selection(&self) -> SelectionSnapshot {
        let state = lock(&self.state);
        let nodes: Vec<String> = state.nodes.iter().cloned().collect();
        let edges: Vec<String> = state.edges.iter().cloned().collect();
        SelectionSnapshot {
            count: nodes.len() + edges.len(),
            nodes,
            edges,
        }
    }

    pub fn is_selected(&self, node_id: &str) -> bool {
        lock(&self.state).nodes.contains(node_id)
    }

    /// The diagnostic log, oldest first.
    pub fn trace(&self) -> Vec<TraceEntry> {
        lock(&self.trace).iter().cloned().collect()
    }

    pub fn trace_capacity(&self) -> usize {
        self.max_history_size
    }

    fn node_ids(&self) -> Vec<String> {
        lock(&self.state).nodes.iter().cloned().collect()
    }

    fn log(&self, item_id: Option<&str>, action: SelectionAction) {
        if self.max_history_size == 0 {
            return;
        }
        let mut trace = lock(&self.trace);
        while trace.len() >= self.max_history_size {
            trace.pop_front();
        }
        trace.push_back(TraceEntry {
            kind: TraceKind::Selection,
            item_id: item_id.map(str::to_string),
            item_type: ItemType::Node,
            action,
            timestamp: now_ms(),
        });
    }

    fn emit(&self, name: &str, payload: Value, source: Option<&str>) {
        let overrides = MetadataOverrides {
            source: source.map(str::to_string),
            ..MetadataOverrides::default()
        };
        self.bus.publish_with(name, payload, overrides);
    }
}

impl Drop for SelectionManager {
    fn drop(&mut self) {
        for id in lock(&self.subscriptions).drain(..) {
            self.bus.unsubscribe_id(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(trace: usize) -> Arc<SelectionManager> {
        SelectionManager::new(Arc::new(EventBus::default()), trace)
    }

    #[test]
    fn select_then_multi_select_keeps_order() {
        let m = manager(20);
        assert!(m.select_node("b", SelectOptions::default()));
        assert!(m.select_node("a", SelectOptions::multi()));
        assert_eq!(m.get_selection().nodes, vec!["b", "a"]);
    }

    #[test]
    fn multi_select_of_present_node_is_noop() {
        let m = manager(20);
        m.select_node("a", SelectOptions::default());
        assert!(!m.select_node("a", SelectOptions::multi()));
        assert_eq!(m.get_selection().count, 1);
    }

    #[test]
    fn deselect_absent_node_returns_false() {
        let m = manager(20);
        assert!(!m.deselect_node("ghost", None));
        assert!(m.trace().is_empty());
    }

    #[test]
    fn trace_is_bounded() {
        let m = manager(3);
        for id in ["a", "b", "c", "d"] {
            m.select_node(id, SelectOptions::multi());
        }
        let trace = m.trace();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].item_id.as_deref(), Some("b"));
        assert_eq!(trace[2].item_id.as_deref(), Some("d"));
        assert!(trace.iter().all(|e| e.kind == TraceKind::Selection));
    }

    #[test]
    fn clear_logs_deselects_then_clear() {
        let m = manager(20);
        m.select_node("a", SelectOptions::default());
        m.clear_selection(None);
        let actions: Vec<SelectionAction> = m.trace().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                SelectionAction::Select,
                SelectionAction::Deselect,
                SelectionAction::Clear
            ]
        );
        assert!(m.trace()[2].item_id.is_none());
    }

    #[test]
    fn snapshot_does_not_alias_state() {
        let m = manager(20);
        m.select_node("a", SelectOptions::default());
        let before = m.get_selection();
        m.select_node("b", SelectOptions::multi());
        assert_eq!(before.nodes, vec!["a"]);
        assert_eq!(m.get_selection().nodes, vec!["a", "b"]);
    }

    #[test]
    fn dropping_manager_releases_its_subscriptions() {
        let bus = Arc::new(EventBus::default());
        let m = SelectionManager::new(Arc::clone(&bus), 20);
        assert_eq!(bus.subscriber_count(), 3);
        drop(m);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
