//! Event catalogue: the names and payload shapes components agree on.
//!
//! Collaborators outside the core (uploaders, graph builders, the canvas)
//! publish the `graph.*` and `dataset.*` families. The selection and
//! history managers publish the rest. The bus itself never validates
//! payloads; these types exist so both sides serialize the same fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// Low-level selection requests from the canvas.
pub const GRAPH_NODE_SELECTED: &str = "graph.node.selected";
pub const GRAPH_NODE_DESELECTED: &str = "graph.node.deselected";
pub const GRAPH_SELECTION_CLEARED: &str = "graph.selection.cleared";

// Graph lifecycle.
pub const GRAPH_CREATED: &str = "graph.created";
pub const GRAPH_UPDATED: &str = "graph.updated";
pub const GRAPH_DELETED: &str = "graph.deleted";
pub const GRAPH_NODE_ADDED: &str = "graph.node.added";
pub const GRAPH_NODE_REMOVED: &str = "graph.node.removed";

// Dataset lifecycle.
pub const DATASET_UPLOADED: &str = "dataset.uploaded";
pub const DATASET_DELETED: &str = "dataset.deleted";

// Published by the selection manager.
pub const NODE_SELECTED: &str = "node.selected";
pub const NODE_DESELECTED: &str = "node.deselected";
pub const SELECTION_CHANGED: &str = "selection.changed";

// Published by the history manager.
pub const HISTORY_UNDO_CHANGED: &str = "history.undo.changed";
pub const HISTORY_REDO_CHANGED: &str = "history.redo.changed";
pub const HISTORY_ACTION_PERFORMED: &str = "history.action.performed";

/// Payload of node selection events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPayload {
    pub node_id: String,
    #[serde(default)]
    pub multi_select: bool,
    #[serde(default)]
    pub source: Option<String>,
}

/// Payload of `node.deselected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeselectionPayload {
    pub node_id: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// Payload of `selection.changed`: always the complete selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionChanged {
    pub selected_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_selection: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Payload of the graph lifecycle family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLifecyclePayload {
    pub graph_id: String,
    pub graph_type: String,
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(default)]
    pub source: Option<String>,
}

/// Payload of the dataset lifecycle family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetLifecyclePayload {
    pub dataset_id: String,
    pub filename: String,
    pub row_count: usize,
    pub column_count: usize,
    pub uploader_id: String,
}

/// Payload of `history.undo.changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoChanged {
    pub size: usize,
    pub can_undo: bool,
}

/// Payload of `history.redo.changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedoChanged {
    pub size: usize,
    pub can_redo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformedKind {
    Undo,
    Redo,
}

/// Payload of `history.action.performed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPerformed {
    #[serde(rename = "type")]
    pub kind: PerformedKind,
    pub action_name: String,
}

/// Serialize a payload struct into the bus's `Value` representation.
/// Plain data structs with string keys cannot fail here.
pub fn to_payload<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or_default()
}
