//! A throwaway in-memory graph so the shell has something to undo.

use anyhow::{Result, bail};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::bindings::Emitter;
use crate::bus::lock;
use crate::events::{self, GraphLifecyclePayload};
use crate::history::Action;

/// A set of node ids standing in for a real graph document.
pub struct DemoGraph {
    id: String,
    nodes: Mutex<BTreeSet<String>>,
}

impl DemoGraph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contains(&self, node_id: &str) -> bool {
        lock(&self.nodes).contains(node_id)
    }

    pub fn nodes(&self) -> Vec<String> {
        lock(&self.nodes).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.nodes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, node_id: &str) -> bool {
        lock(&self.nodes).insert(node_id.to_string())
    }

    fn remove(&self, node_id: &str) -> bool {
        lock(&self.nodes).remove(node_id)
    }

    fn announce(&self, emitter: &Emitter, name: &str, node_id: &str) {
        emitter.emit(name, json!({ "graphId": self.id, "nodeId": node_id }));
        emitter.emit_payload(
            events::GRAPH_UPDATED,
            &GraphLifecyclePayload {
                graph_id: self.id.clone(),
                graph_type: "demo".to_string(),
                node_count: self.len(),
                edge_count: 0,
                source: Some(emitter.source().to_string()),
            },
        );
    }
}

/// Adds a node; undo removes it again.
pub struct AddNode {
    graph: Arc<DemoGraph>,
    emitter: Emitter,
    node_id: String,
    label: String,
}

impl AddNode {
    pub fn new(graph: Arc<DemoGraph>, emitter: Emitter, node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            label: format!("add {node_id}"),
            graph,
            emitter,
            node_id,
        }
    }
}

impl Action for AddNode {
    fn name(&self) -> &str {
        &self.label
    }

    fn execute(&mut self) -> Result<()> {
        if !self.graph.insert(&self.node_id) {
            bail!("node {} already exists", self.node_id);
        }
        self.graph
            .announce(&self.emitter, events::GRAPH_NODE_ADDED, &self.node_id);
        Ok(())
    }

    fn undo(&mut self) -> Result<()> {
        if !self.graph.remove(&self.node_id) {
            bail!("node {} is already gone", self.node_id);
        }
        self.emitter.emit(
            events::GRAPH_NODE_DESELECTED,
            json!({ "nodeId": self.node_id }),
        );
        self.graph
            .announce(&self.emitter, events::GRAPH_NODE_REMOVED, &self.node_id);
        Ok(())
    }
}

/// Removes a node (dropping it from the selection); undo restores it.
pub struct RemoveNode {
    graph: Arc<DemoGraph>,
    emitter: Emitter,
    node_id: String,
    label: String,
}

impl RemoveNode {
    pub fn new(graph: Arc<DemoGraph>, emitter: Emitter, node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Self {
            label: format!("remove {node_id}"),
            graph,
            emitter,
            node_id,
        }
    }
}

impl Action for RemoveNode {
    fn name(&self) -> &str {
        &self.label
    }

    fn execute(&mut self) -> Result<()> {
        if !self.graph.remove(&self.node_id) {
            bail!("no such node: {}", self.node_id);
        }
        self.emitter.emit(
            events::GRAPH_NODE_DESELECTED,
            json!({ "nodeId": self.node_id }),
        );
        self.graph
            .announce(&self.emitter, events::GRAPH_NODE_REMOVED, &self.node_id);
        Ok(())
    }

    fn undo(&mut self) -> Result<()> {
        if !self.graph.insert(&self.node_id) {
            bail!("node {} already exists", self.node_id);
        }
        self.graph
            .announce(&self.emitter, events::GRAPH_NODE_ADDED, &self.node_id);
        Ok(())
    }
}
