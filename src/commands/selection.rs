use serde_json::json;

use super::{Command, CommandResult, Session};
use crate::events::{self, SelectionPayload};

/// Sends a `graph.node.selected` request, as a canvas click would.
pub struct SelectCommand;

impl Command for SelectCommand {
    fn name(&self) -> &str {
        "/select"
    }

    fn usage(&self) -> &str {
        "<node> [--multi]"
    }

    fn description(&self) -> &str {
        "select a node (replacing the selection unless --multi)"
    }

    fn execute(&self, args: &[&str], session: &Session) -> CommandResult {
        let multi = args.contains(&"--multi") || args.contains(&"-m");
        let Some(node_id) = args.iter().find(|a| !a.starts_with('-')) else {
            return CommandResult::Failed("usage: /select <node> [--multi]".to_string());
        };
        let report = session.canvas.emit_payload(
            events::GRAPH_NODE_SELECTED,
            &SelectionPayload {
                node_id: node_id.to_string(),
                multi_select: multi,
                source: Some(session.canvas.source().to_string()),
            },
        );
        if let Some(failure) = report.errors.first() {
            return CommandResult::Failed(format!("{:#}", failure.error));
        }
        print_selection(session);
        CommandResult::Handled
    }
}

pub struct DeselectCommand;

impl Command for DeselectCommand {
    fn name(&self) -> &str {
        "/deselect"
    }

    fn usage(&self) -> &str {
        "<node>"
    }

    fn description(&self) -> &str {
        "deselect a node"
    }

    fn execute(&self, args: &[&str], session: &Session) -> CommandResult {
        let Some(node_id) = args.first() else {
            return CommandResult::Failed("usage: /deselect <node>".to_string());
        };
        session
            .canvas
            .emit(events::GRAPH_NODE_DESELECTED, json!({ "nodeId": node_id }));
        print_selection(session);
        CommandResult::Handled
    }
}

pub struct ClearCommand;

impl Command for ClearCommand {
    fn name(&self) -> &str {
        "/clear"
    }

    fn description(&self) -> &str {
        "clear the selection"
    }

    fn execute(&self, _args: &[&str], session: &Session) -> CommandResult {
        session
            .canvas
            .emit(events::GRAPH_SELECTION_CLEARED, json!({}));
        print_selection(session);
        CommandResult::Handled
    }
}

pub struct SelectionCommand;

impl Command for SelectionCommand {
    fn name(&self) -> &str {
        "/selection"
    }

    fn aliases(&self) -> &[&str] {
        &["/sel"]
    }

    fn description(&self) -> &str {
        "show the current selection and its trace"
    }

    fn execute(&self, _args: &[&str], session: &Session) -> CommandResult {
        print_selection(session);
        for entry in session.selection.trace() {
            println!(
                "    {:>13}  {:?} {}",
                entry.timestamp,
                entry.action,
                entry.item_id.as_deref().unwrap_or("*")
            );
        }
        CommandResult::Handled
    }
}

fn print_selection(session: &Session) {
    let snapshot = session.selection.get_selection();
    if snapshot.count == 0 {
        println!("  nothing selected");
    } else {
        println!("  selected ({}): {}", snapshot.count, snapshot.nodes.join(", "));
    }
}
