use super::{AddNode, Command, CommandResult, RemoveNode, Session};

pub struct AddCommand;

impl Command for AddCommand {
    fn name(&self) -> &str {
        "/add"
    }

    fn usage(&self) -> &str {
        "<node>"
    }

    fn description(&self) -> &str {
        "add a node to the demo graph (undoable)"
    }

    fn execute(&self, args: &[&str], session: &Session) -> CommandResult {
        let Some(node_id) = args.first() else {
            return CommandResult::Failed("usage: /add <node>".to_string());
        };
        let action = AddNode::new(
            session.graph.clone(),
            session.canvas.clone(),
            node_id.to_string(),
        );
        match session.history.execute(action) {
            Ok(()) => {
                println!("  graph: {}", session.graph.nodes().join(", "));
                CommandResult::Handled
            }
            Err(e) => CommandResult::Failed(e.to_string()),
        }
    }
}

pub struct RemoveCommand;

impl Command for RemoveCommand {
    fn name(&self) -> &str {
        "/remove"
    }

    fn aliases(&self) -> &[&str] {
        &["/rm"]
    }

    fn usage(&self) -> &str {
        "<node>"
    }

    fn description(&self) -> &str {
        "remove a node from the demo graph (undoable)"
    }

    fn execute(&self, args: &[&str], session: &Session) -> CommandResult {
        let Some(node_id) = args.first() else {
            return CommandResult::Failed("usage: /remove <node>".to_string());
        };
        let action = RemoveNode::new(
            session.graph.clone(),
            session.canvas.clone(),
            node_id.to_string(),
        );
        match session.history.execute(action) {
            Ok(()) => {
                println!("  graph: {}", session.graph.nodes().join(", "));
                CommandResult::Handled
            }
            Err(e) => CommandResult::Failed(e.to_string()),
        }
    }
}

pub struct UndoCommand;

impl Command for UndoCommand {
    fn name(&self) -> &str {
        "/undo"
    }

    fn aliases(&self) -> &[&str] {
        &["/u"]
    }

    fn description(&self) -> &str {
        "undo the last action"
    }

    fn execute(&self, _args: &[&str], session: &Session) -> CommandResult {
        match session.history.undo() {
            Ok(true) => {
                println!("  graph: {}", session.graph.nodes().join(", "));
                CommandResult::Handled
            }
            Ok(false) => {
                println!("  nothing to undo");
                CommandResult::Handled
            }
            Err(e) => CommandResult::Failed(e.to_string()),
        }
    }
}

pub struct RedoCommand;

impl Command for RedoCommand {
    fn name(&self) -> &str {
        "/redo"
    }

    fn aliases(&self) -> &[&str] {
        &["/r"]
    }

    fn description(&self) -> &str {
        "redo the last undone action"
    }

    fn execute(&self, _args: &[&str], session: &Session) -> CommandResult {
        match session.history.redo() {
            Ok(true) => {
                println!("  graph: {}", session.graph.nodes().join(", "));
                CommandResult::Handled
            }
            Ok(false) => {
                println!("  nothing to redo");
                CommandResult::Handled
            }
            Err(e) => CommandResult::Failed(e.to_string()),
        }
    }
}

pub struct StackCommand;

impl Command for StackCommand {
    fn name(&self) -> &str {
        "/stack"
    }

    fn description(&self) -> &str {
        "show the undo and redo stacks"
    }

    fn execute(&self, _args: &[&str], session: &Session) -> CommandResult {
        println!("  undo: [{}]", session.history.undo_names().join(", "));
        println!("  redo: [{}]", session.history.redo_names().join(", "));
        CommandResult::Handled
    }
}
