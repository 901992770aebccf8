//! Built-in shell commands prefixed with `/`.
//!
//! Commands implement the [`Command`] trait and are registered in a
//! [`CommandRegistry`]. The registry handles dispatch, alias resolution,
//! and dynamic help generation. Extra commands can be registered at
//! runtime via `registry.register(Arc::new(MyCommand))`.

mod bus;
mod graph;
mod help;
mod history;
mod quit;
mod selection;

pub use graph::{AddNode, DemoGraph, RemoveNode};

use std::sync::Arc;

use crate::bindings::Emitter;
use crate::bus::EventBus;
use crate::history::HistoryManager;
use crate::selection::SelectionManager;

/// Metadata `source` used for everything the shell publishes.
pub const SHELL_SOURCE: &str = "shell";

/// The composed core the commands operate on.
pub struct Session {
    pub bus: Arc<EventBus>,
    pub selection: Arc<SelectionManager>,
    pub history: Arc<HistoryManager>,
    pub graph: Arc<DemoGraph>,
    /// Publishes as the canvas would, with `source = "shell"`.
    pub canvas: Emitter,
}

impl Session {
    pub fn new(
        bus: Arc<EventBus>,
        selection: Arc<SelectionManager>,
        history: Arc<HistoryManager>,
    ) -> Self {
        let canvas = Emitter::new(&bus, SHELL_SOURCE);
        Self {
            bus,
            selection,
            history,
            graph: Arc::new(DemoGraph::new("shell")),
            canvas,
        }
    }
}

/// What the shell should do after a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Not a command.
    NotACommand,
    /// Command handled, continue the loop.
    Handled,
    /// Command was understood but could not run (bad arguments, failed action).
    Failed(String),
    /// Exit the shell.
    Quit,
}

/// A shell command. Implement this trait to add new commands.
pub trait Command: Send + Sync {
    /// Primary name, e.g. `"/select"`.
    fn name(&self) -> &str;

    /// Alternative names, e.g. `&["/h", "/?"]`.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Argument synopsis shown in help, e.g. `"<node> [--multi]"`.
    fn usage(&self) -> &str {
        ""
    }

    /// One-line description for `/help`.
    fn description(&self) -> &str;

    /// Run the command with the whitespace-split arguments.
    fn execute(&self, args: &[&str], session: &Session) -> CommandResult;
}

/// Holds registered commands.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with all built-in commands.
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(help::HelpCommand),
            Arc::new(bus::PublishCommand),
            Arc::new(bus::EventsCommand),
            Arc::new(selection::SelectCommand),
            Arc::new(selection::DeselectCommand),
            Arc::new(selection::ClearCommand),
            Arc::new(selection::SelectionCommand),
            Arc::new(history::AddCommand),
            Arc::new(history::RemoveCommand),
            Arc::new(history::UndoCommand),
            Arc::new(history::RedoCommand),
            Arc::new(history::StackCommand),
            Arc::new(quit::QuitCommand),
        ];
        Self { commands }
    }

    /// Register an additional command.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.push(command);
    }

    /// Dispatch input to a matching command, or return `NotACommand`.
    pub fn dispatch(&self, input: &str, session: &Session) -> CommandResult {
        let mut words = input.split_whitespace();
        let Some(cmd) = words.next() else {
            return CommandResult::NotACommand;
        };
        let args: Vec<&str> = words.collect();

        for command in &self.commands {
            if cmd == command.name() || command.aliases().contains(&cmd) {
                // /help needs the registry to list all commands
                if command.name() == "/help" {
                    print!("{}", self.help_text());
                    return CommandResult::Handled;
                }
                let result = command.execute(&args, session);
                if let CommandResult::Failed(reason) = &result {
                    println!("  error: {reason}");
                }
                return result;
            }
        }

        if cmd.starts_with('/') {
            println!("unknown command: {cmd}");
            println!("type /help for available commands");
            return CommandResult::Handled;
        }

        CommandResult::NotACommand
    }

    /// Generate help text from all registered commands.
    pub fn help_text(&self) -> String {
        let entries: Vec<(String, &str)> = self
            .commands
            .iter()
            .map(|c| (format_label(c.name(), c.aliases(), c.usage()), c.description()))
            .collect();

        let max_width = entries
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(10);

        let mut out = String::new();
        for (label, desc) in &entries {
            out.push_str(&format!("  {label:<max_width$}  {desc}\n"));
        }
        out
    }

    /// All registered command names (for testing).
    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    /// All registered names and aliases (for duplicate detection).
    pub fn all_triggers(&self) -> Vec<&str> {
        let mut triggers = Vec::new();
        for cmd in &self.commands {
            triggers.push(cmd.name());
            triggers.extend_from_slice(cmd.aliases());
        }
        triggers
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn format_label(name: &str, aliases: &[&str], usage: &str) -> String {
    let mut label = name.to_string();
    if !usage.is_empty() {
        label.push(' ');
        label.push_str(usage);
    }
    if !aliases.is_empty() {
        label.push_str(&format!(" ({})", aliases.join(", ")));
    }
    label
}
