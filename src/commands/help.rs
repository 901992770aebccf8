use super::{Command, CommandResult, Session};

/// Listed like any other command; the registry renders the text itself.
pub struct HelpCommand;

impl Command for HelpCommand {
    fn name(&self) -> &str {
        "/help"
    }

    fn aliases(&self) -> &[&str] {
        &["/h", "/?"]
    }

    fn description(&self) -> &str {
        "list available commands"
    }

    fn execute(&self, _args: &[&str], _session: &Session) -> CommandResult {
        CommandResult::Handled
    }
}
