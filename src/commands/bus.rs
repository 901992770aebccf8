use serde_json::Value;

use super::{Command, CommandResult, Session};
use crate::bus::PublishReport;

pub struct PublishCommand;

impl Command for PublishCommand {
    fn name(&self) -> &str {
        "/publish"
    }

    fn aliases(&self) -> &[&str] {
        &["/pub"]
    }

    fn usage(&self) -> &str {
        "<event> [json]"
    }

    fn description(&self) -> &str {
        "publish an event with an optional JSON payload"
    }

    fn execute(&self, args: &[&str], session: &Session) -> CommandResult {
        let Some((name, rest)) = args.split_first() else {
            return CommandResult::Failed("usage: /publish <event> [json]".to_string());
        };
        let payload = if rest.is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&rest.join(" ")) {
                Ok(value) => value,
                Err(e) => return CommandResult::Failed(format!("invalid JSON payload: {e}")),
            }
        };

        let report = session.canvas.emit(name, payload);
        print_report(&report);
        CommandResult::Handled
    }
}

fn print_report(report: &PublishReport) {
    if report.cancelled {
        match &report.middleware_error {
            Some(e) => println!("  cancelled: {e}"),
            None => println!("  cancelled by middleware"),
        }
        return;
    }
    println!(
        "  {} delivered to {} subscriber(s)",
        report.event.name, report.delivered
    );
    for failure in &report.errors {
        println!("  ✗ {}: {:#}", failure.subscription_id, failure.error);
    }
}

pub struct EventsCommand;

impl Command for EventsCommand {
    fn name(&self) -> &str {
        "/events"
    }

    fn usage(&self) -> &str {
        "[event] [limit]"
    }

    fn description(&self) -> &str {
        "show recent bus history"
    }

    fn execute(&self, args: &[&str], session: &Session) -> CommandResult {
        let mut name = None;
        let mut limit = None;
        for arg in args {
            match arg.parse::<usize>() {
                Ok(n) => limit = Some(n),
                Err(_) => name = Some(*arg),
            }
        }

        let events = session.bus.history(name, limit);
        if events.is_empty() {
            println!("  no events recorded");
        }
        for event in events {
            println!(
                "  {:>13}  {:<28} {}",
                event.metadata.timestamp, event.name, event.payload
            );
        }
        CommandResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::test_session;

    #[test]
    fn publish_records_event_with_payload() {
        let session = test_session();
        let result = PublishCommand.execute(&["dataset.uploaded", "{\"rowCount\":", "3}"], &session);
        assert_eq!(result, CommandResult::Handled);

        let events = session.bus.history(Some("dataset.uploaded"), None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["rowCount"], 3);
        assert_eq!(events[0].metadata.source.as_deref(), Some("shell"));
    }

    #[test]
    fn publish_rejects_bad_json() {
        let session = test_session();
        assert!(matches!(
            PublishCommand.execute(&["a.b", "{oops"], &session),
            CommandResult::Failed(_)
        ));
        assert!(session.bus.history(None, None).is_empty());
    }

    #[test]
    fn publish_requires_a_name() {
        assert!(matches!(
            PublishCommand.execute(&[], &test_session()),
            CommandResult::Failed(_)
        ));
    }

    #[test]
    fn events_accepts_name_and_limit_in_any_order() {
        let session = test_session();
        assert_eq!(
            EventsCommand.execute(&["5", "graph.created"], &session),
            CommandResult::Handled
        );
        assert_eq!(EventsCommand.execute(&[], &session), CommandResult::Handled);
    }
}
