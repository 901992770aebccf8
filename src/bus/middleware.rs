//! Pre-delivery hooks.
//!
//! Middleware runs in registration order before subscribers are resolved.
//! Returning [`Flow::Cancel`] halts the publish: nothing is delivered and
//! nothing is written to history.

use anyhow::Result;
use tracing::debug;

use super::{Event, EventBus};

/// What a middleware wants the bus to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cancel,
}

/// A hook that sees every event before delivery.
pub trait Middleware: Send + Sync {
    fn handle(&self, event: &Event, bus: &EventBus) -> Result<Flow>;
}

impl<F> Middleware for F
where
    F: Fn(&Event, &EventBus) -> Result<Flow> + Send + Sync,
{
    fn handle(&self, event: &Event, bus: &EventBus) -> Result<Flow> {
        self(event, bus)
    }
}

/// Logs every publish at debug level. Never cancels.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, event: &Event, _bus: &EventBus) -> Result<Flow> {
        debug!(
            event = %event.name,
            id = %event.id,
            correlation_id = %event.metadata.correlation_id,
            source = event.metadata.source.as_deref().unwrap_or("-"),
            "publish"
        );
        Ok(Flow::Continue)
    }
}

/// Cancels events whose name is not a dot-segmented identifier
/// (empty segments, whitespace or wildcard characters).
pub struct NameGuard;

impl NameGuard {
    pub fn is_valid(name: &str) -> bool {
        !name.is_empty()
            && name.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            })
    }
}

impl Middleware for NameGuard {
    fn handle(&self, event: &Event, _bus: &EventBus) -> Result<Flow> {
        if Self::is_valid(&event.name) {
            Ok(Flow::Continue)
        } else {
            debug!(event = %event.name, "rejected malformed event name");
            Ok(Flow::Cancel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_guard_accepts_dotted_names() {
        assert!(NameGuard::is_valid("graph.node.selected"));
        assert!(NameGuard::is_valid("dataset.uploaded"));
        assert!(NameGuard::is_valid("ui.side-panel.opened"));
    }

    #[test]
    fn name_guard_rejects_malformed_names() {
        assert!(!NameGuard::is_valid(""));
        assert!(!NameGuard::is_valid("graph..node"));
        assert!(!NameGuard::is_valid("graph.*"));
        assert!(!NameGuard::is_valid("graph node"));
        assert!(!NameGuard::is_valid(".graph"));
    }
}
