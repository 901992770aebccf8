//! Adapters for view code that should not hold the managers directly.
//!
//! A view mounts a [`Binding`] when it appears and drops (or unmounts) it
//! when it goes away; the subscription lives exactly as long as the
//! binding. The signal helpers turn bus traffic into [`Observable`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::bus::{
    Event, EventBus, MetadataOverrides, PublishReport, SubscribeOptions, SubscriptionId,
};
use crate::events::{self, RedoChanged, SelectionChanged, UndoChanged, to_payload};
use crate::observable::Observable;

/// A subscription tied to the lifetime of a view.
pub struct Binding {
    bus: Arc<EventBus>,
    id: Option<SubscriptionId>,
}

impl Binding {
    /// Subscribe now; unsubscribe on [`unmount`](Self::unmount) or drop.
    pub fn mount<F>(
        bus: &Arc<EventBus>,
        pattern: &str,
        callback: F,
        options: SubscribeOptions,
    ) -> Self
    where
        F: Fn(&Event, &EventBus) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = bus.subscribe(pattern, callback, options);
        Self {
            bus: Arc::clone(bus),
            id: Some(id),
        }
    }

    pub fn id(&self) -> Option<&SubscriptionId> {
        self.id.as_ref()
    }

    /// Returns whether the subscription was still registered.
    pub fn unmount(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        match self.id.take() {
            Some(id) => self.bus.unsubscribe_id(&id),
            None => false,
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.release();
    }
}

/// Publishes with a fixed `source` in the metadata.
#[derive(Clone)]
pub struct Emitter {
    bus: Arc<EventBus>,
    source: String,
}

impl Emitter {
    pub fn new(bus: &Arc<EventBus>, source: impl Into<String>) -> Self {
        Self {
            bus: Arc::clone(bus),
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn emit(&self, name: &str, payload: Value) -> PublishReport {
        self.bus
            .publish_with(name, payload, MetadataOverrides::source(self.source.clone()))
    }

    pub fn emit_payload<T: Serialize>(&self, name: &str, payload: &T) -> PublishReport {
        self.emit(name, to_payload(payload))
    }

    /// Publish as part of an existing correlation chain.
    pub fn emit_correlated(
        &self,
        name: &str,
        payload: Value,
        correlation_id: &str,
    ) -> PublishReport {
        self.bus.publish_with(
            name,
            payload,
            MetadataOverrides::source(self.source.clone()).with_correlation_id(correlation_id),
        )
    }
}

/// The most recent event matching `pattern`.
pub fn latest_event(bus: &Arc<EventBus>, pattern: &str) -> (Observable<Option<Arc<Event>>>, Binding) {
    let signal = Observable::new(None);
    let sink = signal.clone();
    let binding = Binding::mount(
        bus,
        pattern,
        move |event, _| {
            sink.set(Some(Arc::new(event.clone())));
            Ok(())
        },
        SubscribeOptions::default(),
    );
    (signal, binding)
}

/// Selected node ids, kept current from `selection.changed`.
pub fn selection_signal(bus: &Arc<EventBus>, initial: Vec<String>) -> (Observable<Vec<String>>, Binding) {
    let signal = Observable::new(initial);
    let sink = signal.clone();
    let binding = Binding::mount(
        bus,
        events::SELECTION_CHANGED,
        move |event, _| {
            let changed: SelectionChanged = serde_json::from_value(event.payload.clone())?;
            sink.set(changed.selected_ids);
            Ok(())
        },
        SubscribeOptions::default(),
    );
    (signal, binding)
}

/// Undo/redo availability as a view sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatus {
    pub undo_size: usize,
    pub redo_size: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Undo/redo availability, kept current from the `history.*.changed` pair.
pub fn history_signal(bus: &Arc<EventBus>) -> (Observable<HistoryStatus>, Vec<Binding>) {
    let signal = Observable::new(HistoryStatus::default());

    let sink = signal.clone();
    let undo = Binding::mount(
        bus,
        events::HISTORY_UNDO_CHANGED,
        move |event, _| {
            let changed: UndoChanged = serde_json::from_value(event.payload.clone())?;
            sink.update(|status| HistoryStatus {
                undo_size: changed.size,
                can_undo: changed.can_undo,
                ..*status
            });
            Ok(())
        },
        SubscribeOptions::default(),
    );

    let sink = signal.clone();
    let redo = Binding::mount(
        bus,
        events::HISTORY_REDO_CHANGED,
        move |event, _| {
            let changed: RedoChanged = serde_json::from_value(event.payload.clone())?;
            sink.update(|status| HistoryStatus {
                redo_size: changed.size,
                can_redo: changed.can_redo,
                ..*status
            });
            Ok(())
        },
        SubscribeOptions::default(),
    );

    (signal, vec![undo, redo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binding_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::default());
        {
            let _binding = Binding::mount(&bus, "a.b", |_, _| Ok(()), SubscribeOptions::default());
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn unmount_reports_whether_still_registered() {
        let bus = Arc::new(EventBus::default());
        let binding = Binding::mount(&bus, "a.b", |_, _| Ok(()), SubscribeOptions::default());
        assert!(binding.unmount());

        let binding = Binding::mount(&bus, "a.b", |_, _| Ok(()), SubscribeOptions::default());
        bus.unsubscribe("a.b");
        assert!(!binding.unmount());
    }

    #[test]
    fn emitter_stamps_source() {
        let bus = Arc::new(EventBus::default());
        let emitter = Emitter::new(&bus, "upload-form");
        let report = emitter.emit(events::DATASET_UPLOADED, json!({"datasetId": "d1"}));
        assert_eq!(report.event.metadata.source.as_deref(), Some("upload-form"));

        let report = emitter.emit_correlated("dataset.deleted", json!({}), "corr-9");
        assert_eq!(report.event.metadata.correlation_id, "corr-9");
    }

    #[test]
    fn latest_event_tracks_matches_only() {
        let bus = Arc::new(EventBus::default());
        let (latest, _binding) = latest_event(&bus, "graph.*");
        assert!(latest.get().is_none());

        bus.publish("graph.created", json!({"graphId": "g1"}));
        bus.publish("dataset.uploaded", json!({}));
        let event = latest.get().unwrap();
        assert_eq!(event.name, "graph.created");
    }
}
