//! In-process publish/subscribe hub.
//!
//! Subscribers register against a pattern (exact name or wildcard, see
//! [`Pattern`]) and are called synchronously from [`EventBus::publish`],
//! highest priority first. Middleware can veto a publish before delivery.
//! The last `max_history_size` published events are kept in a ring buffer.
//!
//! Each publish takes a snapshot of the matching subscriptions before any
//! callback runs, so callbacks may subscribe, unsubscribe or publish again
//! without affecting the pass in progress. No lock is held while user code
//! runs.

pub mod event;
pub mod middleware;
pub mod pattern;

pub use event::{Event, EventMetadata, MetadataOverrides};
pub use middleware::{Flow, Middleware, NameGuard, TracingMiddleware};
pub use pattern::{Pattern, Segment};

use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, trace, warn};

use crate::config::BusConfig;
use crate::consts::DEFAULT_BUS_HISTORY_SIZE;

/// Subscriber callback. Errors are collected by the bus, never propagated.
pub type Callback = dyn Fn(&Event, &EventBus) -> Result<()> + Send + Sync;

/// Optional per-subscription predicate. `false` skips delivery.
pub type Filter = dyn Fn(&Event) -> bool + Send + Sync;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-subscription settings. Defaults: priority 0, not once, no filter.
#[derive(Clone, Default)]
pub struct SubscribeOptions {
    /// Higher fires first; ties keep registration order.
    pub priority: i32,
    /// Remove after the first delivery attempt that passes the filter.
    pub once: bool,
    pub filter: Option<Arc<Filter>>,
}

impl SubscribeOptions {
    pub fn priority(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// A subscriber error captured during delivery.
#[derive(Debug)]
pub struct DeliveryError {
    pub subscription_id: SubscriptionId,
    pub error: anyhow::Error,
}

/// Outcome of a single [`EventBus::publish`] call.
#[derive(Debug)]
pub struct PublishReport {
    /// Callbacks that returned `Ok`.
    pub delivered: usize,
    pub errors: Vec<DeliveryError>,
    /// A middleware halted the publish; nothing was delivered or recorded.
    pub cancelled: bool,
    /// Set when the cancellation came from a failing middleware.
    pub middleware_error: Option<anyhow::Error>,
    pub event: Arc<Event>,
}

impl PublishReport {
    fn new(event: Arc<Event>) -> Self {
        Self {
            delivered: 0,
            errors: Vec::new(),
            cancelled: false,
            middleware_error: None,
            event,
        }
    }

    /// Delivered without cancellation or subscriber errors.
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.errors.is_empty()
    }
}

struct Subscription {
    id: SubscriptionId,
    seq: u64,
    priority: i32,
    once: bool,
    filter: Option<Arc<Filter>>,
    callback: Arc<Callback>,
    consumed: AtomicBool,
}

struct PatternEntry {
    pattern: Pattern,
    /// Sorted by descending priority; equal priorities in insertion order.
    subscriptions: Vec<Arc<Subscription>>,
}

#[derive(Default)]
struct Registry {
    patterns: IndexMap<String, PatternEntry>,
    owners: HashMap<SubscriptionId, String>,
}

impl Registry {
    fn insert(&mut self, pattern: &str, sub: Arc<Subscription>) {
        let entry = self
            .patterns
            .entry(pattern.to_string())
            .or_insert_with(|| PatternEntry {
                pattern: Pattern::compile(pattern),
                subscriptions: Vec::new(),
            });
        let at = entry
            .subscriptions
            .iter()
            .position(|s| s.priority < sub.priority)
            .unwrap_or(entry.subscriptions.len());
        self.owners.insert(sub.id.clone(), pattern.to_string());
        entry.subscriptions.insert(at, sub);
    }

    fn remove_id(&mut self, id: &SubscriptionId) -> bool {
        let Some(pattern) = self.owners.remove(id) else {
            return false;
        };
        if let Some(entry) = self.patterns.get_mut(&pattern) {
            entry.subscriptions.retain(|s| s.id != *id);
            if entry.subscriptions.is_empty() {
                self.patterns.shift_remove(&pattern);
            }
        }
        true
    }

    fn remove_pattern(&mut self, pattern: &str) -> bool {
        match self.patterns.shift_remove(pattern) {
            Some(entry) => {
                for sub in entry.subscriptions {
                    self.owners.remove(&sub.id);
                }
                true
            }
            None => false,
        }
    }

    /// Exact subscriptions for `name` unioned with every matching wildcard
    /// pattern, in delivery order.
    fn resolve(&self, name: &str) -> Vec<Arc<Subscription>> {
        let mut matched = Vec::new();
        if let Some(entry) = self.patterns.get(name) {
            if !entry.pattern.is_wildcard() {
                matched.extend(entry.subscriptions.iter().cloned());
            }
        }
        for entry in self.patterns.values() {
            if entry.pattern.is_wildcard() && entry.pattern.matches(name) {
                matched.extend(entry.subscriptions.iter().cloned());
            }
        }
        matched.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        matched
    }

    fn len(&self) -> usize {
        self.owners.len()
    }
}

/// The central hub. Share it behind an `Arc`.
pub struct EventBus {
    registry: Mutex<Registry>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    history: Mutex<VecDeque<Arc<Event>>>,
    max_history_size: usize,
    next_seq: AtomicU64,
}

impl EventBus {
    /// Create a bus that keeps at most `max_history_size` past events.
    pub fn new(max_history_size: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            middleware: RwLock::new(Vec::new()),
            history: Mutex::new(VecDeque::with_capacity(max_history_size)),
            max_history_size,
            next_seq: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.max_history_size)
    }

    /// Register `callback` for every event whose name matches `pattern`.
    pub fn subscribe<F>(&self, pattern: &str, callback: F, options: SubscribeOptions) -> SubscriptionId
    where
        F: Fn(&Event, &EventBus) -> Result<()> + Send + Sync + 'static,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let id = SubscriptionId(format!("sub_{seq}"));
        let sub = Arc::new(Subscription {
            id: id.clone(),
            seq,
            priority: options.priority,
            once: options.once,
            filter: options.filter,
            callback: Arc::new(callback),
            consumed: AtomicBool::new(false),
        });
        lock(&self.registry).insert(pattern, sub);
        trace!(%id, pattern, priority = options.priority, once = options.once, "subscribed");
        id
    }

    /// [`subscribe`](Self::subscribe) with `once` forced on.
    pub fn subscribe_once<F>(
        &self,
        pattern: &str,
        callback: F,
        options: SubscribeOptions,
    ) -> SubscriptionId
    where
        F: Fn(&Event, &EventBus) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(pattern, callback, options.once())
    }

    /// Publish with bus-generated metadata.
    pub fn publish(&self, name: &str, payload: Value) -> PublishReport {
        self.publish_with(name, payload, MetadataOverrides::default())
    }

    /// Build the event, run middleware, deliver to a snapshot of matching
    /// subscribers and record the event in history.
    pub fn publish_with(
        &self,
        name: &str,
        payload: Value,
        overrides: MetadataOverrides,
    ) -> PublishReport {
        let event = Arc::new(Event::new(name, payload, overrides));
        let mut report = PublishReport::new(Arc::clone(&event));

        let chain: Vec<Arc<dyn Middleware>> = read(&self.middleware).clone();
        for middleware in &chain {
            match middleware.handle(&event, self) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Cancel) => {
                    debug!(event = %event.name, "publish cancelled by middleware");
                    report.cancelled = true;
                    return report;
                }
                Err(error) => {
                    warn!(event = %event.name, error = %error, "middleware failed, cancelling publish");
                    report.cancelled = true;
                    report.middleware_error = Some(error);
                    return report;
                }
            }
        }

        let snapshot = lock(&self.registry).resolve(&event.name);
        for sub in &snapshot {
            if let Some(filter) = &sub.filter {
                if !filter(&event) {
                    continue;
                }
            }
            if sub.once && sub.consumed.swap(true, Ordering::SeqCst) {
                continue;
            }

            let outcome = (sub.callback)(&event, self);
            if sub.once {
                lock(&self.registry).remove_id(&sub.id);
            }
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(event = %event.name, subscription = %sub.id, error = %error, "subscriber failed");
                    report.errors.push(DeliveryError {
                        subscription_id: sub.id.clone(),
                        error,
                    });
                }
            }
        }

        self.record(Arc::clone(&event));
        debug!(
            event = %event.name,
            matched = snapshot.len(),
            delivered = report.delivered,
            errors = report.errors.len(),
            "dispatched"
        );
        report
    }

    fn record(&self, event: Arc<Event>) {
        if self.max_history_size == 0 {
            return;
        }
        let mut history = lock(&self.history);
        while history.len() >= self.max_history_size {
            history.pop_front();
        }
        history.push_back(event);
    }

    /// Remove by subscription id; failing that, by exact pattern; failing
    /// that, remove every registered pattern that `key` matches as a
    /// wildcard. Returns whether anything was removed.
    pub fn unsubscribe(&self, key: &str) -> bool {
        let mut registry = lock(&self.registry);
        let id = SubscriptionId(key.to_string());
        if registry.owners.contains_key(&id) {
            return registry.remove_id(&id);
        }
        if registry.remove_pattern(key) {
            trace!(pattern = key, "unsubscribed pattern");
            return true;
        }
        let sweep = Pattern::compile(key);
        let doomed: Vec<String> = registry
            .patterns
            .keys()
            .filter(|registered| sweep.matches(registered))
            .cloned()
            .collect();
        for pattern in &doomed {
            registry.remove_pattern(pattern);
        }
        if !doomed.is_empty() {
            trace!(sweep = key, removed = doomed.len(), "unsubscribed by wildcard");
        }
        !doomed.is_empty()
    }

    /// Remove exactly one subscription.
    pub fn unsubscribe_id(&self, id: &SubscriptionId) -> bool {
        let removed = lock(&self.registry).remove_id(id);
        if removed {
            trace!(%id, "unsubscribed");
        }
        removed
    }

    /// Remove every subscription registered under exactly `pattern`.
    pub fn unsubscribe_pattern(&self, pattern: &str) -> bool {
        lock(&self.registry).remove_pattern(pattern)
    }

    /// Append a middleware. There is no removal.
    pub fn use_middleware<M: Middleware + 'static>(&self, middleware: M) {
        write(&self.middleware).push(Arc::new(middleware));
    }

    /// Closure form of [`use_middleware`](Self::use_middleware).
    pub fn use_middleware_fn<F>(&self, middleware: F)
    where
        F: Fn(&Event, &EventBus) -> Result<Flow> + Send + Sync + 'static,
    {
        self.use_middleware(middleware);
    }

    /// Recorded events, oldest first, optionally restricted to an exact
    /// name and to the most recent `limit` matches.
    pub fn history(&self, name: Option<&str>, limit: Option<usize>) -> Vec<Arc<Event>> {
        let history = lock(&self.history);
        let matching: Vec<Arc<Event>> = history
            .iter()
            .filter(|e| name.is_none_or(|n| e.name == n))
            .cloned()
            .collect();
        match limit {
            Some(limit) if limit < matching.len() => matching[matching.len() - limit..].to_vec(),
            _ => matching,
        }
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }

    pub fn history_capacity(&self) -> usize {
        self.max_history_size
    }

    /// Number of live subscriptions across all patterns.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Registered patterns in first-registration order.
    pub fn patterns(&self) -> Vec<String> {
        lock(&self.registry).patterns.keys().cloned().collect()
    }

    /// Whether publishing `name` right now would reach anyone.
    pub fn has_subscribers(&self, name: &str) -> bool {
        !lock(&self.registry).resolve(name).is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_HISTORY_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriber_count())
            .field("middleware", &read(&self.middleware).len())
            .field("history", &lock(&self.history).len())
            .field("max_history_size", &self.max_history_size)
            .finish()
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rw: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}
