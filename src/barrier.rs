//! # Join Barrier
//!
//! Waits for a fixed set of independently completing one-shot signals and
//! invokes a single listener exactly once when the last of them arrives.
//!
//! ## State machine
//!
//! Two states, `Pending` and `Fired`. Only the arrival that marks the last
//! outstanding slot moves `Pending -> Fired`; `Fired` is absorbing. Arrivals
//! may come in any order and from any thread, all bookkeeping happens under
//! one mutex, and the listener runs after that mutex is released.
//!
//! Dropping the barrier while it is pending discards the listener without
//! calling it. Sources connected through [`crate::source::connect`] only hold
//! weak references, so their late deliveries go nowhere.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{BarrierConfig, EmptyPayloadPolicy};
use crate::error::{BarrierError, Result};
use crate::listener::{Completion, CompletionListener};
use crate::signal::{SignalId, SignalOutcome, SignalSet, MAX_SIGNALS};

const DEFAULT_LABEL: &str = "barrier";

/// Lifecycle state of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum BarrierState {
    Pending,
    Fired,
}

/// Point-in-time snapshot of a barrier, for logs and FFI callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierStatus {
    pub label: String,
    pub state: BarrierState,
    pub arity: usize,
    pub received: usize,
    /// Names of slots that have not arrived yet, in declaration order
    pub pending: Vec<String>,
}

impl BarrierStatus {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Declares the slots of a barrier before it starts receiving signals.
///
/// # Example
/// ```
/// use join_barrier::{Completion, JoinBarrierBuilder};
///
/// let barrier = JoinBarrierBuilder::new()
///     .signal("view-ready")
///     .primary("map-ready")
///     .build(|completion: Completion<&'static str>| {
///         assert_eq!(completion.into_primary(), Some("map handle"));
///     })
///     .unwrap();
///
/// let view = barrier.signal_id("view-ready").unwrap();
/// let map = barrier.signal_id("map-ready").unwrap();
/// barrier.on_signal(view, None);
/// assert!(barrier.on_signal(map, Some("map handle")).completed());
/// ```
#[derive(Debug, Clone, Default)]
pub struct JoinBarrierBuilder {
    signals: Vec<(String, bool)>,
    config: BarrierConfig,
}

impl JoinBarrierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Await a completion-only signal.
    pub fn signal(mut self, name: impl Into<String>) -> Self {
        self.signals.push((name.into(), false));
        self
    }

    /// Await the signal whose payload is handed to the listener.
    pub fn primary(mut self, name: impl Into<String>) -> Self {
        self.signals.push((name.into(), true));
        self
    }

    pub fn config(mut self, config: BarrierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    pub fn empty_payload(mut self, policy: EmptyPayloadPolicy) -> Self {
        self.config.empty_payload = policy;
        self
    }

    /// Build the barrier with a closure listener.
    pub fn build<P, F>(self, on_ready: F) -> Result<Arc<JoinBarrier<P>>>
    where
        P: Send + 'static,
        F: FnOnce(Completion<P>) + Send + 'static,
    {
        self.build_with_listener(Box::new(on_ready))
    }

    pub fn build_with_listener<P>(
        self,
        listener: Box<dyn CompletionListener<P>>,
    ) -> Result<Arc<JoinBarrier<P>>>
    where
        P: Send + 'static,
    {
        self.validate()?;

        let primary = self
            .signals
            .iter()
            .position(|(_, is_primary)| *is_primary)
            .map(|i| SignalId(i as u8));
        let names: Vec<String> = self.signals.into_iter().map(|(name, _)| name).collect();
        let label = self
            .config
            .label
            .clone()
            .unwrap_or_else(|| DEFAULT_LABEL.to_string());

        debug!(
            "[JoinBarrier:{}] Registered {} signals: {:?}",
            label,
            names.len(),
            names
        );

        let payloads = names.iter().map(|_| None).collect();
        Ok(Arc::new(JoinBarrier {
            label,
            primary,
            config: self.config,
            names,
            inner: Mutex::new(Inner {
                state: BarrierState::Pending,
                received: SignalSet::default(),
                payloads,
                listener: Some(listener),
                cancelled: false,
            }),
        }))
    }

    fn validate(&self) -> Result<()> {
        if self.signals.is_empty() {
            return Err(BarrierError::NoSignals);
        }
        if self.signals.len() > MAX_SIGNALS {
            return Err(BarrierError::TooManySignals {
                count: self.signals.len(),
                max: MAX_SIGNALS,
            });
        }

        let mut seen = HashSet::new();
        let mut primary: Option<&str> = None;
        for (name, is_primary) in &self.signals {
            if !seen.insert(name.as_str()) {
                return Err(BarrierError::DuplicateSignal { name: name.clone() });
            }
            if *is_primary {
                if let Some(first) = primary {
                    return Err(BarrierError::MultiplePrimary {
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
                primary = Some(name);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Barrier
// ============================================================================

struct Inner<P> {
    state: BarrierState,
    received: SignalSet,
    payloads: Vec<Option<P>>,
    listener: Option<Box<dyn CompletionListener<P>>>,
    /// Torn down by its owner before firing
    cancelled: bool,
}

/// Fires a listener exactly once after every declared signal has arrived.
pub struct JoinBarrier<P> {
    label: String,
    primary: Option<SignalId>,
    config: BarrierConfig,
    names: Vec<String>,
    inner: Mutex<Inner<P>>,
}

impl<P> JoinBarrier<P> {
    /// Deliver a signal.
    ///
    /// Never fails. The returned outcome says what the arrival did; callers
    /// are free to ignore it.
    pub fn on_signal(&self, id: SignalId, payload: Option<P>) -> SignalOutcome {
        let (listener, completion) = {
            let mut inner = self.lock();

            if inner.state == BarrierState::Fired {
                debug!(
                    "[JoinBarrier:{}] Ignoring late signal {:?}, already fired",
                    self.label,
                    self.names.get(id.index())
                );
                return SignalOutcome::AlreadyFired;
            }

            if inner.cancelled {
                debug!(
                    "[JoinBarrier:{}] Ignoring signal {:?}, barrier was cancelled",
                    self.label,
                    self.names.get(id.index())
                );
                return SignalOutcome::Cancelled;
            }

            let Some(name) = self.names.get(id.index()) else {
                warn!(
                    "[JoinBarrier:{}] Signal index {} out of range ({} signals)",
                    self.label,
                    id.index(),
                    self.names.len()
                );
                return SignalOutcome::Unknown;
            };

            if inner.received.contains(id) {
                warn!(
                    "[JoinBarrier:{}] Duplicate delivery of '{}'",
                    self.label, name
                );
                if payload.is_some() {
                    inner.payloads[id.index()] = payload;
                }
                return SignalOutcome::Duplicate;
            }

            if payload.is_none()
                && Some(id) == self.primary
                && self.config.empty_payload == EmptyPayloadPolicy::Withhold
            {
                debug!(
                    "[JoinBarrier:{}] Primary '{}' arrived empty, still pending",
                    self.label, name
                );
                return SignalOutcome::Withheld;
            }

            inner.received.insert(id);
            inner.payloads[id.index()] = payload;

            if !inner.received.is_full(self.names.len()) {
                debug!(
                    "[JoinBarrier:{}] '{}' arrived ({}/{})",
                    self.label,
                    name,
                    inner.received.len(),
                    self.names.len()
                );
                return SignalOutcome::Recorded;
            }

            inner.state = BarrierState::Fired;
            let completion = self.take_completion(&mut inner);
            (inner.listener.take(), completion)
        };

        info!(
            "[JoinBarrier:{}] All {} signals arrived, firing",
            self.label,
            self.names.len()
        );
        if let Some(listener) = listener {
            listener.on_ready(completion);
        }
        SignalOutcome::Completed
    }

    /// Discard the listener of a pending barrier so no later arrival can run
    /// it. Returns `false` if the barrier already fired or was cancelled.
    pub(crate) fn cancel(&self) -> bool {
        let listener = {
            let mut inner = self.lock();
            if inner.state == BarrierState::Fired || inner.cancelled {
                return false;
            }
            inner.cancelled = true;
            inner.listener.take()
        };
        debug!(
            "[JoinBarrier:{}] Cancelled with {}/{} signals",
            self.label,
            self.received(),
            self.names.len()
        );
        // Dropped outside the lock; the listener may own other barriers.
        drop(listener);
        true
    }

    /// Deliver a signal by name.
    pub fn on_named_signal(&self, name: &str, payload: Option<P>) -> Result<SignalOutcome> {
        let id = self
            .signal_id(name)
            .ok_or_else(|| BarrierError::UnknownSignal {
                barrier: self.label.clone(),
                name: name.to_string(),
            })?;
        Ok(self.on_signal(id, payload))
    }

    /// Look up the id of a declared signal.
    pub fn signal_id(&self, name: &str) -> Option<SignalId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| SignalId(i as u8))
    }

    pub fn signal_name(&self, id: SignalId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    pub fn primary(&self) -> Option<SignalId> {
        self.primary
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &BarrierConfig {
        &self.config
    }

    /// Number of signals awaited.
    pub fn arity(&self) -> usize {
        self.names.len()
    }

    pub fn state(&self) -> BarrierState {
        self.lock().state
    }

    pub fn is_fired(&self) -> bool {
        self.state() == BarrierState::Fired
    }

    /// Number of distinct signals marked so far.
    pub fn received(&self) -> usize {
        self.lock().received.len()
    }

    /// Names of signals still outstanding.
    pub fn pending(&self) -> Vec<String> {
        let inner = self.lock();
        self.pending_names(&inner)
    }

    pub fn status(&self) -> BarrierStatus {
        let inner = self.lock();
        BarrierStatus {
            label: self.label.clone(),
            state: inner.state,
            arity: self.names.len(),
            received: inner.received.len(),
            pending: self.pending_names(&inner),
        }
    }

    fn pending_names(&self, inner: &Inner<P>) -> Vec<String> {
        self.names
            .iter()
            .enumerate()
            .filter(|(i, _)| !inner.received.contains(SignalId(*i as u8)))
            .map(|(_, name)| name.clone())
            .collect()
    }

    fn take_completion(&self, inner: &mut Inner<P>) -> Completion<P> {
        let mut primary = None;
        let mut payloads = Vec::with_capacity(self.names.len());
        for (i, payload) in inner.payloads.iter_mut().enumerate() {
            if Some(SignalId(i as u8)) == self.primary {
                primary = payload.take();
            } else {
                payloads.push((self.names[i].clone(), payload.take()));
            }
        }
        let primary_name = self.primary.map(|id| self.names[id.index()].clone());
        Completion::new(primary_name, primary, payloads)
    }

    // Bookkeeping stays consistent even if a holder panicked, so poisoning
    // is not an error here.
    fn lock(&self) -> MutexGuard<'_, Inner<P>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Drop for JoinBarrier<P> {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if inner.state == BarrierState::Pending && !inner.cancelled {
            debug!(
                "[JoinBarrier:{}] Dropped with {}/{} signals, listener discarded",
                self.label,
                inner.received.len(),
                self.names.len()
            );
        }
    }
}

impl<P> std::fmt::Debug for JoinBarrier<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("JoinBarrier")
            .field("label", &self.label)
            .field("signals", &self.names)
            .field("state", &inner.state)
            .field("received", &inner.received.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn map_and_view() -> (Arc<JoinBarrier<&'static str>>, mpsc::Receiver<Option<&'static str>>) {
        let (tx, rx) = mpsc::channel();
        let barrier = JoinBarrierBuilder::new()
            .label("map-screen")
            .signal("view")
            .primary("map")
            .build(move |completion: Completion<&'static str>| {
                tx.send(completion.into_primary()).ok();
            })
            .unwrap();
        (barrier, rx)
    }

    #[test]
    fn test_view_then_map() {
        let (barrier, rx) = map_and_view();
        let view = barrier.signal_id("view").unwrap();
        let map = barrier.signal_id("map").unwrap();

        assert_eq!(barrier.on_signal(view, None), SignalOutcome::Recorded);
        assert!(rx.try_recv().is_err());
        assert_eq!(barrier.on_signal(map, Some("handleX")), SignalOutcome::Completed);

        assert_eq!(rx.try_recv().unwrap(), Some("handleX"));
        assert!(rx.try_recv().is_err());
        assert!(barrier.is_fired());
    }

    #[test]
    fn test_map_then_view() {
        let (barrier, rx) = map_and_view();
        let view = barrier.signal_id("view").unwrap();
        let map = barrier.signal_id("map").unwrap();

        assert_eq!(barrier.on_signal(map, Some("handleX")), SignalOutcome::Recorded);
        assert_eq!(barrier.on_signal(view, None), SignalOutcome::Completed);

        assert_eq!(rx.try_recv().unwrap(), Some("handleX"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_duplicate_view_fires_once() {
        let (barrier, rx) = map_and_view();
        let view = barrier.signal_id("view").unwrap();
        let map = barrier.signal_id("map").unwrap();

        barrier.on_signal(view, None);
        assert_eq!(barrier.on_signal(view, None), SignalOutcome::Duplicate);
        barrier.on_signal(map, Some("handleX"));

        assert_eq!(rx.try_recv().unwrap(), Some("handleX"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_signals_after_fire_are_noops() {
        let (barrier, rx) = map_and_view();
        let view = barrier.signal_id("view").unwrap();
        let map = barrier.signal_id("map").unwrap();

        barrier.on_signal(view, None);
        barrier.on_signal(map, Some("first"));
        assert_eq!(barrier.on_signal(map, Some("second")), SignalOutcome::AlreadyFired);
        assert_eq!(barrier.on_signal(view, None), SignalOutcome::AlreadyFired);

        assert_eq!(rx.try_recv().unwrap(), Some("first"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_one_of_two_never_fires() {
        let (barrier, rx) = map_and_view();
        let view = barrier.signal_id("view").unwrap();

        barrier.on_signal(view, None);
        assert_eq!(barrier.state(), BarrierState::Pending);
        assert_eq!(barrier.pending(), vec!["map".to_string()]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_empty_primary_is_withheld() {
        let (barrier, rx) = map_and_view();
        let view = barrier.signal_id("view").unwrap();
        let map = barrier.signal_id("map").unwrap();

        barrier.on_signal(view, None);
        assert_eq!(barrier.on_signal(map, None), SignalOutcome::Withheld);
        assert!(!barrier.is_fired());
        assert_eq!(barrier.on_signal(map, Some("late")), SignalOutcome::Completed);
        assert_eq!(rx.try_recv().unwrap(), Some("late"));
    }

    #[test]
    fn test_empty_primary_arrives_when_configured() {
        let (tx, rx) = mpsc::channel();
        let barrier = JoinBarrierBuilder::new()
            .signal("view")
            .primary("map")
            .empty_payload(EmptyPayloadPolicy::Arrive)
            .build(move |completion: Completion<u32>| {
                tx.send(completion.into_primary()).ok();
            })
            .unwrap();

        barrier.on_named_signal("view", None).unwrap();
        assert_eq!(
            barrier.on_named_signal("map", None).unwrap(),
            SignalOutcome::Completed
        );
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[test]
    fn test_duplicate_refreshes_payload() {
        let (tx, rx) = mpsc::channel();
        let barrier = JoinBarrierBuilder::new()
            .primary("route")
            .signal("map")
            .build(move |completion: Completion<u32>| {
                tx.send(completion.into_primary()).ok();
            })
            .unwrap();

        barrier.on_named_signal("route", Some(1)).unwrap();
        barrier.on_named_signal("route", Some(2)).unwrap();
        barrier.on_named_signal("route", None).unwrap();
        barrier.on_named_signal("map", None).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Some(2));
    }

    #[test]
    fn test_completion_names_every_slot() {
        let (tx, rx) = mpsc::channel();
        let barrier = JoinBarrierBuilder::new()
            .signal("map")
            .primary("route")
            .build(move |completion: Completion<&'static str>| {
                tx.send(completion).ok();
            })
            .unwrap();

        barrier.on_named_signal("map", Some("gms")).unwrap();
        barrier.on_named_signal("route", Some("polyline")).unwrap();

        let completion = rx.try_recv().unwrap();
        assert_eq!(completion.primary_name(), Some("route"));
        assert_eq!(completion.payload("route"), Some(&"polyline"));
        assert_eq!(completion.payload("map"), Some(&"gms"));
        assert_eq!(completion.payloads().len(), 1);
    }

    #[test]
    fn test_non_primary_payloads_are_kept() {
        let (tx, rx) = mpsc::channel();
        let barrier = JoinBarrierBuilder::new()
            .signal("client")
            .signal("permission")
            .build(move |completion: Completion<String>| {
                tx.send(completion).ok();
            })
            .unwrap();
        assert!(barrier.primary().is_none());

        barrier
            .on_named_signal("permission", Some("granted".to_string()))
            .unwrap();
        barrier.on_named_signal("client", None).unwrap();

        let completion = rx.try_recv().unwrap();
        assert_eq!(completion.primary(), None);
        assert_eq!(completion.payload("permission").map(String::as_str), Some("granted"));
        assert_eq!(completion.payloads()[0].0, "client");
    }

    #[test]
    fn test_unknown_signals() {
        let (barrier, _rx) = map_and_view();
        assert_eq!(barrier.on_signal(SignalId(9), Some("x")), SignalOutcome::Unknown);
        let err = barrier.on_named_signal("camera", None).unwrap_err();
        assert!(matches!(err, BarrierError::UnknownSignal { .. }));
        assert_eq!(barrier.received(), 0);
    }

    #[test]
    fn test_single_signal_barrier() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let barrier = JoinBarrierBuilder::new()
            .primary("only")
            .build(move |_: Completion<u8>| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        barrier.on_named_signal("only", Some(1)).unwrap();
        barrier.on_named_signal("only", Some(2)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_pending_never_fires() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let barrier = JoinBarrierBuilder::new()
            .signal("a")
            .signal("b")
            .build(move |_: Completion<()>| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        barrier.on_named_signal("a", None).unwrap();
        drop(barrier);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_discards_listener() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let barrier = JoinBarrierBuilder::new()
            .signal("a")
            .signal("b")
            .build(move |_: Completion<()>| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        barrier.on_named_signal("a", None).unwrap();

        assert!(barrier.cancel());
        assert!(!barrier.cancel());
        assert_eq!(
            barrier.on_named_signal("b", None).unwrap(),
            SignalOutcome::Cancelled
        );
        assert_eq!(barrier.state(), BarrierState::Pending);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_after_fire_is_refused() {
        let (barrier, rx) = map_and_view();
        barrier.on_named_signal("view", None).unwrap();
        barrier.on_named_signal("map", Some("handleX")).unwrap();
        assert!(!barrier.cancel());
        assert_eq!(rx.try_recv().unwrap(), Some("handleX"));
    }

    #[test]
    fn test_builder_validation() {
        let noop = |_: Completion<()>| {};

        assert_eq!(
            JoinBarrierBuilder::new().build(noop).unwrap_err(),
            BarrierError::NoSignals
        );

        assert!(matches!(
            JoinBarrierBuilder::new()
                .signal("a")
                .signal("a")
                .build(noop)
                .unwrap_err(),
            BarrierError::DuplicateSignal { .. }
        ));

        assert!(matches!(
            JoinBarrierBuilder::new()
                .primary("a")
                .primary("b")
                .build(noop)
                .unwrap_err(),
            BarrierError::MultiplePrimary { .. }
        ));

        let too_many = (0..=MAX_SIGNALS).fold(JoinBarrierBuilder::new(), |b, i| {
            b.signal(format!("s{}", i))
        });
        assert!(matches!(
            too_many.build(noop).unwrap_err(),
            BarrierError::TooManySignals { count: 65, max: 64 }
        ));
    }

    #[test]
    fn test_status_snapshot() {
        let (barrier, _rx) = map_and_view();
        barrier.on_named_signal("view", None).unwrap();

        let status = barrier.status();
        assert_eq!(status.label, "map-screen");
        assert_eq!(status.state, BarrierState::Pending);
        assert_eq!(status.arity, 2);
        assert_eq!(status.received, 1);
        assert_eq!(status.pending, vec!["map".to_string()]);

        let json = status.to_json();
        assert!(json.contains("\"state\":\"pending\""));
    }

    #[test]
    fn test_listener_may_query_barrier() {
        let slot: Arc<Mutex<Option<Arc<JoinBarrier<u8>>>>> = Arc::new(Mutex::new(None));
        let inside = Arc::clone(&slot);
        let (tx, rx) = mpsc::channel();
        let barrier = JoinBarrierBuilder::new()
            .primary("only")
            .build(move |_: Completion<u8>| {
                let guard = inside.lock().unwrap();
                let barrier = guard.as_ref().unwrap();
                tx.send(barrier.is_fired()).ok();
            })
            .unwrap();
        *slot.lock().unwrap() = Some(Arc::clone(&barrier));

        barrier.on_named_signal("only", Some(1)).unwrap();
        assert!(rx.try_recv().unwrap());
        slot.lock().unwrap().take();
    }
}
