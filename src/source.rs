//! # Signal Sources
//!
//! Producers that complete once and report through a one-shot subscription,
//! and the wiring that feeds them into a barrier slot.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use log::debug;

use crate::barrier::JoinBarrier;
use crate::signal::SignalId;

/// One-shot completion callback handed to a source.
pub type OnComplete<P> = Box<dyn FnOnce(Option<P>) + Send>;

/// An asynchronous producer that eventually completes once.
///
/// Implementations must invoke `on_complete` at most once per subscription.
/// They may do so synchronously from inside `subscribe` if the value is
/// already available.
pub trait SignalSource<P> {
    fn subscribe(&self, on_complete: OnComplete<P>);
}

enum SourceState<P> {
    Idle,
    Subscribed(OnComplete<P>),
    Completed(Option<P>),
    Delivered,
}

/// A source completed by hand, e.g. from a platform callback.
///
/// Completing before anyone subscribed holds the value until the first
/// subscription. Every completion after the first is ignored.
pub struct OneShotSource<P> {
    name: String,
    state: Mutex<SourceState<P>>,
}

impl<P> OneShotSource<P> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SourceState::Idle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Complete the source. Returns `false` if it had already completed.
    pub fn complete(&self, payload: Option<P>) -> bool {
        let callback = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, SourceState::Delivered) {
                SourceState::Idle => {
                    *state = SourceState::Completed(payload);
                    return true;
                }
                SourceState::Subscribed(callback) => callback,
                previous @ (SourceState::Completed(_) | SourceState::Delivered) => {
                    *state = previous;
                    debug!("[OneShotSource:{}] Ignoring second completion", self.name);
                    return false;
                }
            }
        };
        callback(payload);
        true
    }

    pub fn is_completed(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(
            *state,
            SourceState::Completed(_) | SourceState::Delivered
        )
    }
}

impl<P> SignalSource<P> for OneShotSource<P> {
    fn subscribe(&self, on_complete: OnComplete<P>) {
        let ready = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, SourceState::Delivered) {
                SourceState::Idle | SourceState::Subscribed(_) => {
                    *state = SourceState::Subscribed(on_complete);
                    return;
                }
                SourceState::Completed(payload) => payload,
                SourceState::Delivered => {
                    debug!(
                        "[OneShotSource:{}] Subscription after delivery, dropped",
                        self.name
                    );
                    return;
                }
            }
        };
        on_complete(ready);
    }
}

/// Subscribe `barrier`'s slot `id` to `source`.
///
/// The subscription holds a weak reference. If the barrier has been dropped
/// by the time the source completes, the delivery is discarded.
pub fn connect<P, S>(barrier: &Arc<JoinBarrier<P>>, id: SignalId, source: &S)
where
    P: Send + 'static,
    S: SignalSource<P> + ?Sized,
{
    let weak: Weak<JoinBarrier<P>> = Arc::downgrade(barrier);
    source.subscribe(Box::new(move |payload| match weak.upgrade() {
        Some(barrier) => {
            barrier.on_signal(id, payload);
        }
        None => debug!("[JoinBarrier] Signal {:?} arrived after barrier was dropped", id),
    }));
}
