//! # Barrier Registry
//!
//! Handle-based ownership of barriers for callers that cannot hold a Rust
//! `Arc`, such as Kotlin or Swift code on the other side of the FFI.
//! Payloads are strings (typically JSON) at this level.
//!
//! A barrier lives in the registry from `create` until it either completes
//! or its owner calls `destroy` (screen torn down). Handles are never reused,
//! so a stale handle cannot reach a newer barrier.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use once_cell::sync::Lazy;

use crate::barrier::{BarrierStatus, JoinBarrier, JoinBarrierBuilder};
use crate::config::BarrierConfig;
use crate::error::{BarrierError, Result};
use crate::listener::Completion;
use crate::signal::SignalOutcome;

/// Barrier type stored in the registry.
pub type SharedBarrier = Arc<JoinBarrier<String>>;

/// Owns barriers by numeric handle.
#[derive(Debug, Default)]
pub struct BarrierRegistry {
    barriers: HashMap<u64, SharedBarrier>,
    last_handle: u64,
}

impl BarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a barrier awaiting `signals`; `primary`, if given, must be one
    /// of them. The listener receives the primary payload.
    pub fn create<F>(
        &mut self,
        signals: &[String],
        primary: Option<&str>,
        config: BarrierConfig,
        on_ready: F,
    ) -> Result<u64>
    where
        F: FnOnce(u64, Option<String>) + Send + 'static,
    {
        if let Some(name) = primary {
            if !signals.iter().any(|s| s == name) {
                return Err(BarrierError::UnknownPrimary {
                    name: name.to_string(),
                });
            }
        }

        let handle = self.last_handle + 1;
        let builder = signals
            .iter()
            .fold(JoinBarrierBuilder::new().config(config), |b, name| {
                if Some(name.as_str()) == primary {
                    b.primary(name.clone())
                } else {
                    b.signal(name.clone())
                }
            });
        let barrier = builder.build(move |completion: Completion<String>| {
            on_ready(handle, completion.into_primary());
        })?;

        self.last_handle = handle;
        info!(
            "[BarrierRegistry] Created barrier {} ({}) awaiting {} signals",
            handle,
            barrier.label(),
            barrier.arity()
        );
        self.barriers.insert(handle, barrier);
        Ok(handle)
    }

    /// Look up a live barrier.
    pub fn get(&self, handle: u64) -> Result<SharedBarrier> {
        self.barriers
            .get(&handle)
            .cloned()
            .ok_or(BarrierError::UnknownHandle { handle })
    }

    /// Deliver a signal. The listener runs on this thread, with `self`
    /// still borrowed; see [`signal_registered`] for the reentrant variant.
    ///
    /// A barrier that fires is released even if its listener panics.
    pub fn signal(
        &mut self,
        handle: u64,
        name: &str,
        payload: Option<String>,
    ) -> Result<SignalOutcome> {
        let barrier = self.get(handle)?;
        let _retire = RetireOnFire::new(Arc::clone(&barrier), || self.retire(handle));
        barrier.on_named_signal(name, payload)
    }

    /// Tear down a barrier. Pending signals become moot and its listener is
    /// never called, even by a caller that fetched the barrier earlier.
    /// Returns `false` for unknown handles.
    pub fn destroy(&mut self, handle: u64) -> bool {
        match self.barriers.remove(&handle) {
            Some(barrier) => {
                info!(
                    "[BarrierRegistry] Destroyed barrier {} with pending {:?}",
                    handle,
                    barrier.pending()
                );
                barrier.cancel();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, handle: u64) -> Result<BarrierStatus> {
        Ok(self.get(handle)?.status())
    }

    /// Number of live barriers.
    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    /// Drop every barrier without firing any of them.
    pub fn clear(&mut self) {
        if !self.barriers.is_empty() {
            info!("[BarrierRegistry] Clearing {} barriers", self.barriers.len());
        }
        for (_, barrier) in self.barriers.drain() {
            barrier.cancel();
        }
    }

    fn retire(&mut self, handle: u64) {
        if self.barriers.remove(&handle).is_some() {
            debug!("[BarrierRegistry] Barrier {} fired, released", handle);
        }
    }
}

/// Releases a registry handle on drop once its barrier has fired, including
/// while unwinding out of a panicking listener.
struct RetireOnFire<F: FnOnce()> {
    barrier: SharedBarrier,
    retire: Option<F>,
}

impl<F: FnOnce()> RetireOnFire<F> {
    fn new(barrier: SharedBarrier, retire: F) -> Self {
        Self {
            barrier,
            retire: Some(retire),
        }
    }
}

impl<F: FnOnce()> Drop for RetireOnFire<F> {
    fn drop(&mut self) {
        if self.barrier.is_fired() {
            if let Some(retire) = self.retire.take() {
                retire();
            }
        }
    }
}

// ============================================================================
// Global Singleton
// ============================================================================

/// Global registry instance.
///
/// This singleton allows FFI calls to refer to barriers by handle without
/// passing state back and forth across the FFI boundary.
pub static REGISTRY: Lazy<Mutex<BarrierRegistry>> =
    Lazy::new(|| Mutex::new(BarrierRegistry::new()));

/// Run `f` with the global registry locked.
pub fn with_registry<F, R>(f: F) -> R
where
    F: FnOnce(&mut BarrierRegistry) -> R,
{
    let mut guard = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Deliver a signal to a barrier in the global registry.
///
/// The registry lock is released before the signal is delivered, so the
/// listener may itself create, signal or destroy registry barriers.
pub fn signal_registered(
    handle: u64,
    name: &str,
    payload: Option<String>,
) -> Result<SignalOutcome> {
    let barrier = with_registry(|r| r.get(handle))?;
    let _retire = RetireOnFire::new(Arc::clone(&barrier), move || {
        with_registry(|r| r.retire(handle))
    });
    barrier.on_named_signal(name, payload)
}
