//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose the global barrier
//! registry to Kotlin and Swift. Barriers are referred to by handle, and
//! payloads cross the boundary as strings. Failures are logged and reported
//! as `None`/`false` rather than thrown.

use log::{info, warn};

use crate::registry::{signal_registered, with_registry};
use crate::{init_logging, BarrierConfig, SignalOutcome};

// ============================================================================
// Callback Interface
// ============================================================================

/// Callback interface for barrier completion.
/// Implement this in Kotlin/Swift, e.g. to configure the map once it and its
/// view are both ready.
#[uniffi::export(callback_interface)]
pub trait ReadyCallback: Send + Sync {
    /// Called exactly once, when the last awaited signal arrives.
    /// - handle: The barrier that fired
    /// - payload: Payload of the primary signal, if any
    fn on_ready(&self, handle: u64, payload: Option<String>);
}

// ============================================================================
// Barrier Functions
// ============================================================================

/// Get default configuration.
#[uniffi::export]
pub fn default_barrier_config() -> BarrierConfig {
    init_logging();
    BarrierConfig::default()
}

/// Create a barrier awaiting `signals`. Returns its handle, or `None` if the
/// declaration is invalid (empty, duplicate names, unknown primary).
#[uniffi::export]
pub fn barrier_create(
    signals: Vec<String>,
    primary: Option<String>,
    config: BarrierConfig,
    callback: Box<dyn ReadyCallback>,
) -> Option<u64> {
    init_logging();
    let result = with_registry(|r| {
        r.create(&signals, primary.as_deref(), config, move |handle, payload| {
            callback.on_ready(handle, payload);
        })
    });
    match result {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("[JoinBarrierRust] barrier_create failed: {}", e);
            None
        }
    }
}

/// Deliver a signal. Returns `None` for an unknown handle or signal name.
/// The callback, if this completes the barrier, runs before this returns.
#[uniffi::export]
pub fn barrier_signal(handle: u64, signal: String, payload: Option<String>) -> Option<SignalOutcome> {
    init_logging();
    match signal_registered(handle, &signal, payload) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("[JoinBarrierRust] barrier_signal failed: {}", e);
            None
        }
    }
}

/// Tear down a barrier (e.g. from `onDestroy`). Pending signals become moot.
#[uniffi::export]
pub fn barrier_destroy(handle: u64) -> bool {
    init_logging();
    let destroyed = with_registry(|r| r.destroy(handle));
    if destroyed {
        info!("[JoinBarrierRust] barrier {} destroyed", handle);
    }
    destroyed
}

/// Status snapshot as JSON, or `None` if the barrier is gone.
#[uniffi::export]
pub fn barrier_status_json(handle: u64) -> Option<String> {
    init_logging();
    with_registry(|r| r.status(handle))
        .ok()
        .map(|status| status.to_json())
}

/// Number of live barriers, saturating at `u32::MAX`.
#[uniffi::export]
pub fn barrier_count() -> u32 {
    init_logging();
    saturating_count(with_registry(|r| r.len()))
}

fn saturating_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
