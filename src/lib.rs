//! # Join Barrier
//!
//! Run a callback exactly once after a fixed set of independently completing
//! asynchronous signals have all arrived.
//!
//! Built for the map screen handshake on Android/iOS: the map SDK hands over
//! its map asynchronously, the map view reports its layout separately, and
//! the screen may only configure the map once both have happened. The same
//! barrier covers any "wait for N async results, then proceed" step.
//!
//! ## Features
//!
//! - **`async`** (default) - Awaitable completion via tokio
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use join_barrier::{Completion, JoinBarrierBuilder, SignalOutcome};
//!
//! let barrier = JoinBarrierBuilder::new()
//!     .signal("view-ready")
//!     .primary("map-ready")
//!     .build(|completion: Completion<u32>| {
//!         println!("map ready: {:?}", completion.primary());
//!     })
//!     .unwrap();
//!
//! let map = barrier.signal_id("map-ready").unwrap();
//! let view = barrier.signal_id("view-ready").unwrap();
//!
//! assert_eq!(barrier.on_signal(map, Some(7u32)), SignalOutcome::Recorded);
//! assert_eq!(barrier.on_signal(view, None), SignalOutcome::Completed);
//! assert_eq!(barrier.on_signal(view, None), SignalOutcome::AlreadyFired);
//! ```

// Unified error handling
pub mod error;
pub use error::{BarrierError, Result};

// Slot ids and arrival outcomes
pub mod signal;
pub use signal::{SignalId, SignalOutcome, MAX_SIGNALS};

// Barrier configuration
pub mod config;
pub use config::{BarrierConfig, EmptyPayloadPolicy};

// Completion listeners
pub mod listener;
pub use listener::{Completion, CompletionListener};

// The join barrier itself
pub mod barrier;
pub use barrier::{BarrierState, BarrierStatus, JoinBarrier, JoinBarrierBuilder};

// Signal sources and barrier wiring
pub mod source;
pub use source::{connect, OnComplete, OneShotSource, SignalSource};

// Map + view readiness handshake
pub mod map_ready;
pub use map_ready::{MapAndViewReady, ViewLayout, MAP_READY, VIEW_READY};

// Blocking and async completion handles
pub mod wait;
#[cfg(feature = "async")]
pub use wait::ReadyFuture;
pub use wait::ReadyHandle;

// Handle-based registry (singleton for FFI)
pub mod registry;
pub use registry::{signal_registered, with_registry, BarrierRegistry, REGISTRY};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("JoinBarrierRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}
