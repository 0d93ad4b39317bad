//! # Map and view readiness
//!
//! The two-signal handshake of a map screen: the map SDK hands over its map
//! asynchronously, and the map view must have been laid out before camera
//! updates such as "fit these bounds" make sense. The callback runs once
//! both have happened, whichever comes first.

use std::sync::Arc;

use crate::barrier::{JoinBarrier, JoinBarrierBuilder};
use crate::error::{BarrierError, Result};
use crate::listener::Completion;
use crate::signal::{SignalId, SignalOutcome};
use crate::source::{connect, SignalSource};

/// Slot name of the view layout signal.
pub const VIEW_READY: &str = "view-ready";
/// Slot name of the map signal.
pub const MAP_READY: &str = "map-ready";

/// Current size of the map view in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewLayout {
    pub width: u32,
    pub height: u32,
}

impl ViewLayout {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A view that has not been measured yet.
    pub fn unmeasured() -> Self {
        Self::default()
    }

    pub fn is_laid_out(&self) -> bool {
        self.width != 0 && self.height != 0
    }
}

/// Runs a callback with the map once the map is ready and its view has a size.
///
/// # Example
/// ```
/// use join_barrier::{MapAndViewReady, ViewLayout};
/// use std::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel();
/// let ready = MapAndViewReady::new(ViewLayout::unmeasured(), move |map: &'static str| {
///     tx.send(map).unwrap();
/// })
/// .unwrap();
///
/// ready.on_map_ready("google-map");
/// assert!(rx.try_recv().is_err());
/// ready.on_global_layout();
/// assert_eq!(rx.try_recv().unwrap(), "google-map");
/// ```
pub struct MapAndViewReady<M> {
    barrier: Arc<JoinBarrier<M>>,
    view: SignalId,
    map: SignalId,
}

impl<M: Send + 'static> MapAndViewReady<M> {
    /// Start waiting. A view that is already laid out counts as ready
    /// immediately.
    pub fn new<F>(view: ViewLayout, on_ready: F) -> Result<Self>
    where
        F: FnOnce(M) + Send + 'static,
    {
        let barrier = JoinBarrierBuilder::new()
            .label("map-and-view")
            .signal(VIEW_READY)
            .primary(MAP_READY)
            .build(move |completion: Completion<M>| {
                // Withheld empty payloads mean the map slot only fills with a value.
                if let Some(map) = completion.into_primary() {
                    on_ready(map);
                }
            })?;

        let ready = Self {
            view: slot(&barrier, VIEW_READY)?,
            map: slot(&barrier, MAP_READY)?,
            barrier,
        };
        if view.is_laid_out() {
            ready.on_global_layout();
        }
        Ok(ready)
    }

    /// The view finished layout.
    pub fn on_global_layout(&self) -> SignalOutcome {
        self.barrier.on_signal(self.view, None)
    }

    /// The map SDK delivered its map.
    pub fn on_map_ready(&self, map: M) -> SignalOutcome {
        self.barrier.on_signal(self.map, Some(map))
    }

    /// Feed both slots from external sources instead of calling the
    /// `on_*` methods directly.
    pub fn attach<V, S>(&self, view_source: &V, map_source: &S)
    where
        V: SignalSource<M> + ?Sized,
        S: SignalSource<M> + ?Sized,
    {
        connect(&self.barrier, self.view, view_source);
        connect(&self.barrier, self.map, map_source);
    }

    pub fn is_ready(&self) -> bool {
        self.barrier.is_fired()
    }

    pub fn barrier(&self) -> &Arc<JoinBarrier<M>> {
        &self.barrier
    }
}

fn slot<M>(barrier: &JoinBarrier<M>, name: &str) -> Result<SignalId> {
    barrier
        .signal_id(name)
        .ok_or_else(|| BarrierError::UnknownSignal {
            barrier: barrier.label().to_string(),
            name: name.to_string(),
        })
}
