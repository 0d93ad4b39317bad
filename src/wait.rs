//! Handles for waiting on a barrier instead of supplying a listener.
//!
//! Each handle resolves to `None` if its barrier is dropped before firing.

use std::sync::mpsc;
use std::sync::Arc;

use crate::barrier::{JoinBarrier, JoinBarrierBuilder};
use crate::error::Result;
use crate::listener::Completion;

/// Blocking/polling handle for a barrier's completion.
#[derive(Debug)]
pub struct ReadyHandle<P> {
    receiver: mpsc::Receiver<Completion<P>>,
}

impl<P> ReadyHandle<P> {
    /// Check if the barrier has fired (non-blocking).
    pub fn try_recv(&self) -> Option<Completion<P>> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the barrier to fire (blocking).
    pub fn recv(self) -> Option<Completion<P>> {
        self.receiver.recv().ok()
    }

    /// Wait at most `timeout` for the barrier to fire.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Completion<P>> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

impl JoinBarrierBuilder {
    /// Build a barrier whose completion is collected through a [`ReadyHandle`].
    pub fn build_with_handle<P>(self) -> Result<(Arc<JoinBarrier<P>>, ReadyHandle<P>)>
    where
        P: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let barrier = self.build(move |completion: Completion<P>| {
            tx.send(completion).ok();
        })?;
        Ok((barrier, ReadyHandle { receiver: rx }))
    }
}

#[cfg(feature = "async")]
pub use self::future::ReadyFuture;

#[cfg(feature = "async")]
mod future {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use tokio::sync::oneshot;

    use crate::barrier::{JoinBarrier, JoinBarrierBuilder};
    use crate::error::Result;
    use crate::listener::Completion;

    /// Future resolving when the barrier fires.
    ///
    /// Wrap it in `tokio::time::timeout` to bound the wait; the barrier
    /// itself never times out.
    #[derive(Debug)]
    pub struct ReadyFuture<P> {
        receiver: oneshot::Receiver<Completion<P>>,
    }

    impl<P> Future for ReadyFuture<P> {
        type Output = Option<Completion<P>>;

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            Pin::new(&mut self.receiver).poll(cx).map(|r| r.ok())
        }
    }

    impl JoinBarrierBuilder {
        /// Build a barrier whose completion is awaited through a [`ReadyFuture`].
        pub fn build_async<P>(self) -> Result<(Arc<JoinBarrier<P>>, ReadyFuture<P>)>
        where
            P: Send + 'static,
        {
            let (tx, rx) = oneshot::channel();
            let barrier = self.build(move |completion: Completion<P>| {
                tx.send(completion).ok();
            })?;
            Ok((barrier, ReadyFuture { receiver: rx }))
        }
    }
}
