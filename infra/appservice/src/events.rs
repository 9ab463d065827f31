//! Single-consumer event streams fed by the listener.

use crate::error::TransportError;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

const DEFAULT_CAPACITY: usize = 128;
const MIN_CAPACITY: usize = 1;

/// A named, bounded queue of `T` with exactly one subscriber.
///
/// Events emitted before [`EventSource::subscribe`] are buffered (up to the
/// capacity) and delivered once a handler is installed.
pub struct EventSource<T> {
    name: &'static str,
    sender: mpsc::Sender<T>,
    receiver: Mutex<Option<mpsc::Receiver<T>>>,
}

impl<T> fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.name)
            .field("subscribed", &self.receiver.lock().is_none())
            .finish()
    }
}

impl<T: Send + 'static> EventSource<T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(MIN_CAPACITY));
        Self { name, sender, receiver: Mutex::new(Some(receiver)) }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Producer handle for the listener side.
    #[must_use]
    pub fn emitter(&self) -> EventEmitter<T> {
        EventEmitter { name: self.name, sender: self.sender.clone() }
    }

    /// Installs `handler`; every event is handed to it and the returned
    /// future runs as its own task.
    ///
    /// Dropping or cancelling the [`Subscription`] stops delivery; handler
    /// tasks already spawned run to completion.
    ///
    /// # Errors
    /// [`TransportError::AlreadySubscribed`] on a second call.
    pub fn subscribe<F, Fut>(&self, handler: F) -> Result<Subscription, TransportError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut receiver = self.receiver.lock().take().ok_or_else(|| {
            TransportError::AlreadySubscribed { message: self.name.into(), context: None }
        })?;

        let name = self.name;
        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                trace!(source = name, "Dispatching event");
                tokio::spawn(handler(event));
            }
            debug!(source = name, "Event source drained");
        });

        debug!(source = name, "Subscription installed");
        Ok(Subscription { name, task })
    }
}

/// Sending half of an [`EventSource`].
pub struct EventEmitter<T> {
    name: &'static str,
    sender: mpsc::Sender<T>,
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self { name: self.name, sender: self.sender.clone() }
    }
}

impl<T> fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<T: Send + 'static> EventEmitter<T> {
    /// Queues `event`, waiting for room when the buffer is full.
    ///
    /// # Errors
    /// [`TransportError::Closed`] once the subscription is gone.
    pub async fn emit(&self, event: T) -> Result<(), TransportError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| TransportError::Closed { message: self.name.into(), context: None })
    }
}

/// Live subscription to an [`EventSource`]; aborts its delivery task on drop.
#[must_use = "dropping a Subscription cancels it"]
#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    task: JoinHandle<()>,
}

impl Subscription {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!(source = self.name, "Subscription cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn buffered_events_reach_late_subscriber() {
        let source = EventSource::<usize>::new("numbers");
        let emitter = source.emitter();
        emitter.emit(1).await.expect("emit");
        emitter.emit(2).await.expect("emit");

        let seen = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Notify::new());
        let (seen_in, done_in) = (Arc::clone(&seen), Arc::clone(&done));
        let _sub = source
            .subscribe(move |n| {
                let seen = Arc::clone(&seen_in);
                let done = Arc::clone(&done_in);
                async move {
                    if seen.fetch_add(n, Ordering::SeqCst) + n == 3 {
                        done.notify_one();
                    }
                }
            })
            .expect("subscribe");

        tokio::time::timeout(Duration::from_secs(2), done.notified()).await.expect("delivered");
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn second_subscriber_is_rejected() {
        let source = EventSource::<()>::new("unit");
        let _first = source.subscribe(|()| async {}).expect("first");
        let err = source.subscribe(|()| async {}).unwrap_err();
        assert!(matches!(err, TransportError::AlreadySubscribed { .. }));
    }

    #[tokio::test]
    async fn cancelled_subscription_closes_source() {
        let source = EventSource::<u8>::new("bytes");
        let emitter = source.emitter();
        let sub = source.subscribe(|_| async {}).expect("subscribe");
        assert!(sub.is_active());
        sub.cancel();

        // The aborted task drops the receiver shortly after.
        let mut closed = false;
        for _ in 0..50 {
            if emitter.emit(0).await.is_err() {
                closed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(closed, "emitter should observe the closed source");
    }
}
