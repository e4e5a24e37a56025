//! Event listeners and subscriptions
//!
//! A listener owns the OS input hook. Captured events are delivered inline on
//! the thread that pumps the listener, in OS delivery order, to every live
//! subscription. There is no buffering between the hook and the sinks.

use crate::events::RawEvent;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use desktester_core::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub type EventSink = Box<dyn FnMut(&RawEvent) + Send>;

/// Decides which event a one-shot subscription takes.
pub type EventFilter = fn(&RawEvent) -> bool;

struct Entry {
    id: u64,
    sink: EventSink,
    /// One-shot entries detach after the first event their filter accepts.
    once: Option<EventFilter>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
    /// Ids cancelled while their entry was checked out for dispatch.
    cancelled: Vec<u64>,
    dispatching: bool,
}

/// Fan-out from one listener to its subscriptions.
///
/// Sinks may cancel subscriptions, including their own, while being called.
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sink: EventSink) -> Subscription {
        self.register(sink, None)
    }

    /// Delivered the first event `accept` passes, then detached.
    pub fn subscribe_once(&self, accept: EventFilter, sink: EventSink) -> Subscription {
        self.register(sink, Some(accept))
    }

    fn register(&self, sink: EventSink, once: Option<EventFilter>) -> Subscription {
        let id = {
            let mut reg = self.registry.lock();
            reg.next_id += 1;
            let id = reg.next_id;
            reg.entries.push(Entry { id, sink, once });
            id
        };
        let registry = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                let mut reg = registry.lock();
                let before = reg.entries.len();
                reg.entries.retain(|e| e.id != id);
                if reg.entries.len() == before && reg.dispatching {
                    reg.cancelled.push(id);
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every live subscription; returns how many saw it.
    pub fn dispatch(&self, event: &RawEvent) -> usize {
        let mut entries = {
            let mut reg = self.registry.lock();
            reg.dispatching = true;
            std::mem::take(&mut reg.entries)
        };

        let mut delivered = 0;
        entries.retain_mut(|entry| {
            if self.registry.lock().cancelled.contains(&entry.id) {
                return false;
            }
            if let Some(accept) = entry.once {
                if !accept(event) {
                    return true;
                }
            }
            (entry.sink)(event);
            delivered += 1;
            entry.once.is_none()
        });

        let mut reg = self.registry.lock();
        entries.append(&mut reg.entries);
        let cancelled = std::mem::take(&mut reg.cancelled);
        entries.retain(|e| !cancelled.contains(&e.id));
        reg.entries = entries;
        reg.dispatching = false;
        delivered
    }
}

/// Registration handle. Cancelling detaches the sink exactly once; later
/// calls and the drop that follows are no-ops.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.is_active()).finish()
    }
}

/// Source of raw input events.
pub trait EventListener {
    /// Install the OS hooks. Calling it while active is a no-op.
    fn start(&mut self) -> Result<()>;

    /// Remove the OS hooks. Subscriptions stay registered.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    fn dispatcher(&self) -> &Dispatcher;

    /// Run the host event loop for up to `timeout`, delivering captured events
    /// to the subscriptions before returning. Returns the number of events.
    fn pump(&mut self, timeout: Duration) -> Result<usize>;

    fn subscribe(&self, sink: EventSink) -> Subscription {
        self.dispatcher().subscribe(sink)
    }

    fn subscribe_once(&self, accept: EventFilter, sink: EventSink) -> Subscription {
        self.dispatcher().subscribe_once(accept, sink)
    }
}

impl<L: EventListener + ?Sized> EventListener for Box<L> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn dispatcher(&self) -> &Dispatcher {
        (**self).dispatcher()
    }

    fn pump(&mut self, timeout: Duration) -> Result<usize> {
        (**self).pump(timeout)
    }
}

/// Listener fed through a channel instead of an OS hook.
///
/// Events sent while the listener is stopped are discarded at the next pump,
/// the way an uninstalled hook never sees them.
pub struct ChannelListener {
    rx: Receiver<RawEvent>,
    dispatcher: Dispatcher,
    active: bool,
}

impl ChannelListener {
    pub fn new() -> (Self, Sender<RawEvent>) {
        let (tx, rx) = unbounded();
        let listener = Self {
            rx,
            dispatcher: Dispatcher::new(),
            active: false,
        };
        (listener, tx)
    }

    fn deliver(&self, event: RawEvent) -> usize {
        if !self.active {
            return 0;
        }
        self.dispatcher.dispatch(&event);
        1
    }
}

impl EventListener for ChannelListener {
    fn start(&mut self) -> Result<()> {
        // Drop anything queued while stopped.
        while self.rx.try_recv().is_ok() {}
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn pump(&mut self, timeout: Duration) -> Result<usize> {
        let mut count = match self.rx.recv_timeout(timeout) {
            Ok(event) => self.deliver(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return Ok(0),
        };
        while let Ok(event) = self.rx.try_recv() {
            count += self.deliver(event);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, EventSink) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn delivers_in_order_to_every_subscription() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _a = dispatcher.subscribe(Box::new(move |e| s.lock().push(e.x)));
        let (count, sink) = counter();
        let _b = dispatcher.subscribe(sink);

        for x in [1.0, 2.0, 3.0] {
            assert_eq!(dispatcher.dispatch(&RawEvent::click(x, 0.0)), 2);
        }
        assert_eq!(*seen.lock(), vec![1.0, 2.0, 3.0]);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cancel_is_idempotent_and_runs_on_drop() {
        let dispatcher = Dispatcher::new();
        let (_, sink) = counter();
        let mut sub = dispatcher.subscribe(sink);
        assert_eq!(dispatcher.len(), 1);
        sub.cancel();
        sub.cancel();
        assert!(!sub.is_active());
        assert!(dispatcher.is_empty());

        let (_, sink) = counter();
        {
            let _sub = dispatcher.subscribe(sink);
            assert_eq!(dispatcher.len(), 1);
        }
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn one_shot_fires_once_for_an_accepted_event() {
        let dispatcher = Dispatcher::new();
        let (count, sink) = counter();
        let _sub = dispatcher.subscribe_once(|e| e.kind.is_pointer(), sink);

        assert_eq!(dispatcher.dispatch(&RawEvent::key("a")), 0);
        assert_eq!(dispatcher.len(), 1);
        dispatcher.dispatch(&RawEvent::click(0.0, 0.0));
        dispatcher.dispatch(&RawEvent::click(0.0, 0.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn sink_can_cancel_another_subscription_mid_dispatch() {
        let dispatcher = Dispatcher::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let s = slot.clone();
        let _first = dispatcher.subscribe(Box::new(move |_| {
            if let Some(mut sub) = s.lock().take() {
                sub.cancel();
            }
        }));
        let (count, sink) = counter();
        *slot.lock() = Some(dispatcher.subscribe(sink));

        assert_eq!(dispatcher.dispatch(&RawEvent::click(0.0, 0.0)), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn channel_listener_ignores_events_while_stopped() {
        let (mut listener, tx) = ChannelListener::new();
        let (count, sink) = counter();
        let _sub = listener.subscribe(sink);

        tx.send(RawEvent::click(0.0, 0.0)).unwrap();
        assert_eq!(listener.pump(Duration::from_millis(10)).unwrap(), 0);

        listener.start().unwrap();
        tx.send(RawEvent::click(1.0, 1.0)).unwrap();
        tx.send(RawEvent::key("a")).unwrap();
        assert_eq!(listener.pump(Duration::from_millis(10)).unwrap(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        listener.stop();
        tx.send(RawEvent::key("b")).unwrap();
        assert_eq!(listener.pump(Duration::from_millis(10)).unwrap(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
