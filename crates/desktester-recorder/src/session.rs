//! Recording Session - listener, resolver, converter and optimizer in one place
//!
//! The session owns the step buffer. Events are turned into steps inline as
//! the listener is pumped; `stop` runs the optimizer and returns the result.

use crate::convert::EventToStep;
use crate::events::RawEvent;
use crate::listener::{EventListener, Subscription};
use crate::optimizer;
use crate::resolver::ElementResolver;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use desktester_core::resolve::deadline_after;
use desktester_core::{AutomationEngine, LocatorStrategy, Result, Step, UIElement};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a single pump waits while picking.
const PICK_SLICE: Duration = Duration::from_millis(50);

struct Recording {
    resolver: ElementResolver,
    converter: EventToStep,
    steps: Vec<Step>,
    active: bool,
    feeds: Vec<Sender<Step>>,
}

impl Recording {
    fn handle(&mut self, event: &RawEvent) {
        if !self.active {
            return;
        }
        let resolved = if event.kind.is_pointer() {
            self.resolver.resolve(event.x, event.y)
        } else {
            self.resolver.resolve_focused()
        };
        let (element, target) = match resolved {
            Some((element, locator)) => (Some(element), Some(locator)),
            None => (None, None),
        };

        if let Some(step) = self.converter.convert(event, element.as_ref(), target) {
            tracing::debug!(step = %step.id, action = %step.action, description = %step.description, "recorded step");
            self.feeds.retain(|tx| tx.send(step.clone()).is_ok());
            self.steps.push(step);
        }
    }
}

pub struct RecordingSession<L: EventListener = Box<dyn EventListener>> {
    engine: Arc<AutomationEngine>,
    listener: L,
    recording: Arc<Mutex<Recording>>,
    _subscription: Subscription,
}

impl RecordingSession {
    /// Session on the host's input hooks. Must be pumped on this thread.
    pub fn for_current_platform(engine: Arc<AutomationEngine>) -> Result<Self> {
        Ok(Self::new(engine, crate::platform::create_listener()?))
    }
}

impl<L: EventListener> RecordingSession<L> {
    pub fn new(engine: Arc<AutomationEngine>, listener: L) -> Self {
        let recording = Arc::new(Mutex::new(Recording {
            resolver: ElementResolver::new(engine.clone()),
            converter: EventToStep::new(),
            steps: Vec::new(),
            active: false,
            feeds: Vec::new(),
        }));
        let sink = recording.clone();
        let subscription = listener.subscribe(Box::new(move |event| sink.lock().handle(event)));
        Self {
            engine,
            listener,
            recording,
            _subscription: subscription,
        }
    }

    pub fn engine(&self) -> &Arc<AutomationEngine> {
        &self.engine
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Clears the buffer, restarts numbering at `step_1` and installs hooks.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut rec = self.recording.lock();
            rec.steps.clear();
            rec.converter.reset();
            rec.active = true;
        }
        if let Err(e) = self.listener.start() {
            self.recording.lock().active = false;
            return Err(e);
        }
        tracing::info!("recording started");
        Ok(())
    }

    /// Removes the hooks and returns the optimized steps. The optimized list
    /// also replaces the buffer, so `steps()` agrees with the return value.
    pub fn stop(&mut self) -> Vec<Step> {
        self.listener.stop();
        let mut rec = self.recording.lock();
        rec.active = false;
        let raw = std::mem::take(&mut rec.steps);
        let raw_count = raw.len();
        rec.steps = optimizer::optimize(raw);
        tracing::info!(raw = raw_count, steps = rec.steps.len(), "recording stopped");
        rec.steps.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.lock().active
    }

    /// Steps captured so far, unoptimized while recording.
    pub fn steps(&self) -> Vec<Step> {
        self.recording.lock().steps.clone()
    }

    /// Live feed of steps as they are recorded. Each call opens a new feed;
    /// dropping the receiver closes it.
    pub fn feed(&self) -> Receiver<Step> {
        let (tx, rx) = unbounded();
        self.recording.lock().feeds.push(tx);
        rx
    }

    /// Run the listener's event loop for up to `timeout`.
    pub fn pump(&mut self, timeout: Duration) -> Result<usize> {
        self.listener.pump(timeout)
    }

    /// Resolve the next click to an element and locator without recording
    /// it. `Ok(None)` on timeout or when nothing is under the pointer.
    pub fn pick_element(&mut self, timeout: Duration) -> Result<Option<(UIElement, LocatorStrategy)>> {
        let (tx, rx) = bounded::<(f64, f64)>(1);
        let mut pick = self.listener.subscribe_once(
            |event| event.kind.is_pointer(),
            Box::new(move |event| {
                let _ = tx.try_send((event.x, event.y));
            }),
        );

        let was_recording = std::mem::replace(&mut self.recording.lock().active, false);
        let was_listening = self.listener.is_active();
        let result = self.wait_for_pick(&rx, timeout, was_listening);

        pick.cancel();
        if !was_listening {
            self.listener.stop();
        }
        self.recording.lock().active = was_recording;

        let point = result?;
        Ok(point.and_then(|(x, y)| ElementResolver::new(self.engine.clone()).resolve(x, y)))
    }

    fn wait_for_pick(&mut self, rx: &Receiver<(f64, f64)>, timeout: Duration, listening: bool) -> Result<Option<(f64, f64)>> {
        if !listening {
            self.listener.start()?;
        }
        let deadline = deadline_after(timeout);
        loop {
            if let Ok(point) = rx.try_recv() {
                return Ok(Some(point));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.listener.pump((deadline - now).min(PICK_SLICE))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ChannelListener;
    use desktester_core::virtual_desktop::{VirtualApp, VirtualNode};
    use desktester_core::{ActionType, Bounds, LocatorType, VirtualDesktop};

    fn session() -> (RecordingSession<ChannelListener>, Sender<RawEvent>) {
        let desktop = VirtualDesktop::new();
        desktop.spawn(
            VirtualApp::new("Demo").with_root(
                VirtualNode::new("window").bounds(Bounds::new(0.0, 0.0, 200.0, 200.0)).child(
                    VirtualNode::new("button")
                        .identifier("btnOK")
                        .title("OK")
                        .bounds(Bounds::new(10.0, 10.0, 20.0, 10.0)),
                ),
            ),
        );
        let engine = Arc::new(AutomationEngine::new(desktop));
        let (listener, tx) = ChannelListener::new();
        (RecordingSession::new(engine, listener), tx)
    }

    fn pump_all(session: &mut RecordingSession<ChannelListener>) {
        session.pump(Duration::from_millis(20)).unwrap();
    }

    #[test]
    fn records_only_between_start_and_stop() {
        let (mut session, tx) = session();
        tx.send(RawEvent::click(15.0, 15.0)).unwrap();
        pump_all(&mut session);
        assert!(session.steps().is_empty());

        session.start().unwrap();
        assert!(session.is_recording());
        tx.send(RawEvent::click(15.0, 15.0)).unwrap();
        pump_all(&mut session);
        assert_eq!(session.steps().len(), 1);

        let steps = session.stop();
        assert!(!session.is_recording());
        tx.send(RawEvent::click(15.0, 15.0)).unwrap();
        pump_all(&mut session);
        assert_eq!(session.steps(), steps);
    }

    #[test]
    fn restart_clears_buffer_and_numbering() {
        let (mut session, tx) = session();
        session.start().unwrap();
        tx.send(RawEvent::click(15.0, 15.0)).unwrap();
        tx.send(RawEvent::click(100.0, 100.0)).unwrap();
        pump_all(&mut session);
        session.stop();

        session.start().unwrap();
        assert!(session.steps().is_empty());
        tx.send(RawEvent::right_click(15.0, 15.0)).unwrap();
        pump_all(&mut session);
        let steps = session.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].id, "step_1");
        assert_eq!(steps[0].action, ActionType::RightClick);
    }

    #[test]
    fn feed_sees_steps_before_stop() {
        let (mut session, tx) = session();
        let feed = session.feed();
        session.start().unwrap();
        tx.send(RawEvent::click(15.0, 15.0)).unwrap();
        pump_all(&mut session);

        let step = feed.try_recv().unwrap();
        assert_eq!(step.action, ActionType::Click);
        assert_eq!(step.description, "Click \"OK\" (button)");
        assert!(session.is_recording());
    }

    #[test]
    fn pick_resolves_without_recording() {
        let (mut session, tx) = session();
        session.start().unwrap();
        tx.send(RawEvent::key("x")).unwrap();
        tx.send(RawEvent::click(15.0, 15.0)).unwrap();

        let (element, locator) = session.pick_element(Duration::from_millis(500)).unwrap().unwrap();
        assert_eq!(element.identifier.as_deref(), Some("btnOK"));
        assert_eq!(locator.locator_type, LocatorType::AccessibilityId);
        assert!(session.steps().is_empty());
        assert!(session.is_recording());
    }

    #[test]
    fn pick_times_out() {
        let (mut session, _tx) = session();
        let picked = session.pick_element(Duration::from_millis(60)).unwrap();
        assert!(picked.is_none());
        assert!(!session.listener().is_active());
    }
}
