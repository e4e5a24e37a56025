//! macOS listener: a listen-only CGEventTap on the pumping thread's run loop

use crate::events::{normalize_key, RawEvent, RawEventKind};
use crate::listener::{Dispatcher, EventListener};
use cidre::cg::event::access as cg_access;
use cidre::{cf, cg};
use desktester_core::keys::{mac_key_name, mac_keycode_char, Modifiers};
use desktester_core::resolve::deadline_after;
use desktester_core::{Error, Result};
use std::time::{Duration, Instant};

struct TapState {
    dispatcher: Dispatcher,
    start: Instant,
    /// Modifiers as of the last flags-changed event.
    held: Modifiers,
    delivered: usize,
}

impl TapState {
    fn normalize(&mut self, event_type: cg::EventType, event: &cg::Event) -> Option<RawEvent> {
        let t = self.start.elapsed().as_millis() as u64;
        let loc = event.location();
        let mods = Modifiers::from_cg_flags(event.flags().0);

        match event_type {
            cg::EventType::FLAGS_CHANGED => {
                self.held = mods;
                None
            }
            cg::EventType::LEFT_MOUSE_DOWN => {
                let clicks = event.field_i64(cg::EventField::MOUSE_EVENT_CLICK_STATE);
                let kind = if clicks == 2 { RawEventKind::DoubleClick } else { RawEventKind::Click };
                // Triple clicks and beyond carry no step of their own.
                if clicks > 2 {
                    return None;
                }
                Some(RawEvent::pointer(kind, loc.x, loc.y).with_modifiers(mods).at(t))
            }
            cg::EventType::RIGHT_MOUSE_DOWN => {
                Some(RawEvent::pointer(RawEventKind::RightClick, loc.x, loc.y).with_modifiers(mods).at(t))
            }
            cg::EventType::KEY_DOWN => {
                let keycode = event.field_i64(cg::EventField::KEYBOARD_EVENT_KEYCODE) as u16;
                let chars = mac_keycode_char(keycode, false).zip(mac_keycode_char(keycode, true));
                let held = Modifiers(mods.0 | self.held.0);
                let (key, modifiers) = normalize_key(mac_key_name(keycode), chars, held)?;
                Some(RawEvent::key(key).with_modifiers(modifiers).at(t))
            }
            _ => None,
        }
    }
}

extern "C" fn tap_callback(
    _proxy: *mut cg::EventTapProxy,
    event_type: cg::EventType,
    event: &mut cg::Event,
    user_info: *mut TapState,
) -> Option<&cg::Event> {
    let state = unsafe { &mut *user_info };
    if let Some(raw) = state.normalize(event_type, event) {
        state.dispatcher.dispatch(&raw);
        state.delivered += 1;
    }
    Some(event)
}

/// Listen-only taps need the Input Monitoring grant.
pub fn ensure_input_monitoring() -> Result<()> {
    if cg_access::listen_preflight() {
        return Ok(());
    }
    cg_access::listen_request();
    Err(Error::permission_denied("Input Monitoring access is required to record").with_suggestions(vec![
        "Grant access in System Settings > Privacy & Security > Input Monitoring".to_string(),
        "Restart the host process after granting access".to_string(),
    ]))
}

pub struct MacEventListener {
    state: Box<TapState>,
    detach: Option<Box<dyn FnOnce()>>,
}

impl MacEventListener {
    pub fn new() -> Result<Self> {
        ensure_input_monitoring()?;
        Ok(Self {
            state: Box::new(TapState {
                dispatcher: Dispatcher::new(),
                start: Instant::now(),
                held: Modifiers::default(),
                delivered: 0,
            }),
            detach: None,
        })
    }
}

impl EventListener for MacEventListener {
    fn start(&mut self) -> Result<()> {
        if self.detach.is_some() {
            return Ok(());
        }
        let mask = cg::EventType::LEFT_MOUSE_DOWN.mask()
            | cg::EventType::RIGHT_MOUSE_DOWN.mask()
            | cg::EventType::KEY_DOWN.mask()
            | cg::EventType::FLAGS_CHANGED.mask();

        self.state.start = Instant::now();
        self.state.held = Modifiers::default();
        let user_info: *mut TapState = &mut *self.state;

        let Some(tap) = cg::EventTap::new(
            cg::EventTapLocation::Session,
            cg::EventTapPlacement::TailAppend,
            cg::EventTapOpts::LISTEN_ONLY,
            mask,
            tap_callback,
            user_info,
        ) else {
            return Err(Error::permission_denied("Failed to create event tap"));
        };
        let Some(src) = cf::MachPort::run_loop_src(&tap, 0) else {
            return Err(Error::action_failed("start recording", "no run loop source for event tap"));
        };

        let rl = cf::RunLoop::current();
        rl.add_src(&src, cf::RunLoopMode::default());
        tracing::debug!("event tap installed");

        self.detach = Some(Box::new(move || {
            cf::RunLoop::current().remove_src(&src, cf::RunLoopMode::default());
            drop(tap);
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
            tracing::debug!("event tap removed");
        }
    }

    fn is_active(&self) -> bool {
        self.detach.is_some()
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.state.dispatcher
    }

    fn pump(&mut self, timeout: Duration) -> Result<usize> {
        let before = self.state.delivered;
        let deadline = deadline_after(timeout);
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            cf::RunLoop::run_in_mode(cf::RunLoopMode::default(), left.as_secs_f64(), true);
            if self.state.delivered > before || Instant::now() >= deadline {
                break;
            }
        }
        Ok(self.state.delivered - before)
    }
}

impl Drop for MacEventListener {
    fn drop(&mut self) {
        self.stop();
    }
}
