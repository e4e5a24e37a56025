//! Input synthesis through CGEvent injection

use crate::keys::{mac_keycode, KeyCombo, Modifiers};
use cidre::cg;
use std::ffi::c_void;
use std::thread;
use std::time::Duration;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventPost(tap: u32, event: *const c_void);
    fn CGEventKeyboardSetUnicodeString(event: *const c_void, length: usize, string: *const u16);
}

const HID_EVENT_TAP: u32 = 0;

/// Pause between the characters of synthesized typing.
pub const CHAR_DELAY: Duration = Duration::from_millis(20);

fn post(event: &cg::Event) {
    unsafe {
        CGEventPost(HID_EVENT_TAP, event as *const cg::Event as *const c_void);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
}

/// `clicks` down/up pairs at one point, with the click-state field set so
/// the second pair registers as a double click.
pub fn click_at(x: f64, y: f64, button: Button, clicks: u8) {
    let pos = cg::Point { x, y };
    let (btn, down, up) = match button {
        Button::Left => (
            cg::MouseButton::Left,
            cg::EventType::LEFT_MOUSE_DOWN,
            cg::EventType::LEFT_MOUSE_UP,
        ),
        Button::Right => (
            cg::MouseButton::Right,
            cg::EventType::RIGHT_MOUSE_DOWN,
            cg::EventType::RIGHT_MOUSE_UP,
        ),
    };

    for n in 1..=clicks.max(1) {
        for kind in [down, up] {
            if let Some(mut evt) = cg::Event::mouse(None, kind, pos, btn) {
                evt.set_field_i64(cg::EventField::MOUSE_EVENT_CLICK_STATE, n as i64);
                post(&evt);
            }
            thread::sleep(Duration::from_millis(10));
        }
        if n < clicks {
            thread::sleep(Duration::from_millis(50));
        }
    }
}

pub fn key(keycode: u16, modifiers: Modifiers) {
    let flags = cg::EventFlags(modifiers.to_cg_flags());
    for down in [true, false] {
        if let Some(mut evt) = cg::Event::keyboard(None, keycode, down) {
            evt.set_flags(flags);
            post(&evt);
        }
        if down {
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// One unicode key event pair per character, independent of keyboard layout.
pub fn type_chars(text: &str) {
    for c in text.chars() {
        let mut units = [0u16; 2];
        let encoded = c.encode_utf16(&mut units);
        for down in [true, false] {
            if let Some(evt) = cg::Event::keyboard(None, 0, down) {
                unsafe {
                    CGEventKeyboardSetUnicodeString(
                        &*evt as *const cg::Event as *const c_void,
                        encoded.len(),
                        encoded.as_ptr(),
                    );
                }
                post(&evt);
            }
        }
        thread::sleep(CHAR_DELAY);
    }
}

/// Presses every regular key of the combo with the modifier mask applied.
/// Returns the keys that had no key code.
pub fn key_combo(combo: &KeyCombo) -> Vec<String> {
    let mut skipped = Vec::new();
    for name in &combo.keys {
        match mac_keycode(name) {
            Some(code) => key(code, combo.modifiers),
            None => skipped.push(name.clone()),
        }
    }
    skipped
}
