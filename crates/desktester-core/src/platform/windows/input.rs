//! Windows input injection via SendInput

use crate::error::{Error, ErrorCode, Result};
use crate::keys::{virtual_key, KeyCombo, Modifiers};
use std::thread;
use std::time::Duration;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

pub const CHAR_DELAY: Duration = Duration::from_millis(20);

const VK_SHIFT: u16 = 0x10;
const VK_CONTROL: u16 = 0x11;
const VK_MENU: u16 = 0x12;
const VK_LWIN: u16 = 0x5B;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
}

pub fn move_mouse(x: i32, y: i32) -> Result<()> {
    unsafe { SetCursorPos(x, y) }
        .map_err(|e| Error::new(ErrorCode::ActionFailed, format!("Failed to move mouse: {:?}", e)))
}

pub fn click_at(x: f64, y: f64, button: Button, clicks: u8) -> Result<()> {
    move_mouse(x.round() as i32, y.round() as i32)?;
    thread::sleep(Duration::from_millis(10));
    let (down, up) = match button {
        Button::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
        Button::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
    };
    for n in 0..clicks.max(1) {
        if n > 0 {
            thread::sleep(Duration::from_millis(50));
        }
        send_inputs(&[make_mouse_input(down), make_mouse_input(up)])?;
    }
    Ok(())
}

pub fn type_chars(text: &str) -> Result<()> {
    let mut units = [0u16; 2];
    for c in text.chars() {
        let mut inputs = Vec::new();
        for unit in c.encode_utf16(&mut units).iter() {
            inputs.push(make_unicode_input(*unit, false));
            inputs.push(make_unicode_input(*unit, true));
        }
        send_inputs(&inputs)?;
        thread::sleep(CHAR_DELAY);
    }
    Ok(())
}

fn modifier_keys(modifiers: Modifiers) -> Vec<u16> {
    [
        (Modifiers::CTRL, VK_CONTROL),
        (Modifiers::OPT, VK_MENU),
        (Modifiers::SHIFT, VK_SHIFT),
        (Modifiers::CMD, VK_LWIN),
    ]
    .iter()
    .filter(|(flag, _)| modifiers.contains(*flag))
    .map(|(_, vk)| *vk)
    .collect()
}

/// Holds the modifiers, taps every known key, releases in reverse. Returns the
/// keys that had no virtual-key code.
pub fn key_combo(combo: &KeyCombo) -> Result<Vec<String>> {
    let mut skipped = Vec::new();
    let mut keys = Vec::new();
    for name in &combo.keys {
        match virtual_key(name) {
            Some(vk) => keys.push(vk),
            None => skipped.push(name.clone()),
        }
    }
    if keys.is_empty() {
        return Ok(skipped);
    }

    let modifiers = modifier_keys(combo.modifiers);
    let mut inputs = Vec::new();
    for &m in &modifiers {
        inputs.push(make_key_input(m, false));
    }
    for &k in &keys {
        inputs.push(make_key_input(k, false));
        inputs.push(make_key_input(k, true));
    }
    for &m in modifiers.iter().rev() {
        inputs.push(make_key_input(m, true));
    }
    send_inputs(&inputs)?;
    Ok(skipped)
}

fn make_mouse_input(flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn make_key_input(vk: u16, key_up: bool) -> INPUT {
    let flags = if key_up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn make_unicode_input(unit: u16, key_up: bool) -> INPUT {
    let mut flags = KEYEVENTF_UNICODE;
    if key_up {
        flags |= KEYEVENTF_KEYUP;
    }
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: unit,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send_inputs(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(Error::new(
            ErrorCode::ActionFailed,
            format!("SendInput failed: sent {} of {} inputs", sent, inputs.len()),
        ));
    }
    Ok(())
}
