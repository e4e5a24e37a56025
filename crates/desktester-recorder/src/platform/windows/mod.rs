//! Windows listener: low-level mouse and keyboard hooks
//!
//! Hook procedures only queue events; they are dispatched from `pump` once
//! the thread's message queue has been drained, so sinks never run inside
//! the hook's time budget.

use crate::events::{normalize_key, RawEvent, RawEventKind};
use crate::listener::{Dispatcher, EventListener};
use desktester_core::keys::{vk_name, Modifiers};
use desktester_core::resolve::deadline_after;
use desktester_core::{Error, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, GetDoubleClickTime, GetKeyState, ToUnicode, VIRTUAL_KEY, VK_CAPITAL, VK_CONTROL, VK_LWIN,
    VK_MENU, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetSystemMetrics, PeekMessageW, SetWindowsHookExW, TranslateMessage,
    UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, PM_REMOVE, SM_CXDOUBLECLK, SM_CYDOUBLECLK,
    WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_LBUTTONDOWN, WM_RBUTTONDOWN, WM_SYSKEYDOWN,
};

const LLMHF_INJECTED: u32 = 0x1;
const LLKHF_INJECTED: u32 = 0x10;
/// ToUnicode flag: leave the kernel keyboard state (dead keys) untouched.
const TO_UNICODE_NO_STATE: u32 = 0x4;

#[derive(Default)]
struct HookState {
    queue: VecDeque<RawEvent>,
    start: Option<Instant>,
    last_click: Option<(Instant, i32, i32)>,
}

thread_local! {
    static HOOKS: RefCell<HookState> = RefCell::new(HookState::default());
}

fn elapsed_ms() -> u64 {
    HOOKS.with(|h| h.borrow().start.map(|s| s.elapsed().as_millis() as u64).unwrap_or(0))
}

fn key_down(vk: VIRTUAL_KEY) -> bool {
    unsafe { GetAsyncKeyState(vk.0 as i32) < 0 }
}

fn held_modifiers() -> Modifiers {
    let mut m = Modifiers::default();
    if key_down(VK_SHIFT) {
        m.insert(Modifiers::SHIFT);
    }
    if key_down(VK_CONTROL) {
        m.insert(Modifiers::CTRL);
    }
    if key_down(VK_MENU) {
        m.insert(Modifiers::OPT);
    }
    if key_down(VK_LWIN) || key_down(VK_RWIN) {
        m.insert(Modifiers::CMD);
    }
    if unsafe { GetKeyState(VK_CAPITAL.0 as i32) } & 1 != 0 {
        m.insert(Modifiers::CAPS);
    }
    m
}

/// Character a virtual key produces with and without shift.
fn key_chars(vk: u32, scan: u32) -> Option<(char, char)> {
    let translate = |shift: bool| -> Option<char> {
        let mut state = [0u8; 256];
        if shift {
            state[VK_SHIFT.0 as usize] = 0x80;
        }
        let mut buf = [0u16; 4];
        let n = unsafe { ToUnicode(vk, scan, Some(&state), &mut buf, TO_UNICODE_NO_STATE) };
        if n != 1 {
            return None;
        }
        char::from_u32(buf[0] as u32)
    };
    translate(false).zip(translate(true))
}

fn is_double_click(x: i32, y: i32) -> bool {
    let now = Instant::now();
    let window = Duration::from_millis(unsafe { GetDoubleClickTime() } as u64);
    let (dx, dy) = unsafe { (GetSystemMetrics(SM_CXDOUBLECLK) / 2, GetSystemMetrics(SM_CYDOUBLECLK) / 2) };
    HOOKS.with(|h| {
        let mut h = h.borrow_mut();
        let double = matches!(h.last_click, Some((at, px, py))
            if now.duration_since(at) <= window && (x - px).abs() <= dx && (y - py).abs() <= dy);
        // A double click consumes the pair so a third click starts over.
        h.last_click = if double { None } else { Some((now, x, y)) };
        double
    })
}

fn enqueue(event: RawEvent) {
    HOOKS.with(|h| h.borrow_mut().queue.push_back(event));
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
        if info.flags & LLMHF_INJECTED == 0 {
            let (x, y) = (info.pt.x, info.pt.y);
            let kind = match wparam.0 as u32 {
                WM_LBUTTONDOWN if is_double_click(x, y) => Some(RawEventKind::DoubleClick),
                WM_LBUTTONDOWN => Some(RawEventKind::Click),
                WM_RBUTTONDOWN => Some(RawEventKind::RightClick),
                _ => None,
            };
            if let Some(kind) = kind {
                enqueue(
                    RawEvent::pointer(kind, x as f64, y as f64)
                        .with_modifiers(held_modifiers())
                        .at(elapsed_ms()),
                );
            }
        }
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 && matches!(wparam.0 as u32, WM_KEYDOWN | WM_SYSKEYDOWN) {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        if info.flags.0 & LLKHF_INJECTED == 0 {
            let named = vk_name(info.vkCode as u16);
            let chars = if named.is_none() { key_chars(info.vkCode, info.scanCode) } else { None };
            if let Some((key, modifiers)) = normalize_key(named, chars, held_modifiers()) {
                enqueue(RawEvent::key(key).with_modifiers(modifiers).at(elapsed_ms()));
            }
        }
    }
    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}

pub struct WindowsEventListener {
    dispatcher: Dispatcher,
    hooks: Option<(HHOOK, HHOOK)>,
}

impl WindowsEventListener {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dispatcher: Dispatcher::new(),
            hooks: None,
        })
    }
}

impl EventListener for WindowsEventListener {
    fn start(&mut self) -> Result<()> {
        if self.hooks.is_some() {
            return Ok(());
        }
        HOOKS.with(|h| {
            let mut h = h.borrow_mut();
            h.queue.clear();
            h.last_click = None;
            h.start = Some(Instant::now());
        });
        let hooks = unsafe {
            let module: HINSTANCE = GetModuleHandleW(None)
                .map_err(|e| Error::action_failed("install input hooks", &e.to_string()))?
                .into();
            let mouse = SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), module, 0)
                .map_err(|e| Error::action_failed("install mouse hook", &e.to_string()))?;
            match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), module, 0) {
                Ok(keyboard) => (mouse, keyboard),
                Err(e) => {
                    let _ = UnhookWindowsHookEx(mouse);
                    return Err(Error::action_failed("install keyboard hook", &e.to_string()));
                }
            }
        };
        self.hooks = Some(hooks);
        tracing::debug!("low-level input hooks installed");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((mouse, keyboard)) = self.hooks.take() {
            unsafe {
                let _ = UnhookWindowsHookEx(mouse);
                let _ = UnhookWindowsHookEx(keyboard);
            }
            HOOKS.with(|h| h.borrow_mut().queue.clear());
            tracing::debug!("low-level input hooks removed");
        }
    }

    fn is_active(&self) -> bool {
        self.hooks.is_some()
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn pump(&mut self, timeout: Duration) -> Result<usize> {
        let deadline = deadline_after(timeout);
        let mut msg = MSG::default();
        loop {
            // Low-level hooks are called while this thread retrieves messages.
            unsafe {
                while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
            let events: Vec<RawEvent> = HOOKS.with(|h| h.borrow_mut().queue.drain(..).collect());
            for event in &events {
                self.dispatcher.dispatch(event);
            }
            let now = Instant::now();
            if !events.is_empty() || now >= deadline {
                return Ok(events.len());
            }
            thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }
    }
}

impl Drop for WindowsEventListener {
    fn drop(&mut self) {
        self.stop();
    }
}
