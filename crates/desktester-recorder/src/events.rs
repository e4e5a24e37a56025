//! Raw input events as the listener sees them
//!
//! Ephemeral: a `RawEvent` lives from the OS callback until it has been turned
//! into a step, and is never persisted.

use desktester_core::keys::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    Click,
    DoubleClick,
    RightClick,
    KeyPress,
}

impl RawEventKind {
    pub fn is_pointer(&self) -> bool {
        !matches!(self, RawEventKind::KeyPress)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    /// Milliseconds since the listener started.
    pub t: u64,
    /// Screen point, top-left origin. Zero for key events.
    pub x: f64,
    pub y: f64,
    /// Key name (`"return"`, `"f5"`) or the typed character (`"H"`).
    pub key: Option<String>,
    /// Held modifiers. Shift is already folded into printable characters.
    pub modifiers: Modifiers,
}

impl RawEvent {
    pub fn click(x: f64, y: f64) -> Self {
        Self::pointer(RawEventKind::Click, x, y)
    }

    pub fn double_click(x: f64, y: f64) -> Self {
        Self::pointer(RawEventKind::DoubleClick, x, y)
    }

    pub fn right_click(x: f64, y: f64) -> Self {
        Self::pointer(RawEventKind::RightClick, x, y)
    }

    pub fn pointer(kind: RawEventKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            t: 0,
            x,
            y,
            key: None,
            modifiers: Modifiers::default(),
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self {
            kind: RawEventKind::KeyPress,
            t: 0,
            x: 0.0,
            y: 0.0,
            key: Some(key.into()),
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn at(mut self, t: u64) -> Self {
        self.t = t;
        self
    }

    /// A key that types a character rather than naming a key.
    pub fn is_printable(&self) -> bool {
        match &self.key {
            Some(k) => {
                let mut chars = k.chars();
                matches!((chars.next(), chars.next()), (Some(c), None) if !c.is_control())
            }
            None => false,
        }
    }
}

/// Normalize a key-down into `(key, modifiers)`.
///
/// `named` wins over `chars` so return/tab/arrows keep their names. `chars`
/// is the key's plain and shifted character. Shift alone is folded into the
/// character; with cmd/ctrl/alt held the combo names the plain character and
/// keeps shift. `None` means the key has no usable name (bare modifier keys,
/// unmapped codes).
pub fn normalize_key(named: Option<&str>, chars: Option<(char, char)>, mut modifiers: Modifiers) -> Option<(String, Modifiers)> {
    modifiers.remove(Modifiers::FN);
    if let Some(name) = named {
        modifiers.remove(Modifiers::CAPS);
        return Some((name.to_string(), modifiers));
    }
    let (plain, shifted) = chars.filter(|(c, _)| !c.is_control())?;
    let caps = modifiers.contains(Modifiers::CAPS);
    modifiers.remove(Modifiers::CAPS);
    if modifiers.contains(Modifiers::CMD) || modifiers.contains(Modifiers::CTRL) || modifiers.contains(Modifiers::OPT) {
        return Some((plain.to_string(), modifiers));
    }
    let shift = modifiers.contains(Modifiers::SHIFT);
    modifiers.remove(Modifiers::SHIFT);
    let c = match (shift, caps && plain.is_alphabetic()) {
        (true, false) => shifted,
        (false, true) => plain.to_ascii_uppercase(),
        _ => plain,
    };
    Some((c.to_string(), modifiers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_detection() {
        assert!(RawEvent::key("H").is_printable());
        assert!(RawEvent::key(" ").is_printable());
        assert!(!RawEvent::key("return").is_printable());
        assert!(!RawEvent::click(1.0, 2.0).is_printable());
    }

    #[test]
    fn shift_is_folded_into_characters() {
        let (key, mods) = normalize_key(None, Some(('h', 'H')), Modifiers(Modifiers::SHIFT)).unwrap();
        assert_eq!(key, "H");
        assert!(!mods.any());
    }

    #[test]
    fn named_keys_keep_their_modifiers() {
        let (key, mods) = normalize_key(Some("tab"), None, Modifiers(Modifiers::SHIFT)).unwrap();
        assert_eq!(key, "tab");
        assert_eq!(mods.names(), vec!["shift"]);
    }

    #[test]
    fn combos_keep_shift_and_the_plain_key() {
        let mods = Modifiers(Modifiers::CMD | Modifiers::SHIFT);
        let (key, mods) = normalize_key(None, Some(('s', 'S')), mods).unwrap();
        assert_eq!(key, "s");
        assert_eq!(mods.names(), vec!["cmd", "shift"]);
    }

    #[test]
    fn caps_lock_uppercases_letters_only() {
        let caps = Modifiers(Modifiers::CAPS);
        assert_eq!(normalize_key(None, Some(('a', 'A')), caps).unwrap().0, "A");
        assert_eq!(normalize_key(None, Some(('1', '!')), caps).unwrap().0, "1");
    }

    #[test]
    fn unnamed_keys_are_dropped() {
        assert!(normalize_key(None, None, Modifiers::default()).is_none());
        assert!(normalize_key(None, Some(('\u{8}', '\u{8}')), Modifiers::default()).is_none());
    }
}
