//! Key names, modifier flags and native key code tables
//!
//! Steps carry keys as lowercase names (`"cmd"`, `"a"`, `"return"`). Backends
//! split a combo into a modifier mask plus regular keys and look each regular
//! key up here. Names that are not in the tables are skipped, not rejected.

/// Modifier flags packed into a single byte.
/// Bit 0: shift, 1: ctrl, 2: option/alt, 3: command, 4: capslock, 5: fn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(pub u8);

impl Modifiers {
    pub const SHIFT: u8 = 1 << 0;
    pub const CTRL: u8 = 1 << 1;
    pub const OPT: u8 = 1 << 2;
    pub const CMD: u8 = 1 << 3;
    pub const CAPS: u8 = 1 << 4;
    pub const FN: u8 = 1 << 5;

    /// Names in the order recorded combos list them.
    const NAMED: [(u8, &'static str); 4] = [
        (Self::CMD, "cmd"),
        (Self::SHIFT, "shift"),
        (Self::OPT, "alt"),
        (Self::CTRL, "ctrl"),
    ];

    pub fn from_cg_flags(flags: u64) -> Self {
        let mut m = 0u8;
        if flags & 0x20000 != 0 { m |= Self::SHIFT; }
        if flags & 0x40000 != 0 { m |= Self::CTRL; }
        if flags & 0x80000 != 0 { m |= Self::OPT; }
        if flags & 0x100000 != 0 { m |= Self::CMD; }
        if flags & 0x10000 != 0 { m |= Self::CAPS; }
        if flags & 0x800000 != 0 { m |= Self::FN; }
        Self(m)
    }

    pub fn to_cg_flags(self) -> u64 {
        let mut flags = 0u64;
        if self.0 & Self::SHIFT != 0 { flags |= 0x20000; }
        if self.0 & Self::CTRL != 0 { flags |= 0x40000; }
        if self.0 & Self::OPT != 0 { flags |= 0x80000; }
        if self.0 & Self::CMD != 0 { flags |= 0x100000; }
        flags
    }

    /// Flag for a modifier key name, accepting the usual aliases.
    pub fn flag_for(name: &str) -> Option<u8> {
        match name.to_lowercase().as_str() {
            "cmd" | "command" | "meta" | "super" | "win" => Some(Self::CMD),
            "shift" => Some(Self::SHIFT),
            "alt" | "option" | "opt" => Some(Self::OPT),
            "ctrl" | "control" => Some(Self::CTRL),
            _ => None,
        }
    }

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn insert(&mut self, flag: u8) {
        self.0 |= flag;
    }

    pub fn remove(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    /// True when any of cmd/shift/alt/ctrl is held. Caps lock and fn don't count.
    pub fn any(self) -> bool {
        self.0 & (Self::CMD | Self::SHIFT | Self::OPT | Self::CTRL) != 0
    }

    pub fn names(self) -> Vec<String> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name.to_string())
            .collect()
    }
}

/// The select-all / copy / paste modifier of the host platform.
#[cfg(target_os = "macos")]
pub const PRIMARY_MODIFIER: &str = "cmd";
#[cfg(not(target_os = "macos"))]
pub const PRIMARY_MODIFIER: &str = "ctrl";

/// A key combo split into its modifier mask and regular keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub keys: Vec<String>,
}

impl KeyCombo {
    pub fn parse<S: AsRef<str>>(keys: &[S]) -> Self {
        let mut combo = KeyCombo::default();
        for key in keys {
            let key = key.as_ref().trim();
            if key.is_empty() {
                continue;
            }
            match Modifiers::flag_for(key) {
                Some(flag) => combo.modifiers.insert(flag),
                None => combo.keys.push(canonical_key(key)),
            }
        }
        combo
    }

    /// `"cmd+shift+s"` style input.
    pub fn parse_plus(s: &str) -> Self {
        let parts: Vec<&str> = s.split('+').collect();
        Self::parse(&parts)
    }
}

/// Lowercases multi-character names and folds aliases. Single characters keep
/// their case so typed text survives.
pub fn canonical_key(name: &str) -> String {
    if name.chars().count() == 1 {
        return name.to_string();
    }
    match name.to_lowercase().as_str() {
        "enter" => "return".to_string(),
        "esc" => "escape".to_string(),
        "arrowup" | "arrow_up" => "up".to_string(),
        "arrowdown" | "arrow_down" => "down".to_string(),
        "arrowleft" | "arrow_left" => "left".to_string(),
        "arrowright" | "arrow_right" => "right".to_string(),
        "pageup" | "pgup" => "page_up".to_string(),
        "pagedown" | "pgdn" => "page_down".to_string(),
        "capslock" => "caps_lock".to_string(),
        other => other.to_string(),
    }
}

/// Named (non-printable) macOS virtual key codes.
const MAC_NAMED: &[(&str, u16)] = &[
    ("return", 0x24),
    ("tab", 0x30),
    ("space", 0x31),
    ("backspace", 0x33),
    ("escape", 0x35),
    ("cmd", 0x37),
    ("shift", 0x38),
    ("caps_lock", 0x39),
    ("alt", 0x3A),
    ("ctrl", 0x3B),
    ("f5", 0x60),
    ("f6", 0x61),
    ("f7", 0x62),
    ("f3", 0x63),
    ("f8", 0x64),
    ("f9", 0x65),
    ("f11", 0x67),
    ("f10", 0x6D),
    ("f12", 0x6F),
    ("home", 0x73),
    ("page_up", 0x74),
    ("delete", 0x75),
    ("f4", 0x76),
    ("end", 0x77),
    ("f2", 0x78),
    ("page_down", 0x79),
    ("f1", 0x7A),
    ("left", 0x7B),
    ("right", 0x7C),
    ("down", 0x7D),
    ("up", 0x7E),
];

/// macOS key codes for printable keys: (keycode, plain, shifted).
const MAC_CHARS: &[(u16, char, char)] = &[
    (0, 'a', 'A'), (11, 'b', 'B'), (8, 'c', 'C'), (2, 'd', 'D'), (14, 'e', 'E'),
    (3, 'f', 'F'), (5, 'g', 'G'), (4, 'h', 'H'), (34, 'i', 'I'), (38, 'j', 'J'),
    (40, 'k', 'K'), (37, 'l', 'L'), (46, 'm', 'M'), (45, 'n', 'N'), (31, 'o', 'O'),
    (35, 'p', 'P'), (12, 'q', 'Q'), (15, 'r', 'R'), (1, 's', 'S'), (17, 't', 'T'),
    (32, 'u', 'U'), (9, 'v', 'V'), (13, 'w', 'W'), (7, 'x', 'X'), (16, 'y', 'Y'),
    (6, 'z', 'Z'),
    (29, '0', ')'), (18, '1', '!'), (19, '2', '@'), (20, '3', '#'), (21, '4', '$'),
    (23, '5', '%'), (22, '6', '^'), (26, '7', '&'), (28, '8', '*'), (25, '9', '('),
    (27, '-', '_'), (24, '=', '+'), (33, '[', '{'), (30, ']', '}'), (42, '\\', '|'),
    (41, ';', ':'), (39, '\'', '"'), (43, ',', '<'), (47, '.', '>'), (44, '/', '?'),
    (50, '`', '~'),
];

/// macOS key code for a key name or single character.
pub fn mac_keycode(name: &str) -> Option<u16> {
    let name = canonical_key(name);
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.clone().next()) {
        if c == ' ' {
            return Some(0x31);
        }
        return MAC_CHARS
            .iter()
            .find(|(_, plain, shifted)| *plain == c || *shifted == c)
            .map(|(code, _, _)| *code);
    }
    let name = match Modifiers::flag_for(&name) {
        Some(Modifiers::CMD) => "cmd",
        Some(Modifiers::SHIFT) => "shift",
        Some(Modifiers::OPT) => "alt",
        Some(Modifiers::CTRL) => "ctrl",
        _ => name.as_str(),
    };
    MAC_NAMED.iter().find(|(n, _)| *n == name).map(|(_, code)| *code)
}

/// Name for a non-printable macOS key code (return, arrows, f-keys...).
/// Modifier keys are excluded.
pub fn mac_key_name(keycode: u16) -> Option<&'static str> {
    MAC_NAMED
        .iter()
        .filter(|(n, _)| !matches!(*n, "cmd" | "shift" | "alt" | "ctrl" | "caps_lock"))
        .find(|(_, code)| *code == keycode)
        .map(|(n, _)| *n)
}

/// Printable character for a macOS key code.
pub fn mac_keycode_char(keycode: u16, shift: bool) -> Option<char> {
    MAC_CHARS
        .iter()
        .find(|(code, _, _)| *code == keycode)
        .map(|(_, plain, shifted)| if shift { *shifted } else { *plain })
}

/// Named Windows virtual-key codes.
const VK_NAMED: &[(&str, u16)] = &[
    ("backspace", 0x08),
    ("tab", 0x09),
    ("return", 0x0D),
    ("shift", 0x10),
    ("ctrl", 0x11),
    ("alt", 0x12),
    ("caps_lock", 0x14),
    ("escape", 0x1B),
    ("space", 0x20),
    ("page_up", 0x21),
    ("page_down", 0x22),
    ("end", 0x23),
    ("home", 0x24),
    ("left", 0x25),
    ("up", 0x26),
    ("right", 0x27),
    ("down", 0x28),
    ("delete", 0x2E),
    ("cmd", 0x5B),
    ("f1", 0x70),
    ("f2", 0x71),
    ("f3", 0x72),
    ("f4", 0x73),
    ("f5", 0x74),
    ("f6", 0x75),
    ("f7", 0x76),
    ("f8", 0x77),
    ("f9", 0x78),
    ("f10", 0x79),
    ("f11", 0x7A),
    ("f12", 0x7B),
];

const VK_PUNCT: &[(char, u16)] = &[
    (';', 0xBA),
    ('=', 0xBB),
    (',', 0xBC),
    ('-', 0xBD),
    ('.', 0xBE),
    ('/', 0xBF),
    ('`', 0xC0),
    ('[', 0xDB),
    ('\\', 0xDC),
    (']', 0xDD),
    ('\'', 0xDE),
];

/// Windows virtual-key code for a key name or single character.
pub fn virtual_key(name: &str) -> Option<u16> {
    let name = canonical_key(name);
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.clone().next()) {
        return match c {
            ' ' => Some(0x20),
            'a'..='z' | 'A'..='Z' => Some(c.to_ascii_uppercase() as u16),
            '0'..='9' => Some(c as u16),
            _ => VK_PUNCT.iter().find(|(p, _)| *p == c).map(|(_, vk)| *vk),
        };
    }
    let name = match Modifiers::flag_for(&name) {
        Some(Modifiers::CMD) => "cmd",
        Some(Modifiers::SHIFT) => "shift",
        Some(Modifiers::OPT) => "alt",
        Some(Modifiers::CTRL) => "ctrl",
        _ => name.as_str(),
    };
    VK_NAMED.iter().find(|(n, _)| *n == name).map(|(_, vk)| *vk)
}

/// Name for a non-printable Windows virtual-key code, modifiers excluded.
pub fn vk_name(vk: u16) -> Option<&'static str> {
    VK_NAMED
        .iter()
        .filter(|(n, _)| !matches!(*n, "cmd" | "shift" | "alt" | "ctrl" | "caps_lock"))
        .find(|(_, code)| *code == vk)
        .map(|(n, _)| *n)
}
