//! Symbolic keys and chords, and their terminal byte sequences.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Keyboard key for terminal input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    // Character keys
    /// Regular character, sent literally
    Char(char),

    // Navigation
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Home key
    Home,
    /// End key
    End,
    /// Page Up
    PageUp,
    /// Page Down
    PageDown,

    // Actions
    /// Enter/Return key
    Enter,
    /// Tab key
    Tab,
    /// Escape key
    Escape,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Space key
    Space,
    /// Insert key
    Insert,

    /// Function key F1..=F12
    F(u8),

    // Modified keys
    /// Ctrl + character
    Ctrl(char),
    /// Alt + character
    Alt(char),
    /// Shift + key
    Shift(Box<Key>),
    /// Ctrl + Alt + character
    CtrlAlt(char),
}

#[derive(Default)]
struct Modifiers {
    ctrl: bool,
    alt: bool,
    shift: bool,
}

impl Key {
    /// Parse a key name or a `+`-joined chord.
    ///
    /// Examples:
    /// - "a" -> Key::Char('a')
    /// - "Enter" / "Return" -> Key::Enter
    /// - "ArrowUp" / "Up" -> Key::Up
    /// - "Ctrl+c" -> Key::Ctrl('c')
    /// - "Shift+Tab" -> Key::Shift(Tab)
    pub fn parse(s: &str) -> Result<Self> {
        if s.chars().count() > 1 && s.contains('+') {
            let parts: Vec<&str> = s.split('+').collect();
            return Self::chord(&parts);
        }
        if let Some(key) = Self::named(s) {
            return Ok(key);
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Key::Char(c)),
            _ => Err(Error::InvalidKey(format!("unknown key name: {s}"))),
        }
    }

    /// Build a key from a chord: every part but the last is a modifier.
    ///
    /// Recognized modifiers are `ctrl`/`control`, `alt`/`meta`/`option` and
    /// `shift`, matched case-insensitively.
    pub fn chord(parts: &[&str]) -> Result<Self> {
        let Some((base, modifier_names)) = parts.split_last() else {
            return Err(Error::InvalidKey("empty chord".to_string()));
        };
        if modifier_names.is_empty() {
            return Self::parse(base);
        }

        let mut modifiers = Modifiers::default();
        for name in modifier_names {
            match name.trim().to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "meta" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                other => {
                    return Err(Error::InvalidKey(format!(
                        "unknown modifier {other:?} in chord {}",
                        parts.join("+")
                    )))
                }
            }
        }

        let single = {
            let mut chars = base.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        };

        match (modifiers, single) {
            (Modifiers { ctrl: true, alt: true, .. }, Some(c)) => Ok(Key::CtrlAlt(c)),
            (Modifiers { ctrl: true, .. }, Some(c)) => Ok(Key::Ctrl(c)),
            (Modifiers { alt: true, .. }, Some(c)) => Ok(Key::Alt(c)),
            (
                Modifiers {
                    shift: true,
                    ctrl: false,
                    alt: false,
                },
                _,
            ) => Ok(Key::Shift(Box::new(Self::parse(base)?))),
            _ => Err(Error::InvalidKey(format!(
                "unsupported chord: {}",
                parts.join("+")
            ))),
        }
    }

    fn named(name: &str) -> Option<Key> {
        let key = match name {
            "Enter" | "Return" => Key::Enter,
            "Tab" => Key::Tab,
            "Escape" | "Esc" => Key::Escape,
            "Backspace" => Key::Backspace,
            "Delete" | "Del" => Key::Delete,
            "Space" => Key::Space,
            "Insert" | "Ins" => Key::Insert,
            "Up" | "ArrowUp" => Key::Up,
            "Down" | "ArrowDown" => Key::Down,
            "Left" | "ArrowLeft" => Key::Left,
            "Right" | "ArrowRight" => Key::Right,
            "Home" => Key::Home,
            "End" => Key::End,
            "PageUp" | "PgUp" => Key::PageUp,
            "PageDown" | "PgDn" => Key::PageDown,
            _ => {
                let n: u8 = name.strip_prefix('F')?.parse().ok()?;
                if !(1..=12).contains(&n) {
                    return None;
                }
                Key::F(n)
            }
        };
        Some(key)
    }

    /// Convert key to terminal escape sequence bytes.
    pub fn to_escape_sequence(&self) -> Vec<u8> {
        match self {
            Key::Char(c) => c.to_string().into_bytes(),
            Key::Enter => vec![0x0D],
            Key::Tab => vec![0x09],
            Key::Escape => vec![0x1B],
            Key::Backspace => vec![0x7F],
            Key::Delete => b"\x1b[3~".to_vec(),
            Key::Space => vec![0x20],
            Key::Insert => b"\x1b[2~".to_vec(),
            Key::Up => b"\x1b[A".to_vec(),
            Key::Down => b"\x1b[B".to_vec(),
            Key::Right => b"\x1b[C".to_vec(),
            Key::Left => b"\x1b[D".to_vec(),
            Key::Home => b"\x1b[H".to_vec(),
            Key::End => b"\x1b[F".to_vec(),
            Key::PageUp => b"\x1b[5~".to_vec(),
            Key::PageDown => b"\x1b[6~".to_vec(),
            Key::F(n) => function_key_sequence(*n),
            Key::Ctrl(c) => control_bytes(*c),
            Key::Alt(c) => {
                let mut seq = vec![0x1B];
                seq.extend(c.to_string().bytes());
                seq
            }
            Key::Shift(inner) => match inner.as_ref() {
                Key::Tab => b"\x1b[Z".to_vec(),
                Key::Up => b"\x1b[1;2A".to_vec(),
                Key::Down => b"\x1b[1;2B".to_vec(),
                Key::Right => b"\x1b[1;2C".to_vec(),
                Key::Left => b"\x1b[1;2D".to_vec(),
                Key::Char(c) => c.to_uppercase().to_string().into_bytes(),
                _ => inner.to_escape_sequence(),
            },
            Key::CtrlAlt(c) => {
                let mut seq = vec![0x1B];
                seq.extend(control_bytes(*c));
                seq
            }
        }
    }
}

/// Control character for `c`: its uppercase code minus 64 when that lands in
/// the C0 range, otherwise the character itself.
fn control_bytes(c: char) -> Vec<u8> {
    let code = c.to_ascii_uppercase() as u32;
    if (64..=95).contains(&code) {
        vec![(code - 64) as u8]
    } else {
        c.to_string().into_bytes()
    }
}

fn function_key_sequence(n: u8) -> Vec<u8> {
    let seq: &[u8] = match n {
        1 => b"\x1bOP",
        2 => b"\x1bOQ",
        3 => b"\x1bOR",
        4 => b"\x1bOS",
        5 => b"\x1b[15~",
        6 => b"\x1b[17~",
        7 => b"\x1b[18~",
        8 => b"\x1b[19~",
        9 => b"\x1b[20~",
        10 => b"\x1b[21~",
        11 => b"\x1b[23~",
        12 => b"\x1b[24~",
        _ => b"",
    };
    seq.to_vec()
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Up => write!(f, "Up"),
            Key::Down => write!(f, "Down"),
            Key::Left => write!(f, "Left"),
            Key::Right => write!(f, "Right"),
            Key::Home => write!(f, "Home"),
            Key::End => write!(f, "End"),
            Key::PageUp => write!(f, "PageUp"),
            Key::PageDown => write!(f, "PageDown"),
            Key::Enter => write!(f, "Enter"),
            Key::Tab => write!(f, "Tab"),
            Key::Escape => write!(f, "Escape"),
            Key::Backspace => write!(f, "Backspace"),
            Key::Delete => write!(f, "Delete"),
            Key::Space => write!(f, "Space"),
            Key::Insert => write!(f, "Insert"),
            Key::F(n) => write!(f, "F{n}"),
            Key::Ctrl(c) => write!(f, "Ctrl+{c}"),
            Key::Alt(c) => write!(f, "Alt+{c}"),
            Key::Shift(k) => write!(f, "Shift+{k}"),
            Key::CtrlAlt(c) => write!(f, "Ctrl+Alt+{c}"),
        }
    }
}
