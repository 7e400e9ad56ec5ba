//! Keyboard keys and key-filter matching.
//!
//! Two views of the keyboard live here:
//!
//! - [`Key`], the ergonomic constants a caller presses through the client
//!   (`client.press(sel, Key::Enter)`), each carrying its DOM `key`, `code`,
//!   and legacy `keyCode` values;
//! - [`KeyFilter`], the parsed form of key tokens in handler modifiers
//!   (`data-modifiers-keydown="enter"`), matched against an incoming key
//!   event with a physical-code fallback for layout-shifted characters.

// ============================================================================
// Key Enum
// ============================================================================

/// Common keyboard keys for synthetic key events.
///
/// For typing text into a control, use the client's `input` instead; `Key`
/// covers the navigation and control keys servers bind handlers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
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
    /// Space bar
    Space,
    /// Arrow Up
    ArrowUp,
    /// Arrow Down
    ArrowDown,
    /// Arrow Left
    ArrowLeft,
    /// Arrow Right
    ArrowRight,
}

impl Key {
    /// Returns the key properties: (key, code, keyCode, printable).
    #[must_use]
    pub fn properties(self) -> (&'static str, &'static str, u32, bool) {
        match self {
            Key::Enter => ("Enter", "Enter", 13, false),
            Key::Tab => ("Tab", "Tab", 9, false),
            Key::Escape => ("Escape", "Escape", 27, false),
            Key::Backspace => ("Backspace", "Backspace", 8, false),
            Key::Delete => ("Delete", "Delete", 46, false),
            Key::Space => (" ", "Space", 32, true),
            Key::ArrowUp => ("ArrowUp", "ArrowUp", 38, false),
            Key::ArrowDown => ("ArrowDown", "ArrowDown", 40, false),
            Key::ArrowLeft => ("ArrowLeft", "ArrowLeft", 37, false),
            Key::ArrowRight => ("ArrowRight", "ArrowRight", 39, false),
        }
    }

    /// Returns the DOM `key` value string.
    #[inline]
    #[must_use]
    pub fn key(self) -> &'static str {
        self.properties().0
    }

    /// Returns the DOM `code` string.
    #[inline]
    #[must_use]
    pub fn code(self) -> &'static str {
        self.properties().1
    }

    /// Returns the legacy `keyCode`.
    #[inline]
    #[must_use]
    pub fn key_code(self) -> u32 {
        self.properties().2
    }

    /// Returns whether this key produces printable output.
    #[inline]
    #[must_use]
    pub fn is_printable(self) -> bool {
        self.properties().3
    }
}

// ============================================================================
// KeyFilter
// ============================================================================

/// One key requirement declared in handler modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFilter {
    Enter,
    Escape,
    Space,
    Tab,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    /// Any single printable character, matched case-insensitively.
    Char(char),
}

impl KeyFilter {
    /// Parses one modifier token into a key filter.
    ///
    /// Accepts the named forms (`enter`, `esc`/`escape`, `space`, `tab`,
    /// `up`/`arrowup`, ...) and any single-character token. Returns `None`
    /// for tokens that are not key filters.
    #[must_use]
    pub(crate) fn parse(token: &str) -> Option<Self> {
        let filter = match token {
            "enter" => Self::Enter,
            "esc" | "escape" => Self::Escape,
            "space" => Self::Space,
            "tab" => Self::Tab,
            "up" | "arrowup" | "arrow-up" => Self::ArrowUp,
            "down" | "arrowdown" | "arrow-down" => Self::ArrowDown,
            "left" | "arrowleft" | "arrow-left" => Self::ArrowLeft,
            "right" | "arrowright" | "arrow-right" => Self::ArrowRight,
            _ => {
                let mut chars = token.chars();
                let first = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                Self::Char(first.to_ascii_lowercase())
            }
        };
        Some(filter)
    }

    /// Matches the filter against an incoming key event.
    ///
    /// Character filters first compare the logical `key`; when that misses,
    /// the physical `code` (`KeyA`, `Digit5`) decides, so a handler bound to
    /// `"a"` still fires on a layout where the A key produces another glyph.
    #[must_use]
    pub fn matches(self, key: &str, code: Option<&str>) -> bool {
        match self {
            Self::Enter => key == "Enter",
            Self::Escape => key == "Escape" || key == "Esc",
            Self::Space => key == " " || key == "Space" || key == "Spacebar",
            Self::Tab => key == "Tab",
            Self::ArrowUp => key == "ArrowUp" || key == "Up",
            Self::ArrowDown => key == "ArrowDown" || key == "Down",
            Self::ArrowLeft => key == "ArrowLeft" || key == "Left",
            Self::ArrowRight => key == "ArrowRight" || key == "Right",
            Self::Char(ch) => {
                let mut chars = key.chars();
                if let (Some(first), None) = (chars.next(), chars.next()) {
                    if first.to_ascii_lowercase() == ch {
                        return true;
                    }
                }
                code.and_then(char_from_code) == Some(ch)
            }
        }
    }
}

/// Maps a physical key code (`KeyA`, `Digit5`) to its base character.
fn char_from_code(code: &str) -> Option<char> {
    if let Some(letter) = code.strip_prefix("Key") {
        let mut chars = letter.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return Some(ch.to_ascii_lowercase());
        }
    }
    if let Some(digit) = code.strip_prefix("Digit") {
        let mut chars = digit.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return Some(ch);
        }
    }
    None
}

/// Legacy `keyCode` for a DOM `key` value, for payloads that omit it.
#[must_use]
pub(crate) fn legacy_key_code(key: &str) -> Option<u32> {
    let code = match key {
        "Enter" => 13,
        "Tab" => 9,
        "Escape" | "Esc" => 27,
        "Backspace" => 8,
        "Delete" => 46,
        " " | "Space" | "Spacebar" => 32,
        "ArrowUp" | "Up" => 38,
        "ArrowDown" | "Down" => 40,
        "ArrowLeft" | "Left" => 37,
        "ArrowRight" | "Right" => 39,
        _ => {
            let mut chars = key.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return None;
            };
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase() as u32
            } else {
                return None;
            }
        }
    };
    Some(code)
}

// ============================================================================
// Tests
// ============================================================================
