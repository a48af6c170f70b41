//! Host platform signals consumed by the observers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The class of platform event a signal belongs to. Observers subscribe per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalClass {
    Visibility,
    Focus,
    Clipboard,
    ContextMenu,
    Keyboard,
    Fullscreen,
}

impl fmt::Display for SignalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalClass::Visibility => "visibility",
            SignalClass::Focus => "focus",
            SignalClass::Clipboard => "clipboard",
            SignalClass::ContextMenu => "context_menu",
            SignalClass::Keyboard => "keyboard",
            SignalClass::Fullscreen => "fullscreen",
        };
        f.write_str(name)
    }
}

/// Where a keyboard event was aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTarget {
    TextInput,
    TextArea,
    ContentEditable,
    /// Question text and any other exam content.
    Protected,
}

impl SignalTarget {
    /// Free-text regions hold the candidate's own answer; clipboard shortcuts stay usable there.
    pub fn is_free_text(self) -> bool {
        matches!(
            self,
            SignalTarget::TextInput | SignalTarget::TextArea | SignalTarget::ContentEditable
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Char(char),
    Insert,
    Delete,
    Other(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

/// A key press together with its held modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

/// Clipboard operation a key combination is equivalent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardShortcut {
    Copy,
    Cut,
}

impl KeyCombo {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Ctrl/Cmd + `c`.
    pub fn ctrl(ch: char) -> Self {
        Self::new(
            Key::Char(ch),
            Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        )
    }

    /// Which clipboard operation, if any, this combination triggers.
    ///
    /// Copy: Ctrl/Meta+C, Ctrl+Insert. Cut: Ctrl/Meta+X, Shift+Delete.
    pub fn clipboard_shortcut(&self) -> Option<ClipboardShortcut> {
        let m = self.modifiers;
        let command = m.ctrl || m.meta;
        match &self.key {
            Key::Char(c) if command && !m.alt => match c.to_ascii_lowercase() {
                'c' => Some(ClipboardShortcut::Copy),
                'x' => Some(ClipboardShortcut::Cut),
                _ => None,
            },
            Key::Insert if m.ctrl && !m.shift => Some(ClipboardShortcut::Copy),
            Key::Delete if m.shift && !command => Some(ClipboardShortcut::Cut),
            _ => None,
        }
    }
}

/// A classified event delivered by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostSignal {
    VisibilityChange { hidden: bool },
    WindowBlur,
    WindowFocus,
    Copy,
    Cut,
    ContextMenu,
    KeyDown { combo: KeyCombo, target: SignalTarget },
    FullscreenChange { is_fullscreen: bool },
}

impl HostSignal {
    pub fn class(&self) -> SignalClass {
        match self {
            HostSignal::VisibilityChange { .. } => SignalClass::Visibility,
            HostSignal::WindowBlur | HostSignal::WindowFocus => SignalClass::Focus,
            HostSignal::Copy | HostSignal::Cut => SignalClass::Clipboard,
            HostSignal::ContextMenu => SignalClass::ContextMenu,
            HostSignal::KeyDown { .. } => SignalClass::Keyboard,
            HostSignal::FullscreenChange { .. } => SignalClass::Fullscreen,
        }
    }
}

/// What the host should do with the signal's default action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignalDisposition {
    #[default]
    Allow,
    PreventDefault,
}

impl SignalDisposition {
    pub fn is_blocked(self) -> bool {
        self == SignalDisposition::PreventDefault
    }

    /// Blocking wins when several observers answer the same signal.
    pub fn merge(self, other: SignalDisposition) -> SignalDisposition {
        if self.is_blocked() || other.is_blocked() {
            SignalDisposition::PreventDefault
        } else {
            SignalDisposition::Allow
        }
    }
}
