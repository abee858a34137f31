//! Key model shared by the dispatcher and the per-context routers
//!
//! `HostKey` names the host's physical keys. The lookup tables at the bottom of
//! this module classify a host key into what the immediate-mode layer
//! understands: a pointer button, a named key, a modifier, or a character.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Physical key as reported by the host
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HostKey {
    /// Unbound chord side
    Invalid,
    /// Placeholder used when asking whether any key could be routed
    AnyKey,

    LeftMouseButton,
    RightMouseButton,
    MiddleMouseButton,
    ThumbMouseButton,
    ThumbMouseButton2,
    MouseWheelAxis,
    /// Pointer motion, always routable while the context is visible
    Mouse2D,

    BackSpace,
    Tab,
    Enter,
    Pause,
    CapsLock,
    Escape,
    SpaceBar,
    PageUp,
    PageDown,
    End,
    Home,
    Left,
    Up,
    Right,
    Down,
    Insert,
    Delete,

    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,

    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,

    NumPadZero,
    NumPadOne,
    NumPadTwo,
    NumPadThree,
    NumPadFour,
    NumPadFive,
    NumPadSix,
    NumPadSeven,
    NumPadEight,
    NumPadNine,
    Multiply,
    Add,
    Subtract,
    Decimal,
    Divide,

    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,

    NumLock,
    ScrollLock,

    LeftShift,
    RightShift,
    LeftControl,
    RightControl,
    LeftAlt,
    RightAlt,
    LeftCommand,
    RightCommand,

    Semicolon,
    Equals,
    Comma,
    Hyphen,
    Period,
    Slash,
    Tilde,
    LeftBracket,
    Backslash,
    RightBracket,
    Apostrophe,

    GamepadLeftThumbstick,
    GamepadRightThumbstick,
    GamepadSpecialLeft,
    GamepadSpecialRight,
    GamepadFaceButtonBottom,
    GamepadFaceButtonRight,
    GamepadFaceButtonLeft,
    GamepadFaceButtonTop,
    GamepadLeftShoulder,
    GamepadRightShoulder,
    GamepadLeftTrigger,
    GamepadRightTrigger,
    GamepadDPadUp,
    GamepadDPadDown,
    GamepadDPadRight,
    GamepadDPadLeft,
    GamepadLeftStickUp,
    GamepadLeftStickDown,
    GamepadLeftStickRight,
    GamepadLeftStickLeft,
    GamepadRightStickUp,
    GamepadRightStickDown,
    GamepadRightStickRight,
    GamepadRightStickLeft,
}

impl HostKey {
    /// False only for [`HostKey::Invalid`]
    pub fn is_valid(self) -> bool {
        self != HostKey::Invalid
    }

    /// Pointer buttons and pointer axes, following the host's convention
    pub fn is_mouse_button(self) -> bool {
        matches!(
            self,
            HostKey::LeftMouseButton
                | HostKey::RightMouseButton
                | HostKey::MiddleMouseButton
                | HostKey::ThumbMouseButton
                | HostKey::ThumbMouseButton2
                | HostKey::MouseWheelAxis
                | HostKey::Mouse2D
        )
    }
}

/// Edge reported with a key event
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InputEventKind {
    Pressed,
    Repeat,
    Released,
    DoubleClick,
}

impl InputEventKind {
    /// Press, repeat and double-click all mean "key is down"
    pub fn is_press_like(self) -> bool {
        !matches!(self, InputEventKind::Released)
    }

    /// Edges that may fire a global chord
    pub fn is_chord_edge(self) -> bool {
        matches!(self, InputEventKind::Pressed | InputEventKind::DoubleClick)
    }
}

/// Pointer buttons understood by the immediate-mode layer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImMouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys understood by the immediate-mode layer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImModifier {
    Ctrl,
    Shift,
    Alt,
    Super,
}

bitflags::bitflags! {
    /// Set of modifiers currently held on the immediate-mode side
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ImModifiers: u8 {
        const CTRL = 1 << 0;
        const SHIFT = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

impl From<ImModifier> for ImModifiers {
    fn from(modifier: ImModifier) -> Self {
        match modifier {
            ImModifier::Ctrl => ImModifiers::CTRL,
            ImModifier::Shift => ImModifiers::SHIFT,
            ImModifier::Alt => ImModifiers::ALT,
            ImModifier::Super => ImModifiers::SUPER,
        }
    }
}

/// Named keys understood by the immediate-mode layer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImKey {
    Tab,
    LeftArrow,
    RightArrow,
    UpArrow,
    DownArrow,
    PageUp,
    PageDown,
    Home,
    End,
    Insert,
    Delete,
    Backspace,
    Space,
    Enter,
    Escape,
    Pause,
    CapsLock,
    ScrollLock,
    NumLock,
    LeftCtrl,
    LeftShift,
    LeftAlt,
    LeftSuper,
    RightCtrl,
    RightShift,
    RightAlt,
    RightSuper,
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    Keypad0,
    Keypad1,
    Keypad2,
    Keypad3,
    Keypad4,
    Keypad5,
    Keypad6,
    Keypad7,
    Keypad8,
    Keypad9,
    KeypadMultiply,
    KeypadAdd,
    KeypadSubtract,
    KeypadDecimal,
    KeypadDivide,
    Apostrophe,
    Comma,
    Minus,
    Period,
    Slash,
    Semicolon,
    Equal,
    LeftBracket,
    Backslash,
    RightBracket,
    GraveAccent,
    GamepadStart,
    GamepadBack,
    GamepadFaceLeft,
    GamepadFaceRight,
    GamepadFaceUp,
    GamepadFaceDown,
    GamepadDpadLeft,
    GamepadDpadRight,
    GamepadDpadUp,
    GamepadDpadDown,
    GamepadL1,
    GamepadR1,
    GamepadL2,
    GamepadR2,
    GamepadL3,
    GamepadR3,
    GamepadLStickLeft,
    GamepadLStickRight,
    GamepadLStickUp,
    GamepadLStickDown,
    GamepadRStickLeft,
    GamepadRStickRight,
    GamepadRStickUp,
    GamepadRStickDown,
}

/// What a host key means to the immediate-mode layer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ApiKey {
    Mouse(ImMouseButton),
    Modifier(ImModifier),
    Key(ImKey),
}

/// Classify a host key, modifiers first
pub fn classify(key: HostKey) -> Option<ApiKey> {
    api_modifier(key)
        .map(ApiKey::Modifier)
        .or_else(|| api_mouse_button(key).map(ApiKey::Mouse))
        .or_else(|| api_key(key).map(ApiKey::Key))
}

/// Pointer-button table
pub fn api_mouse_button(key: HostKey) -> Option<ImMouseButton> {
    match key {
        HostKey::LeftMouseButton => Some(ImMouseButton::Left),
        HostKey::RightMouseButton => Some(ImMouseButton::Right),
        HostKey::MiddleMouseButton => Some(ImMouseButton::Middle),
        _ => None,
    }
}

/// Modifier table
///
/// Control is the shortcut modifier everywhere except macOS, where Command
/// plays that role and Control is left to the key table.
pub fn api_modifier(key: HostKey) -> Option<ImModifier> {
    match key {
        HostKey::LeftShift | HostKey::RightShift => Some(ImModifier::Shift),
        HostKey::LeftAlt | HostKey::RightAlt => Some(ImModifier::Alt),
        HostKey::LeftControl | HostKey::RightControl if !cfg!(target_os = "macos") => {
            Some(ImModifier::Ctrl)
        }
        HostKey::LeftCommand | HostKey::RightCommand if cfg!(target_os = "macos") => {
            Some(ImModifier::Super)
        }
        _ => None,
    }
}

/// Keyboard and gamepad table
pub fn api_key(key: HostKey) -> Option<ImKey> {
    let key = match key {
        HostKey::BackSpace => ImKey::Backspace,
        HostKey::Tab => ImKey::Tab,
        HostKey::Enter => ImKey::Enter,
        HostKey::Pause => ImKey::Pause,
        HostKey::CapsLock => ImKey::CapsLock,
        HostKey::Escape => ImKey::Escape,
        HostKey::SpaceBar => ImKey::Space,
        HostKey::PageUp => ImKey::PageUp,
        HostKey::PageDown => ImKey::PageDown,
        HostKey::End => ImKey::End,
        HostKey::Home => ImKey::Home,
        HostKey::Left => ImKey::LeftArrow,
        HostKey::Up => ImKey::UpArrow,
        HostKey::Right => ImKey::RightArrow,
        HostKey::Down => ImKey::DownArrow,
        HostKey::Insert => ImKey::Insert,
        HostKey::Delete => ImKey::Delete,

        HostKey::Zero => ImKey::Key0,
        HostKey::One => ImKey::Key1,
        HostKey::Two => ImKey::Key2,
        HostKey::Three => ImKey::Key3,
        HostKey::Four => ImKey::Key4,
        HostKey::Five => ImKey::Key5,
        HostKey::Six => ImKey::Key6,
        HostKey::Seven => ImKey::Key7,
        HostKey::Eight => ImKey::Key8,
        HostKey::Nine => ImKey::Key9,

        HostKey::A => ImKey::A,
        HostKey::B => ImKey::B,
        HostKey::C => ImKey::C,
        HostKey::D => ImKey::D,
        HostKey::E => ImKey::E,
        HostKey::F => ImKey::F,
        HostKey::G => ImKey::G,
        HostKey::H => ImKey::H,
        HostKey::I => ImKey::I,
        HostKey::J => ImKey::J,
        HostKey::K => ImKey::K,
        HostKey::L => ImKey::L,
        HostKey::M => ImKey::M,
        HostKey::N => ImKey::N,
        HostKey::O => ImKey::O,
        HostKey::P => ImKey::P,
        HostKey::Q => ImKey::Q,
        HostKey::R => ImKey::R,
        HostKey::S => ImKey::S,
        HostKey::T => ImKey::T,
        HostKey::U => ImKey::U,
        HostKey::V => ImKey::V,
        HostKey::W => ImKey::W,
        HostKey::X => ImKey::X,
        HostKey::Y => ImKey::Y,
        HostKey::Z => ImKey::Z,

        HostKey::NumPadZero => ImKey::Keypad0,
        HostKey::NumPadOne => ImKey::Keypad1,
        HostKey::NumPadTwo => ImKey::Keypad2,
        HostKey::NumPadThree => ImKey::Keypad3,
        HostKey::NumPadFour => ImKey::Keypad4,
        HostKey::NumPadFive => ImKey::Keypad5,
        HostKey::NumPadSix => ImKey::Keypad6,
        HostKey::NumPadSeven => ImKey::Keypad7,
        HostKey::NumPadEight => ImKey::Keypad8,
        HostKey::NumPadNine => ImKey::Keypad9,
        HostKey::Multiply => ImKey::KeypadMultiply,
        HostKey::Add => ImKey::KeypadAdd,
        HostKey::Subtract => ImKey::KeypadSubtract,
        HostKey::Decimal => ImKey::KeypadDecimal,
        HostKey::Divide => ImKey::KeypadDivide,

        HostKey::F1 => ImKey::F1,
        HostKey::F2 => ImKey::F2,
        HostKey::F3 => ImKey::F3,
        HostKey::F4 => ImKey::F4,
        HostKey::F5 => ImKey::F5,
        HostKey::F6 => ImKey::F6,
        HostKey::F7 => ImKey::F7,
        HostKey::F8 => ImKey::F8,
        HostKey::F9 => ImKey::F9,
        HostKey::F10 => ImKey::F10,
        HostKey::F11 => ImKey::F11,
        HostKey::F12 => ImKey::F12,

        HostKey::NumLock => ImKey::NumLock,
        HostKey::ScrollLock => ImKey::ScrollLock,

        HostKey::LeftShift => ImKey::LeftShift,
        HostKey::RightShift => ImKey::RightShift,
        HostKey::LeftControl => ImKey::LeftCtrl,
        HostKey::RightControl => ImKey::RightCtrl,
        HostKey::LeftAlt => ImKey::LeftAlt,
        HostKey::RightAlt => ImKey::RightAlt,
        HostKey::LeftCommand => ImKey::LeftSuper,
        HostKey::RightCommand => ImKey::RightSuper,

        HostKey::Semicolon => ImKey::Semicolon,
        HostKey::Equals => ImKey::Equal,
        HostKey::Comma => ImKey::Comma,
        HostKey::Hyphen => ImKey::Minus,
        HostKey::Period => ImKey::Period,
        HostKey::Slash => ImKey::Slash,
        HostKey::Tilde => ImKey::GraveAccent,
        HostKey::LeftBracket => ImKey::LeftBracket,
        HostKey::Backslash => ImKey::Backslash,
        HostKey::RightBracket => ImKey::RightBracket,
        HostKey::Apostrophe => ImKey::Apostrophe,

        HostKey::GamepadLeftThumbstick => ImKey::GamepadL3,
        HostKey::GamepadRightThumbstick => ImKey::GamepadR3,
        HostKey::GamepadSpecialLeft => ImKey::GamepadBack,
        HostKey::GamepadSpecialRight => ImKey::GamepadStart,
        HostKey::GamepadFaceButtonBottom => ImKey::GamepadFaceDown,
        HostKey::GamepadFaceButtonRight => ImKey::GamepadFaceRight,
        HostKey::GamepadFaceButtonLeft => ImKey::GamepadFaceLeft,
        HostKey::GamepadFaceButtonTop => ImKey::GamepadFaceUp,
        HostKey::GamepadLeftShoulder => ImKey::GamepadL1,
        HostKey::GamepadRightShoulder => ImKey::GamepadR1,
        HostKey::GamepadLeftTrigger => ImKey::GamepadL2,
        HostKey::GamepadRightTrigger => ImKey::GamepadR2,
        HostKey::GamepadDPadUp => ImKey::GamepadDpadUp,
        HostKey::GamepadDPadDown => ImKey::GamepadDpadDown,
        HostKey::GamepadDPadRight => ImKey::GamepadDpadRight,
        HostKey::GamepadDPadLeft => ImKey::GamepadDpadLeft,
        HostKey::GamepadLeftStickUp => ImKey::GamepadLStickUp,
        HostKey::GamepadLeftStickDown => ImKey::GamepadLStickDown,
        HostKey::GamepadLeftStickRight => ImKey::GamepadLStickRight,
        HostKey::GamepadLeftStickLeft => ImKey::GamepadLStickLeft,
        HostKey::GamepadRightStickUp => ImKey::GamepadRStickUp,
        HostKey::GamepadRightStickDown => ImKey::GamepadRStickDown,
        HostKey::GamepadRightStickRight => ImKey::GamepadRStickRight,
        HostKey::GamepadRightStickLeft => ImKey::GamepadRStickLeft,

        _ => return None,
    };
    Some(key)
}

/// Fallback characters for keypad keys the host key manager may not map
///
/// `Decimal` always yields `'.'`, whatever the keyboard locale. Hosts that
/// want a locale separator such as `','` should map the key themselves
/// through [`InputHost::char_for_key`](crate::InputHost::char_for_key),
/// which is consulted first.
pub fn keypad_char(key: HostKey) -> Option<char> {
    match key {
        HostKey::NumPadZero => Some('0'),
        HostKey::NumPadOne => Some('1'),
        HostKey::NumPadTwo => Some('2'),
        HostKey::NumPadThree => Some('3'),
        HostKey::NumPadFour => Some('4'),
        HostKey::NumPadFive => Some('5'),
        HostKey::NumPadSix => Some('6'),
        HostKey::NumPadSeven => Some('7'),
        HostKey::NumPadEight => Some('8'),
        HostKey::NumPadNine => Some('9'),
        HostKey::Multiply => Some('*'),
        HostKey::Add => Some('+'),
        HostKey::Subtract => Some('-'),
        HostKey::Decimal => Some('.'),
        HostKey::Divide => Some('/'),
        _ => None,
    }
}

/// Key substitution applied before classification
#[derive(Clone, Debug, Default)]
pub struct KeyRemap {
    aliases: HashMap<HostKey, HostKey>,
}

impl KeyRemap {
    /// Build a remap table from `(from, to)` pairs
    pub fn new(aliases: impl IntoIterator<Item = (HostKey, HostKey)>) -> Self {
        Self {
            aliases: aliases.into_iter().collect(),
        }
    }

    /// Identity for unmapped keys
    pub fn apply(&self, key: HostKey) -> HostKey {
        self.aliases.get(&key).copied().unwrap_or(key)
    }

    pub fn is_identity(&self) -> bool {
        self.aliases.is_empty()
    }
}
