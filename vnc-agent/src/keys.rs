//! Key names and X11 keysym values.
//!
//! The keyboard controller's stable vocabulary: a fixed table of named
//! keys, single characters in the latin-1 range mapping to their code
//! point, and raw keysym numbers passing through untouched.

/// X11 keysym values for the named keys.
#[allow(non_upper_case_globals)]
pub mod keysyms {
    pub const XK_BackSpace: u32 = 0xff08;
    pub const XK_Tab: u32 = 0xff09;
    pub const XK_Return: u32 = 0xff0d;
    pub const XK_Escape: u32 = 0xff1b;
    pub const XK_Delete: u32 = 0xffff;
    pub const XK_Home: u32 = 0xff50;
    pub const XK_End: u32 = 0xff57;
    pub const XK_Page_Up: u32 = 0xff55;
    pub const XK_Page_Down: u32 = 0xff56;
    pub const XK_Left: u32 = 0xff51;
    pub const XK_Up: u32 = 0xff52;
    pub const XK_Right: u32 = 0xff53;
    pub const XK_Down: u32 = 0xff54;
    pub const XK_F1: u32 = 0xffbe;
    pub const XK_F2: u32 = 0xffbf;
    pub const XK_F3: u32 = 0xffc0;
    pub const XK_F4: u32 = 0xffc1;
    pub const XK_F5: u32 = 0xffc2;
    pub const XK_F6: u32 = 0xffc3;
    pub const XK_F7: u32 = 0xffc4;
    pub const XK_F8: u32 = 0xffc5;
    pub const XK_F9: u32 = 0xffc6;
    pub const XK_F10: u32 = 0xffc7;
    pub const XK_F11: u32 = 0xffc8;
    pub const XK_F12: u32 = 0xffc9;
    pub const XK_Shift_L: u32 = 0xffe1;
    pub const XK_Shift_R: u32 = 0xffe2;
    pub const XK_Control_L: u32 = 0xffe3;
    pub const XK_Control_R: u32 = 0xffe4;
    pub const XK_Alt_L: u32 = 0xffe9;
    pub const XK_Alt_R: u32 = 0xffea;
    pub const XK_Super_L: u32 = 0xffeb;
    pub const XK_Meta_L: u32 = 0xffed;
    pub const XK_Caps_Lock: u32 = 0xffe5;
    pub const XK_Num_Lock: u32 = 0xff7f;
    pub const XK_Scroll_Lock: u32 = 0xff14;
    pub const XK_space: u32 = 0x0020;
}

use keysyms::*;

/// A key as callers specify it: a name from the fixed table (or a single
/// latin-1 character), or a raw X11 keysym.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    Named(&'a str),
    Keysym(u32),
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(name: &'a str) -> Self {
        Key::Named(name)
    }
}

impl From<u32> for Key<'_> {
    fn from(keysym: u32) -> Self {
        Key::Keysym(keysym)
    }
}

/// Look up a named key, case-insensitively.
///
/// Returns `None` for names outside the vocabulary.
pub fn named_keysym(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let keysym = match lower.as_str() {
        // Navigation
        "left" => XK_Left,
        "right" => XK_Right,
        "up" => XK_Up,
        "down" => XK_Down,
        "home" => XK_Home,
        "end" => XK_End,
        "pageup" => XK_Page_Up,
        "pagedown" => XK_Page_Down,
        // Editing
        "return" | "enter" => XK_Return,
        "escape" | "esc" => XK_Escape,
        "tab" => XK_Tab,
        "backspace" => XK_BackSpace,
        "delete" | "del" => XK_Delete,
        "space" => XK_space,
        // Function keys
        "f1" => XK_F1,
        "f2" => XK_F2,
        "f3" => XK_F3,
        "f4" => XK_F4,
        "f5" => XK_F5,
        "f6" => XK_F6,
        "f7" => XK_F7,
        "f8" => XK_F8,
        "f9" => XK_F9,
        "f10" => XK_F10,
        "f11" => XK_F11,
        "f12" => XK_F12,
        // Modifiers
        "shift" | "lshift" => XK_Shift_L,
        "rshift" => XK_Shift_R,
        "ctrl" | "lctrl" => XK_Control_L,
        "rctrl" => XK_Control_R,
        "alt" | "lalt" => XK_Alt_L,
        "ralt" => XK_Alt_R,
        "meta" => XK_Meta_L,
        "cmd" | "windows" => XK_Super_L,
        "capslock" => XK_Caps_Lock,
        "numlock" => XK_Num_Lock,
        "scrolllock" => XK_Scroll_Lock,
        _ => return None,
    };
    Some(keysym)
}

/// True when the name (case-insensitive) is a modifier usable in a hotkey
/// chord.
pub fn is_modifier(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "shift"
            | "lshift"
            | "rshift"
            | "ctrl"
            | "lctrl"
            | "rctrl"
            | "alt"
            | "lalt"
            | "ralt"
            | "meta"
            | "cmd"
            | "windows"
    )
}

/// True when the keysym is a modifier usable in a hotkey chord - the raw
/// counterpart of [`is_modifier`].
pub fn is_modifier_keysym(keysym: u32) -> bool {
    matches!(
        keysym,
        XK_Shift_L
            | XK_Shift_R
            | XK_Control_L
            | XK_Control_R
            | XK_Alt_L
            | XK_Alt_R
            | XK_Meta_L
            | XK_Super_L
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_resolve() {
        assert_eq!(named_keysym("return"), Some(XK_Return));
        assert_eq!(named_keysym("enter"), Some(XK_Return));
        assert_eq!(named_keysym("f12"), Some(XK_F12));
        assert_eq!(named_keysym("pagedown"), Some(XK_Page_Down));
        assert_eq!(named_keysym("del"), Some(XK_Delete));
        assert_eq!(named_keysym("windows"), Some(XK_Super_L));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(named_keysym("CTRL"), Some(XK_Control_L));
        assert_eq!(named_keysym("PageUp"), Some(XK_Page_Up));
    }

    #[test]
    fn unknown_names_miss() {
        assert_eq!(named_keysym("hyper"), None);
        assert_eq!(named_keysym(""), None);
    }

    #[test]
    fn left_right_variants_differ() {
        assert_ne!(named_keysym("lshift"), named_keysym("rshift"));
        assert_ne!(named_keysym("lctrl"), named_keysym("rctrl"));
        assert_ne!(named_keysym("lalt"), named_keysym("ralt"));
    }

    #[test]
    fn modifier_classification() {
        for name in ["shift", "Ctrl", "ALT", "meta", "cmd", "rshift"] {
            assert!(is_modifier(name), "{} should be a modifier", name);
        }
        for name in ["a", "f1", "return", "space"] {
            assert!(!is_modifier(name), "{} should not be a modifier", name);
        }
    }

    #[test]
    fn modifier_keysym_classification() {
        // Every named modifier's keysym classifies as one.
        for name in [
            "shift", "rshift", "ctrl", "rctrl", "alt", "ralt", "meta", "cmd",
        ] {
            let keysym = named_keysym(name).unwrap();
            assert!(
                is_modifier_keysym(keysym),
                "{} (0x{:04X}) should be a modifier keysym",
                name,
                keysym
            );
        }
        for keysym in [0x0061, XK_Return, XK_F1, XK_Caps_Lock] {
            assert!(
                !is_modifier_keysym(keysym),
                "0x{:04X} should not be a modifier keysym",
                keysym
            );
        }
    }
}
