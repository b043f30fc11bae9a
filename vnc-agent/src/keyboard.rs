//! Keyboard control.

use crate::connection::SharedSession;
use crate::errors::{Result, VncError};
use crate::keys::{self, Key};
use crate::pointer::pace;
use std::time::Duration;

/// Pacing between a key's press and release.
const KEY_HOLD: Duration = Duration::from_millis(10);
/// Pacing between consecutive characters while typing.
const TYPE_GAP: Duration = Duration::from_millis(20);

/// Drives the remote keyboard.
///
/// Keys are named from a fixed vocabulary (see [`crate::keys`]), given as
/// single latin-1 characters, or passed through as raw X11 keysyms.
/// Unknown names and characters above U+00FF fail with an input error
/// before any event reaches the wire.
#[derive(Clone)]
pub struct Keyboard {
    session: SharedSession,
}

impl Keyboard {
    pub(crate) fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Type `text` character by character, pressing and releasing each
    /// key.
    ///
    /// # Errors
    ///
    /// [`VncError::Input`] when `text` is empty or contains a character
    /// outside the latin-1 range; nothing is sent in that case.
    pub async fn type_text(&self, text: &str, delay: Duration) -> Result<()> {
        if text.is_empty() {
            return Err(VncError::Input("text cannot be empty".into()));
        }
        // Validate the whole string up front so a bad character cannot
        // leave a half-typed prefix on the remote side.
        let keysyms = text
            .chars()
            .map(char_keysym)
            .collect::<Result<Vec<u32>>>()?;

        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            for (i, keysym) in keysyms.iter().enumerate() {
                conn.send_key_event(*keysym, true).await?;
                tokio::time::sleep(KEY_HOLD).await;
                conn.send_key_event(*keysym, false).await?;
                if i + 1 < keysyms.len() {
                    tokio::time::sleep(TYPE_GAP).await;
                }
            }
            Ok(())
        }
        .await;
        session.finish(result)?;
        drop(session);
        pace(delay).await;
        Ok(())
    }

    /// Press and release a single key.
    pub async fn press_key<'a>(&self, key: impl Into<Key<'a>>, delay: Duration) -> Result<()> {
        let keysym = resolve(key.into())?;
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            conn.send_key_event(keysym, true).await?;
            tokio::time::sleep(KEY_HOLD).await;
            conn.send_key_event(keysym, false).await
        }
        .await;
        session.finish(result)?;
        drop(session);
        pace(delay).await;
        Ok(())
    }

    /// Press a modifier chord: all but the last key must be modifiers.
    ///
    /// Modifiers go down in order, the main key is pressed and released,
    /// then the modifiers come up in reverse order.
    ///
    /// ```no_run
    /// # async fn example(keyboard: &vnc_agent::Keyboard) -> vnc_agent::Result<()> {
    /// keyboard.hotkey(&["ctrl".into(), "a".into()], std::time::Duration::ZERO).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn hotkey(&self, chord: &[Key<'_>], delay: Duration) -> Result<()> {
        let Some((main, modifiers)) = chord.split_last() else {
            return Err(VncError::Input(
                "hotkey requires at least 2 keys (modifier + main)".into(),
            ));
        };
        if modifiers.is_empty() {
            return Err(VncError::Input(
                "hotkey requires at least 2 keys (modifier + main)".into(),
            ));
        }
        let modifier_syms = modifiers
            .iter()
            .map(|key| match key {
                Key::Named(name) if keys::is_modifier(name) => resolve(*key),
                Key::Named(name) => Err(VncError::Input(format!(
                    "'{}' is not a modifier key",
                    name
                ))),
                Key::Keysym(sym) if keys::is_modifier_keysym(*sym) => Ok(*sym),
                Key::Keysym(sym) => Err(VncError::Input(format!(
                    "keysym 0x{:04X} is not a modifier key",
                    sym
                ))),
            })
            .collect::<Result<Vec<u32>>>()?;
        let main_sym = resolve(*main)?;

        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            for sym in &modifier_syms {
                conn.send_key_event(*sym, true).await?;
            }
            tokio::time::sleep(KEY_HOLD).await;
            conn.send_key_event(main_sym, true).await?;
            tokio::time::sleep(KEY_HOLD).await;
            conn.send_key_event(main_sym, false).await?;
            tokio::time::sleep(KEY_HOLD).await;
            for sym in modifier_syms.iter().rev() {
                conn.send_key_event(*sym, false).await?;
            }
            Ok(())
        }
        .await;
        session.finish(result)?;
        drop(session);
        pace(delay).await;
        Ok(())
    }

    /// Press a key without releasing it; pair with [`keyup`](Self::keyup).
    pub async fn keydown<'a>(&self, key: impl Into<Key<'a>>, delay: Duration) -> Result<()> {
        self.key_edge(key.into(), true).await?;
        pace(delay).await;
        Ok(())
    }

    /// Release a key held by [`keydown`](Self::keydown).
    pub async fn keyup<'a>(&self, key: impl Into<Key<'a>>, delay: Duration) -> Result<()> {
        self.key_edge(key.into(), false).await?;
        pace(delay).await;
        Ok(())
    }

    async fn key_edge(&self, key: Key<'_>, down: bool) -> Result<()> {
        let keysym = resolve(key)?;
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            conn.send_key_event(keysym, down).await
        }
        .await;
        session.finish(result)
    }
}

/// Resolve a key specification to a keysym, or an input error.
fn resolve(key: Key<'_>) -> Result<u32> {
    match key {
        Key::Keysym(sym) => Ok(sym),
        Key::Named(name) => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => char_keysym(c),
                _ => keys::named_keysym(name)
                    .ok_or_else(|| VncError::Input(format!("unknown key: '{}'", name))),
            }
        }
    }
}

/// Map a character to its keysym: latin-1 code points map directly,
/// anything wider is unsupported.
fn char_keysym(c: char) -> Result<u32> {
    let cp = c as u32;
    if cp <= 0xFF {
        Ok(cp)
    } else {
        Err(VncError::Input(format!(
            "unsupported character: '{}' (U+{:04X})",
            c, cp
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_characters_names_and_raw_keysyms() {
        assert_eq!(resolve(Key::Named("a")).unwrap(), 0x61);
        assert_eq!(resolve(Key::Named("\u{e9}")).unwrap(), 0xE9);
        assert_eq!(resolve(Key::Named("enter")).unwrap(), 0xFF0D);
        assert_eq!(resolve(Key::Keysym(0xFFC9)).unwrap(), 0xFFC9);
    }

    #[test]
    fn wide_characters_are_input_errors() {
        assert!(matches!(
            resolve(Key::Named("\u{2603}")),
            Err(VncError::Input(_))
        ));
        assert!(matches!(char_keysym('\u{0100}'), Err(VncError::Input(_))));
    }

    #[test]
    fn unknown_names_are_input_errors() {
        assert!(matches!(
            resolve(Key::Named("hyper")),
            Err(VncError::Input(_))
        ));
    }
}
