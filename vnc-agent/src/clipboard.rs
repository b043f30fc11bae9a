//! Clipboard control over the RFB cut-text channel.
//!
//! The controller keeps a cache of the last known clipboard text: a send
//! updates it, a received ServerCutText updates it, clearing empties it.
//! The cache is a hint, not a coherent snapshot - last writer wins.

use crate::connection::SharedSession;
use crate::errors::{Result, VncError};
use crate::pointer::pace;
use rfb_protocol::messages::types::encode_latin1;
use std::time::Duration;

/// Drives the remote clipboard.
#[derive(Clone)]
pub struct Clipboard {
    session: SharedSession,
}

impl Clipboard {
    pub(crate) fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Send `text` to the server clipboard and remember it in the cache.
    ///
    /// # Errors
    ///
    /// [`VncError::Input`] when `text` is empty or not latin-1 encodable;
    /// nothing is sent in that case.
    pub async fn send_text(&self, text: &str, delay: Duration) -> Result<()> {
        if text.is_empty() {
            return Err(VncError::Input("text cannot be empty".into()));
        }
        if encode_latin1(text).is_none() {
            return Err(VncError::Input(
                "text contains characters outside latin-1".into(),
            ));
        }

        pace(delay).await;
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            conn.send_cut_text(text).await?;
            conn.set_clipboard_cache(Some(text.to_string()));
            Ok(())
        }
        .await;
        session.finish(result)
    }

    /// Wait up to `timeout` for clipboard text from the server.
    ///
    /// Inbound messages are routed while waiting: framebuffer updates are
    /// applied to the raster, bells and colour-map updates dropped. Returns
    /// `None` when no cut text arrived within the window; on success the
    /// cache is updated.
    pub async fn get_text(&self, timeout: Duration) -> Result<Option<String>> {
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            conn.read_cut_text(timeout).await
        }
        .await;
        session.finish(result)
    }

    /// Clear the remote clipboard (an empty cut text) and the cache.
    pub async fn clear(&self, delay: Duration) -> Result<()> {
        pace(delay).await;
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            conn.send_cut_text("").await?;
            conn.set_clipboard_cache(None);
            Ok(())
        }
        .await;
        session.finish(result)
    }

    /// Whether the cache holds non-empty text.
    pub async fn has_text(&self) -> Result<bool> {
        let mut session = self.session.lock().await;
        let conn = session.connection()?;
        Ok(conn.clipboard_cache().is_some_and(|t| !t.is_empty()))
    }

    /// The cached clipboard content, empty when absent.
    ///
    /// Reflects the last send or receive; call
    /// [`get_text`](Self::get_text) to refresh from the server.
    pub async fn text(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        let conn = session.connection()?;
        Ok(conn.clipboard_cache().unwrap_or_default().to_string())
    }
}
