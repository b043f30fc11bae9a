//! The `VncAgent` facade.

use crate::clipboard::Clipboard;
use crate::config::Config;
use crate::connection::{Connection, SharedSession, Session};
use crate::errors::{Result, VncError};
use crate::keyboard::Keyboard;
use crate::pointer::Pointer;
use crate::screenshot::Screenshot;
use crate::scroll::Scroll;
use crate::video::{RecorderState, Video};
use std::future::Future;
use std::sync::Arc;

/// The single entry point callers hold.
///
/// An agent binds a transport to the RFB protocol engine and exposes the
/// controllers. It is cheaply cloneable - clones share the same session -
/// and all controller access is serialized through one internal lock, so
/// messages reach the server in program order.
///
/// ```no_run
/// use std::time::Duration;
/// use vnc_agent::{Config, VncAgent};
///
/// # async fn example() -> vnc_agent::Result<()> {
/// let config = Config::builder().host("192.168.1.20").port(5900).build()?;
/// let agent = VncAgent::new(config)?;
/// agent.connect().await?;
/// agent.pointer().left_click(Some(100), Some(200), Duration::ZERO).await?;
/// agent.disconnect().await?;
/// # Ok(())
/// # }
/// ```
///
/// For guaranteed teardown on every exit path, prefer
/// [`VncAgent::with_session`].
#[derive(Clone)]
pub struct VncAgent {
    config: Config,
    session: SharedSession,
    recorder: Arc<RecorderState>,
}

impl VncAgent {
    /// Create an agent from a validated configuration. No I/O happens
    /// until [`connect`](Self::connect).
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: Arc::new(tokio::sync::Mutex::new(Session::default())),
            recorder: Arc::new(RecorderState::default()),
        })
    }

    /// Open the transport, run the RFB handshake, and allocate the
    /// framebuffer.
    ///
    /// # Errors
    ///
    /// [`VncError::State`] when already connected; otherwise whatever the
    /// transport or handshake produced.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_connected() {
            return Err(VncError::State("already connected".into()));
        }
        let connection = Connection::establish(&self.config).await?;
        session.set(connection);
        Ok(())
    }

    /// Close the session. Idempotent: disconnecting a disconnected agent
    /// is a no-op. An active background recording is stopped first.
    pub async fn disconnect(&self) -> Result<()> {
        let video = self.video();
        if video.is_recording() {
            let _ = video.stop_recording().await;
        }

        let connection = {
            let mut session = self.session.lock().await;
            session.take()
        };
        if let Some(connection) = connection {
            connection.close().await;
            tracing::info!("disconnected");
        }
        Ok(())
    }

    /// Whether a session is currently up.
    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_connected()
    }

    /// Negotiated desktop dimensions.
    pub async fn desktop_size(&self) -> Result<(u16, u16)> {
        let mut session = self.session.lock().await;
        let init = session.connection()?.server_init();
        Ok((init.width, init.height))
    }

    /// Negotiated desktop name.
    pub async fn desktop_name(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        Ok(session.connection()?.server_init().name.clone())
    }

    /// The pointer controller.
    pub fn pointer(&self) -> Pointer {
        Pointer::new(self.session.clone())
    }

    /// The keyboard controller.
    pub fn keyboard(&self) -> Keyboard {
        Keyboard::new(self.session.clone())
    }

    /// The scroll controller.
    pub fn scroll(&self) -> Scroll {
        Scroll::new(self.session.clone())
    }

    /// The clipboard controller.
    pub fn clipboard(&self) -> Clipboard {
        Clipboard::new(self.session.clone())
    }

    /// The screenshot controller.
    pub fn screenshot(&self) -> Screenshot {
        Screenshot::new(self.session.clone())
    }

    /// The video recorder.
    pub fn video(&self) -> Video {
        Video::new(self.session.clone(), self.recorder.clone())
    }

    /// Run `f` against a connected agent, disconnecting on every exit
    /// path.
    ///
    /// The scoped form of the facade: `connect` runs on entry, and
    /// `disconnect` runs exactly once whether the closure succeeds or
    /// fails.
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use vnc_agent::{Config, VncAgent};
    ///
    /// # async fn example() -> vnc_agent::Result<()> {
    /// let config = Config::builder().host("192.168.1.20").build()?;
    /// VncAgent::with_session(config, |agent| async move {
    ///     agent.keyboard().type_text("hello", Duration::ZERO).await
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_session<F, Fut, T>(config: Config, f: F) -> Result<T>
    where
        F: FnOnce(VncAgent) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let agent = VncAgent::new(config)?;
        agent.connect().await?;
        let result = f(agent.clone()).await;
        let teardown = agent.disconnect().await;
        let value = result?;
        teardown?;
        Ok(value)
    }
}
