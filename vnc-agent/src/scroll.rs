//! Mouse wheel control.
//!
//! RFB has no dedicated wheel message: a wheel tick is a pointer event
//! with button 4 (up) or button 5 (down) asserted, followed by a release.
//! Ticks are emitted at the current cursor position.

use crate::connection::SharedSession;
use crate::errors::Result;
use crate::pointer::pace;
use std::time::Duration;

const WHEEL_UP: u8 = 1 << 3; // button 4
const WHEEL_DOWN: u8 = 1 << 4; // button 5

/// Pacing between wheel ticks.
const TICK_GAP: Duration = Duration::from_millis(10);
/// Ticks emitted by [`Scroll::scroll_to`].
const DEFAULT_TICKS: u32 = 3;

/// Drives the remote mouse wheel.
#[derive(Clone)]
pub struct Scroll {
    session: SharedSession,
}

impl Scroll {
    pub(crate) fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Scroll up by `amount` wheel ticks. Zero is a no-op.
    pub async fn scroll_up(&self, amount: u32, delay: Duration) -> Result<()> {
        self.ticks(WHEEL_UP, amount).await?;
        pace(delay).await;
        Ok(())
    }

    /// Scroll down by `amount` wheel ticks. Zero is a no-op.
    pub async fn scroll_down(&self, amount: u32, delay: Duration) -> Result<()> {
        self.ticks(WHEEL_DOWN, amount).await?;
        pace(delay).await;
        Ok(())
    }

    /// Move the cursor to `(x, y)`, then scroll down a short default
    /// amount there.
    pub async fn scroll_to(&self, x: u16, y: u16, delay: Duration) -> Result<()> {
        {
            let mut session = self.session.lock().await;
            let result = async {
                let conn = session.connection()?;
                conn.send_pointer_event(x, y, 0).await
            }
            .await;
            session.finish(result)?;
        }
        self.ticks(WHEEL_DOWN, DEFAULT_TICKS).await?;
        pace(delay).await;
        Ok(())
    }

    async fn ticks(&self, button: u8, amount: u32) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            for i in 0..amount {
                let at = conn.cursor();
                conn.send_pointer_event(at.x, at.y, button).await?;
                conn.send_pointer_event(at.x, at.y, 0).await?;
                if i + 1 < amount {
                    tokio::time::sleep(TICK_GAP).await;
                }
            }
            Ok(())
        }
        .await;
        session.finish(result)
    }
}
