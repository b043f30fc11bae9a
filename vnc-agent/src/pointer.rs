//! Pointer (mouse) control.

use crate::connection::SharedSession;
use crate::errors::Result;
use rfb_common::Position;
use std::time::Duration;

const BUTTON_LEFT: u8 = 1 << 0;
const BUTTON_RIGHT: u8 = 1 << 2;

/// Pacing between button press and release of a click.
const CLICK_HOLD: Duration = Duration::from_millis(10);
/// Pacing between the two clicks of a double click.
const DOUBLE_CLICK_GAP: Duration = Duration::from_millis(50);
/// Interpolation points emitted per second of drag duration.
const DRAG_STEPS_PER_SECOND: f64 = 10.0;

/// Drives the remote pointer.
///
/// The cursor position and button mask live in the connection, so the
/// scroll controller and this one always agree on where the pointer is.
/// Coordinates are `u16`: the RFB wire range 0..=65535 holds by
/// construction. Every operation takes a trailing `delay` slept after the
/// final event, for paced interaction sequences; pass
/// [`Duration::ZERO`] when no pacing is wanted.
#[derive(Clone)]
pub struct Pointer {
    session: SharedSession,
}

impl Pointer {
    pub(crate) fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Click the left button, optionally moving to `(x, y)` first.
    ///
    /// `None` coordinates reuse the current cursor position.
    pub async fn left_click(&self, x: Option<u16>, y: Option<u16>, delay: Duration) -> Result<()> {
        self.click(BUTTON_LEFT, x, y).await?;
        pace(delay).await;
        Ok(())
    }

    /// Click the right button, optionally moving to `(x, y)` first.
    pub async fn right_click(&self, x: Option<u16>, y: Option<u16>, delay: Duration) -> Result<()> {
        self.click(BUTTON_RIGHT, x, y).await?;
        pace(delay).await;
        Ok(())
    }

    /// Two left clicks, paced to register as a double click.
    pub async fn double_click(&self, x: Option<u16>, y: Option<u16>, delay: Duration) -> Result<()> {
        self.click(BUTTON_LEFT, x, y).await?;
        tokio::time::sleep(DOUBLE_CLICK_GAP).await;
        self.click(BUTTON_LEFT, x, y).await?;
        pace(delay).await;
        Ok(())
    }

    /// Move the cursor to `(x, y)` with no buttons pressed.
    pub async fn move_to(&self, x: u16, y: u16, delay: Duration) -> Result<()> {
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            conn.send_pointer_event(x, y, 0).await
        }
        .await;
        session.finish(result)?;
        drop(session);
        pace(delay).await;
        Ok(())
    }

    /// Drag with the left button held from the current cursor to `(x, y)`.
    ///
    /// Emits roughly ten interpolated move events per second of
    /// `duration`; a zero duration degenerates to a single move plus
    /// release at the target.
    pub async fn drag_to(&self, x: u16, y: u16, duration: Duration, delay: Duration) -> Result<()> {
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            let start = conn.cursor();

            conn.send_pointer_event(start.x, start.y, BUTTON_LEFT).await?;
            let mask = conn.buttons();

            let steps = ((duration.as_secs_f64() * DRAG_STEPS_PER_SECOND) as u32).max(1);
            let pause = duration / steps;
            for i in 1..=steps {
                let t = f64::from(i) / f64::from(steps);
                let px = lerp(start.x, x, t);
                let py = lerp(start.y, y, t);
                conn.send_pointer_event(px, py, mask).await?;
                if i < steps {
                    tokio::time::sleep(pause).await;
                }
            }

            conn.send_pointer_event(x, y, 0).await
        }
        .await;
        session.finish(result)?;
        drop(session);
        pace(delay).await;
        Ok(())
    }

    /// The current cursor position (the last coordinate transmitted).
    pub async fn position(&self) -> Result<Position> {
        let mut session = self.session.lock().await;
        let conn = session.connection()?;
        Ok(conn.cursor())
    }

    async fn click(&self, button: u8, x: Option<u16>, y: Option<u16>) -> Result<()> {
        let mut session = self.session.lock().await;
        let result = async {
            let conn = session.connection()?;
            let current = conn.cursor();
            let target = Position::new(x.unwrap_or(current.x), y.unwrap_or(current.y));

            if target != current {
                conn.send_pointer_event(target.x, target.y, 0).await?;
            }
            conn.send_pointer_event(target.x, target.y, button).await?;
            tokio::time::sleep(CLICK_HOLD).await;
            conn.send_pointer_event(target.x, target.y, 0).await
        }
        .await;
        session.finish(result)
    }
}

/// Sleep a trailing delay, skipping the timer for zero.
pub(crate) async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn lerp(from: u16, to: u16, t: f64) -> u16 {
    let value = f64::from(from) + (f64::from(to) - f64::from(from)) * t;
    value.round().clamp(0.0, f64::from(u16::MAX)) as u16
}
