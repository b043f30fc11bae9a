//! Video recording: timed sequences of framebuffer captures.
//!
//! Three capture modes share one loop shape: fixed-duration, predicate-
//! bounded, and a background task with a stop flag. Frames are stamped
//! with a monotonic timestamp relative to the recording start and a
//! strictly increasing frame number. Individual capture failures are
//! logged and dropped - a recording survives transient hiccups.
//!
//! The background worker is the only concurrent user of the connection;
//! it goes through the same session mutex as every controller, so the
//! single-writer rule holds by construction.

use crate::connection::SharedSession;
use crate::errors::{Result, VncError};
use crate::framebuffer::Raster;
use crate::pointer::pace;
use crate::screenshot::{self, ImageFormat};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How long `stop_recording` waits for the worker to finish its in-flight
/// capture before abandoning it.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// One captured frame.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 0-based position in the recording; strictly increasing.
    pub frame_number: u64,
    /// Time since the recording started; monotonically non-decreasing.
    pub timestamp: Duration,
    /// The captured pixels.
    pub raster: Raster,
}

#[derive(Default)]
pub(crate) struct RecorderState {
    stop: AtomicBool,
    running: AtomicBool,
    frame_count: AtomicU64,
    frames: parking_lot::Mutex<Vec<VideoFrame>>,
    worker: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Records frame sequences from the remote desktop.
#[derive(Clone)]
pub struct Video {
    session: SharedSession,
    state: Arc<RecorderState>,
}

impl Video {
    pub(crate) fn new(session: SharedSession, state: Arc<RecorderState>) -> Self {
        Self { session, state }
    }

    /// Record for `duration` at a target `fps`, blocking the caller.
    ///
    /// # Errors
    ///
    /// [`VncError::Input`] for a zero duration or non-positive fps,
    /// [`VncError::State`] when disconnected.
    pub async fn record(
        &self,
        duration: Duration,
        fps: f64,
        delay: Duration,
    ) -> Result<Vec<VideoFrame>> {
        let interval = frame_interval(fps)?;
        if duration.is_zero() {
            return Err(VncError::Input("duration must be positive".into()));
        }
        self.ensure_connected().await?;
        pace(delay).await;

        let mut frames = Vec::new();
        let start = Instant::now();
        while start.elapsed() < duration {
            let frame_start = Instant::now();
            self.capture_into(&mut frames, start).await;
            sleep_remainder(interval, frame_start).await;
        }
        Ok(frames)
    }

    /// Record until `until` returns true or `max_duration` elapses.
    ///
    /// The predicate is polled before each capture; a panicking predicate
    /// counts as false.
    pub async fn record_until<F>(
        &self,
        until: F,
        max_duration: Duration,
        fps: f64,
        delay: Duration,
    ) -> Result<Vec<VideoFrame>>
    where
        F: Fn() -> bool,
    {
        let interval = frame_interval(fps)?;
        if max_duration.is_zero() {
            return Err(VncError::Input("max duration must be positive".into()));
        }
        self.ensure_connected().await?;
        pace(delay).await;

        let mut frames = Vec::new();
        let start = Instant::now();
        while start.elapsed() < max_duration {
            if catch_unwind(AssertUnwindSafe(&until)).unwrap_or(false) {
                break;
            }
            let frame_start = Instant::now();
            self.capture_into(&mut frames, start).await;
            sleep_remainder(interval, frame_start).await;
        }
        Ok(frames)
    }

    /// Start a background recording task.
    ///
    /// While it runs, the worker is the only party that may talk to the
    /// server; other controller calls will queue behind its captures.
    pub async fn start_recording(&self, fps: f64, delay: Duration) -> Result<()> {
        if self.state.running.load(Ordering::SeqCst) {
            return Err(VncError::State("already recording".into()));
        }
        let interval = frame_interval(fps)?;
        self.ensure_connected().await?;

        self.state.frames.lock().clear();
        self.state.frame_count.store(0, Ordering::SeqCst);
        self.state.stop.store(false, Ordering::SeqCst);
        self.state.running.store(true, Ordering::SeqCst);

        let session = self.session.clone();
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            pace(delay).await;

            let start = Instant::now();
            let mut frame_number = 0u64;
            while !state.stop.load(Ordering::SeqCst) {
                let frame_start = Instant::now();
                let timestamp = start.elapsed();
                match screenshot::capture_raster(&session, true, None).await {
                    Ok(raster) => {
                        state.frames.lock().push(VideoFrame {
                            frame_number,
                            timestamp,
                            raster,
                        });
                        state.frame_count.fetch_add(1, Ordering::SeqCst);
                        frame_number += 1;
                    }
                    Err(err) => {
                        tracing::debug!("background capture dropped: {}", err);
                    }
                }
                sleep_remainder(interval, frame_start).await;
            }
            state.running.store(false, Ordering::SeqCst);
        });
        *self.state.worker.lock() = Some(handle);
        Ok(())
    }

    /// Stop the background recording and return the captured frames.
    ///
    /// The worker observes the stop flag at the top of its loop; an
    /// in-flight capture is allowed to finish, bounded by a grace period.
    pub async fn stop_recording(&self) -> Result<Vec<VideoFrame>> {
        let worker = self.state.worker.lock().take();
        let Some(handle) = worker else {
            return Err(VncError::State("not currently recording".into()));
        };

        self.state.stop.store(true, Ordering::SeqCst);
        if tokio::time::timeout(STOP_GRACE, handle).await.is_err() {
            tracing::warn!("recording worker did not stop within {:?}", STOP_GRACE);
        }
        self.state.running.store(false, Ordering::SeqCst);

        Ok(std::mem::take(&mut *self.state.frames.lock()))
    }

    /// Whether the background worker is live.
    pub fn is_recording(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Frames captured so far by the background worker.
    pub fn frame_count(&self) -> u64 {
        self.state.frame_count.load(Ordering::SeqCst)
    }

    /// Write `frames` as individual images named
    /// `{prefix}_{frame_number:06}.{ext}`, creating `directory` as needed.
    pub async fn save_frames(
        &self,
        frames: &[VideoFrame],
        directory: impl AsRef<Path>,
        prefix: &str,
        format: ImageFormat,
    ) -> Result<()> {
        if frames.is_empty() {
            return Err(VncError::Input("no frames to save".into()));
        }
        let directory = directory.as_ref();
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| VncError::Input(format!("failed to create directory: {}", e)))?;

        for frame in frames {
            let filename = format!(
                "{}_{:06}.{}",
                prefix,
                frame.frame_number,
                format.extension()
            );
            let encoded = screenshot::encode_raster(&frame.raster, format)?;
            tokio::fs::write(directory.join(filename), encoded)
                .await
                .map_err(|e| VncError::Input(format!("failed to write frame: {}", e)))?;
        }
        Ok(())
    }

    /// Achieved frame rate of a recording: count over covered time, 0.0
    /// below two frames.
    pub fn frame_rate(frames: &[VideoFrame]) -> Result<f64> {
        if frames.is_empty() {
            return Err(VncError::Input(
                "cannot compute frame rate of an empty recording".into(),
            ));
        }
        if frames.len() < 2 {
            return Ok(0.0);
        }
        let span = frames[frames.len() - 1].timestamp - frames[0].timestamp;
        if span.is_zero() {
            return Ok(0.0);
        }
        Ok(frames.len() as f64 / span.as_secs_f64())
    }

    /// Time covered by a recording: last timestamp minus first.
    pub fn duration(frames: &[VideoFrame]) -> Result<Duration> {
        if frames.is_empty() {
            return Err(VncError::Input(
                "cannot compute duration of an empty recording".into(),
            ));
        }
        Ok(frames[frames.len() - 1].timestamp - frames[0].timestamp)
    }

    async fn capture_into(&self, frames: &mut Vec<VideoFrame>, start: Instant) {
        let timestamp = start.elapsed();
        match screenshot::capture_raster(&self.session, true, None).await {
            Ok(raster) => {
                let frame_number = frames.len() as u64;
                frames.push(VideoFrame {
                    frame_number,
                    timestamp,
                    raster,
                });
            }
            Err(err) => {
                tracing::debug!("capture dropped: {}", err);
            }
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.connection().map(|_| ())
    }
}

fn frame_interval(fps: f64) -> Result<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(VncError::Input(format!("fps must be positive: {}", fps)));
    }
    Ok(Duration::from_secs_f64(1.0 / fps))
}

async fn sleep_remainder(interval: Duration, frame_start: Instant) {
    let elapsed = frame_start.elapsed();
    if elapsed < interval {
        tokio::time::sleep(interval - elapsed).await;
    }
}
