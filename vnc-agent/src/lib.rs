//! A programmatic RFB 3.8 client for driving remote desktops.
//!
//! This crate lets automation agents operate a remote desktop over the
//! RFB (VNC) protocol: synthesize pointer, keyboard, scroll and clipboard
//! events, capture the framebuffer as still images or frame sequences,
//! and observe clipboard updates from the server.
//!
//! Two transports sit behind one client surface: a direct TCP socket, and
//! an RFB stream tunneled as binary frames over a secure WebSocket (the
//! shape hypervisor console endpoints expose, with templated URLs and
//! optional mutual-TLS material).
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//! use vnc_agent::{Config, ImageFormat, VncAgent};
//!
//! # async fn example() -> vnc_agent::Result<()> {
//! let config = Config::builder()
//!     .host("192.168.1.20")
//!     .port(5900)
//!     .password("secret")
//!     .build()?;
//!
//! VncAgent::with_session(config, |agent| async move {
//!     agent.pointer().left_click(Some(400), Some(300), Duration::ZERO).await?;
//!     agent.keyboard().type_text("hello", Duration::ZERO).await?;
//!     agent
//!         .screenshot()
//!         .save("after.png", ImageFormat::Png, false, Duration::ZERO)
//!         .await
//! })
//! .await
//! # }
//! ```
//!
//! # Concurrency
//!
//! The client is single-writer: one internal lock serializes every
//! controller operation's transport I/O, and for a single caller task
//! messages reach the server in program order. The background video
//! recorder is the only shipped concurrent user and goes through the same
//! lock.

pub mod agent;
pub mod clipboard;
pub mod config;
mod connection;
pub mod errors;
pub mod framebuffer;
pub mod keyboard;
pub mod keys;
pub mod pointer;
pub mod screenshot;
pub mod scroll;
pub mod video;

pub use agent::VncAgent;
pub use clipboard::Clipboard;
pub use config::{Config, ConfigBuilder, Transport, WebSocketConfig};
pub use errors::{Result, VncError};
pub use framebuffer::{Framebuffer, Raster};
pub use keyboard::Keyboard;
pub use keys::Key;
pub use pointer::Pointer;
pub use rfb_common::{Position, Region};
pub use screenshot::{ImageFormat, Screenshot};
pub use scroll::Scroll;
pub use video::{Video, VideoFrame};
