//! RFB protocol message codecs.
//!
//! Messages are split by direction, as in the protocol specification:
//!
//! - [`client`] - client-to-server: ClientInit, SetEncodings,
//!   FramebufferUpdateRequest, KeyEvent, PointerEvent, ClientCutText
//! - [`server`] - server-to-client: ServerInit, FramebufferUpdate,
//!   ServerCutText, Bell, SetColourMapEntries
//! - [`types`] - shared wire types and constants
//!
//! Client messages implement `write_to` against an [`crate::RfbOutStream`];
//! server messages implement `read_from` against an [`crate::RfbInStream`].
//! The inverse directions exist where the in-process test servers need them.

pub mod client;
pub mod server;
pub mod types;

pub use client::{
    ClientCutText, ClientInit, FramebufferUpdateRequest, KeyEvent, PointerEvent, SetEncodings,
};
pub use server::{Bell, FramebufferUpdate, ServerCutText, ServerInit, UpdateRectangle};
pub use types::{PixelFormat, Rectangle};
