//! Wire protocol, framing, and shared error type for edgelink.
//!
//! This crate provides the vocabulary exchanged between the Host (owns
//! the physical keyboard/mouse) and the Client (driven remotely), plus
//! the pure, stateless codec that frames it for a byte stream. It has no
//! knowledge of sockets, threads, or the OS input APIs — those live in
//! `edgelink-net` and `edgelink-platform`.

#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod message;

pub use codec::{decode, decode_payload, encode, encode_payload, MAX_FRAME_BYTES};
pub use error::{Error, Result};
pub use geometry::DisplayFrame;
pub use logging::init_tracing;
pub use message::{
    ButtonEvent, GestureDirection, GestureKind, GesturePhase, InputMessage, KeyEvent, MotionEvent,
};

/// Default TCP port for the Client's listener.
pub const DEFAULT_PORT: u16 = 9876;
