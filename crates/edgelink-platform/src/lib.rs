//! Control state machine, edge detector, hotkey parsing, and per-OS input
//! capture/injection.
//!
//! The pure logic (`control`, `edge`, `hotkey`) has no OS dependency and is
//! exercised directly in unit tests. The capture/injection side is a pair
//! of traits with one implementation per target OS, selected at compile
//! time via `cfg(target_os = ...)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use edgelink_core::InputMessage;
use tokio::sync::mpsc;

pub mod control;
pub mod edge;
pub mod hotkey;

pub use control::{ControlEffect, ControlEvent, ControlMode, ControlStateMachine, Hotkey, ModifierMask};
pub use edge::{EdgeDetector, EdgeDetectorConfig};
pub use hotkey::parse_hotkey;

/// Shared flag a capture implementation polls on every event: while set,
/// captured input is swallowed locally instead of reaching the OS, because
/// control has passed to the peer.
#[derive(Clone, Default)]
pub struct Suppression(Arc<AtomicBool>);

impl Suppression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, suppressed: bool) {
        self.0.store(suppressed, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Starts capturing local input on a dedicated OS thread and maps it to
/// [`InputMessage`]s delivered over `tx`. Returned handle controls the
/// suppression flag; dropping it does not stop the thread (capture runs
/// for the lifetime of the Host process, per the Host's "own the tap for
/// process lifetime" guarantee).
pub trait InputCapture: Send {
    fn suppression(&self) -> Suppression;
}

/// Replays [`InputMessage`]s received from the peer as synthetic OS input.
/// Each method corresponds to one non-control `InputMessage` variant.
pub trait InputInjector: Send {
    fn key(&mut self, key_code: u16, down: bool) -> Result<()>;
    fn mouse_button(&mut self, button_number: i32, down: bool) -> Result<()>;
    /// Moves the cursor to `(target_x, target_y)`, already clamped by the
    /// caller to the active `DisplayFrame`. Backends whose underlying
    /// device is relative-only (e.g. a `uinput` device) derive the delta
    /// from their own tracked position internally; this is never the raw,
    /// unclamped wire delta.
    fn mouse_motion(&mut self, target_x: f64, target_y: f64) -> Result<()>;
    fn warp(&mut self, x: f64, y: f64) -> Result<()>;
    fn scroll(&mut self, delta_x: f64, delta_y: f64) -> Result<()>;
}

/// Sends `msg` to `tx`, logging and dropping it on a full channel exactly
/// when the message is droppable; otherwise blocks the capture thread
/// briefly via `blocking_send` so non-droppable input is never lost.
pub(crate) fn forward(tx: &mpsc::Sender<InputMessage>, msg: InputMessage) {
    if msg.is_droppable() {
        if let Err(err) = tx.try_send(msg) {
            tracing::trace!(%err, "dropped droppable capture event under backpressure");
        }
    } else if let Err(err) = tx.blocking_send(msg) {
        tracing::warn!(%err, "capture channel closed, event lost");
    }
}

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::{MacCapture, MacInjector};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::{LinuxCapture, LinuxInjector};

#[cfg(target_os = "windows")]
mod windows_injector;
#[cfg(target_os = "windows")]
pub use windows_injector::WindowsInjector;

mod dummy;
pub use dummy::{DummyCapture, DummyInjector};

/// Spawns the capture implementation for the current target, falling
/// back to [`DummyCapture`] on platforms with no tap implemented yet.
#[cfg(target_os = "macos")]
pub fn spawn_capture(tx: mpsc::Sender<InputMessage>) -> Result<Box<dyn InputCapture>> {
    Ok(Box::new(MacCapture::spawn(tx)?))
}

#[cfg(target_os = "linux")]
pub fn spawn_capture(tx: mpsc::Sender<InputMessage>) -> Result<Box<dyn InputCapture>> {
    Ok(Box::new(LinuxCapture::spawn(tx)?))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub fn spawn_capture(tx: mpsc::Sender<InputMessage>) -> Result<Box<dyn InputCapture>> {
    let _ = tx;
    Ok(Box::new(DummyCapture::new()?))
}

/// Builds the injector implementation for the current target.
#[cfg(target_os = "macos")]
pub fn new_injector() -> Result<Box<dyn InputInjector>> {
    Ok(Box::new(MacInjector::new()?))
}

#[cfg(target_os = "linux")]
pub fn new_injector() -> Result<Box<dyn InputInjector>> {
    Ok(Box::new(LinuxInjector::new()?))
}

#[cfg(target_os = "windows")]
pub fn new_injector() -> Result<Box<dyn InputInjector>> {
    Ok(Box::new(WindowsInjector::new()?))
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
pub fn new_injector() -> Result<Box<dyn InputInjector>> {
    Ok(Box::new(DummyInjector::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_starts_clear_and_is_shared() {
        let s = Suppression::new();
        assert!(!s.get());
        let s2 = s.clone();
        s2.set(true);
        assert!(s.get());
    }
}
