use anyhow::Result;
use tracing::info;

use crate::{InputInjector, Suppression};

/// Fallback capture for targets without a real tap. Never produces events;
/// exists so the Host binary links on every platform.
pub struct DummyCapture {
    suppression: Suppression,
}

impl DummyCapture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            suppression: Suppression::new(),
        })
    }
}

impl crate::InputCapture for DummyCapture {
    fn suppression(&self) -> Suppression {
        self.suppression.clone()
    }
}

pub struct DummyInjector;

impl DummyInjector {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}

impl InputInjector for DummyInjector {
    fn key(&mut self, key_code: u16, down: bool) -> Result<()> {
        info!(key_code, down, "DummyInjector: key");
        Ok(())
    }

    fn mouse_button(&mut self, button_number: i32, down: bool) -> Result<()> {
        info!(button_number, down, "DummyInjector: mouse button");
        Ok(())
    }

    fn mouse_motion(&mut self, target_x: f64, target_y: f64) -> Result<()> {
        info!(target_x, target_y, "DummyInjector: mouse motion");
        Ok(())
    }

    fn warp(&mut self, x: f64, y: f64) -> Result<()> {
        info!(x, y, "DummyInjector: warp");
        Ok(())
    }

    fn scroll(&mut self, delta_x: f64, delta_y: f64) -> Result<()> {
        info!(delta_x, delta_y, "DummyInjector: scroll");
        Ok(())
    }
}
