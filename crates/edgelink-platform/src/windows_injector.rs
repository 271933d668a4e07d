//! Windows injection via `SendInput`. Windows capture (a global
//! keyboard/mouse hook) is not implemented; the Host binary falls back to
//! [`crate::DummyCapture`] on this target.

use anyhow::Result;
use windows::Win32::UI::Input::KeyboardAndMouse::*;
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use crate::InputInjector;

pub struct WindowsInjector;

impl WindowsInjector {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}

fn send(input: INPUT) {
    unsafe {
        SendInput(&[input], std::mem::size_of::<INPUT>() as i32);
    }
}

/// Builds an absolute `MOUSEEVENTF_ABSOLUTE` move to `(x, y)` in screen
/// pixels, normalized to the 0..65535 range `SendInput` expects.
fn absolute_move_input(x: f64, y: f64) -> INPUT {
    let (screen_w, screen_h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    let normalized_x = (x / screen_w.max(1) as f64 * 65535.0) as i32;
    let normalized_y = (y / screen_h.max(1) as f64 * 65535.0) as i32;
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: normalized_x,
                dy: normalized_y,
                mouseData: 0,
                dwFlags: MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

impl InputInjector for WindowsInjector {
    fn key(&mut self, key_code: u16, down: bool) -> Result<()> {
        send(INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(key_code),
                    wScan: 0,
                    dwFlags: if down { KEYBD_EVENT_FLAGS(0) } else { KEYEVENTF_KEYUP },
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        });
        Ok(())
    }

    fn mouse_button(&mut self, button_number: i32, down: bool) -> Result<()> {
        let flags = match (button_number, down) {
            (0, true) => MOUSEEVENTF_LEFTDOWN,
            (0, false) => MOUSEEVENTF_LEFTUP,
            (1, true) => MOUSEEVENTF_RIGHTDOWN,
            (1, false) => MOUSEEVENTF_RIGHTUP,
            (_, true) => MOUSEEVENTF_MIDDLEDOWN,
            (_, false) => MOUSEEVENTF_MIDDLEUP,
        };
        send(INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    mouseData: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        });
        Ok(())
    }

    fn mouse_motion(&mut self, target_x: f64, target_y: f64) -> Result<()> {
        send(absolute_move_input(target_x, target_y));
        Ok(())
    }

    fn warp(&mut self, x: f64, y: f64) -> Result<()> {
        send(absolute_move_input(x, y));
        Ok(())
    }

    fn scroll(&mut self, delta_x: f64, delta_y: f64) -> Result<()> {
        if delta_y != 0.0 {
            send(INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dx: 0,
                        dy: 0,
                        mouseData: (delta_y * 120.0) as i32,
                        dwFlags: MOUSEEVENTF_WHEEL,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            });
        }
        if delta_x != 0.0 {
            send(INPUT {
                r#type: INPUT_MOUSE,
                Anonymous: INPUT_0 {
                    mi: MOUSEINPUT {
                        dx: 0,
                        dy: 0,
                        mouseData: (delta_x * 120.0) as i32,
                        dwFlags: MOUSEEVENTF_HWHEEL,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            });
        }
        Ok(())
    }
}
