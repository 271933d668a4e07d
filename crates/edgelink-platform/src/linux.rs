//! Linux capture via raw `evdev` device polling, injection via a `uinput`
//! virtual device, scoped to this crate's keyboard/mouse/scroll message
//! set (no gamepad).

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use edgelink_core::{ButtonEvent, InputMessage, KeyEvent, MotionEvent};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key, RelativeAxisType};
use tokio::sync::mpsc;

use crate::{forward, InputCapture, InputInjector, Suppression};

const POLL_IDLE: Duration = Duration::from_millis(1);

enum DeviceKind {
    Keyboard,
    Mouse,
}

fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::KEY_A) || keys.contains(Key::KEY_ENTER))
}

fn is_mouse(device: &Device) -> bool {
    let rel_ok = device
        .supported_relative_axes()
        .is_some_and(|rel| rel.contains(RelativeAxisType::REL_X) && rel.contains(RelativeAxisType::REL_Y));
    let btn_ok = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_LEFT));
    rel_ok && btn_ok
}

fn find_device(kind: DeviceKind) -> Result<Option<Device>> {
    for (_, device) in evdev::enumerate() {
        let matches = match kind {
            DeviceKind::Keyboard => is_keyboard(&device),
            DeviceKind::Mouse => is_mouse(&device),
        };
        if matches {
            return Ok(Some(device));
        }
    }
    Ok(None)
}

pub struct LinuxCapture {
    suppression: Suppression,
}

impl LinuxCapture {
    pub fn spawn(tx: mpsc::Sender<InputMessage>) -> Result<Self> {
        let suppression = Suppression::new();

        if let Some(mut keyboard) = find_device(DeviceKind::Keyboard)? {
            let tx = tx.clone();
            thread::Builder::new()
                .name("edgelink-capture-kbd".into())
                .spawn(move || loop {
                    let mut had_events = false;
                    if let Ok(events) = keyboard.fetch_events() {
                        for event in events {
                            had_events = true;
                            if event.event_type() == EventType::KEY {
                                // Always reported so the control state
                                // machine can recognise the hotkey even
                                // while Local; this device is not grabbed
                                // (no EVIOCGRAB), so it always also reaches
                                // the desktop regardless of `suppression`.
                                forward(
                                    &tx,
                                    InputMessage::Keyboard {
                                        key_code: event.code(),
                                        event: if event.value() != 0 {
                                            KeyEvent::KeyDown
                                        } else {
                                            KeyEvent::KeyUp
                                        },
                                        flags: 0,
                                    },
                                );
                            }
                        }
                    }
                    if !had_events {
                        thread::sleep(POLL_IDLE);
                    }
                })
                .map_err(|e| anyhow!("failed to spawn keyboard capture thread: {e}"))?;
        } else {
            tracing::warn!("no keyboard input device found");
        }

        if let Some(mut mouse) = find_device(DeviceKind::Mouse)? {
            let tx = tx.clone();
            thread::Builder::new()
                .name("edgelink-capture-mouse".into())
                .spawn(move || {
                    let (mut dx, mut dy) = (0.0_f64, 0.0_f64);
                    loop {
                        let mut had_events = false;
                        if let Ok(events) = mouse.fetch_events() {
                            for event in events {
                                had_events = true;
                                match event.event_type() {
                                    EventType::RELATIVE if event.code() == RelativeAxisType::REL_X.0 => {
                                        dx += event.value() as f64;
                                    }
                                    EventType::RELATIVE if event.code() == RelativeAxisType::REL_Y.0 => {
                                        dy += event.value() as f64;
                                    }
                                    EventType::RELATIVE if event.code() == RelativeAxisType::REL_WHEEL.0 => {
                                        forward(
                                            &tx,
                                            InputMessage::Scroll {
                                                delta_x: 0.0,
                                                delta_y: event.value() as f64,
                                                scroll_phase: 0,
                                                momentum_phase: 0,
                                            },
                                        );
                                    }
                                    EventType::KEY => {
                                        let button = match event.code() {
                                            c if c == Key::BTN_LEFT.code() => Some((0, ButtonEvent::LeftDown, ButtonEvent::LeftUp)),
                                            c if c == Key::BTN_RIGHT.code() => {
                                                Some((1, ButtonEvent::RightDown, ButtonEvent::RightUp))
                                            }
                                            c if c == Key::BTN_MIDDLE.code() => {
                                                Some((2, ButtonEvent::OtherDown, ButtonEvent::OtherUp))
                                            }
                                            _ => None,
                                        };
                                        if let Some((number, down_kind, up_kind)) = button {
                                            forward(
                                                &tx,
                                                InputMessage::MouseButton {
                                                    event: if event.value() != 0 { down_kind } else { up_kind },
                                                    button_number: number,
                                                    click_state: 1,
                                                },
                                            );
                                        }
                                    }
                                    EventType::SYNCHRONIZATION => {
                                        if dx != 0.0 || dy != 0.0 {
                                            forward(
                                                &tx,
                                                InputMessage::MouseMotion {
                                                    delta_x: dx,
                                                    delta_y: dy,
                                                    event: MotionEvent::Moved,
                                                },
                                            );
                                            dx = 0.0;
                                            dy = 0.0;
                                        }
                                    }
                                    _ => {}
                                }
                            }
                        }
                        if !had_events {
                            thread::sleep(POLL_IDLE);
                        }
                    }
                })
                .map_err(|e| anyhow!("failed to spawn mouse capture thread: {e}"))?;
        } else {
            tracing::warn!("no mouse input device found");
        }

        Ok(Self { suppression })
    }
}

impl InputCapture for LinuxCapture {
    fn suppression(&self) -> Suppression {
        self.suppression.clone()
    }
}

pub struct LinuxInjector {
    device: VirtualDevice,
    /// Our own tally of where the (purely relative) device has left the
    /// cursor, so `mouse_motion`'s already-clamped absolute target can be
    /// turned back into the one relative move `uinput` actually accepts.
    last_pos: (f64, f64),
}

impl LinuxInjector {
    pub fn new() -> Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 0u16..=255u16 {
            keys.insert(Key::new(code));
        }
        let mut rel_axes = AttributeSet::<RelativeAxisType>::new();
        rel_axes.insert(RelativeAxisType::REL_X);
        rel_axes.insert(RelativeAxisType::REL_Y);
        rel_axes.insert(RelativeAxisType::REL_WHEEL);
        rel_axes.insert(RelativeAxisType::REL_HWHEEL);

        let device = VirtualDeviceBuilder::new()?
            .name("edgelink-uinput")
            .with_keys(&keys)?
            .with_relative_axes(&rel_axes)?
            .build()?;
        Ok(Self { device, last_pos: (0.0, 0.0) })
    }

    fn emit(&mut self, event: InputEvent) -> Result<()> {
        self.device.emit(&[event])?;
        Ok(())
    }
}

fn button_code(button_number: i32) -> u16 {
    match button_number {
        0 => Key::BTN_LEFT.code(),
        1 => Key::BTN_RIGHT.code(),
        _ => Key::BTN_MIDDLE.code(),
    }
}

impl InputInjector for LinuxInjector {
    fn key(&mut self, key_code: u16, down: bool) -> Result<()> {
        self.emit(InputEvent::new(EventType::KEY, key_code, down as i32))
    }

    fn mouse_button(&mut self, button_number: i32, down: bool) -> Result<()> {
        self.emit(InputEvent::new(EventType::KEY, button_code(button_number), down as i32))
    }

    fn mouse_motion(&mut self, target_x: f64, target_y: f64) -> Result<()> {
        let delta_x = target_x - self.last_pos.0;
        let delta_y = target_y - self.last_pos.1;
        self.last_pos = (target_x, target_y);
        self.device.emit(&[
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, delta_x as i32),
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_Y.0, delta_y as i32),
        ])?;
        Ok(())
    }

    fn warp(&mut self, x: f64, y: f64) -> Result<()> {
        // `uinput` has no absolute-positioning channel on a purely relative
        // virtual device: approximate the warp as the one large relative
        // motion that gets our own tracked position to the same place.
        let delta_x = x - self.last_pos.0;
        let delta_y = y - self.last_pos.1;
        self.last_pos = (x, y);
        self.device.emit(&[
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, delta_x as i32),
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_Y.0, delta_y as i32),
        ])?;
        Ok(())
    }

    fn scroll(&mut self, delta_x: f64, delta_y: f64) -> Result<()> {
        self.device.emit(&[
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_WHEEL.0, delta_y as i32),
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_HWHEEL.0, delta_x as i32),
        ])?;
        Ok(())
    }
}
