//! macOS capture via `CGEventTap`, injection via raw `CGEvent*` FFI.
//!
//! Capture uses the `core-graphics`/`core-foundation` crates' safe(r)
//! wrappers around the tap. Injection stays on raw `extern "C"` FFI calls
//! into CoreGraphics directly, covering this crate's full `InputMessage`
//! field set.

use std::ffi::c_void;
use std::ptr::null;
use std::thread;

use anyhow::{anyhow, Result};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use edgelink_core::{ButtonEvent, GestureDirection, GestureKind, GesturePhase, InputMessage, KeyEvent, MotionEvent};
use tokio::sync::mpsc;

use crate::control::ModifierMask;
use crate::{forward, InputCapture, InputInjector, Suppression};

fn flags_bits(flags: CGEventFlags) -> u64 {
    flags.bits()
}

/// Bit a `FlagsChanged` event's key code corresponds to, so `is_key_down`
/// can be derived from whether that bit is now set rather than assumed.
/// Left/right variants of a modifier share the same bit in `CGEventFlags`.
fn modifier_bit_for_key_code(key_code: u16) -> Option<u64> {
    Some(match key_code {
        0x38 | 0x3C => ModifierMask::MAC_SHIFT,
        0x3B | 0x3E => ModifierMask::MAC_CONTROL,
        0x3A | 0x3D => ModifierMask::MAC_ALTERNATE,
        0x37 | 0x36 => ModifierMask::MAC_COMMAND,
        _ => return None,
    })
}

fn motion_kind(event_type: CGEventType) -> Option<MotionEvent> {
    match event_type {
        CGEventType::MouseMoved => Some(MotionEvent::Moved),
        CGEventType::LeftMouseDragged => Some(MotionEvent::LeftDragged),
        CGEventType::RightMouseDragged => Some(MotionEvent::RightDragged),
        CGEventType::OtherMouseDragged => Some(MotionEvent::OtherDragged),
        _ => None,
    }
}

fn button_kind(event_type: CGEventType) -> Option<ButtonEvent> {
    match event_type {
        CGEventType::LeftMouseDown => Some(ButtonEvent::LeftDown),
        CGEventType::LeftMouseUp => Some(ButtonEvent::LeftUp),
        CGEventType::RightMouseDown => Some(ButtonEvent::RightDown),
        CGEventType::RightMouseUp => Some(ButtonEvent::RightUp),
        CGEventType::OtherMouseDown => Some(ButtonEvent::OtherDown),
        CGEventType::OtherMouseUp => Some(ButtonEvent::OtherUp),
        _ => None,
    }
}

/// Maps one tapped `CGEvent` to zero or more wire messages. A `FlagsChanged`
/// event's key-down/key-up is derived from whether its own modifier bit is
/// now set in its flags, not from the event type (both directions report
/// as `FlagsChanged`); a `FlagsChanged` whose key code isn't a recognised
/// modifier yields nothing.
fn map_event(event_type: CGEventType, event: &CGEvent) -> Option<InputMessage> {
    if let Some(motion) = motion_kind(event_type) {
        return Some(InputMessage::MouseMotion {
            delta_x: event.get_double_value_field(EventField::MOUSE_EVENT_DELTA_X),
            delta_y: event.get_double_value_field(EventField::MOUSE_EVENT_DELTA_Y),
            event: motion,
        });
    }
    if let Some(button) = button_kind(event_type) {
        return Some(InputMessage::MouseButton {
            event: button,
            button_number: event.get_integer_value_field(EventField::MOUSE_EVENT_BUTTON_NUMBER) as i32,
            click_state: event.get_integer_value_field(EventField::MOUSE_EVENT_CLICK_STATE),
        });
    }
    match event_type {
        CGEventType::KeyDown | CGEventType::KeyUp => Some(InputMessage::Keyboard {
            key_code: event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16,
            event: if event_type == CGEventType::KeyDown {
                KeyEvent::KeyDown
            } else {
                KeyEvent::KeyUp
            },
            flags: flags_bits(event.get_flags()),
        }),
        CGEventType::FlagsChanged => {
            let key_code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            let flags = flags_bits(event.get_flags());
            let bit = modifier_bit_for_key_code(key_code)?;
            Some(InputMessage::Keyboard {
                key_code,
                event: if flags & bit != 0 { KeyEvent::KeyDown } else { KeyEvent::KeyUp },
                flags,
            })
        }
        CGEventType::ScrollWheel => Some(InputMessage::Scroll {
            delta_x: event.get_double_value_field(EventField::SCROLL_WHEEL_EVENT_POINT_DELTA_AXIS_2),
            delta_y: event.get_double_value_field(EventField::SCROLL_WHEEL_EVENT_POINT_DELTA_AXIS_1),
            scroll_phase: event.get_integer_value_field(EventField::SCROLL_WHEEL_EVENT_SCROLL_PHASE),
            momentum_phase: event.get_integer_value_field(EventField::SCROLL_WHEEL_EVENT_MOMENTUM_PHASE),
        }),
        _ => None,
    }
}

/// Unused outside of documenting the gesture variants this tap never
/// produces on its own (trackpad gestures arrive through a separate NSEvent
/// path on macOS, not `CGEventTap`); kept so `GestureKind`/`GestureDirection`/
/// `GesturePhase` stay referenced from platform code for anyone extending
/// capture to that path.
#[allow(dead_code)]
fn unused_gesture_reference(_: GestureKind, _: GestureDirection, _: GesturePhase) {}

pub struct MacCapture {
    suppression: Suppression,
}

impl MacCapture {
    pub fn spawn(tx: mpsc::Sender<InputMessage>) -> Result<Self> {
        let suppression = Suppression::new();
        let tap_suppression = suppression.clone();

        thread::Builder::new()
            .name("edgelink-capture".into())
            .spawn(move || run_tap(tx, tap_suppression))
            .map_err(|e| anyhow!("failed to spawn capture thread: {e}"))?;

        Ok(Self { suppression })
    }
}

impl InputCapture for MacCapture {
    fn suppression(&self) -> Suppression {
        self.suppression.clone()
    }
}

fn run_tap(tx: mpsc::Sender<InputMessage>, suppression: Suppression) {
    let events_of_interest = vec![
        CGEventType::KeyDown,
        CGEventType::KeyUp,
        CGEventType::FlagsChanged,
        CGEventType::LeftMouseDown,
        CGEventType::LeftMouseUp,
        CGEventType::RightMouseDown,
        CGEventType::RightMouseUp,
        CGEventType::OtherMouseDown,
        CGEventType::OtherMouseUp,
        CGEventType::MouseMoved,
        CGEventType::LeftMouseDragged,
        CGEventType::RightMouseDragged,
        CGEventType::OtherMouseDragged,
        CGEventType::ScrollWheel,
    ];

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        events_of_interest,
        move |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| {
            if matches!(
                event_type,
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput
            ) {
                tracing::error!("macOS event tap disabled, input capture stopped");
                return Some(event.to_owned());
            }

            if let Some(msg) = map_event(event_type, event) {
                forward(&tx, msg);
            }

            if suppression.get() {
                event.set_type(CGEventType::Null);
            }
            Some(event.to_owned())
        },
    ) {
        Ok(tap) => tap,
        Err(()) => {
            tracing::error!("failed to create CGEventTap; is accessibility access granted?");
            return;
        }
    };

    match tap.mach_port.create_runloop_source(0) {
        Ok(source) => unsafe {
            CFRunLoop::get_current().add_source(&source, kCFRunLoopCommonModes);
        },
        Err(()) => {
            tracing::error!("failed to create run loop source for event tap");
            return;
        }
    }
    tap.enable();
    CFRunLoop::run_current();
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct CGPointFfi {
    x: f64,
    y: f64,
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventCreate(source: *const c_void) -> *mut c_void;
    fn CGEventGetLocation(event: *const c_void) -> CGPointFfi;
    fn CGEventCreateMouseEvent(
        source: *const c_void,
        mouse_type: u32,
        mouse_cursor_position: CGPointFfi,
        mouse_button: u32,
    ) -> *mut c_void;
    fn CGEventCreateKeyboardEvent(source: *const c_void, keycode: u16, keydown: bool) -> *mut c_void;
    fn CGEventCreateScrollWheelEvent2(
        source: *const c_void,
        units: u32,
        wheel_count: u32,
        wheel1: i32,
        wheel2: i32,
        wheel3: i32,
    ) -> *mut c_void;
    fn CGEventPost(tap: u32, event: *mut c_void);
    fn CGWarpMouseCursorPosition(new_cursor_position: CGPointFfi) -> i32;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRelease(cf: *const c_void);
}

const K_CG_EVENT_NULL: u32 = 0;
const K_CG_EVENT_LEFT_MOUSE_DOWN: u32 = 1;
const K_CG_EVENT_LEFT_MOUSE_UP: u32 = 2;
const K_CG_EVENT_RIGHT_MOUSE_DOWN: u32 = 3;
const K_CG_EVENT_RIGHT_MOUSE_UP: u32 = 4;
const K_CG_EVENT_MOUSE_MOVED: u32 = 5;
const K_CG_EVENT_OTHER_MOUSE_DOWN: u32 = 25;
const K_CG_EVENT_OTHER_MOUSE_UP: u32 = 26;

const K_CG_MOUSE_BUTTON_LEFT: u32 = 0;
const K_CG_MOUSE_BUTTON_RIGHT: u32 = 1;
const K_CG_MOUSE_BUTTON_CENTER: u32 = 2;

const K_CG_HID_EVENT_TAP: u32 = 0;
const K_CG_SCROLL_EVENT_UNIT_PIXEL: u32 = 0;

fn current_location() -> CGPointFfi {
    unsafe {
        let probe = CGEventCreate(null());
        let loc = CGEventGetLocation(probe);
        CFRelease(probe);
        loc
    }
}

pub struct MacInjector;

impl MacInjector {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}

unsafe impl Send for MacInjector {}

impl InputInjector for MacInjector {
    fn key(&mut self, key_code: u16, down: bool) -> Result<()> {
        unsafe {
            let ev = CGEventCreateKeyboardEvent(null(), key_code, down);
            if !ev.is_null() {
                CGEventPost(K_CG_HID_EVENT_TAP, ev);
                CFRelease(ev);
            }
        }
        Ok(())
    }

    fn mouse_button(&mut self, button_number: i32, down: bool) -> Result<()> {
        let (event_type, button) = match (button_number, down) {
            (0, true) => (K_CG_EVENT_LEFT_MOUSE_DOWN, K_CG_MOUSE_BUTTON_LEFT),
            (0, false) => (K_CG_EVENT_LEFT_MOUSE_UP, K_CG_MOUSE_BUTTON_LEFT),
            (1, true) => (K_CG_EVENT_RIGHT_MOUSE_DOWN, K_CG_MOUSE_BUTTON_RIGHT),
            (1, false) => (K_CG_EVENT_RIGHT_MOUSE_UP, K_CG_MOUSE_BUTTON_RIGHT),
            (_, true) => (K_CG_EVENT_OTHER_MOUSE_DOWN, K_CG_MOUSE_BUTTON_CENTER),
            (_, false) => (K_CG_EVENT_OTHER_MOUSE_UP, K_CG_MOUSE_BUTTON_CENTER),
        };
        unsafe {
            let loc = current_location();
            let ev = CGEventCreateMouseEvent(null(), event_type, loc, button);
            if !ev.is_null() {
                CGEventPost(K_CG_HID_EVENT_TAP, ev);
                CFRelease(ev);
            }
        }
        Ok(())
    }

    fn mouse_motion(&mut self, target_x: f64, target_y: f64) -> Result<()> {
        unsafe {
            let target = CGPointFfi { x: target_x, y: target_y };
            let ev = CGEventCreateMouseEvent(null(), K_CG_EVENT_MOUSE_MOVED, target, K_CG_MOUSE_BUTTON_LEFT);
            if !ev.is_null() {
                CGEventPost(K_CG_HID_EVENT_TAP, ev);
                CFRelease(ev);
            }
        }
        Ok(())
    }

    fn warp(&mut self, x: f64, y: f64) -> Result<()> {
        unsafe {
            let target = CGPointFfi { x, y };
            CGWarpMouseCursorPosition(target);
        }
        Ok(())
    }

    fn scroll(&mut self, delta_x: f64, delta_y: f64) -> Result<()> {
        unsafe {
            let ev = CGEventCreateScrollWheelEvent2(
                null(),
                K_CG_SCROLL_EVENT_UNIT_PIXEL,
                2,
                delta_y as i32,
                delta_x as i32,
                0,
            );
            if !ev.is_null() {
                CGEventPost(K_CG_HID_EVENT_TAP, ev);
                CFRelease(ev);
            }
        }
        let _ = K_CG_EVENT_NULL;
        Ok(())
    }
}
