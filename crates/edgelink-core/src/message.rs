//! The wire vocabulary exchanged between Host and Client.
//!
//! Motion is always a relative delta; `WarpCursor` is the only channel
//! that carries an absolute position. Mixing the two (e.g. transmitting
//! normalised absolute coordinates for ordinary motion) reintroduces the
//! coordinate-skew failure mode this design deliberately avoids.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEvent {
    KeyDown,
    KeyUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionEvent {
    Moved,
    LeftDragged,
    RightDragged,
    OtherDragged,
}

/// `{Left|Right|Other} x {Down|Up}` collapsed into one tag, mirroring the
/// CGEventType alphabet this maps onto at the capture/injection layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonEvent {
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    OtherDown,
    OtherUp,
}

impl ButtonEvent {
    pub fn is_down(self) -> bool {
        matches!(self, Self::LeftDown | Self::RightDown | Self::OtherDown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureKind {
    Swipe,
    SmartZoom,
    MissionControlTap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureDirection {
    None,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GesturePhase {
    Began,
    Changed,
    Ended,
    Cancelled,
}

/// The single tagged sum transmitted over the wire. Coordinates
/// are never transmitted as absolute, normalised pixel positions for
/// motion — only deltas are authoritative, with `WarpCursor` the sole
/// absolute-position channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum InputMessage {
    Keyboard {
        key_code: u16,
        event: KeyEvent,
        flags: u64,
    },
    MouseMotion {
        delta_x: f64,
        delta_y: f64,
        event: MotionEvent,
    },
    MouseButton {
        event: ButtonEvent,
        button_number: i32,
        click_state: i64,
    },
    Scroll {
        delta_x: f64,
        delta_y: f64,
        scroll_phase: i64,
        momentum_phase: i64,
    },
    Gesture {
        gesture_kind: GestureKind,
        direction: GestureDirection,
        delta_x: f64,
        delta_y: f64,
        phase: GesturePhase,
        tap_count: i64,
        timestamp_ms: u64,
    },
    /// Peer requests transfer of control back to the other side.
    ControlRelease,
    /// Absolute target in the receiver's display frame.
    WarpCursor {
        x: f64,
        y: f64,
    },
    ScreenInfo {
        width: f64,
        height: f64,
        is_virtual: bool,
        display_id: Option<u32>,
    },
}

impl InputMessage {
    /// True for the message classes the transport is allowed to drop
    /// under sustained backpressure: plain motion, scroll without a
    /// gesture phase, and non-initial gesture updates. `Keyboard`,
    /// `MouseButton`, and `ControlRelease` are never droppable.
    pub fn is_droppable(&self) -> bool {
        match self {
            InputMessage::MouseMotion { .. } => true,
            InputMessage::Scroll { scroll_phase: 0, .. } => true,
            InputMessage::Gesture {
                phase: GesturePhase::Changed,
                ..
            } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn droppable_classes_match_spec() {
        assert!(InputMessage::MouseMotion {
            delta_x: 1.0,
            delta_y: 1.0,
            event: MotionEvent::Moved
        }
        .is_droppable());

        assert!(InputMessage::Scroll {
            delta_x: 0.0,
            delta_y: 1.0,
            scroll_phase: 0,
            momentum_phase: 0
        }
        .is_droppable());

        assert!(!InputMessage::Scroll {
            delta_x: 0.0,
            delta_y: 1.0,
            scroll_phase: 1,
            momentum_phase: 0
        }
        .is_droppable());

        assert!(InputMessage::Gesture {
            gesture_kind: GestureKind::Swipe,
            direction: GestureDirection::Left,
            delta_x: 0.0,
            delta_y: 0.0,
            phase: GesturePhase::Changed,
            tap_count: 0,
            timestamp_ms: 0,
        }
        .is_droppable());

        assert!(!InputMessage::Keyboard {
            key_code: 0x04,
            event: KeyEvent::KeyDown,
            flags: 0
        }
        .is_droppable());
        assert!(!InputMessage::MouseButton {
            event: ButtonEvent::LeftDown,
            button_number: 0,
            click_state: 1
        }
        .is_droppable());
        assert!(!InputMessage::ControlRelease.is_droppable());
    }
}
