//! Control state machine.

use std::collections::HashSet;

use edgelink_core::InputMessage;

/// `{Local, Remote, PendingRelease}` with an initial value of `Local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Local,
    Remote,
    /// Transient: entered only on the Host when it has emitted
    /// `ControlRelease` and is waiting for the peer to resume local
    /// input handling.
    PendingRelease,
}

/// The four modifier keys a hotkey mask is compared against, after
/// intersecting with the raw flags so caps-lock and fn never spoil a
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifierMask {
    pub ctrl: bool,
    pub alt: bool,
    pub cmd: bool,
    pub shift: bool,
}

impl ModifierMask {
    pub(crate) const MAC_SHIFT: u64 = 0x0002_0000;
    pub(crate) const MAC_CONTROL: u64 = 0x0004_0000;
    pub(crate) const MAC_ALTERNATE: u64 = 0x0008_0000;
    pub(crate) const MAC_COMMAND: u64 = 0x0010_0000;

    /// Decodes the `CGEventFlags` bit layout captured in a `Keyboard`
    /// message's `flags` field on macOS. Other platforms currently leave
    /// `flags` at zero, so this decodes to "no modifiers" there too.
    pub fn from_mac_flags(flags: u64) -> Self {
        Self {
            ctrl: flags & Self::MAC_CONTROL != 0,
            alt: flags & Self::MAC_ALTERNATE != 0,
            cmd: flags & Self::MAC_COMMAND != 0,
            shift: flags & Self::MAC_SHIFT != 0,
        }
    }
}

/// A parsed hotkey: a key token plus the modifiers that must be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub key_code: u16,
    pub modifiers: ModifierMask,
}

/// A side effect the control state machine asks its owner to perform.
/// The SM itself never touches the network or the input tap directly —
/// it only decides what should happen.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEffect {
    /// Send this message to the peer.
    Emit(InputMessage),
    /// Start (or stop) suppressing local input and forwarding it
    /// instead. `true` means "now suppressing", `false` means "stop".
    SetSuppression(bool),
}

/// Inputs the control state machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Hotkey,
    EdgeLeftCrossed,
    EdgeRightCrossed,
    PeerControlRelease,
    /// The Host observed the first local input after requesting release
    /// (the "Ack / first local input seen" transition out of
    /// `PendingRelease`).
    ReleaseAcked,
    ConnectionDown,
}

/// Holds the current `ControlMode` and the modifiers a hotkey-down
/// currently has held, so the matching key-up can also be swallowed
/// so the matching key-up doesn't reach the foreground application.
pub struct ControlStateMachine {
    mode: ControlMode,
    held_hotkey_codes: HashSet<u16>,
    /// Far-right x coordinate of the peer's display frame, used for the
    /// `WarpCursor` emitted on an edge-left crossing.
    peer_far_right: f64,
}

impl ControlStateMachine {
    pub fn new(peer_far_right: f64) -> Self {
        Self {
            mode: ControlMode::Local,
            held_hotkey_codes: HashSet::new(),
            peer_far_right,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn set_peer_far_right(&mut self, x: f64) {
        self.peer_far_right = x;
    }

    /// Apply one event, returning the side effects the caller should
    /// perform.
    pub fn handle(&mut self, event: ControlEvent) -> Vec<ControlEffect> {
        match (self.mode, event) {
            (ControlMode::Local, ControlEvent::Hotkey) => {
                self.mode = ControlMode::Remote;
                vec![ControlEffect::SetSuppression(true)]
            }
            (ControlMode::Local, ControlEvent::EdgeLeftCrossed) => {
                self.mode = ControlMode::Remote;
                vec![
                    ControlEffect::SetSuppression(true),
                    ControlEffect::Emit(InputMessage::WarpCursor {
                        x: self.peer_far_right,
                        y: 0.0,
                    }),
                ]
            }
            (ControlMode::Remote, ControlEvent::Hotkey) => {
                self.mode = ControlMode::Local;
                vec![ControlEffect::SetSuppression(false)]
            }
            (ControlMode::Remote, ControlEvent::EdgeRightCrossed) => {
                self.mode = ControlMode::PendingRelease;
                vec![ControlEffect::Emit(InputMessage::ControlRelease)]
            }
            (ControlMode::PendingRelease, ControlEvent::ReleaseAcked) => {
                self.mode = ControlMode::Local;
                vec![ControlEffect::SetSuppression(false)]
            }
            (_, ControlEvent::ConnectionDown) => {
                self.mode = ControlMode::Local;
                vec![ControlEffect::SetSuppression(false)]
            }
            // Peer-side handling of ControlRelease: the receiving node
            // (which is in Remote because it's the one driving the
            // sender) returns to Local and stops the would-be injection
            // suppression bookkeeping it never held in the first place;
            // modelled as a no-op transition away from Remote.
            (ControlMode::Remote, ControlEvent::PeerControlRelease) => {
                self.mode = ControlMode::Local;
                vec![ControlEffect::SetSuppression(false)]
            }
            _ => vec![],
        }
    }

    /// Recognised only on `KeyDown` with the exact configured modifier
    /// mask, after intersecting with `{Ctrl, Alt, Cmd, Shift}`.
    pub fn is_hotkey_down(&self, hotkey: Hotkey, key_code: u16, mods: ModifierMask) -> bool {
        key_code == hotkey.key_code && mods == hotkey.modifiers
    }

    /// Records that `key_code` is currently depressed as part of a
    /// matched hotkey, so the corresponding key-up can also be swallowed.
    pub fn note_hotkey_down(&mut self, key_code: u16) {
        self.held_hotkey_codes.insert(key_code);
    }

    /// True if `key_code`'s key-up should be swallowed because it was
    /// part of a hotkey chord. Clears the bookkeeping for that code.
    pub fn take_hotkey_up(&mut self, key_code: u16) -> bool {
        self.held_hotkey_codes.remove(&key_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_hotkeys_return_to_start() {
        let mut sm = ControlStateMachine::new(1920.0);
        assert_eq!(sm.mode(), ControlMode::Local);
        sm.handle(ControlEvent::Hotkey);
        assert_eq!(sm.mode(), ControlMode::Remote);
        sm.handle(ControlEvent::Hotkey);
        assert_eq!(sm.mode(), ControlMode::Local);
    }

    #[test]
    fn connection_down_always_goes_local() {
        for start in [ControlMode::Local, ControlMode::Remote, ControlMode::PendingRelease] {
            let mut sm = ControlStateMachine::new(1920.0);
            sm.mode = start;
            sm.handle(ControlEvent::ConnectionDown);
            assert_eq!(sm.mode(), ControlMode::Local);
        }
    }

    #[test]
    fn edge_crossing_on_client_emits_warp_and_enters_remote() {
        let mut sm = ControlStateMachine::new(2000.0);
        let effects = sm.handle(ControlEvent::EdgeLeftCrossed);
        assert_eq!(sm.mode(), ControlMode::Remote);
        assert!(effects.contains(&ControlEffect::SetSuppression(true)));
        assert!(effects
            .iter()
            .any(|e| matches!(e, ControlEffect::Emit(InputMessage::WarpCursor { x, .. }) if *x == 2000.0)));
    }

    #[test]
    fn edge_crossing_on_host_requests_release() {
        let mut sm = ControlStateMachine::new(0.0);
        sm.handle(ControlEvent::Hotkey);
        assert_eq!(sm.mode(), ControlMode::Remote);
        let effects = sm.handle(ControlEvent::EdgeRightCrossed);
        assert_eq!(sm.mode(), ControlMode::PendingRelease);
        assert_eq!(effects, vec![ControlEffect::Emit(InputMessage::ControlRelease)]);
    }

    #[test]
    fn pending_release_acked_returns_to_local() {
        let mut sm = ControlStateMachine::new(0.0);
        sm.mode = ControlMode::PendingRelease;
        sm.handle(ControlEvent::ReleaseAcked);
        assert_eq!(sm.mode(), ControlMode::Local);
    }

    #[test]
    fn hotkey_swallows_matching_key_up() {
        let mut sm = ControlStateMachine::new(0.0);
        sm.note_hotkey_down(0x04);
        assert!(sm.take_hotkey_up(0x04));
        // Only swallowed once; a later unrelated key-up passes through.
        assert!(!sm.take_hotkey_up(0x04));
    }

    #[test]
    fn hotkey_mask_ignores_caps_lock_and_fn() {
        let sm = ControlStateMachine::new(0.0);
        let hotkey = Hotkey {
            key_code: 0x04,
            modifiers: ModifierMask {
                ctrl: true,
                alt: true,
                cmd: true,
                shift: false,
            },
        };
        let mods = ModifierMask {
            ctrl: true,
            alt: true,
            cmd: true,
            shift: false,
        };
        assert!(sm.is_hotkey_down(hotkey, 0x04, mods));
    }
}
