//! Host process: owns the physical keyboard and mouse, dials out to an
//! `edgelink-client`, and decides when control passes between them.

use std::net::SocketAddr;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use edgelink_core::{DisplayFrame, InputMessage, KeyEvent};
use edgelink_net::{run_host_connect_loop, Connection};
use edgelink_platform::{
    parse_hotkey, spawn_capture, ControlEffect, ControlEvent, ControlStateMachine, EdgeDetector, Hotkey,
    InputCapture, ModifierMask, Suppression,
};
use tokio::sync::mpsc;
use tracing::info;

const CAPTURE_CHANNEL_CAPACITY: usize = 256;
const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// The Host's own screen is assumed to start at the origin; only the
/// left edge of the primary display matters for the enter-remote check.
const HOST_LEFT_EDGE: f64 = 0.0;

#[derive(Parser, Debug)]
#[command(name = "edgelink-host", about = "Shares this machine's keyboard and mouse with an edgelink-client peer")]
struct Args {
    /// Address of the edgelink-client process, e.g. 192.168.1.20:9876
    #[arg(long)]
    client_addr: SocketAddr,

    /// Hotkey combo that toggles control, e.g. "ctrl+alt+cmd+space"
    #[arg(long, default_value = "ctrl+alt+cmd+space")]
    hotkey: String,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,
}

struct RemoteTracking {
    peer_frame: DisplayFrame,
    virtual_pos: (f64, f64),
}

impl Default for RemoteTracking {
    fn default() -> Self {
        Self {
            peer_frame: DisplayFrame::new((0.0, 0.0), (1920.0, 1080.0)),
            virtual_pos: (0.0, 0.0),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    edgelink_core::init_tracing();

    let hotkey = parse_hotkey(&args.hotkey).context("invalid --hotkey")?;

    let (capture_tx, mut capture_rx) = mpsc::channel::<InputMessage>(CAPTURE_CHANNEL_CAPACITY);
    let capture = spawn_capture(capture_tx).context("failed to start input capture")?;
    let suppression = capture.suppression();

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InputMessage>(INBOUND_CHANNEL_CAPACITY);
    let mut connection = run_host_connect_loop(args.client_addr, inbound_tx.clone()).await?;

    let mut control = ControlStateMachine::new(0.0);
    let mut enter_edge = EdgeDetector::default();
    let mut release_edge = EdgeDetector::default();
    let started = Instant::now();
    let mut host_pos: (f64, f64) = (0.0, 0.0);
    let mut remote = RemoteTracking::default();

    info!(addr = %args.client_addr, hotkey = %args.hotkey, "edgelink-host ready");

    loop {
        tokio::select! {
            Some(msg) = capture_rx.recv() => {
                handle_captured(
                    msg,
                    &mut control,
                    &mut enter_edge,
                    &mut release_edge,
                    &suppression,
                    &connection,
                    &mut host_pos,
                    &mut remote,
                    hotkey,
                    started,
                )
                .await;
            }
            Some(msg) = inbound_rx.recv() => {
                handle_inbound(msg, &mut control, &mut remote);
            }
            _ = connection.until_down() => {
                info!("connection to client lost, resetting to Local");
                for effect in control.handle(ControlEvent::ConnectionDown) {
                    apply_effect(effect, &suppression, &connection).await;
                }
                enter_edge.reset();
                release_edge.reset();
                connection = run_host_connect_loop(args.client_addr, inbound_tx.clone()).await?;
            }
        }
    }
}

fn handle_inbound(msg: InputMessage, control: &mut ControlStateMachine, remote: &mut RemoteTracking) {
    match msg {
        InputMessage::ScreenInfo { width, height, .. } => {
            remote.peer_frame = DisplayFrame::new((0.0, 0.0), (width, height));
            control.set_peer_far_right(width - 1.0);
        }
        // The Host is always the side that owns the physical devices, so
        // it never receives injected input back; anything else arriving
        // here is either a stray `ControlRelease` echo or not meaningful
        // on this side.
        _ => {}
    }
}

async fn handle_captured(
    msg: InputMessage,
    control: &mut ControlStateMachine,
    enter_edge: &mut EdgeDetector,
    release_edge: &mut EdgeDetector,
    suppression: &Suppression,
    connection: &Connection,
    host_pos: &mut (f64, f64),
    remote: &mut RemoteTracking,
    hotkey: Hotkey,
    started: Instant,
) {
    use edgelink_platform::ControlMode;

    let now = started.elapsed().as_secs_f64();

    if control.mode() == ControlMode::PendingRelease {
        for effect in control.handle(ControlEvent::ReleaseAcked) {
            apply_effect(effect, suppression, connection).await;
        }
        return;
    }

    if let InputMessage::Keyboard { key_code, event, flags } = &msg {
        let mods = ModifierMask::from_mac_flags(*flags);
        if *event == KeyEvent::KeyDown && control.is_hotkey_down(hotkey, *key_code, mods) {
            control.note_hotkey_down(*key_code);
            for effect in control.handle(ControlEvent::Hotkey) {
                apply_effect(effect, suppression, connection).await;
            }
            return;
        }
        if *event == KeyEvent::KeyUp && control.take_hotkey_up(*key_code) {
            return;
        }
    }

    if let InputMessage::MouseMotion { delta_x, delta_y, .. } = &msg {
        host_pos.0 += delta_x;
        host_pos.1 += delta_y;
    }

    match control.mode() {
        ControlMode::Local => {
            if let InputMessage::MouseMotion { delta_x, .. } = &msg {
                if enter_edge.should_enter_remote(now, *host_pos, *delta_x, HOST_LEFT_EDGE) {
                    // The warp this triggers always lands the peer's cursor
                    // at (peer_far_right, 0.0); the shadow position is set
                    // to match exactly rather than carrying over whatever
                    // it held from a previous Remote session.
                    remote.virtual_pos = (remote.peer_frame.max_x() - 1.0, remote.peer_frame.min_y());
                    enter_edge.record_warp(now);
                    // The shadow cursor starts right at the peer's right
                    // edge, so `release_edge`'s own grace window must be
                    // armed here too or the very next Remote-mode motion
                    // would immediately trip `should_release`.
                    release_edge.record_warp(now);
                    for effect in control.handle(ControlEvent::EdgeLeftCrossed) {
                        apply_effect(effect, suppression, connection).await;
                    }
                }
            }
        }
        ControlMode::Remote => {
            if let InputMessage::MouseMotion { delta_x, delta_y, .. } = &msg {
                // Only Remote-mode deltas are ever forwarded to the peer, so
                // only they should move the shadow of its cursor; motion
                // captured while Local never reaches the peer and must not
                // drift this value.
                remote.virtual_pos = remote.peer_frame.clamp((remote.virtual_pos.0 + delta_x, remote.virtual_pos.1 + delta_y));
                if release_edge.should_release(now, remote.virtual_pos, remote.peer_frame.max_x()) {
                    for effect in control.handle(ControlEvent::EdgeRightCrossed) {
                        apply_effect(effect, suppression, connection).await;
                    }
                }
            }
            connection.send(msg).await;
        }
        ControlMode::PendingRelease => unreachable!("handled above"),
    }
}

async fn apply_effect(effect: ControlEffect, suppression: &Suppression, connection: &Connection) {
    match effect {
        ControlEffect::SetSuppression(flag) => suppression.set(flag),
        ControlEffect::Emit(msg) => connection.send(msg).await,
    }
}
