//! Client process: listens for a single Host connection and replays
//! whatever arrives as synthetic local input.

use std::collections::HashSet;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use edgelink_core::{DisplayFrame, InputMessage, KeyEvent, DEFAULT_PORT};
use edgelink_net::{ClientAcceptLoop, Connection};
use edgelink_platform::{new_injector, InputInjector};
use tokio::sync::mpsc;
use tracing::{info, warn};

const INBOUND_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "edgelink-client", about = "Accepts an edgelink-host connection and replays its input locally")]
struct Args {
    /// Port to listen on for the Host's connection.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// This machine's screen width, reported to the Host so it can clamp
    /// and warp the shared cursor correctly.
    #[arg(long, default_value_t = 1920.0)]
    width: f64,

    /// This machine's screen height.
    #[arg(long, default_value_t = 1080.0)]
    height: f64,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,
}

/// Tracks keys/buttons this process has injected as "down" so a dropped
/// connection can release them instead of leaving a stuck key.
#[derive(Default)]
struct HeldInput {
    keys: HashSet<u16>,
    left_down: bool,
    right_down: bool,
    other_down: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    edgelink_core::init_tracing();

    let frame = DisplayFrame::new((0.0, 0.0), (args.width, args.height));
    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse().expect("valid bind address");
    let accept_loop = ClientAcceptLoop::bind(addr).await.context("failed to bind listener")?;

    let mut injector = new_injector().context("failed to initialize input injector")?;
    let mut cursor = (0.0_f64, 0.0_f64);
    let mut held = HeldInput::default();

    // Tracks the single currently-active Host connection. A second Host
    // dialing in pre-empts whatever is here: `accept_next` is raced against
    // servicing the current connection rather than only being retried once
    // the current one has already gone down, so the old connection never
    // lingers while a new one is already live.
    let mut current: Option<Connection> = None;
    let mut inbound_rx: Option<mpsc::Receiver<InputMessage>> = None;

    loop {
        let (new_tx, new_rx) = mpsc::channel::<InputMessage>(INBOUND_CHANNEL_CAPACITY);
        tokio::select! {
            accepted = accept_loop.accept_next(new_tx) => {
                let conn = accepted?;
                if current.take().is_some() {
                    info!("new host connection arrived, pre-empting the active one");
                    release_all(&mut *injector, &mut held);
                }
                conn.send(InputMessage::ScreenInfo {
                    width: args.width,
                    height: args.height,
                    is_virtual: false,
                    display_id: None,
                })
                .await;
                info!(width = args.width, height = args.height, "ready, replaying input from host");
                current = Some(conn);
                inbound_rx = Some(new_rx);
            }
            msg = recv_current(inbound_rx.as_mut()) => {
                match msg {
                    Some(msg) => replay(&mut *injector, &frame, &mut cursor, &mut held, msg),
                    None => {
                        current = None;
                        inbound_rx = None;
                    }
                }
            }
            _ = until_down_current(current.as_ref()) => {
                warn!("host connection dropped, releasing any held input");
                release_all(&mut *injector, &mut held);
                current = None;
                inbound_rx = None;
            }
        }
    }
}

/// Awaits the current connection's inbound channel, or never resolves if
/// there isn't one yet, so it can sit alongside the accept branch in a
/// `select!` without disabling it via a precondition.
async fn recv_current(rx: Option<&mut mpsc::Receiver<InputMessage>>) -> Option<InputMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn until_down_current(conn: Option<&Connection>) {
    match conn {
        Some(conn) => conn.until_down().await,
        None => std::future::pending().await,
    }
}

fn replay(injector: &mut dyn InputInjector, frame: &DisplayFrame, cursor: &mut (f64, f64), held: &mut HeldInput, msg: InputMessage) {
    let result = match msg {
        InputMessage::Keyboard { key_code, event, .. } => {
            let down = event == KeyEvent::KeyDown;
            if down {
                held.keys.insert(key_code);
            } else {
                held.keys.remove(&key_code);
            }
            injector.key(key_code, down)
        }
        InputMessage::MouseMotion { delta_x, delta_y, .. } => {
            *cursor = frame.clamp((cursor.0 + delta_x, cursor.1 + delta_y));
            injector.mouse_motion(cursor.0, cursor.1)
        }
        InputMessage::MouseButton { event, button_number, .. } => {
            match button_number {
                0 => held.left_down = event.is_down(),
                1 => held.right_down = event.is_down(),
                _ => held.other_down = event.is_down(),
            }
            injector.mouse_button(button_number, event.is_down())
        }
        InputMessage::Scroll { delta_x, delta_y, .. } => injector.scroll(delta_x, delta_y),
        InputMessage::WarpCursor { x, y } => {
            *cursor = frame.clamp((x, y));
            injector.warp(cursor.0, cursor.1)
        }
        InputMessage::ControlRelease | InputMessage::ScreenInfo { .. } | InputMessage::Gesture { .. } => Ok(()),
    };
    if let Err(err) = result {
        warn!(%err, "failed to replay input event");
    }
}

fn release_all(injector: &mut dyn InputInjector, held: &mut HeldInput) {
    for key_code in held.keys.drain() {
        let _ = injector.key(key_code, false);
    }
    if held.left_down {
        let _ = injector.mouse_button(0, false);
        held.left_down = false;
    }
    if held.right_down {
        let _ = injector.mouse_button(1, false);
        held.right_down = false;
    }
    if held.other_down {
        let _ = injector.mouse_button(2, false);
        held.other_down = false;
    }
}
