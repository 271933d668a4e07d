//! TCP transport for edgelink: framed connection, `Up`/`Down` lifecycle,
//! and the Host/Client lifecycle supervisors.

pub mod connection;
pub mod supervisor;

pub use connection::{ConnState, Connection};
pub use supervisor::{run_host_connect_loop, ClientAcceptLoop, SETTLE_DELAY};
