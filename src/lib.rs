//! causerie, a small multi-user chat server.
//!
//! The wire protocol is line-oriented: clients send
//! `VERB req_id key=value...` requests, the server answers with a
//! correlated `OK`/`ERR` reply and may push `PUSH subject ...` lines at
//! any time.  See `causerie_tokens` for the framing details and
//! [`state::State`] for the command semantics.

pub mod client;
pub mod config;
pub mod net;
pub mod state;

mod auth;
mod db;
mod group;
mod history;
mod lines;
mod util;

pub use crate::config::Config;
pub use crate::state::State;

use std::io;
use tokio::net::TcpListener;

/// A registered account, identified by a server-assigned id.
pub type UserId = u64;
/// A group, identified by a server-assigned id.
pub type GroupId = u64;
/// A live connection, identified by its slot in the connection registry.
pub type ConnId = usize;

/// Binds the listener and runs the server until ctrl-c.
pub async fn run(config: Config) -> io::Result<()> {
    let state = State::new(config.state_config())?;
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let addr = listener.local_addr()?;

    // test harnesses wait for this line on stdout
    println!("Server listening on {}", addr);
    log::info!(
        "listening on {}, idle timeout {}s",
        addr,
        config.idle_timeout.as_secs()
    );

    tokio::select! {
        result = net::serve(listener, state) => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("interrupted, shutting down");
            Ok(())
        }
    }
}
