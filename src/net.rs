//! The accept loop, the per-connection tasks and the idle reaper.

use crate::state::State;
use causerie_reader::LineReader;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const REAPER_PERIOD: Duration = Duration::from_secs(1);

/// Runs the server on an already-bound listener until an accept error.
///
/// Drives the accept loop and the session reaper together; each accepted
/// connection gets its own task.
pub async fn serve(listener: TcpListener, state: State) -> io::Result<()> {
    tokio::select! {
        result = accept_loop(listener, state.clone()) => result,
        _ = reap_loop(state) => unreachable!("the reaper never stops"),
    }
}

async fn accept_loop(listener: TcpListener, state: State) -> io::Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            handle_connection(socket, addr, state).await;
        });
    }
}

async fn reap_loop(state: State) {
    let mut interval = tokio::time::interval(REAPER_PERIOD);
    loop {
        interval.tick().await;
        state.sweep_idle_sessions().await;
    }
}

/// Owns one connection: reads lines into the state, writes queued lines
/// out, until either side gives up.
async fn handle_connection(socket: TcpStream, addr: SocketAddr, state: State) {
    let _ = socket.set_nodelay(true);
    let (read_half, mut write_half) = socket.into_split();
    let (queue, mut outgoing) = mpsc::unbounded_channel();
    let id = state.peer_joined(addr.ip().to_string(), queue).await;
    let mut reader = LineReader::new(read_half);

    let mut quit_err: Option<io::Error> = None;
    loop {
        tokio::select! {
            line = reader.next_line() => match line {
                Ok(Some(line)) => state.handle_line(id, &line).await,
                Ok(None) => break,
                Err(err) => {
                    quit_err = Some(err);
                    break;
                }
            },
            msg = outgoing.recv() => match msg {
                Some(msg) => {
                    let bytes: &[u8] = msg.as_ref();
                    if let Err(err) = write_half.write_all(bytes).await {
                        quit_err = Some(err);
                        break;
                    }
                }
                // the state dropped the client: server-side close
                None => break,
            },
        }
    }

    // write whatever the state queued before the close decision
    while let Ok(msg) = outgoing.try_recv() {
        let bytes: &[u8] = msg.as_ref();
        if write_half.write_all(bytes).await.is_err() {
            break;
        }
    }
    let _ = write_half.shutdown().await;
    state.peer_quit(id, quit_err).await;
}
