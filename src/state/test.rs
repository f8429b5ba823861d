//! Testing utilities for `causerie::state`

use super::StateInner;
use crate::client::MessageQueueItem;
use crate::config::StateConfig;
use crate::ConnId;
use std::collections::HashMap;
use tokio::sync::mpsc;

pub(crate) type Queue = mpsc::UnboundedReceiver<MessageQueueItem>;

pub(crate) fn simple_state() -> StateInner {
    StateInner::new(StateConfig::default()).unwrap()
}

pub(crate) fn add_client(state: &mut StateInner) -> (ConnId, Queue) {
    let (queue, outgoing) = mpsc::unbounded_channel();
    let id = state.peer_joined("127.0.0.1".to_owned(), queue);
    (id, outgoing)
}

/// Registers `name` (password `pass1234`) and logs it in on a fresh
/// connection.  The registration and login replies are drained.
pub(crate) fn add_logged_in(state: &mut StateInner, name: &str) -> (ConnId, Queue, String) {
    let (id, mut queue) = add_client(state);
    state.handle_line(
        id,
        &format!(
            "REGISTER 9000 username={} password=pass1234 email={}@example.com",
            name, name
        ),
    );
    state.handle_line(id, &format!("LOGIN 9001 username={} password=pass1234", name));
    let rs = responses(&mut queue);
    let token = rs
        .iter()
        .find_map(|r| r.kv.get("token").cloned())
        .expect("login failed");
    (id, queue, token)
}

/// `a` invites `b`, `b` accepts.  The replies stay in the queues.
pub(crate) fn make_friends(
    state: &mut StateInner,
    ca: ConnId,
    ta: &str,
    a_name: &str,
    cb: ConnId,
    tb: &str,
    b_name: &str,
) {
    state.handle_line(ca, &format!("FRIEND_INVITE 9100 token={} username={}", ta, b_name));
    state.handle_line(cb, &format!("FRIEND_ACCEPT 9101 token={} username={}", tb, a_name));
}

/// Token of the session currently bound to `id`.
pub(crate) fn last_token(state: &StateInner, id: ConnId) -> String {
    state.clients[id].session_token().expect("no session").to_owned()
}

pub(crate) fn flush(queue: &mut Queue) {
    while queue.try_recv().is_ok() {}
}

/// One parsed server line.
#[derive(Debug)]
pub(crate) struct Resp {
    /// `OK`, `ERR` or `PUSH`.
    pub kind: String,
    /// Echoed request id (replies only).
    pub rid: String,
    /// Push subject (pushes only).
    pub subject: String,
    /// Numeric code (errors only).
    pub code: Option<u16>,
    /// Reason token (errors only).
    pub reason: Option<String>,
    pub kv: HashMap<String, String>,
    pub raw: String,
}

/// Drains the queue and parses every line the server wrote.
pub(crate) fn responses(queue: &mut Queue) -> Vec<Resp> {
    let mut collected = String::new();
    while let Ok(item) = queue.try_recv() {
        let s: &str = item.as_ref();
        collected.push_str(s);
    }
    collected.split("\r\n").filter(|l| !l.is_empty()).map(parse_line).collect()
}

fn parse_line(line: &str) -> Resp {
    let mut tokens = line.split(' ');
    let kind = tokens.next().unwrap_or("").to_owned();
    let head = tokens.next().unwrap_or("").to_owned();
    let (rid, subject) = if kind == "PUSH" {
        (String::new(), head)
    } else {
        (head, String::new())
    };

    let mut code = None;
    let mut reason = None;
    let mut kv = HashMap::new();
    let rest: Vec<&str> = tokens.collect();
    if kind == "ERR" {
        code = rest.first().and_then(|t| t.parse().ok());
        reason = rest.get(1).map(|t| t.to_string());
    } else {
        for token in rest {
            if let Some((key, value)) = token.split_once('=') {
                kv.insert(key.to_owned(), value.to_owned());
            }
        }
    }

    Resp {
        kind,
        rid,
        subject,
        code,
        reason,
        kv,
        raw: format!("{}\r\n", line),
    }
}

/// One `msg_id:from:content:ts` entry of a history reply.
#[derive(Debug)]
pub(crate) struct HistEntry {
    pub msg_id: u64,
    pub from: String,
    pub content: String,
    pub ts: i64,
}

pub(crate) fn history_entries(value: &str) -> Vec<HistEntry> {
    if value.is_empty() {
        return Vec::new();
    }
    value
        .split(',')
        .map(|entry| {
            let fields: Vec<&str> = entry.split(':').collect();
            assert_eq!(fields.len(), 4, "bad history entry {:?}", entry);
            HistEntry {
                msg_id: fields[0].parse().expect("bad msg_id"),
                from: fields[1].to_owned(),
                content: fields[2].to_owned(),
                ts: fields[3].parse().expect("bad ts"),
            }
        })
        .collect()
}
