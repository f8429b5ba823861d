//! Shared state and API to handle incoming commands.
//!
//! This module is split in several files:
//!
//! - `mod.rs`: public API of the server state, the dispatcher and send
//!   utilities
//! - `accounts.rs`: handlers for account and session commands
//! - `friends.rs`: handlers for the FRIEND_* commands
//! - `groups.rs`: handlers for the GROUP_* commands
//! - `pm.rs`: handlers for private messaging
//! - `gm.rs`: handlers for group messaging

use crate::auth::User;
use crate::client::{ChatFocus, Client, MessageQueue, MessageQueueItem};
use crate::config::StateConfig;
use crate::db::{self, Db};
use crate::group::Group;
use crate::history::{Conversation, GmRecord, PairKey, PmRecord, DEFAULT_LIMIT, MAX_LIMIT};
use crate::lines;
use crate::{ConnId, GroupId, UserId};
use causerie_tokens::{code, Buffer, Command, Message, ReplyBuffer};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use slab::Slab;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

mod accounts;
mod friends;
mod gm;
mod groups;
mod pm;
#[cfg(test)]
mod test;

type HandlerResult = Result<(), ()>;

pub struct CommandContext<'a> {
    id: ConnId,
    rb: &'a mut ReplyBuffer,
    /// Set when the command was authenticated by the dispatcher.
    user: Option<UserId>,
}

/// An authenticated binding between a token, a user and a connection.
///
/// Sessions are runtime-only; they never survive a restart.
struct Session {
    user_id: UserId,
    conn: ConnId,
    last_activity: Instant,
}

/// State of the chat server.
///
/// This is just an `Arc` to the real data, so it's cheap to clone and
/// clones share the same data.
///
/// Each connection is identified by the `ConnId` returned from
/// [`State::peer_joined`].  The state pushes outgoing lines onto the
/// connection's queue; the network task at the other end writes them to the
/// socket in order, which stands in for a per-connection send mutex.
///
/// # Example
///
/// ```rust
/// # use causerie::state::State;
/// # use causerie::config::StateConfig;
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let state = State::new(StateConfig::default()).unwrap();
///
/// // The state uses a MPSC queue and pushes the lines meant to be sent
/// // to the client onto the queue.
/// let (queue, mut outgoing) = tokio::sync::mpsc::unbounded_channel();
/// let id = state.peer_joined("127.0.0.1".to_owned(), queue).await;
///
/// state.handle_line(id, "PING 1").await;
///
/// // Outgoing items implement `AsRef<[u8]>` and `AsRef<str>`.
/// let msg = outgoing.recv().await.unwrap();
/// let msg: &str = msg.as_ref();
/// assert_eq!(msg, "OK 1 pong=1\r\n");
/// # });
/// ```
#[derive(Clone)]
pub struct State(Arc<Mutex<StateInner>>);

impl State {
    /// Initializes the state, loading the persistent stores when a data
    /// directory is configured.
    pub fn new(config: StateConfig) -> io::Result<Self> {
        let inner = StateInner::new(config)?;
        Ok(Self(Arc::new(Mutex::new(inner))))
    }

    /// Adds a new connection to the state and returns its id.
    ///
    /// The queue is used to push lines back to the peer.
    pub async fn peer_joined(&self, host: String, queue: MessageQueue) -> ConnId {
        self.0.lock().await.peer_joined(host, queue)
    }

    /// Removes the given connection from the state, with an optional error.
    ///
    /// Any session bound to the connection is destroyed and its open chat is
    /// left, so that no closed connection lingers in a live room.
    pub async fn peer_quit(&self, id: ConnId, err: Option<io::Error>) {
        self.0.lock().await.peer_quit(id, err);
    }

    /// Updates the state according to the given line from the given client.
    pub async fn handle_line(&self, id: ConnId, line: &str) {
        self.0.lock().await.handle_line(id, line);
    }

    /// Destroys every session idle for longer than the configured timeout.
    ///
    /// Driven by the reaper task, once per second.
    pub async fn sweep_idle_sessions(&self) {
        self.0.lock().await.sweep_idle_sessions();
    }
}

/// The actual shared data (state) of the chat server.
pub(crate) struct StateInner {
    /// Live connections, keyed by connection id.
    clients: Slab<Client>,

    /// Registered accounts, with a username index.
    users: HashMap<UserId, User>,
    users_by_name: HashMap<String, UserId>,
    next_user_id: UserId,

    /// Live sessions, by token, with a per-user index that enforces the
    /// single-active-session rule.
    sessions: HashMap<String, Session>,
    sessions_by_user: HashMap<UserId, String>,

    /// Mutual friendships (normalized pairs) and directed pending invites.
    friendships: HashSet<PairKey>,
    invites: HashSet<(UserId, UserId)>,

    groups: HashMap<GroupId, Group>,
    next_group_id: GroupId,

    /// Private conversations, one per unordered pair of users.
    convs: HashMap<PairKey, Conversation>,
    /// Unread counters, keyed by `(viewer, peer)`.  Runtime-only.
    unread: HashMap<(UserId, UserId), u64>,

    idle_timeout: Duration,
    db: Option<Db>,
    rng: ChaCha20Rng,
}

impl StateInner {
    pub fn new(config: StateConfig) -> io::Result<Self> {
        let db = match &config.data_dir {
            Some(dir) => match Db::open(dir) {
                Ok(db) => Some(db),
                Err(err) => {
                    log::warn!(
                        "cannot use data directory {:?}: {}; running without persistence",
                        dir,
                        err
                    );
                    None
                }
            },
            None => None,
        };

        let mut state = Self {
            clients: Slab::new(),
            users: HashMap::new(),
            users_by_name: HashMap::new(),
            next_user_id: 1,
            sessions: HashMap::new(),
            sessions_by_user: HashMap::new(),
            friendships: HashSet::new(),
            invites: HashSet::new(),
            groups: HashMap::new(),
            next_group_id: 1,
            convs: HashMap::new(),
            unread: HashMap::new(),
            idle_timeout: config.idle_timeout,
            db,
            rng: ChaCha20Rng::from_entropy(),
        };
        state.load()?;
        Ok(state)
    }

    fn load(&mut self) -> io::Result<()> {
        let db = match &self.db {
            Some(db) => db,
            None => return Ok(()),
        };
        if let Some(users) = db.load_users()? {
            self.next_user_id = users.next_user_id;
            for user in users.users {
                self.users_by_name.insert(user.username.clone(), user.user_id);
                self.users.insert(user.user_id, user);
            }
        }
        if let Some(friends) = db.load_friends()? {
            self.friendships = friends
                .friendships
                .into_iter()
                .map(|(a, b)| PairKey::new(a, b))
                .collect();
            self.invites = friends.invites.into_iter().collect();
        }
        if let Some(groups) = db.load_groups()? {
            self.next_group_id = groups.next_group_id;
            for group in groups.groups {
                self.groups.insert(group.id, group);
            }
        }
        if let Some(pms) = db.load_pms()? {
            self.convs = pms.conversations.into_iter().collect();
        }
        log::info!(
            "loaded {} users, {} groups, {} conversations",
            self.users.len(),
            self.groups.len(),
            self.convs.len()
        );
        Ok(())
    }

    pub fn peer_joined(&mut self, host: String, queue: MessageQueue) -> ConnId {
        let id = self.clients.insert(Client::new(queue, host));
        log::debug!("{}: connected from {}", id, self.clients[id].host());
        id
    }

    pub fn peer_quit(&mut self, id: ConnId, err: Option<io::Error>) {
        if !self.clients.contains(id) {
            return;
        }
        match err {
            Some(err) => log::debug!("{}: disconnected: {}", id, err),
            None => log::debug!("{}: disconnected", id),
        }
        if let Some(token) = self.clients[id].session_token().map(str::to_owned) {
            self.destroy_session(&token);
        }
        self.clients.remove(id);
    }

    pub fn handle_line(&mut self, id: ConnId, line: &str) {
        if !self.clients.contains(id) {
            return;
        }
        let msg = match Message::parse(line) {
            Some(msg) => msg,
            None => {
                if !line.trim().is_empty() {
                    let mut buf = Buffer::new();
                    buf.err("-", code::BAD_REQUEST, lines::MALFORMED_LINE);
                    self.send(id, buf.into());
                }
                return;
            }
        };
        let mut rb = ReplyBuffer::new(msg.req_id);

        let command = match msg.verb {
            Ok(command) => command,
            Err(unknown) => {
                log::debug!("{}: unknown verb {:?}", id, unknown);
                rb.err(code::BAD_REQUEST, lines::UNKNOWN_COMMAND);
                self.send(id, rb.into());
                return;
            }
        };
        log::debug!("{}: {}", id, command);

        let user = if command.requires_auth() {
            match self.validate_token(id, msg.get("token")) {
                Ok(user_id) => Some(user_id),
                Err(reason) => {
                    log::debug!("{}:         unauthorized", id);
                    rb.err(code::UNAUTHORIZED, reason);
                    self.send(id, rb.into());
                    return;
                }
            }
        } else {
            None
        };

        let ctx = CommandContext {
            id,
            rb: &mut rb,
            user,
        };
        let _ = match command {
            Command::Ping => self.cmd_ping(ctx),
            Command::Register => self.cmd_register(ctx, &msg),
            Command::Login => self.cmd_login(ctx, &msg),
            Command::Logout => self.cmd_logout(ctx, &msg),
            Command::Whoami => self.cmd_whoami(ctx),
            Command::Disconnect => self.cmd_disconnect(ctx),
            Command::FriendInvite => self.cmd_friend_invite(ctx, &msg),
            Command::FriendAccept => self.cmd_friend_accept(ctx, &msg),
            Command::FriendReject => self.cmd_friend_reject(ctx, &msg),
            Command::FriendDelete => self.cmd_friend_delete(ctx, &msg),
            Command::FriendPending => self.cmd_friend_pending(ctx),
            Command::FriendList => self.cmd_friend_list(ctx),
            Command::GroupCreate => self.cmd_group_create(ctx, &msg),
            Command::GroupAdd => self.cmd_group_add(ctx, &msg),
            Command::GroupRemove => self.cmd_group_remove(ctx, &msg),
            Command::GroupLeave => self.cmd_group_leave(ctx, &msg),
            Command::GroupList => self.cmd_group_list(ctx),
            Command::GroupMembers => self.cmd_group_members(ctx, &msg),
            Command::PmChatStart => self.cmd_pm_chat_start(ctx, &msg),
            Command::PmChatEnd => self.cmd_pm_chat_end(ctx),
            Command::PmSend => self.cmd_pm_send(ctx, &msg),
            Command::PmHistory => self.cmd_pm_history(ctx, &msg),
            Command::PmConversations => self.cmd_pm_conversations(ctx),
            Command::GmChatStart => self.cmd_gm_chat_start(ctx, &msg),
            Command::GmChatEnd => self.cmd_gm_chat_end(ctx),
            Command::GmSend => self.cmd_gm_send(ctx, &msg),
            Command::GmHistory => self.cmd_gm_history(ctx, &msg),
        };

        if !rb.is_empty() {
            self.send(id, rb.into());
        }
        if self.clients.get(id).map_or(false, Client::is_quitting) {
            self.peer_quit(id, None);
        }
    }

    /// Resolves and refreshes the session behind `token`.
    ///
    /// The token must have been issued to this very connection; a bearer
    /// token roaming to another connection is rejected, which keeps a
    /// session's chat focus tied to a single connection.
    fn validate_token(&mut self, id: ConnId, token: Option<&str>) -> Result<UserId, &'static str> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(lines::MISSING_TOKEN),
        };
        match self.sessions.get_mut(token) {
            Some(session) if session.conn == id => {
                session.last_activity = Instant::now();
                Ok(session.user_id)
            }
            _ => Err(lines::BAD_TOKEN),
        }
    }

    /// Destroys a session and everything that hangs off it: the per-user
    /// index, the connection binding and the open chat (with its room
    /// notification).  The connection itself stays open.
    fn destroy_session(&mut self, token: &str) {
        let session = match self.sessions.remove(token) {
            Some(session) => session,
            None => return,
        };
        self.sessions_by_user.remove(&session.user_id);
        if let Some(client) = self.clients.get_mut(session.conn) {
            client.clear_session();
        }
        self.leave_chat(session.conn, session.user_id);
    }

    /// Clears the connection's chat focus.  Leaving a group chat notifies
    /// the remaining room members; leaving a private chat resets the unread
    /// counter for the peer.
    fn leave_chat(&mut self, id: ConnId, user_id: UserId) {
        let focus = match self.clients.get(id) {
            Some(client) => client.focus(),
            None => return,
        };
        match focus {
            ChatFocus::None => return,
            ChatFocus::Pm(peer) => {
                self.unread.remove(&(user_id, peer));
            }
            ChatFocus::Gm(group_id) => {
                if let Some(group) = self.groups.get_mut(&group_id) {
                    group.room.remove(&id);
                }
                let mut notice = Buffer::new();
                notice
                    .push("GM_LEAVE")
                    .field("group_id", &group_id.to_string())
                    .field("username", self.username(user_id));
                self.send_to_room(group_id, Some(id), notice.into());
            }
        }
        if let Some(client) = self.clients.get_mut(id) {
            client.set_focus(ChatFocus::None);
        }
    }

    pub fn sweep_idle_sessions(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| now.duration_since(session.last_activity) > self.idle_timeout)
            .map(|(token, _)| token.clone())
            .collect();
        for token in expired {
            if let Some(session) = self.sessions.get(&token) {
                log::info!(
                    "{}: session of user {} expired",
                    session.conn,
                    session.user_id
                );
            }
            self.destroy_session(&token);
        }
    }

    fn username(&self, user_id: UserId) -> &str {
        self.users
            .get(&user_id)
            .map(|user| user.username.as_str())
            .unwrap_or("?")
    }
}

/// Returns `Ok(user_id)` when `name` is a registered username.  Otherwise
/// returns `Err(())` and writes the error reply.
fn find_user(
    rb: &mut ReplyBuffer,
    users_by_name: &HashMap<String, UserId>,
    name: &str,
) -> Result<UserId, ()> {
    match users_by_name.get(name) {
        Some(&user_id) => Ok(user_id),
        None => {
            rb.err(code::NOT_FOUND, lines::USER_NOT_FOUND);
            Err(())
        }
    }
}

/// Returns `Ok(group)` when `group_id` is an existing group.  Otherwise
/// returns `Err(())` and writes the error reply.
fn find_group<'a>(
    rb: &mut ReplyBuffer,
    groups: &'a HashMap<GroupId, Group>,
    group_id: GroupId,
) -> Result<&'a Group, ()> {
    match groups.get(&group_id) {
        Some(group) => Ok(group),
        None => {
            rb.err(code::NOT_FOUND, lines::GROUP_NOT_FOUND);
            Err(())
        }
    }
}

/// Returns the numeric group id carried by `value`, or writes a
/// `400 bad_group_id` error.
fn parse_group_id(rb: &mut ReplyBuffer, value: &str) -> Result<GroupId, ()> {
    match value.parse() {
        Ok(group_id) => Ok(group_id),
        Err(_) => {
            rb.err(code::BAD_REQUEST, lines::BAD_GROUP_ID);
            Err(())
        }
    }
}

/// Returns the value for `key`, or writes a `400 missing_key` error.
///
/// An empty value counts as missing.
fn require<'a>(rb: &mut ReplyBuffer, msg: &Message<'a>, key: &str) -> Result<&'a str, ()> {
    match msg.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => {
            rb.err(code::BAD_REQUEST, lines::MISSING_KEY);
            Err(())
        }
    }
}

/// Returns the history limit carried by the optional `limit` key.
fn parse_limit(rb: &mut ReplyBuffer, msg: &Message<'_>) -> Result<usize, ()> {
    match msg.get("limit") {
        None => Ok(DEFAULT_LIMIT),
        Some(value) => match value.parse::<usize>() {
            Ok(limit) if limit >= 1 => Ok(limit.min(MAX_LIMIT)),
            _ => {
                rb.err(code::BAD_REQUEST, lines::BAD_LIMIT);
                Err(())
            }
        },
    }
}

// Send utilities
impl StateInner {
    /// Sends the given lines to the given connection.
    fn send(&self, id: ConnId, msg: MessageQueueItem) {
        if let Some(client) = self.clients.get(id) {
            client.send(msg);
        }
    }

    /// Sends `msg` to every connection in the group's live room, except
    /// `except`.
    fn send_to_room(&self, group_id: GroupId, except: Option<ConnId>, msg: MessageQueueItem) {
        let group = match self.groups.get(&group_id) {
            Some(group) => group,
            None => return,
        };
        for &member in &group.room {
            if Some(member) != except {
                self.send(member, msg.clone());
            }
        }
    }

    /// Serializes PM history entries as `msg_id:from:content:ts`, joined
    /// with commas.  All four fields are free of `,` and `:`.
    fn write_pm_entries(&self, out: &mut String, messages: &[PmRecord]) {
        for (i, record) in messages.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&record.msg_id.to_string());
            out.push(':');
            out.push_str(self.username(record.from));
            out.push(':');
            out.push_str(&record.content);
            out.push(':');
            out.push_str(&record.ts.to_string());
        }
    }

    /// Same as [`StateInner::write_pm_entries`], for group messages.
    fn write_gm_entries(&self, out: &mut String, messages: &[GmRecord]) {
        for (i, record) in messages.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&record.msg_id.to_string());
            out.push(':');
            out.push_str(self.username(record.from));
            out.push(':');
            out.push_str(&record.content);
            out.push(':');
            out.push_str(&record.ts.to_string());
        }
    }
}

// Persistence
impl StateInner {
    fn persist_users(&self) {
        if let Some(db) = &self.db {
            let mut users: Vec<User> = self.users.values().cloned().collect();
            users.sort_unstable_by_key(|user| user.user_id);
            let file = db::UsersFile {
                next_user_id: self.next_user_id,
                users,
            };
            if let Err(err) = db.save_users(&file) {
                log::warn!("failed to persist users: {}", err);
            }
        }
    }

    fn persist_friends(&self) {
        if let Some(db) = &self.db {
            let mut friendships: Vec<(UserId, UserId)> = self
                .friendships
                .iter()
                .map(|&PairKey(a, b)| (a, b))
                .collect();
            friendships.sort_unstable();
            let mut invites: Vec<(UserId, UserId)> = self.invites.iter().copied().collect();
            invites.sort_unstable();
            let file = db::FriendsFile {
                friendships,
                invites,
            };
            if let Err(err) = db.save_friends(&file) {
                log::warn!("failed to persist friendships: {}", err);
            }
        }
    }

    fn persist_groups(&self) {
        if let Some(db) = &self.db {
            let mut groups: Vec<Group> = self.groups.values().cloned().collect();
            groups.sort_unstable_by_key(|group| group.id);
            let file = db::GroupsFile {
                next_group_id: self.next_group_id,
                groups,
            };
            if let Err(err) = db.save_groups(&file) {
                log::warn!("failed to persist groups: {}", err);
            }
        }
    }

    fn persist_pms(&self) {
        if let Some(db) = &self.db {
            let mut conversations: Vec<(PairKey, Conversation)> = self
                .convs
                .iter()
                .map(|(&key, conv)| (key, conv.clone()))
                .collect();
            conversations.sort_unstable_by_key(|&(PairKey(a, b), _)| (a, b));
            let file = db::PmsFile { conversations };
            if let Err(err) = db.save_pms(&file) {
                log::warn!("failed to persist conversations: {}", err);
            }
        }
    }
}
