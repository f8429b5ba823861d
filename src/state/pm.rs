//! Handlers for private messaging.
//!
//! A message is pushed live to its recipient only when the recipient's
//! connection is focused on the sender; otherwise it is recorded and
//! surfaces through the unread counter of PM_CONVERSATIONS.  A third
//! party must never push-interrupt an open chat.

use super::{find_user, parse_limit, require, CommandContext, HandlerResult, StateInner};
use crate::client::ChatFocus;
use crate::history::PairKey;
use crate::lines;
use crate::util;
use causerie_tokens::{code, Buffer, Message};

impl StateInner {
    pub fn cmd_pm_chat_start(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let name = require(ctx.rb, msg, "with")?;
        let peer = find_user(ctx.rb, &self.users_by_name, name)?;
        let limit = parse_limit(ctx.rb, msg)?;

        self.leave_chat(ctx.id, me);
        self.clients[ctx.id].set_focus(ChatFocus::Pm(peer));
        self.unread.remove(&(me, peer));

        let mut reply = ctx.rb.ok().field("with", name);
        let out = reply.raw_field("messages");
        if let Some(conv) = self.convs.get(&PairKey::new(me, peer)) {
            self.write_pm_entries(out, conv.tail(limit));
        }
        Ok(())
    }

    pub fn cmd_pm_chat_end(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        if let ChatFocus::Pm(_) = self.clients[ctx.id].focus() {
            self.leave_chat(ctx.id, me);
        }
        ctx.rb.ok().field("status", "ok");
        Ok(())
    }

    pub fn cmd_pm_send(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let name = require(ctx.rb, msg, "to")?;
        let encoded = require(ctx.rb, msg, "content")?;
        let to = find_user(ctx.rb, &self.users_by_name, name)?;
        if to == me {
            ctx.rb.err(code::BAD_REQUEST, lines::SELF_MESSAGE);
            return Err(());
        }
        let content = decode_content(ctx.rb, ctx.id, encoded)?;

        let ts = util::now_ts();
        let conv = self.convs.entry(PairKey::new(me, to)).or_default();
        let msg_id = conv.append(me, to, content.clone(), ts);
        self.persist_pms();

        // Push only when the recipient has this very chat open; otherwise
        // bump the unread counter.
        let pushed = match self.sessions_by_user.get(&to) {
            Some(token) => {
                let conn = self.sessions[token].conn;
                let focused = self
                    .clients
                    .get(conn)
                    .map_or(false, |client| client.focus() == ChatFocus::Pm(me));
                if focused {
                    let mut push = Buffer::new();
                    push.push("PM")
                        .field("from", self.username(me))
                        .field("content", &content)
                        .field("msg_id", &msg_id.to_string())
                        .field("ts", &ts.to_string());
                    self.send(conn, push.into());
                }
                focused
            }
            None => false,
        };
        if !pushed {
            *self.unread.entry((to, me)).or_insert(0) += 1;
        }

        ctx.rb.ok().field("msg_id", &msg_id.to_string());
        Ok(())
    }

    pub fn cmd_pm_history(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let name = require(ctx.rb, msg, "with")?;
        let peer = find_user(ctx.rb, &self.users_by_name, name)?;
        let limit = parse_limit(ctx.rb, msg)?;

        let mut reply = ctx.rb.ok();
        let out = reply.raw_field("messages");
        if let Some(conv) = self.convs.get(&PairKey::new(me, peer)) {
            self.write_pm_entries(out, conv.tail(limit));
        }
        Ok(())
    }

    pub fn cmd_pm_conversations(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let mut peers: Vec<(i64, &str, u64)> = self
            .convs
            .iter()
            .filter_map(|(&PairKey(a, b), conv)| {
                let peer = if a == me {
                    b
                } else if b == me {
                    a
                } else {
                    return None;
                };
                let unread = self.unread.get(&(me, peer)).copied().unwrap_or(0);
                Some((conv.last_ts(), self.username(peer), unread))
            })
            .collect();
        // most recent activity first, names break ties
        peers.sort_unstable_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let mut reply = ctx.rb.ok();
        let out = reply.raw_field("conversations");
        for (i, (_, name, unread)) in peers.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push(':');
            out.push_str(&unread.to_string());
        }
        Ok(())
    }
}

/// Decodes the `content` key, enforcing valid, non-empty base64.
///
/// Returns the canonical re-encoding of the decoded bytes, which is what
/// gets stored and re-sent.
pub(super) fn decode_content(
    rb: &mut causerie_tokens::ReplyBuffer,
    id: crate::ConnId,
    encoded: &str,
) -> Result<String, ()> {
    let bytes = match base64::decode(encoded) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("{}:         bad base64: {}", id, err);
            rb.err(code::BAD_REQUEST, lines::BAD_BASE64);
            return Err(());
        }
    };
    if bytes.is_empty() {
        rb.err(code::BAD_REQUEST, lines::EMPTY_CONTENT);
        return Err(());
    }
    Ok(base64::encode(bytes))
}
