//! Handlers for the FRIEND_* commands.
//!
//! A directed invite becomes a mutual friendship on accept; reject and
//! delete drop the relation for both sides at once.

use super::{find_user, require, CommandContext, HandlerResult, StateInner};
use crate::history::PairKey;
use crate::lines;
use causerie_tokens::{code, Message};

impl StateInner {
    pub fn cmd_friend_invite(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let name = require(ctx.rb, msg, "username")?;
        let other = find_user(ctx.rb, &self.users_by_name, name)?;

        if other == me {
            log::debug!("{}:         self invite", ctx.id);
            ctx.rb.err(code::BAD_REQUEST, lines::SELF_INVITE);
            return Err(());
        }
        if self.friendships.contains(&PairKey::new(me, other)) {
            ctx.rb.err(code::CONFLICT, lines::ALREADY_FRIENDS);
            return Err(());
        }
        if self.invites.contains(&(me, other)) || self.invites.contains(&(other, me)) {
            ctx.rb.err(code::CONFLICT, lines::INVITE_PENDING);
            return Err(());
        }

        self.invites.insert((me, other));
        self.persist_friends();
        ctx.rb.ok().field("status", "pending");
        Ok(())
    }

    pub fn cmd_friend_accept(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let name = require(ctx.rb, msg, "username")?;
        let other = find_user(ctx.rb, &self.users_by_name, name)?;

        if !self.invites.remove(&(other, me)) {
            log::debug!("{}:         no pending invite", ctx.id);
            ctx.rb.err(code::NOT_FOUND, lines::NO_INVITE);
            return Err(());
        }
        self.friendships.insert(PairKey::new(me, other));
        self.persist_friends();
        log::info!("{} and {} are now friends", self.username(me), name);
        ctx.rb.ok().field("status", "accepted");
        Ok(())
    }

    pub fn cmd_friend_reject(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let name = require(ctx.rb, msg, "username")?;
        let other = find_user(ctx.rb, &self.users_by_name, name)?;

        if !self.invites.remove(&(other, me)) {
            log::debug!("{}:         no pending invite", ctx.id);
            ctx.rb.err(code::NOT_FOUND, lines::NO_INVITE);
            return Err(());
        }
        self.persist_friends();
        ctx.rb.ok().field("status", "rejected");
        Ok(())
    }

    pub fn cmd_friend_delete(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let name = require(ctx.rb, msg, "username")?;
        let other = find_user(ctx.rb, &self.users_by_name, name)?;

        if !self.friendships.remove(&PairKey::new(me, other)) {
            ctx.rb.err(code::NOT_FOUND, lines::NOT_FRIENDS);
            return Err(());
        }
        self.persist_friends();
        ctx.rb.ok().field("status", "deleted");
        Ok(())
    }

    pub fn cmd_friend_pending(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let mut names: Vec<&str> = self
            .invites
            .iter()
            .filter(|&&(_, to)| to == me)
            .map(|&(from, _)| self.username(from))
            .collect();
        names.sort_unstable();

        let mut reply = ctx.rb.ok();
        let out = reply.raw_field("username");
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
        }
        Ok(())
    }

    pub fn cmd_friend_list(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        let me = ctx.user.unwrap();
        let mut friends: Vec<(&str, bool)> = self
            .friendships
            .iter()
            .filter_map(|&PairKey(a, b)| {
                let other = if a == me {
                    b
                } else if b == me {
                    a
                } else {
                    return None;
                };
                Some((self.username(other), self.sessions_by_user.contains_key(&other)))
            })
            .collect();
        friends.sort_unstable();

        let mut reply = ctx.rb.ok();
        let out = reply.raw_field("username");
        for (i, (name, online)) in friends.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push(':');
            out.push_str(if *online { "online" } else { "offline" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test::*;

    #[test]
    fn test_invite_accept_list() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, mut qb, tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("FRIEND_INVITE 1 token={} username=bob", ta));
        let rs = responses(&mut qa);
        assert_eq!(rs[0].raw, "OK 1 status=pending\r\n");

        state.handle_line(cb, &format!("FRIEND_PENDING 2 token={}", tb));
        let rs = responses(&mut qb);
        assert_eq!(rs[0].kv["username"], "alice");

        state.handle_line(cb, &format!("FRIEND_ACCEPT 3 token={} username=alice", tb));
        state.handle_line(cb, &format!("FRIEND_PENDING 4 token={}", tb));
        state.handle_line(cb, &format!("FRIEND_LIST 5 token={}", tb));
        let rs = responses(&mut qb);
        assert_eq!(rs[0].kv["status"], "accepted");
        assert_eq!(rs[1].kv["username"], "");
        assert_eq!(rs[2].kv["username"], "alice:online");

        // symmetry
        state.handle_line(ca, &format!("FRIEND_LIST 6 token={}", ta));
        let rs = responses(&mut qa);
        assert_eq!(rs[0].kv["username"], "bob:online");
    }

    #[test]
    fn test_presence_follows_sessions() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, _qb, tb) = add_logged_in(&mut state, "bob");
        make_friends(&mut state, ca, &ta, "alice", cb, &tb, "bob");
        flush(&mut qa);

        state.handle_line(cb, &format!("LOGOUT 1 token={}", tb));
        state.handle_line(ca, &format!("FRIEND_LIST 2 token={}", ta));
        let rs = responses(&mut qa);
        assert_eq!(rs[0].kv["username"], "bob:offline");
    }

    #[test]
    fn test_presence_after_disconnect() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, _qb, tb) = add_logged_in(&mut state, "bob");
        make_friends(&mut state, ca, &ta, "alice", cb, &tb, "bob");
        flush(&mut qa);

        state.peer_quit(cb, None);
        state.handle_line(ca, &format!("FRIEND_LIST 2 token={}", ta));
        let rs = responses(&mut qa);
        assert_eq!(rs[0].kv["username"], "bob:offline");
    }

    #[test]
    fn test_invite_errors() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (_cb, _qb, _tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("FRIEND_INVITE 1 token={} username=alice", ta));
        state.handle_line(ca, &format!("FRIEND_INVITE 2 token={} username=ghost", ta));
        state.handle_line(ca, &format!("FRIEND_INVITE 3 token={} username=bob", ta));
        state.handle_line(ca, &format!("FRIEND_INVITE 4 token={} username=bob", ta));
        let rs = responses(&mut qa);
        assert_eq!((rs[0].kind.as_str(), rs[0].code), ("ERR", Some(400)));
        assert_eq!((rs[1].kind.as_str(), rs[1].code), ("ERR", Some(404)));
        assert_eq!(rs[2].kind, "OK");
        assert_eq!((rs[3].kind.as_str(), rs[3].code), ("ERR", Some(409)));
    }

    #[test]
    fn test_invite_when_already_friends() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, _qb, tb) = add_logged_in(&mut state, "bob");
        make_friends(&mut state, ca, &ta, "alice", cb, &tb, "bob");
        flush(&mut qa);

        state.handle_line(ca, &format!("FRIEND_INVITE 1 token={} username=bob", ta));
        let rs = responses(&mut qa);
        assert_eq!((rs[0].kind.as_str(), rs[0].code), ("ERR", Some(409)));
    }

    #[test]
    fn test_accept_without_invite() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (_cb, _qb, _tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("FRIEND_ACCEPT 1 token={} username=bob", ta));
        state.handle_line(ca, &format!("FRIEND_REJECT 2 token={} username=bob", ta));
        let rs = responses(&mut qa);
        assert_eq!((rs[0].kind.as_str(), rs[0].code), ("ERR", Some(404)));
        assert_eq!((rs[1].kind.as_str(), rs[1].code), ("ERR", Some(404)));
    }

    #[test]
    fn test_reject_clears_the_invite() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, mut qb, tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("FRIEND_INVITE 1 token={} username=bob", ta));
        state.handle_line(cb, &format!("FRIEND_REJECT 2 token={} username=alice", tb));
        state.handle_line(cb, &format!("FRIEND_PENDING 3 token={}", tb));
        state.handle_line(ca, &format!("FRIEND_LIST 4 token={}", ta));
        let rs = responses(&mut qb);
        assert_eq!(rs[0].kv["status"], "rejected");
        assert_eq!(rs[1].kv["username"], "");
        let rs = responses(&mut qa);
        assert_eq!(rs[1].kv["username"], "");

        // a rejected invite may be sent again
        state.handle_line(ca, &format!("FRIEND_INVITE 5 token={} username=bob", ta));
        let rs = responses(&mut qa);
        assert_eq!(rs[0].kv["status"], "pending");
    }

    #[test]
    fn test_delete_removes_both_sides() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (cb, mut qb, tb) = add_logged_in(&mut state, "bob");
        make_friends(&mut state, ca, &ta, "alice", cb, &tb, "bob");
        flush(&mut qa);
        flush(&mut qb);

        state.handle_line(cb, &format!("FRIEND_DELETE 1 token={} username=alice", tb));
        state.handle_line(cb, &format!("FRIEND_LIST 2 token={}", tb));
        state.handle_line(ca, &format!("FRIEND_LIST 3 token={}", ta));
        let rs = responses(&mut qb);
        assert_eq!(rs[0].kv["status"], "deleted");
        assert_eq!(rs[1].kv["username"], "");
        let rs = responses(&mut qa);
        assert_eq!(rs[0].kv["username"], "");

        state.handle_line(cb, &format!("FRIEND_DELETE 4 token={} username=alice", tb));
        let rs = responses(&mut qb);
        assert_eq!((rs[0].kind.as_str(), rs[0].code), ("ERR", Some(404)));
    }

    #[test]
    fn test_pending_lists_only_inbound_invites() {
        let mut state = simple_state();
        let (ca, mut qa, ta) = add_logged_in(&mut state, "alice");
        let (_cb, _qb, _tb) = add_logged_in(&mut state, "bob");

        state.handle_line(ca, &format!("FRIEND_INVITE 1 token={} username=bob", ta));
        state.handle_line(ca, &format!("FRIEND_PENDING 2 token={}", ta));
        let rs = responses(&mut qa);
        assert_eq!(rs[1].kv["username"], "");
    }
}
