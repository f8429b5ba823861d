//! Handlers for account and session commands.

use super::{require, CommandContext, HandlerResult, Session, StateInner};
use crate::auth;
use crate::lines;
use causerie_tokens::{code, Message};
use std::time::Instant;

impl StateInner {
    pub fn cmd_ping(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        ctx.rb.ok().field("pong", "1");
        Ok(())
    }

    pub fn cmd_register(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let username = require(ctx.rb, msg, "username")?;
        let password = require(ctx.rb, msg, "password")?;
        let email = require(ctx.rb, msg, "email")?;

        if !is_valid_username(username) {
            log::debug!("{}:         bad username", ctx.id);
            ctx.rb.err(code::VALIDATION, lines::BAD_USERNAME);
            return Err(());
        }
        if !is_valid_password(password) {
            log::debug!("{}:         bad password", ctx.id);
            ctx.rb.err(code::VALIDATION, lines::BAD_PASSWORD);
            return Err(());
        }
        if !is_valid_email(email) {
            log::debug!("{}:         bad email", ctx.id);
            ctx.rb.err(code::VALIDATION, lines::BAD_EMAIL);
            return Err(());
        }
        if self.users_by_name.contains_key(username) {
            log::debug!("{}:         username taken", ctx.id);
            ctx.rb.err(code::CONFLICT, lines::USERNAME_TAKEN);
            return Err(());
        }

        let user_id = self.next_user_id;
        self.next_user_id += 1;
        let (digest, salt) = auth::hash_password(&mut self.rng, password);
        let user = auth::User {
            user_id,
            username: username.to_owned(),
            digest,
            salt,
            email: email.to_owned(),
        };
        self.users_by_name.insert(user.username.clone(), user_id);
        self.users.insert(user_id, user);
        self.persist_users();

        log::info!("{}: registered {} as user {}", ctx.id, username, user_id);
        ctx.rb.ok().field("user_id", &user_id.to_string());
        Ok(())
    }

    pub fn cmd_login(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        let username = require(ctx.rb, msg, "username")?;
        let password = require(ctx.rb, msg, "password")?;

        let user_id = match self.users_by_name.get(username) {
            Some(&user_id) if auth::verify_password(&self.users[&user_id], password) => user_id,
            _ => {
                log::debug!("{}:         bad credentials", ctx.id);
                ctx.rb.err(code::UNAUTHORIZED, lines::BAD_CREDENTIALS);
                return Err(());
            }
        };
        if self.sessions_by_user.contains_key(&user_id) {
            log::debug!("{}:         user {} already has a session", ctx.id, user_id);
            ctx.rb.err(code::CONFLICT, lines::ALREADY_LOGGED_IN);
            return Err(());
        }

        // A second login on the same connection invalidates the previous
        // token before the new one is issued.
        if let Some(token) = self.clients[ctx.id].session_token().map(str::to_owned) {
            self.destroy_session(&token);
        }

        let token = auth::generate_token(&mut self.rng);
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                conn: ctx.id,
                last_activity: Instant::now(),
            },
        );
        self.sessions_by_user.insert(user_id, token.clone());
        self.clients[ctx.id].bind_session(token.clone());

        log::info!("{}: {} logged in", ctx.id, username);
        ctx.rb.ok().field("token", &token);
        Ok(())
    }

    pub fn cmd_logout(&mut self, ctx: CommandContext<'_>, msg: &Message<'_>) -> HandlerResult {
        // the dispatcher validated the token, it is present
        if let Some(token) = msg.get("token") {
            self.destroy_session(token);
        }
        log::info!("{}: logged out", ctx.id);
        ctx.rb.ok().field("status", "ok");
        Ok(())
    }

    pub fn cmd_whoami(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        let user_id = ctx.user.unwrap();
        ctx.rb
            .ok()
            .field("user_id", &user_id.to_string())
            .field("username", self.username(user_id));
        Ok(())
    }

    pub fn cmd_disconnect(&mut self, ctx: CommandContext<'_>) -> HandlerResult {
        log::debug!("{}: disconnect requested", ctx.id);
        self.clients[ctx.id].set_quitting();
        ctx.rb.ok().field("status", "bye");
        Ok(())
    }
}

/// Whether a string is accepted as a username.
fn is_valid_username(s: &str) -> bool {
    (3..=32).contains(&s.len())
        && s.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'_')
}

fn is_valid_password(s: &str) -> bool {
    s.len() >= 6
}

/// `local@domain`, with at least one dot inside the domain.
fn is_valid_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
