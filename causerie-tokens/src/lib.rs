//! Parse the causerie wire protocol like a boss.
//!
//! This library provides helpers to tokenize request lines and build reply
//! and push lines, while keeping the number of allocations minimal.

pub use buffers::{Buffer, MessageBuffer, ReplyBuffer};
pub use command::Command;
pub use message::{Message, PARAMS_LENGTH};

mod buffers;
mod command;
mod message;
pub mod code;
