//! # irond-proto
//!
//! Protocol-level building blocks for the irond IRC server: RFC 1459
//! case mapping, nickname and channel-name validation, message parsing
//! and serialization, numeric replies, channel mode parsing, and the
//! line framer used by the connection engine.
//!
//! The crate is transport-agnostic: it operates on byte buffers and
//! strings, never on sockets.

#![deny(clippy::all)]

pub mod casemap;
pub mod chan;
pub mod line;
pub mod message;
pub mod mode;
pub mod nick;
pub mod response;

pub use casemap::{irc_eq, irc_to_lower};
pub use chan::ChannelExt;
pub use line::{LineBuffer, LineOutcome, MAX_LINE_LEN};
pub use message::{Message, MessageParseError, Prefix};
pub use mode::{parse_channel_modes, ModeChange, ModeParse, ModeParseError};
pub use nick::NickExt;
pub use response::Response;
