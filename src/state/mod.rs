//! Server state: clients, channels, and the registries that own them.

mod channel;
mod client;
mod matrix;

pub use channel::{Channel, ChannelModes, MemberModes, Topic};
pub use client::{Client, ClientState};
pub use matrix::{Matrix, MAX_SENDQ_LEN};
