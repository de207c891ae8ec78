//! Networking: the readiness poller and the event loop built on it.

mod poller;
mod server_loop;

pub use poller::{Poller, Readiness};
pub use server_loop::Server;
