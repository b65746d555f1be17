//! The control socket.
//!
//! External tools (scripts, panels, key-bind helpers) connect to a Unix
//! stream socket and exchange newline-terminated lines: requests go in,
//! `OK`/`ERROR`/bulk replies come back, and subscribed clients additionally
//! receive `EVENT` lines whenever the workspace list, the current workspace
//! or the focused view changes.

pub mod command;
pub mod connection;
pub mod event;
pub mod server;
pub mod snapshot;
