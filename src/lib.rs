//! **workspaced**: the workspace control plane of a Wayland compositor.
//!
//! The crate keeps an ordered list of named workspaces, switches between
//! them and exposes everything over a line-based Unix socket protocol that
//! scripts and panels can query, drive and subscribe to.
//!
//! # Architecture
//!
//! * [`workspaces::Workspaces`] is the registry: the workspace list, the
//!   `current`/`last` pointers, the switch protocol and persistence.
//! * [`traits`] holds the seams to the compositor: [`traits::Desktop`]
//!   (windows, focus, scene layers), [`traits::Indicator`] (on-screen
//!   indicator) and [`traits::WorkspaceGroup`] (external workspace
//!   protocol objects).
//! * [`ipc`] is the socket protocol: framing, request parsing, snapshots
//!   and event broadcast.
//! * [`state::State`] ties the registry and the socket together and
//!   [`event_loop::run`] drives it on a single calloop reactor.
//!
//! [`headless`] provides in-memory collaborators so the daemon can run
//! without a compositor attached.

pub mod actions;
pub mod config;
pub mod encoding;
pub mod event_loop;
pub mod headless;
pub mod ipc;
pub mod state;
pub mod traits;
pub mod workspaces;
