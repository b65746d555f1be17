//! Built-in actions reachable from the IPC socket.
//!
//! Any request line that is not a protocol command names an action.  Action
//! names are case-insensitive and their `key=value` arguments arrive
//! undecoded.
//!
//! | action          | arguments                                   |
//! |-----------------|---------------------------------------------|
//! | `GoToDesktop`   | `to=<target>` `[wrap=yes]`                  |
//! | `SendToDesktop` | `to=<target>` `[follow=yes]` `[wrap=yes]`   |
//! | `Reconfigure`   |                                             |
//! | `Exit`          |                                             |
//!
//! `<target>` is anything [`Workspaces::find`] understands: `left`,
//! `right-occupied`, `last`, an index or a name.

use crate::traits::Desktop;
use crate::workspaces::Workspaces;
use log::{debug, warn};

/// Errors from [`Action::parse`].  The `Display` text is the wire reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("unknown action")]
    Unknown(String),
    #[error("missing required argument")]
    MissingArgument {
        action: &'static str,
        arg: &'static str,
    },
}

/// A validated action, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    GoToDesktop { to: String, wrap: bool },
    SendToDesktop { to: String, follow: bool, wrap: bool },
    Reconfigure,
    Exit,
}

impl Action {
    /// Look up `name` and check its arguments.
    pub fn parse(name: &str, args: &[(String, String)]) -> Result<Self, ActionError> {
        match name.to_ascii_lowercase().as_str() {
            "gotodesktop" => Ok(Action::GoToDesktop {
                to: required(args, "GoToDesktop", "to")?,
                wrap: flag(args, "wrap", true),
            }),
            "sendtodesktop" => Ok(Action::SendToDesktop {
                to: required(args, "SendToDesktop", "to")?,
                follow: flag(args, "follow", true),
                wrap: flag(args, "wrap", true),
            }),
            "reconfigure" => Ok(Action::Reconfigure),
            "exit" => Ok(Action::Exit),
            _ => Err(ActionError::Unknown(name.to_string())),
        }
    }
}

fn lookup<'a>(args: &'a [(String, String)], key: &str) -> Option<&'a str> {
    args.iter()
        .rev()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn required(
    args: &[(String, String)],
    action: &'static str,
    arg: &'static str,
) -> Result<String, ActionError> {
    lookup(args, arg)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(ActionError::MissingArgument { action, arg })
}

fn flag(args: &[(String, String)], key: &str, default: bool) -> bool {
    match lookup(args, key) {
        None => default,
        Some(v) => parse_bool(v).unwrap_or_else(|| {
            warn!("invalid boolean {}={:?}, using {}", key, v, default);
            default
        }),
    }
}

/// `yes`/`no`, `true`/`false`, `on`/`off` or `1`/`0`, any case.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Switch to `to`, resolved relative to the current workspace.
///
/// Returns `false` if the target does not resolve.
pub fn go_to_desktop<D: Desktop>(workspaces: &mut Workspaces<D>, to: &str, wrap: bool) -> bool {
    let anchor = workspaces.current_id();
    match workspaces.find(anchor, to, wrap) {
        Some(target) => {
            workspaces.switch_to(target, true);
            true
        }
        None => {
            debug!("GoToDesktop: no workspace for {:?}", to);
            false
        }
    }
}

/// Move the focused view to `to`, resolved relative to the view's own
/// workspace, and optionally follow it there.
///
/// Returns `false` if nothing is focused or the target does not resolve.
pub fn send_to_desktop<D: Desktop>(
    workspaces: &mut Workspaces<D>,
    to: &str,
    follow: bool,
    wrap: bool,
) -> bool {
    let Some(view) = workspaces.desktop().focused_view() else {
        debug!("SendToDesktop: nothing focused");
        return false;
    };
    let anchor = workspaces
        .desktop()
        .views()
        .into_iter()
        .find(|v| v.id == view)
        .and_then(|v| v.workspace)
        .filter(|ws| workspaces.get(*ws).is_some())
        .unwrap_or_else(|| workspaces.current_id());
    let Some(target) = workspaces.find(anchor, to, wrap) else {
        debug!("SendToDesktop: no workspace for {:?}", to);
        return false;
    };
    if target != anchor {
        workspaces.desktop_mut().move_view_to_workspace(view, target);
    }
    if follow {
        // The view keeps focus, so there is nothing to refocus.
        workspaces.switch_to(target, false);
    }
    true
}
