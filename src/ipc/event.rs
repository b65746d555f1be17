//! Asynchronous notifications pushed to subscribed IPC clients.
//!
//! Every event is a single line:
//!
//! ```text
//! EVENT workspace-changed current=2
//! EVENT workspace-list-changed current=2 count=4
//! EVENT focus-changed current=2 focused=0
//! EVENT focus-changed current=2 focused=1 view=0x7 workspace=2 x=0 y=0 w=800 h=600
//! EVENT view-mapped current=2 view=0x7 workspace=2 x=0 y=0 w=800 h=600
//! ```
//!
//! Workspace positions are 1-based; `0` means "none".

use crate::traits::{Rect, ViewId};
use std::fmt;

/// The part of an event that describes a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEvent {
    pub view: ViewId,
    /// 1-based position of the view's workspace, `0` if unassigned.
    pub workspace: usize,
    pub geometry: Rect,
}

impl fmt::Display for ViewEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "view={} workspace={} x={} y={} w={} h={}",
            self.view,
            self.workspace,
            self.geometry.x,
            self.geometry.y,
            self.geometry.width,
            self.geometry.height
        )
    }
}

/// A change worth telling subscribers about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The current workspace changed.
    WorkspaceChanged { current: usize },
    /// A workspace was added, renamed or removed.
    WorkspaceListChanged { current: usize, count: usize },
    /// Keyboard focus moved; `focused` is `None` when nothing has focus.
    FocusChanged {
        current: usize,
        focused: Option<ViewEvent>,
    },
    ViewMapped { current: usize, view: ViewEvent },
    ViewUnmapped { current: usize, view: ViewEvent },
}

impl Event {
    /// The event kind as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::WorkspaceChanged { .. } => "workspace-changed",
            Event::WorkspaceListChanged { .. } => "workspace-list-changed",
            Event::FocusChanged { .. } => "focus-changed",
            Event::ViewMapped { .. } => "view-mapped",
            Event::ViewUnmapped { .. } => "view-unmapped",
        }
    }

    /// The complete, newline-terminated wire line.
    pub fn to_line(&self) -> String {
        format!("EVENT {}\n", self)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        match self {
            Event::WorkspaceChanged { current } => write!(f, " current={}", current),
            Event::WorkspaceListChanged { current, count } => {
                write!(f, " current={} count={}", current, count)
            }
            Event::FocusChanged {
                current,
                focused: None,
            } => write!(f, " current={} focused=0", current),
            Event::FocusChanged {
                current,
                focused: Some(view),
            } => write!(f, " current={} focused=1 {}", current, view),
            Event::ViewMapped { current, view } | Event::ViewUnmapped { current, view } => {
                write!(f, " current={} {}", current, view)
            }
        }
    }
}
