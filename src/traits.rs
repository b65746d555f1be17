//! Collaborator traits that decouple the workspace registry from the
//! compositor it runs inside.
//!
//! The registry never touches windows, scene nodes or protocol objects
//! directly.  A compositor shell or the in-memory
//! [`headless`](crate::headless) desktop implements these traits, and the
//! [`Workspaces`](crate::workspaces::Workspaces) registry only depends on
//! the abstractions.

use crate::workspaces::WorkspaceId;
use std::fmt;

/// Opaque identity of a window ("view") owned by the [`Desktop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A rectangle in layout coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// The output a view is shown on and that output's usable area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    /// Output connector name (e.g. `"DP-1"`).
    pub name: String,
    /// Area not covered by exclusive layer surfaces.
    pub usable: Rect,
}

/// Snapshot of a single view as reported by the [`Desktop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewInfo {
    pub id: ViewId,
    pub app_id: String,
    pub title: String,
    /// Workspace the view is assigned to, if any.
    pub workspace: Option<WorkspaceId>,
    pub geometry: Rect,
    pub output: Option<OutputInfo>,
    pub mapped: bool,
    /// Whether the view can receive keyboard focus.
    pub focusable: bool,
    /// Whether the view is visible on all workspaces.
    pub omnipresent: bool,
    pub maximized: bool,
    pub minimized: bool,
    pub fullscreen: bool,
    pub tiled: bool,
}

impl ViewInfo {
    /// A mapped, focusable view with no special state.
    pub fn new(id: ViewId, app_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            app_id: app_id.into(),
            title: title.into(),
            workspace: None,
            geometry: Rect::default(),
            output: None,
            mapped: true,
            focusable: true,
            omnipresent: false,
            maximized: false,
            minimized: false,
            fullscreen: false,
            tiled: false,
        }
    }

    /// Whether this view makes its workspace count as occupied.
    pub fn occupies(&self, workspace: WorkspaceId) -> bool {
        self.workspace == Some(workspace) && self.focusable && !self.omnipresent
    }
}

/// The compositor side of the workspace registry: window list, focus and
/// the per-workspace scene layer.
///
/// Calls are in-process and infallible; a backend that cannot honour one
/// logs and carries on.
pub trait Desktop {
    /// Every known view in stacking order, bottom-most first.
    fn views(&self) -> Vec<ViewInfo>;

    /// Reassign `view` to `workspace`.
    fn move_view_to_workspace(&mut self, view: ViewId, workspace: WorkspaceId);

    /// The view holding keyboard focus, if any.
    fn focused_view(&self) -> Option<ViewId>;

    /// The view currently being moved or resized interactively, if any.
    fn grabbed_view(&self) -> Option<ViewId>;

    /// Focus the topmost focusable view on `workspace`.
    ///
    /// Returns `true` if the focused view changed.
    fn focus_topmost(&mut self, workspace: WorkspaceId) -> bool;

    /// Create the drawable layer group for a new workspace (initially disabled).
    fn create_layer(&mut self, workspace: WorkspaceId);

    /// Destroy the layer group of a workspace that is going away.
    fn destroy_layer(&mut self, workspace: WorkspaceId);

    /// Show or hide everything drawn on `workspace`.
    fn set_layer_enabled(&mut self, workspace: WorkspaceId, enabled: bool);

    /// Re-evaluate what is under the cursor after the scene changed.
    fn update_cursor_focus(&mut self);

    /// Recompute whether visible fullscreen views hide the top layer.
    fn update_top_layer_visibility(&mut self);
}

//  Indicator

/// What the transient workspace indicator should draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorState {
    /// Workspace names in display order.
    pub names: Vec<String>,
    /// Position of the current workspace in `names` (0-indexed).
    pub active: usize,
}

impl IndicatorState {
    /// Name of the active workspace.
    pub fn current_name(&self) -> &str {
        self.names.get(self.active).map(String::as_str).unwrap_or("")
    }
}

/// Renderer for the on-screen workspace indicator shown after a switch.
///
/// The registry decides *when* to show and hide it; the renderer only
/// draws.
pub trait Indicator {
    /// Draw (or redraw) the indicator for `state`.
    fn show(&mut self, state: &IndicatorState);

    /// Remove the indicator from every output.
    fn hide(&mut self);
}

//  Workspace groups

/// An external workspace-group protocol object that mirrors the registry
/// to clients such as panels and pagers.
///
/// Each workspace owns one handle in every group for its whole lifetime.
pub trait WorkspaceGroup {
    /// Announce a new workspace.
    fn create(&mut self, workspace: WorkspaceId, name: &str);

    /// Withdraw a workspace that has been removed.
    fn destroy(&mut self, workspace: WorkspaceId);

    /// Publish a new name for `workspace`.
    fn set_name(&mut self, workspace: WorkspaceId, name: &str);

    /// Publish whether `workspace` is the active one.
    fn set_active(&mut self, workspace: WorkspaceId, active: bool);
}

/// Inbound message from a [`WorkspaceGroup`] client asking for a workspace
/// to become current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivateRequest {
    pub workspace: WorkspaceId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn view_id_displays_as_hex() {
        assert_eq!(ViewId(255).to_string(), "0xff");
    }

    #[test]
    fn omnipresent_and_unfocusable_views_do_not_occupy() {
        let ws = WorkspaceId(1);
        let mut view = ViewInfo::new(ViewId(1), "foot", "shell");
        view.workspace = Some(ws);
        assert!(view.occupies(ws));
        assert!(!view.occupies(WorkspaceId(2)));

        view.omnipresent = true;
        assert!(!view.occupies(ws));

        view.omnipresent = false;
        view.focusable = false;
        assert!(!view.occupies(ws));
    }

    #[test]
    fn indicator_state_current_name() {
        let state = IndicatorState {
            names: vec!["a".into(), "b".into()],
            active: 1,
        };
        assert_eq!(state.current_name(), "b");
        let empty = IndicatorState {
            names: vec![],
            active: 0,
        };
        assert_eq!(empty.current_name(), "");
    }

    //  Mock WorkspaceGroup

    /// A test double that records every call made to it.
    #[derive(Default, Clone)]
    struct MockGroup {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl WorkspaceGroup for MockGroup {
        fn create(&mut self, ws: WorkspaceId, name: &str) {
            self.log.borrow_mut().push(format!("create {} {}", ws, name));
        }
        fn destroy(&mut self, ws: WorkspaceId) {
            self.log.borrow_mut().push(format!("destroy {}", ws));
        }
        fn set_name(&mut self, ws: WorkspaceId, name: &str) {
            self.log.borrow_mut().push(format!("name {} {}", ws, name));
        }
        fn set_active(&mut self, ws: WorkspaceId, active: bool) {
            self.log.borrow_mut().push(format!("active {} {}", ws, active));
        }
    }

    #[test]
    fn mock_group_records_calls_through_trait_object() {
        let group = MockGroup::default();
        let log = group.log.clone();
        let mut boxed: Box<dyn WorkspaceGroup> = Box::new(group);
        boxed.create(WorkspaceId(1), "1");
        boxed.set_active(WorkspaceId(1), true);
        assert_eq!(*log.borrow(), vec!["create 1 1", "active 1 true"]);
    }
}
