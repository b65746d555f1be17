//! In-memory collaborators for running without a compositor shell.
//!
//! [`HeadlessDesktop`] keeps a plain list of views and a set of enabled
//! workspace layers; [`LogIndicator`] and [`LogGroup`] only log.  The
//! daemon binary uses them when it runs stand-alone, which is enough to
//! drive the whole IPC surface from scripts.

use crate::traits::{Desktop, Indicator, IndicatorState, ViewId, ViewInfo, WorkspaceGroup};
use crate::workspaces::WorkspaceId;
use log::{debug, info};
use std::collections::HashSet;

/// A desktop whose views live in a `Vec`, bottom-most first.
#[derive(Debug, Default)]
pub struct HeadlessDesktop {
    views: Vec<ViewInfo>,
    focused: Option<ViewId>,
    grabbed: Option<ViewId>,
    layers: HashSet<WorkspaceId>,
    enabled: HashSet<WorkspaceId>,
}

impl HeadlessDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `view` on top of the stack.  An existing view with the same id
    /// is replaced.
    pub fn map_view(&mut self, view: ViewInfo) {
        self.views.retain(|v| v.id != view.id);
        self.views.push(view);
    }

    pub fn view(&self, id: ViewId) -> Option<&ViewInfo> {
        self.views.iter().find(|v| v.id == id)
    }

    pub fn focus(&mut self, id: Option<ViewId>) {
        self.focused = id;
    }

    /// Mark `id` as being moved or resized interactively.
    pub fn set_grabbed(&mut self, id: Option<ViewId>) {
        self.grabbed = id;
    }

    pub fn has_layer(&self, workspace: WorkspaceId) -> bool {
        self.layers.contains(&workspace)
    }

    pub fn is_layer_enabled(&self, workspace: WorkspaceId) -> bool {
        self.enabled.contains(&workspace)
    }
}

impl Desktop for HeadlessDesktop {
    fn views(&self) -> Vec<ViewInfo> {
        self.views.clone()
    }

    fn move_view_to_workspace(&mut self, view: ViewId, workspace: WorkspaceId) {
        if let Some(v) = self.views.iter_mut().find(|v| v.id == view) {
            v.workspace = Some(workspace);
        }
    }

    fn focused_view(&self) -> Option<ViewId> {
        self.focused
    }

    fn grabbed_view(&self) -> Option<ViewId> {
        self.grabbed
    }

    fn focus_topmost(&mut self, workspace: WorkspaceId) -> bool {
        let topmost = self
            .views
            .iter()
            .rev()
            .find(|v| {
                v.mapped && v.focusable && !v.minimized && v.workspace == Some(workspace)
            })
            .map(|v| v.id);
        let changed = topmost != self.focused;
        self.focused = topmost;
        changed
    }

    fn create_layer(&mut self, workspace: WorkspaceId) {
        self.layers.insert(workspace);
        self.enabled.remove(&workspace);
    }

    fn destroy_layer(&mut self, workspace: WorkspaceId) {
        self.layers.remove(&workspace);
        self.enabled.remove(&workspace);
    }

    fn set_layer_enabled(&mut self, workspace: WorkspaceId, enabled: bool) {
        if enabled {
            self.enabled.insert(workspace);
        } else {
            self.enabled.remove(&workspace);
        }
    }

    fn update_cursor_focus(&mut self) {}

    fn update_top_layer_visibility(&mut self) {}
}

/// An [`Indicator`] that writes the current workspace to the log.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn show(&mut self, state: &IndicatorState) {
        info!(
            "workspace {} of {}: {}",
            state.active + 1,
            state.names.len(),
            state.current_name()
        );
    }

    fn hide(&mut self) {
        debug!("workspace indicator hidden");
    }
}

/// A [`WorkspaceGroup`] that logs every change under a fixed label.
#[derive(Debug)]
pub struct LogGroup {
    label: &'static str,
}

impl LogGroup {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl WorkspaceGroup for LogGroup {
    fn create(&mut self, workspace: WorkspaceId, name: &str) {
        debug!("{}: create workspace {} ({:?})", self.label, workspace, name);
    }

    fn destroy(&mut self, workspace: WorkspaceId) {
        debug!("{}: destroy workspace {}", self.label, workspace);
    }

    fn set_name(&mut self, workspace: WorkspaceId, name: &str) {
        debug!("{}: workspace {} renamed to {:?}", self.label, workspace, name);
    }

    fn set_active(&mut self, workspace: WorkspaceId, active: bool) {
        debug!("{}: workspace {} active={}", self.label, workspace, active);
    }
}
