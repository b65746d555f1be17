//! The workspace registry.
//!
//! [`Workspaces`] owns the ordered list of workspaces together with the
//! `current` and `last` pointers.  It is the only place that changes which
//! workspace is current ([`Workspaces::switch_to`]) and the only place that
//! adds, renames or removes workspaces.  Every change to the list's shape or
//! names is persisted through [`persist::StateFile`] and announced as an
//! [`Event`] on the attached channel.
//!
//! Windows, scene layers, the on-screen indicator and the external
//! workspace-group objects are reached only through the traits in
//! [`crate::traits`].

pub mod persist;

use crate::ipc::event::{Event, ViewEvent};
use crate::traits::{
    ActivateRequest, Desktop, Indicator, IndicatorState, ViewInfo, WorkspaceGroup,
};
use log::{debug, error, info, warn};
use persist::StateFile;
use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Stable identity of a workspace, independent of its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceId(pub u64);

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors returned by registry mutations.  A failed mutation changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace name must not be empty")]
    EmptyName,
    #[error("no workspace at index {0}")]
    NoSuchIndex(usize),
    #[error("cannot remove the last workspace")]
    LastWorkspace,
}

/// Step direction for adjacency lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// A named workspace.  Its position is its place in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    id: WorkspaceId,
    name: String,
}

impl Workspace {
    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered workspace collection plus the switch protocol.
///
/// Generic over the [`Desktop`] so that the registry can run against a real
/// compositor shell, the [`headless`](crate::headless) desktop or a test
/// recorder.
pub struct Workspaces<D: Desktop> {
    list: Vec<Workspace>,
    current: WorkspaceId,
    last: Option<WorkspaceId>,
    next_id: u64,
    desktop: D,
    groups: Vec<Box<dyn WorkspaceGroup>>,
    indicator: Option<Box<dyn Indicator>>,
    popup_time: Duration,
    indicator_deadline: Option<Instant>,
    state_file: Option<StateFile>,
    events: Option<mpsc::Sender<Event>>,
}

impl<D: Desktop> Workspaces<D> {
    /// Create the registry for a fresh session.
    ///
    /// A new session always starts with exactly one workspace named `"1"`,
    /// regardless of what was persisted or configured, and that list is
    /// written to `state_file` straight away.
    pub fn new(
        desktop: D,
        groups: Vec<Box<dyn WorkspaceGroup>>,
        state_file: Option<StateFile>,
    ) -> Self {
        let mut workspaces = Self {
            list: Vec::new(),
            current: WorkspaceId(0),
            last: None,
            next_id: 1,
            desktop,
            groups,
            indicator: None,
            popup_time: Duration::ZERO,
            indicator_deadline: None,
            state_file,
            events: None,
        };
        let first = workspaces.create("1");
        workspaces.current = first;
        workspaces.desktop.set_layer_enabled(first, true);
        for group in &mut workspaces.groups {
            group.set_active(first, true);
        }
        workspaces.persist();
        workspaces
    }

    /// Attach the renderer for the transient indicator.
    ///
    /// The indicator stays up for `popup_time` after each switch.  A zero
    /// `popup_time` disables it.
    pub fn set_indicator(&mut self, indicator: Box<dyn Indicator>, popup_time: Duration) {
        self.indicator = Some(indicator);
        self.popup_time = popup_time;
    }

    /// Change the indicator timeout, e.g. after the configuration was
    /// reloaded.
    pub fn set_popup_time(&mut self, popup_time: Duration) {
        self.popup_time = popup_time;
    }

    /// Attach the channel on which [`Event`]s are published.
    pub fn set_event_sink(&mut self, tx: mpsc::Sender<Event>) {
        self.events = Some(tx);
    }

    //  Accessors

    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Always `false`: the registry never becomes empty.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workspace> {
        self.list.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.list.iter().map(|w| w.name.clone()).collect()
    }

    pub fn current_id(&self) -> WorkspaceId {
        self.current
    }

    pub fn current(&self) -> &Workspace {
        // `current` always refers to a member; fall back to the head if that
        // is ever violated rather than panic.
        self.get(self.current).unwrap_or(&self.list[0])
    }

    pub fn last_id(&self) -> Option<WorkspaceId> {
        self.last
    }

    pub fn get(&self, id: WorkspaceId) -> Option<&Workspace> {
        self.list.iter().find(|w| w.id == id)
    }

    /// Look up a workspace by 1-based position.
    pub fn by_index(&self, index: usize) -> Option<&Workspace> {
        index.checked_sub(1).and_then(|i| self.list.get(i))
    }

    /// 1-based position of `id`, or `0` if it is not a member.
    pub fn index_of(&self, id: WorkspaceId) -> usize {
        self.position(id).map_or(0, |p| p + 1)
    }

    /// 1-based position of the current workspace.
    pub fn current_index(&self) -> usize {
        self.index_of(self.current)
    }

    pub fn desktop(&self) -> &D {
        &self.desktop
    }

    pub fn desktop_mut(&mut self) -> &mut D {
        &mut self.desktop
    }

    pub fn state_file(&self) -> Option<&StateFile> {
        self.state_file.as_ref()
    }

    fn position(&self, id: WorkspaceId) -> Option<usize> {
        self.list.iter().position(|w| w.id == id)
    }

    //  Switching

    /// Make `target` the current workspace.
    ///
    /// Does nothing if `target` already is current.  `update_focus` is
    /// `false` only when the switch was itself triggered by a focus change,
    /// to avoid refocusing recursively.
    pub fn switch_to(&mut self, target: WorkspaceId, update_focus: bool) {
        if target == self.current {
            return;
        }
        if self.position(target).is_none() {
            warn!("cannot switch to unknown workspace {}", target);
            return;
        }
        let previous = self.current;

        self.desktop.set_layer_enabled(previous, false);

        let views = self.desktop.views();
        for view in views.iter().rev().filter(|v| v.omnipresent) {
            self.desktop.move_view_to_workspace(view.id, target);
        }

        self.desktop.set_layer_enabled(target, true);

        self.last = Some(previous);
        self.current = target;

        if let Some(grabbed) = self.desktop.grabbed_view() {
            self.desktop.move_view_to_workspace(grabbed, target);
        }

        let mut focus_changed = false;
        if update_focus {
            let focused_is_omnipresent = self
                .desktop
                .focused_view()
                .and_then(|id| views.iter().find(|v| v.id == id))
                .is_some_and(|v| v.omnipresent);
            if !focused_is_omnipresent {
                focus_changed = self.desktop.focus_topmost(target);
            }
        }

        self.show_indicator();
        self.desktop.update_cursor_focus();
        self.desktop.update_top_layer_visibility();

        for group in &mut self.groups {
            group.set_active(previous, false);
            group.set_active(target, true);
        }

        debug!("switched to workspace {}", self.current().name);
        self.emit(Event::WorkspaceChanged {
            current: self.current_index(),
        });
        if focus_changed {
            self.notify_focus_changed();
        }
    }

    /// Handle an activation request coming from a workspace-group client.
    pub fn handle_activate_request(&mut self, request: ActivateRequest) {
        match self.get(request.workspace) {
            Some(ws) => {
                info!("activating workspace {:?} on request", ws.name);
                self.switch_to(request.workspace, true);
            }
            None => warn!(
                "activate request for unknown workspace {}",
                request.workspace
            ),
        }
    }

    //  Adjacency

    /// Resolve a symbolic or literal workspace reference relative to `anchor`.
    ///
    /// Recognised (case-insensitive): `current`, `last`, `left`, `right`,
    /// `left-occupied`, `right-occupied`.  Anything else is tried as a
    /// 1-based index (only if it consists solely of digits) and then as an
    /// exact name, first match wins.
    pub fn find(&self, anchor: WorkspaceId, target: &str, wrap: bool) -> Option<WorkspaceId> {
        let anchor_pos = self.position(anchor)?;
        match target.to_ascii_lowercase().as_str() {
            "current" => Some(anchor),
            "last" => self.last,
            "left" => self.step(anchor_pos, Direction::Left, wrap),
            "right" => self.step(anchor_pos, Direction::Right, wrap),
            "left-occupied" => self.adjacent_occupied(anchor_pos, Direction::Left, wrap),
            "right-occupied" => self.adjacent_occupied(anchor_pos, Direction::Right, wrap),
            _ => self.find_by_name(target),
        }
    }

    fn step(&self, from: usize, dir: Direction, wrap: bool) -> Option<WorkspaceId> {
        let last = self.list.len() - 1;
        let pos = match dir {
            Direction::Left if from == 0 => wrap.then_some(last)?,
            Direction::Left => from - 1,
            Direction::Right if from == last => wrap.then_some(0)?,
            Direction::Right => from + 1,
        };
        Some(self.list[pos].id)
    }

    /// Walk from `anchor` in `dir` to the first occupied workspace.
    ///
    /// The list end is crossed at most once, and reaching the anchor again
    /// ends the search.
    fn adjacent_occupied(&self, anchor: usize, dir: Direction, wrap: bool) -> Option<WorkspaceId> {
        let occupied = self.occupied();
        let len = self.list.len();
        let mut wrapped = false;
        let mut pos = anchor;
        loop {
            let next = match dir {
                Direction::Left => pos.checked_sub(1),
                Direction::Right => Some(pos + 1).filter(|p| *p < len),
            };
            pos = match next {
                Some(p) => p,
                None => {
                    if !wrap || wrapped {
                        return None;
                    }
                    wrapped = true;
                    match dir {
                        Direction::Left => len - 1,
                        Direction::Right => 0,
                    }
                }
            };
            if pos == anchor {
                return None;
            }
            let candidate = self.list[pos].id;
            if occupied.contains(&candidate) {
                return Some(candidate);
            }
        }
    }

    fn occupied(&self) -> HashSet<WorkspaceId> {
        self.desktop
            .views()
            .iter()
            .filter_map(|v| v.workspace.filter(|ws| v.occupies(*ws)))
            .collect()
    }

    /// Whether `id` holds at least one non-omnipresent focusable view.
    pub fn is_occupied(&self, id: WorkspaceId) -> bool {
        self.occupied().contains(&id)
    }

    fn find_by_name(&self, name: &str) -> Option<WorkspaceId> {
        if let Some(ws) = parse_index(name).and_then(|i| self.by_index(i)) {
            return Some(ws.id);
        }
        let found = self.list.iter().find(|w| w.name == name).map(|w| w.id);
        if found.is_none() {
            warn!("workspace {:?} not found", name);
        }
        found
    }

    //  Add / rename / remove

    /// Append a workspace.
    ///
    /// An empty `name` becomes the decimal of the new length, so names can
    /// repeat after removals.
    pub fn add(&mut self, name: &str) -> WorkspaceId {
        let name = if name.is_empty() {
            (self.list.len() + 1).to_string()
        } else {
            name.to_string()
        };
        info!("adding workspace {:?}", name);
        let id = self.create(&name);
        self.list_changed();
        id
    }

    /// Rename the workspace at 1-based `index`.
    ///
    /// Returns `Ok(false)` when the name is unchanged; nothing is persisted
    /// or announced in that case.
    pub fn rename(&mut self, index: usize, name: &str) -> Result<bool, WorkspaceError> {
        if name.is_empty() {
            return Err(WorkspaceError::EmptyName);
        }
        let pos = self.checked_position(index)?;
        if self.list[pos].name == name {
            return Ok(false);
        }
        info!("renaming workspace {:?} to {:?}", self.list[pos].name, name);
        self.set_name(pos, name);
        self.list_changed();
        Ok(true)
    }

    /// Remove the workspace at 1-based `index`.
    ///
    /// Its views move to the next workspace in the list (the first one if it
    /// was the last), which also takes over as current or last if needed.
    pub fn remove(&mut self, index: usize) -> Result<(), WorkspaceError> {
        if self.list.len() <= 1 {
            return Err(WorkspaceError::LastWorkspace);
        }
        let pos = self.checked_position(index)?;
        let removed = self.list[pos].id;
        let fallback = self.list[(pos + 1) % self.list.len()].id;
        info!(
            "removing workspace {:?}, views go to {:?}",
            self.list[pos].name,
            self.get(fallback).map(Workspace::name).unwrap_or_default()
        );

        self.evacuate(removed, fallback);
        self.destroy_at(pos);
        self.list_changed();
        Ok(())
    }

    fn checked_position(&self, index: usize) -> Result<usize, WorkspaceError> {
        index
            .checked_sub(1)
            .filter(|p| *p < self.list.len())
            .ok_or(WorkspaceError::NoSuchIndex(index))
    }

    /// Move everything that refers to `doomed` over to `fallback`.
    fn evacuate(&mut self, doomed: WorkspaceId, fallback: WorkspaceId) {
        for view in self.desktop.views() {
            if view.workspace == Some(doomed) {
                self.desktop.move_view_to_workspace(view.id, fallback);
            }
        }
        if self.current == doomed {
            self.switch_to(fallback, true);
        }
        if self.last == Some(doomed) {
            self.last = Some(fallback);
        }
    }

    //  Reconfigure

    /// Bring the registry in line with the desired workspace list.
    ///
    /// The persisted list is preferred over `declared` whenever it holds at
    /// least one name.  Differing names are renamed in place, missing
    /// workspaces appended and surplus ones destroyed (their views move to
    /// the first workspace).
    pub fn reconfigure(&mut self, declared: &[String]) {
        let desired = match self.state_file.as_ref().and_then(StateFile::load) {
            Some(persisted) => {
                debug!("reconfiguring from {} persisted workspace(s)", persisted.len());
                persisted
            }
            None => declared.to_vec(),
        };
        if desired.is_empty() {
            warn!("no workspaces configured, keeping the current list");
            return;
        }

        let mut changed = false;
        for (pos, name) in desired.iter().enumerate() {
            if pos >= self.list.len() {
                debug!("adding workspace {:?}", name);
                self.create(name);
                changed = true;
            } else if self.list[pos].name != *name {
                debug!("renaming workspace {:?} to {:?}", self.list[pos].name, name);
                self.set_name(pos, name);
                changed = true;
            }
        }

        let first = self.list[0].id;
        while self.list.len() > desired.len() {
            let pos = desired.len();
            debug!("destroying workspace {:?}", self.list[pos].name);
            let doomed = self.list[pos].id;
            self.evacuate(doomed, first);
            self.destroy_at(pos);
            changed = true;
        }

        if changed {
            self.list_changed();
        }
    }

    //  Indicator

    fn show_indicator(&mut self) {
        if self.popup_time.is_zero() {
            return;
        }
        let state = IndicatorState {
            names: self.names(),
            active: self.current_index().saturating_sub(1),
        };
        if let Some(indicator) = self.indicator.as_mut() {
            indicator.show(&state);
            self.indicator_deadline = Some(Instant::now() + self.popup_time);
        }
    }

    /// When the indicator is due to be hidden, if it is showing.
    pub fn indicator_deadline(&self) -> Option<Instant> {
        self.indicator_deadline
    }

    /// Hide the indicator if its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if self.indicator_deadline.is_some_and(|d| d <= now) {
            self.hide_indicator();
        }
    }

    /// Hide the indicator now.
    pub fn hide_indicator(&mut self) {
        if self.indicator_deadline.take().is_none() {
            return;
        }
        if let Some(indicator) = self.indicator.as_mut() {
            indicator.hide();
        }
        self.desktop.update_cursor_focus();
    }

    //  Notifications
    //
    //  The compositor shell calls these when its own state changes; the
    //  headless desktop never maps views on its own and so never does.

    /// Publish the current focus.
    pub fn notify_focus_changed(&mut self) {
        let focused = self.desktop.focused_view().and_then(|id| {
            self.desktop
                .views()
                .into_iter()
                .find(|v| v.id == id)
                .map(|v| self.view_event(&v))
        });
        self.emit(Event::FocusChanged {
            current: self.current_index(),
            focused,
        });
    }

    pub fn notify_view_mapped(&mut self, view: &ViewInfo) {
        let view = self.view_event(view);
        self.emit(Event::ViewMapped {
            current: self.current_index(),
            view,
        });
    }

    pub fn notify_view_unmapped(&mut self, view: &ViewInfo) {
        let view = self.view_event(view);
        self.emit(Event::ViewUnmapped {
            current: self.current_index(),
            view,
        });
    }

    fn view_event(&self, view: &ViewInfo) -> ViewEvent {
        ViewEvent {
            view: view.id,
            workspace: view.workspace.map_or(0, |ws| self.index_of(ws)),
            geometry: view.geometry,
        }
    }

    //  Teardown

    /// Release every workspace's external handles.
    pub fn finish(mut self) {
        self.hide_indicator();
        for ws in std::mem::take(&mut self.list) {
            self.desktop.destroy_layer(ws.id);
            for group in &mut self.groups {
                group.destroy(ws.id);
            }
        }
    }

    //  Internals

    fn create(&mut self, name: &str) -> WorkspaceId {
        let id = WorkspaceId(self.next_id);
        self.next_id += 1;
        self.desktop.create_layer(id);
        for group in &mut self.groups {
            group.create(id, name);
        }
        self.list.push(Workspace {
            id,
            name: name.to_string(),
        });
        id
    }

    fn set_name(&mut self, pos: usize, name: &str) {
        let ws = &mut self.list[pos];
        ws.name = name.to_string();
        for group in &mut self.groups {
            group.set_name(ws.id, name);
        }
    }

    fn destroy_at(&mut self, pos: usize) {
        let ws = self.list.remove(pos);
        self.desktop.destroy_layer(ws.id);
        for group in &mut self.groups {
            group.destroy(ws.id);
        }
    }

    fn list_changed(&mut self) {
        self.persist();
        self.emit(Event::WorkspaceListChanged {
            current: self.current_index(),
            count: self.list.len(),
        });
    }

    /// Best effort: a failed write is logged and the in-memory list stays
    /// authoritative.
    fn persist(&self) {
        let Some(file) = &self.state_file else {
            return;
        };
        if let Err(e) = file.save(self.list.iter().map(|w| w.name.as_str())) {
            error!("failed to persist workspaces: {}", e);
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            debug!("event: {}", event);
            if let Err(mpsc::SendError(event)) = tx.send(event) {
                warn!("event sink closed, dropping {}", event);
            }
        }
    }
}

/// Parse a workspace reference that is purely a positive decimal number.
fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDesktop;
    use crate::traits::{ViewId, ViewInfo};
    use crate::workspaces::persist::tests::tmp_state_dir;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Headless desktop that also records every scene call.
    #[derive(Default)]
    struct RecorderDesktop {
        inner: HeadlessDesktop,
        calls: Vec<String>,
        enabled: HashSet<WorkspaceId>,
        max_enabled: usize,
    }

    impl Desktop for RecorderDesktop {
        fn views(&self) -> Vec<ViewInfo> {
            self.inner.views()
        }
        fn move_view_to_workspace(&mut self, view: ViewId, ws: WorkspaceId) {
            self.calls.push(format!("move {} {}", view, ws));
            self.inner.move_view_to_workspace(view, ws);
        }
        fn focused_view(&self) -> Option<ViewId> {
            self.inner.focused_view()
        }
        fn grabbed_view(&self) -> Option<ViewId> {
            self.inner.grabbed_view()
        }
        fn focus_topmost(&mut self, ws: WorkspaceId) -> bool {
            self.calls.push(format!("focus_topmost {}", ws));
            self.inner.focus_topmost(ws)
        }
        fn create_layer(&mut self, ws: WorkspaceId) {
            self.calls.push(format!("create {}", ws));
            self.inner.create_layer(ws);
        }
        fn destroy_layer(&mut self, ws: WorkspaceId) {
            self.calls.push(format!("destroy {}", ws));
            self.enabled.remove(&ws);
            self.inner.destroy_layer(ws);
        }
        fn set_layer_enabled(&mut self, ws: WorkspaceId, enabled: bool) {
            self.calls.push(format!("{} {}", if enabled { "enable" } else { "disable" }, ws));
            if enabled {
                self.enabled.insert(ws);
            } else {
                self.enabled.remove(&ws);
            }
            self.max_enabled = self.max_enabled.max(self.enabled.len());
            self.inner.set_layer_enabled(ws, enabled);
        }
        fn update_cursor_focus(&mut self) {
            self.calls.push("cursor".into());
        }
        fn update_top_layer_visibility(&mut self) {
            self.calls.push("top_layer".into());
        }
    }

    #[derive(Default, Clone)]
    struct RecorderGroup {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl WorkspaceGroup for RecorderGroup {
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

    #[derive(Default, Clone)]
    struct RecorderIndicator {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Indicator for RecorderIndicator {
        fn show(&mut self, state: &IndicatorState) {
            self.log
                .borrow_mut()
                .push(format!("show {} {}", state.active, state.current_name()));
        }
        fn hide(&mut self) {
            self.log.borrow_mut().push("hide".into());
        }
    }

    struct Harness {
        ws: Workspaces<RecorderDesktop>,
        groups: Rc<RefCell<Vec<String>>>,
        indicator: Rc<RefCell<Vec<String>>>,
        events: mpsc::Receiver<Event>,
    }

    impl Harness {
        fn events(&self) -> Vec<Event> {
            self.events.try_iter().collect()
        }

        fn clear(&mut self) {
            self.ws.desktop_mut().calls.clear();
            self.groups.borrow_mut().clear();
            self.indicator.borrow_mut().clear();
            let _ = self.events();
        }

        fn id(&self, index: usize) -> WorkspaceId {
            self.ws.by_index(index).unwrap().id()
        }

        /// Map a view onto the workspace at 1-based `index`.
        fn map(&mut self, view: u64, index: usize) -> ViewId {
            let ws = self.id(index);
            let mut info = ViewInfo::new(ViewId(view), "app", format!("view {}", view));
            info.workspace = Some(ws);
            self.ws.desktop_mut().inner.map_view(info);
            ViewId(view)
        }

        fn make_omnipresent(&mut self, view: ViewId) {
            let mut info = self.ws.desktop().inner.view(view).unwrap().clone();
            info.omnipresent = true;
            self.ws.desktop_mut().inner.map_view(info);
        }

        fn workspace_of(&self, view: ViewId) -> Option<WorkspaceId> {
            self.ws.desktop().inner.view(view).and_then(|v| v.workspace)
        }
    }

    /// A registry holding `names`, with the first one current and all
    /// recorders cleared.
    fn harness_with(names: &[&str], state_file: Option<StateFile>) -> Harness {
        let group = RecorderGroup::default();
        let groups = group.log.clone();
        let mut ws = Workspaces::new(
            RecorderDesktop::default(),
            vec![Box::new(group)],
            state_file,
        );
        let indicator = RecorderIndicator::default();
        let indicator_log = indicator.log.clone();
        ws.set_indicator(Box::new(indicator), Duration::from_millis(500));
        let (tx, rx) = mpsc::channel();
        ws.set_event_sink(tx);

        ws.rename(1, names[0]).unwrap();
        for name in &names[1..] {
            ws.add(name);
        }
        let mut h = Harness {
            ws,
            groups,
            indicator: indicator_log,
            events: rx,
        };
        h.clear();
        h
    }

    fn harness(names: &[&str]) -> Harness {
        harness_with(names, None)
    }

    //  Startup

    #[test]
    fn fresh_session_has_single_current_workspace() {
        let group = RecorderGroup::default();
        let log = group.log.clone();
        let ws = Workspaces::new(RecorderDesktop::default(), vec![Box::new(group)], None);
        assert_eq!(ws.names(), vec!["1"]);
        assert_eq!(ws.current_index(), 1);
        assert_eq!(ws.last_id(), None);
        assert!(ws.desktop().inner.is_layer_enabled(ws.current_id()));
        assert_eq!(*log.borrow(), vec!["create 1 1", "active 1 true"]);
    }

    #[test]
    fn fresh_session_overwrites_persisted_list() {
        let dir = tmp_state_dir();
        let file = StateFile::new(&dir);
        file.save(["a", "b", "c"]).unwrap();

        let ws = Workspaces::new(HeadlessDesktop::new(), vec![], Some(file.clone()));
        assert_eq!(ws.names(), vec!["1"]);
        assert_eq!(file.load(), Some(vec!["1".to_string()]));
        let _ = std::fs::remove_dir_all(&dir);
    }

    //  Switch protocol

    #[test]
    fn switch_updates_current_and_last_with_one_event() {
        let mut h = harness(&["A", "B", "C"]);
        h.ws.switch_to(h.id(2), true);
        h.clear();

        let c = h.id(3);
        h.ws.switch_to(c, true);
        assert_eq!(h.ws.current().name(), "C");
        assert_eq!(h.ws.last_id(), Some(h.id(2)));
        assert_eq!(h.events(), vec![Event::WorkspaceChanged { current: 3 }]);
    }

    #[test]
    fn switch_to_current_is_noop() {
        let mut h = harness(&["A", "B"]);
        let current = h.ws.current_id();
        h.ws.switch_to(current, true);
        assert!(h.events().is_empty());
        assert!(h.ws.desktop().calls.is_empty());
        assert!(h.groups.borrow().is_empty());
        assert!(h.indicator.borrow().is_empty());
        assert_eq!(h.ws.last_id(), None);
    }

    #[test]
    fn switch_never_enables_two_layers_at_once() {
        let mut h = harness(&["A", "B", "C"]);
        let first = h.ws.current_id();
        h.ws.desktop_mut().enabled.insert(first);
        h.ws.desktop_mut().max_enabled = 1;
        for index in [2, 3, 1, 3] {
            let target = h.id(index);
            h.ws.switch_to(target, true);
        }
        assert_eq!(h.ws.desktop().max_enabled, 1);
        assert!(h.ws.desktop().inner.is_layer_enabled(h.id(3)));
        assert!(!h.ws.desktop().inner.is_layer_enabled(h.id(1)));
    }

    #[test]
    fn switch_runs_protocol_steps_in_order() {
        let mut h = harness(&["A", "B"]);
        let (a, b) = (h.id(1), h.id(2));
        h.ws.switch_to(b, true);
        assert_eq!(
            h.ws.desktop().calls,
            vec![
                format!("disable {}", a),
                format!("enable {}", b),
                format!("focus_topmost {}", b),
                "cursor".to_string(),
                "top_layer".to_string(),
            ]
        );
        assert_eq!(
            *h.groups.borrow(),
            vec![format!("active {} false", a), format!("active {} true", b)]
        );
    }

    #[test]
    fn omnipresent_and_grabbed_views_follow_the_switch() {
        let mut h = harness(&["A", "B"]);
        let sticky = h.map(1, 1);
        let grabbed = h.map(2, 1);
        let stays = h.map(3, 1);
        h.make_omnipresent(sticky);
        h.ws.desktop_mut().inner.set_grabbed(Some(grabbed));

        let b = h.id(2);
        h.ws.switch_to(b, true);
        assert_eq!(h.workspace_of(sticky), Some(b));
        assert_eq!(h.workspace_of(grabbed), Some(b));
        assert_eq!(h.workspace_of(stays), Some(h.id(1)));
    }

    #[test]
    fn refocus_skipped_when_omnipresent_view_has_focus() {
        let mut h = harness(&["A", "B"]);
        let sticky = h.map(1, 1);
        h.make_omnipresent(sticky);
        h.ws.desktop_mut().inner.focus(Some(sticky));

        let b = h.id(2);
        h.ws.switch_to(b, true);
        assert!(!h
            .ws
            .desktop()
            .calls
            .iter()
            .any(|c| c.starts_with("focus_topmost")));
        assert_eq!(h.ws.desktop().focused_view(), Some(sticky));
    }

    #[test]
    fn refocus_can_be_suppressed_by_caller() {
        let mut h = harness(&["A", "B"]);
        h.map(1, 2);
        let b = h.id(2);
        h.ws.switch_to(b, false);
        assert_eq!(h.ws.desktop().focused_view(), None);
        assert_eq!(h.events(), vec![Event::WorkspaceChanged { current: 2 }]);
    }

    #[test]
    fn refocus_emits_focus_changed_after_workspace_changed() {
        let mut h = harness(&["A", "B"]);
        let view = h.map(7, 2);
        let b = h.id(2);
        h.ws.switch_to(b, true);
        assert_eq!(h.ws.desktop().focused_view(), Some(view));
        let events = h.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event::WorkspaceChanged { current: 2 });
        assert!(matches!(
            &events[1],
            Event::FocusChanged { current: 2, focused: Some(v) } if v.view == view && v.workspace == 2
        ));
    }

    #[test]
    fn switch_to_unknown_workspace_is_ignored() {
        let mut h = harness(&["A"]);
        h.ws.switch_to(WorkspaceId(999), true);
        assert_eq!(h.ws.current_index(), 1);
        assert!(h.events().is_empty());
    }

    //  Indicator

    #[test]
    fn indicator_is_shown_then_hidden_after_deadline() {
        let mut h = harness(&["A", "B"]);
        let b = h.id(2);
        h.ws.switch_to(b, true);
        assert_eq!(*h.indicator.borrow(), vec!["show 1 B"]);
        let deadline = h.ws.indicator_deadline().expect("deadline armed");

        h.ws.tick(deadline - Duration::from_millis(1));
        assert_eq!(h.indicator.borrow().len(), 1);

        h.ws.tick(deadline);
        assert_eq!(*h.indicator.borrow(), vec!["show 1 B", "hide"]);
        assert_eq!(h.ws.indicator_deadline(), None);
    }

    #[test]
    fn zero_popup_time_suppresses_indicator() {
        let mut h = harness(&["A", "B"]);
        let indicator = RecorderIndicator::default();
        let log = indicator.log.clone();
        h.ws.set_indicator(Box::new(indicator), Duration::ZERO);
        let b = h.id(2);
        h.ws.switch_to(b, true);
        assert!(log.borrow().is_empty());
        assert_eq!(h.ws.indicator_deadline(), None);
    }

    //  Activation requests

    #[test]
    fn activate_request_switches() {
        let mut h = harness(&["A", "B"]);
        let b = h.id(2);
        h.ws.handle_activate_request(ActivateRequest { workspace: b });
        assert_eq!(h.ws.current_id(), b);

        h.ws.handle_activate_request(ActivateRequest {
            workspace: WorkspaceId(42),
        });
        assert_eq!(h.ws.current_id(), b);
    }

    //  Add / rename / remove

    #[test]
    fn add_synthesizes_names_without_deduplication() {
        let mut h = harness(&["1"]);
        h.ws.add("");
        h.ws.add("");
        assert_eq!(h.ws.names(), vec!["1", "2", "3"]);
        h.ws.remove(2).unwrap();
        h.ws.add("");
        assert_eq!(h.ws.names(), vec!["1", "3", "3"]);
    }

    #[test]
    fn add_appends_persists_and_announces() {
        let dir = tmp_state_dir();
        let mut h = harness_with(&["A"], Some(StateFile::new(&dir)));
        let id = h.ws.add("web docs");
        assert_eq!(h.ws.index_of(id), 2);
        assert_eq!(
            h.events(),
            vec![Event::WorkspaceListChanged {
                current: 1,
                count: 2
            }]
        );
        assert_eq!(
            h.ws.state_file().unwrap().load(),
            Some(vec!["A".to_string(), "web docs".to_string()])
        );
        assert_eq!(*h.groups.borrow(), vec![format!("create {} web docs", id)]);
        assert!(h.ws.desktop().inner.has_layer(id));
        assert!(!h.ws.desktop().inner.is_layer_enabled(id));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_persist_keeps_mutations_and_events() {
        let dir = tmp_state_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let mut h = harness_with(&["A", "B"], Some(StateFile::new(blocker.join("state"))));

        h.ws.add("C");
        assert_eq!(h.ws.rename(1, "mail"), Ok(true));
        h.ws.remove(2).unwrap();

        assert_eq!(h.ws.names(), vec!["mail", "C"]);
        let list_changes = h
            .events()
            .iter()
            .filter(|e| matches!(e, Event::WorkspaceListChanged { .. }))
            .count();
        assert_eq!(list_changes, 3);
        assert_eq!(h.ws.state_file().unwrap().load(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn closed_event_sink_does_not_block_mutations() {
        let Harness { mut ws, events, .. } = harness(&["A"]);
        drop(events);
        let id = ws.add("B");
        ws.switch_to(id, true);
        assert_eq!(ws.names(), vec!["A", "B"]);
        assert_eq!(ws.current_id(), id);
    }

    #[test]
    fn rename_to_same_name_is_silent() {
        let dir = tmp_state_dir();
        let mut h = harness_with(&["A", "B"], Some(StateFile::new(&dir)));
        let path = h.ws.state_file().unwrap().path();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(h.ws.rename(2, "B"), Ok(false));
        assert!(h.events().is_empty());
        assert!(h.groups.borrow().is_empty());
        assert!(!path.exists(), "unchanged rename must not persist");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rename_changes_name_and_announces() {
        let mut h = harness(&["A", "B"]);
        assert_eq!(h.ws.rename(2, "mail"), Ok(true));
        assert_eq!(h.ws.names(), vec!["A", "mail"]);
        assert_eq!(
            h.events(),
            vec![Event::WorkspaceListChanged {
                current: 1,
                count: 2
            }]
        );
        assert_eq!(*h.groups.borrow(), vec![format!("name {} mail", h.id(2))]);
    }

    #[test]
    fn rename_rejects_empty_name_and_bad_index() {
        let mut h = harness(&["A"]);
        assert_eq!(h.ws.rename(1, ""), Err(WorkspaceError::EmptyName));
        assert_eq!(h.ws.rename(0, "x"), Err(WorkspaceError::NoSuchIndex(0)));
        assert_eq!(h.ws.rename(2, "x"), Err(WorkspaceError::NoSuchIndex(2)));
        assert_eq!(h.ws.names(), vec!["A"]);
        assert!(h.events().is_empty());
    }

    #[test]
    fn remove_refuses_last_workspace_and_bad_index() {
        let mut h = harness(&["A"]);
        assert_eq!(h.ws.remove(1), Err(WorkspaceError::LastWorkspace));
        h.ws.add("B");
        let _ = h.events();
        assert_eq!(h.ws.remove(3), Err(WorkspaceError::NoSuchIndex(3)));
        assert_eq!(h.ws.remove(0), Err(WorkspaceError::NoSuchIndex(0)));
        assert_eq!(h.ws.len(), 2);
        assert!(h.events().is_empty());
    }

    #[test]
    fn remove_moves_views_to_successor() {
        let mut h = harness(&["A", "B", "C"]);
        let view = h.map(1, 2);
        let c = h.id(3);
        h.ws.remove(2).unwrap();
        assert_eq!(h.ws.names(), vec!["A", "C"]);
        assert_eq!(h.workspace_of(view), Some(c));
        assert_eq!(
            h.events(),
            vec![Event::WorkspaceListChanged {
                current: 1,
                count: 2
            }]
        );
    }

    #[test]
    fn removing_tail_wraps_to_head() {
        let mut h = harness(&["A", "B", "C"]);
        let view = h.map(1, 3);
        let (a, c) = (h.id(1), h.id(3));
        h.ws.switch_to(c, true);
        let _ = h.events();

        h.ws.remove(3).unwrap();
        assert_eq!(h.ws.current_id(), a);
        assert_eq!(h.workspace_of(view), Some(a));
        // `last` pointed at the removed workspace after the forced switch.
        assert_eq!(h.ws.last_id(), Some(a));
        // The migrated view was already focused, so focus does not move.
        assert_eq!(h.ws.desktop().focused_view(), Some(view));
        let kinds: Vec<_> = h.events().iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["workspace-changed", "workspace-list-changed"]);
        assert!(!h.ws.desktop().inner.has_layer(c));
        assert!(h.groups.borrow().contains(&format!("destroy {}", c)));
    }

    #[test]
    fn removing_current_refocuses_topmost_on_fallback() {
        let mut h = harness(&["A", "B", "C"]);
        let view = h.map(1, 3);
        let c = h.id(3);
        h.ws.switch_to(c, true);
        assert_eq!(h.ws.desktop().focused_view(), Some(view));
        // Mapped after the first view, so it sits above it on A.
        let other = h.map(2, 1);
        let _ = h.events();

        h.ws.remove(3).unwrap();
        assert_eq!(h.ws.desktop().focused_view(), Some(other));
        let kinds: Vec<_> = h.events().iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec!["workspace-changed", "focus-changed", "workspace-list-changed"]
        );
    }

    #[test]
    fn removing_last_visited_repoints_last() {
        let mut h = harness(&["A", "B", "C"]);
        let (b, c) = (h.id(2), h.id(3));
        h.ws.switch_to(b, true);
        h.ws.switch_to(c, true);
        assert_eq!(h.ws.last_id(), Some(b));
        h.ws.remove(2).unwrap();
        assert_eq!(h.ws.current_id(), c);
        assert_eq!(h.ws.last_id(), Some(c));
    }

    #[test]
    fn registry_never_empties() {
        let mut h = harness(&["A"]);
        for round in 0..5 {
            h.ws.add("");
            h.ws.add(&format!("r{}", round));
            while h.ws.len() > 1 {
                let index = h.ws.len();
                h.ws.remove(index).unwrap();
            }
            assert_eq!(h.ws.remove(1), Err(WorkspaceError::LastWorkspace));
            assert_eq!(h.ws.len(), 1);
            assert!(h.ws.get(h.ws.current_id()).is_some());
        }
    }

    //  Adjacency

    #[test]
    fn symbolic_targets_resolve_relative_to_anchor() {
        let mut h = harness(&["A", "B", "C"]);
        let (a, b, c) = (h.id(1), h.id(2), h.id(3));
        assert_eq!(h.ws.find(b, "current", false), Some(b));
        assert_eq!(h.ws.find(b, "CURRENT", false), Some(b));
        assert_eq!(h.ws.find(b, "last", false), None);
        h.ws.switch_to(c, true);
        assert_eq!(h.ws.find(c, "last", false), Some(a));
        assert_eq!(h.ws.find(b, "left", false), Some(a));
        assert_eq!(h.ws.find(b, "Right", false), Some(c));
    }

    #[test]
    fn left_right_wrap_only_when_asked() {
        let h = harness(&["A", "B", "C"]);
        let (a, c) = (h.id(1), h.id(3));
        assert_eq!(h.ws.find(a, "left", false), None);
        assert_eq!(h.ws.find(a, "left", true), Some(c));
        assert_eq!(h.ws.find(c, "right", false), None);
        assert_eq!(h.ws.find(c, "right", true), Some(a));
    }

    #[test]
    fn occupied_search_skips_empty_workspaces() {
        let mut h = harness(&["A", "B", "C", "D"]);
        h.map(1, 4);
        let (a, d) = (h.id(1), h.id(4));
        assert_eq!(h.ws.find(a, "right-occupied", false), Some(d));
        assert_eq!(h.ws.find(a, "left-occupied", false), None);
        assert_eq!(h.ws.find(a, "left-occupied", true), Some(d));
    }

    #[test]
    fn occupied_search_ignores_omnipresent_views() {
        let mut h = harness(&["A", "B", "C"]);
        let v = h.map(1, 2);
        h.make_omnipresent(v);
        assert_eq!(h.ws.find(h.id(1), "right-occupied", true), None);
        assert!(!h.ws.is_occupied(h.id(2)));
    }

    #[test]
    fn occupied_search_terminates_when_only_anchor_is_occupied() {
        let mut h = harness(&["A", "B", "C"]);
        h.map(1, 2);
        let b = h.id(2);
        for target in ["left-occupied", "right-occupied"] {
            assert_eq!(h.ws.find(b, target, false), None);
            assert_eq!(h.ws.find(b, target, true), None);
        }
        let single = harness(&["solo"]);
        let only = single.id(1);
        assert_eq!(single.ws.find(only, "right-occupied", true), None);
        assert_eq!(single.ws.find(only, "left", true), Some(only));
    }

    #[test]
    fn numeric_and_name_lookup() {
        let h = harness(&["A", "7", "A", "x1"]);
        let anchor = h.id(1);
        assert_eq!(h.ws.find(anchor, "2", false), Some(h.id(2)));
        // Out of range as an index, so it falls back to a name match.
        assert_eq!(h.ws.find(anchor, "7", false), Some(h.id(2)));
        assert_eq!(h.ws.find(anchor, "A", false), Some(h.id(1)));
        assert_eq!(h.ws.find(anchor, "x1", false), Some(h.id(4)));
        assert_eq!(h.ws.find(anchor, "0", false), None);
        assert_eq!(h.ws.find(anchor, "-1", false), None);
        assert_eq!(h.ws.find(anchor, "1.5", false), None);
        assert_eq!(h.ws.find(anchor, "nope", false), None);
    }

    #[test]
    fn parse_index_requires_pure_digits() {
        assert_eq!(parse_index("124"), Some(124));
        assert_eq!(parse_index("0"), None);
        assert_eq!(parse_index("+3"), None);
        assert_eq!(parse_index(" 3"), None);
        assert_eq!(parse_index("2nd desktop"), None);
        assert_eq!(parse_index(""), None);
    }

    //  Reconfigure

    #[test]
    fn reconfigure_grows_and_renames_from_declared_list() {
        let mut h = harness(&["1"]);
        let declared: Vec<String> = ["main", "web", "chat"].iter().map(|s| s.to_string()).collect();
        h.ws.reconfigure(&declared);
        assert_eq!(h.ws.names(), declared);
        assert_eq!(
            h.events(),
            vec![Event::WorkspaceListChanged {
                current: 1,
                count: 3
            }]
        );
    }

    #[test]
    fn reconfigure_prefers_persisted_list() {
        let dir = tmp_state_dir();
        let mut h = harness_with(&["1"], Some(StateFile::new(&dir)));
        h.ws.state_file().unwrap().save(["p1", "p2"]).unwrap();
        h.ws.reconfigure(&["d1".to_string()]);
        assert_eq!(h.ws.names(), vec!["p1", "p2"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reconfigure_shrink_moves_views_to_first_and_switches() {
        let mut h = harness(&["A", "B", "C"]);
        let view = h.map(1, 3);
        let (a, c) = (h.id(1), h.id(3));
        h.ws.switch_to(c, true);
        let _ = h.events();

        h.ws.reconfigure(&["A".to_string()]);
        assert_eq!(h.ws.names(), vec!["A"]);
        assert_eq!(h.ws.current_id(), a);
        assert_eq!(h.ws.last_id(), Some(a));
        assert_eq!(h.workspace_of(view), Some(a));
        let events = h.events();
        assert_eq!(
            events.last(),
            Some(&Event::WorkspaceListChanged {
                current: 1,
                count: 1
            })
        );
    }

    #[test]
    fn reconfigure_without_changes_is_silent() {
        let mut h = harness(&["A", "B"]);
        h.ws.reconfigure(&["A".to_string(), "B".to_string()]);
        assert!(h.events().is_empty());
        h.ws.reconfigure(&[]);
        assert_eq!(h.ws.names(), vec!["A", "B"]);
        assert!(h.events().is_empty());
    }

    //  Notifications and teardown

    #[test]
    fn view_notifications_carry_workspace_index() {
        let mut h = harness(&["A", "B"]);
        let id = h.map(5, 2);
        let info = h.ws.desktop().inner.view(id).unwrap().clone();
        h.ws.notify_view_mapped(&info);
        h.ws.notify_view_unmapped(&info);
        h.ws.notify_focus_changed();
        assert_eq!(
            h.events()
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>(),
            vec![
                "view-mapped current=1 view=0x5 workspace=2 x=0 y=0 w=0 h=0",
                "view-unmapped current=1 view=0x5 workspace=2 x=0 y=0 w=0 h=0",
                "focus-changed current=1 focused=0",
            ]
        );
    }

    #[test]
    fn finish_releases_every_handle() {
        let h = harness(&["A", "B"]);
        let log = h.groups.clone();
        let (a, b) = (h.id(1), h.id(2));
        h.ws.finish();
        assert_eq!(
            *log.borrow(),
            vec![format!("destroy {}", a), format!("destroy {}", b)]
        );
    }
}
