//! Bodies of the `list-views` and `list-workspaces` queries.
//!
//! The text form is a header, one line per item and a closing `END` line,
//! with every free-text value percent-encoded.  The JSON form is a single
//! object on one line.
//!
//! ```text
//! current=2
//! encoding=percent
//! workspace index=1 name=main active=0
//! workspace index=2 name=web%20docs active=1
//! END
//! ```

use crate::encoding::percent_encode;
use crate::ipc::command::Format;
use crate::traits::{Desktop, ViewInfo};
use crate::workspaces::Workspaces;
use serde::Serialize;
use std::fmt::Write;

#[derive(Serialize)]
struct ViewsDoc<'a> {
    current_workspace: usize,
    current_workspace_name: &'a str,
    views: Vec<ViewEntry<'a>>,
}

#[derive(Serialize)]
struct ViewEntry<'a> {
    app_id: &'a str,
    title: &'a str,
    workspace: usize,
    workspace_name: &'a str,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    output: &'a str,
    usable_x: i32,
    usable_y: i32,
    usable_w: i32,
    usable_h: i32,
    maximized: bool,
    minimized: bool,
    fullscreen: bool,
    tiled: bool,
    focused: bool,
}

#[derive(Serialize)]
struct WorkspacesDoc<'a> {
    current_workspace: usize,
    current_workspace_name: &'a str,
    workspaces: Vec<WorkspaceEntry<'a>>,
}

#[derive(Serialize)]
struct WorkspaceEntry<'a> {
    index: usize,
    name: &'a str,
    active: bool,
}

fn pct(s: &str) -> String {
    percent_encode(s.as_bytes())
}

fn flag(b: bool) -> u8 {
    u8::from(b)
}

/// Build the `list-views` body for every mapped view, bottom-most first.
pub fn list_views<D: Desktop>(
    workspaces: &Workspaces<D>,
    format: Format,
) -> Result<String, serde_json::Error> {
    let views: Vec<ViewInfo> = workspaces
        .desktop()
        .views()
        .into_iter()
        .filter(|v| v.mapped)
        .collect();
    let focused = workspaces.desktop().focused_view();
    let current = workspaces.current();
    let workspace_of = move |v: &ViewInfo| {
        v.workspace
            .and_then(|id| workspaces.get(id))
            .map_or((0, ""), |ws| (workspaces.index_of(ws.id()), ws.name()))
    };

    match format {
        Format::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "current_workspace={}", workspaces.current_index());
            out.push_str("encoding=percent\n");
            let _ = writeln!(out, "current_workspace_name={}", pct(current.name()));
            for v in &views {
                let (index, name) = workspace_of(v);
                let _ = writeln!(
                    out,
                    "view app_id={} title={} workspace={} workspace_name={} \
                     x={} y={} w={} h={} \
                     maximized={} minimized={} fullscreen={} tiled={} focused={}",
                    pct(&v.app_id),
                    pct(&v.title),
                    index,
                    pct(name),
                    v.geometry.x,
                    v.geometry.y,
                    v.geometry.width,
                    v.geometry.height,
                    flag(v.maximized),
                    flag(v.minimized),
                    flag(v.fullscreen),
                    flag(v.tiled),
                    flag(focused == Some(v.id)),
                );
            }
            out.push_str("END\n");
            Ok(out)
        }
        Format::Json => {
            let doc = ViewsDoc {
                current_workspace: workspaces.current_index(),
                current_workspace_name: current.name(),
                views: views
                    .iter()
                    .map(|v| {
                        let (index, name) = workspace_of(v);
                        let (output, usable) = v
                            .output
                            .as_ref()
                            .map_or(("", Default::default()), |o| (o.name.as_str(), o.usable));
                        ViewEntry {
                            app_id: &v.app_id,
                            title: &v.title,
                            workspace: index,
                            workspace_name: name,
                            x: v.geometry.x,
                            y: v.geometry.y,
                            w: v.geometry.width,
                            h: v.geometry.height,
                            output,
                            usable_x: usable.x,
                            usable_y: usable.y,
                            usable_w: usable.width,
                            usable_h: usable.height,
                            maximized: v.maximized,
                            minimized: v.minimized,
                            fullscreen: v.fullscreen,
                            tiled: v.tiled,
                            focused: focused == Some(v.id),
                        }
                    })
                    .collect(),
            };
            let mut out = serde_json::to_string(&doc)?;
            out.push('\n');
            Ok(out)
        }
    }
}

/// Build the `list-workspaces` body.
pub fn list_workspaces<D: Desktop>(
    workspaces: &Workspaces<D>,
    format: Format,
) -> Result<String, serde_json::Error> {
    let current = workspaces.current_id();
    match format {
        Format::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "current={}", workspaces.current_index());
            out.push_str("encoding=percent\n");
            for (i, ws) in workspaces.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "workspace index={} name={} active={}",
                    i + 1,
                    pct(ws.name()),
                    flag(ws.id() == current)
                );
            }
            out.push_str("END\n");
            Ok(out)
        }
        Format::Json => {
            let doc = WorkspacesDoc {
                current_workspace: workspaces.current_index(),
                current_workspace_name: workspaces.current().name(),
                workspaces: workspaces
                    .iter()
                    .enumerate()
                    .map(|(i, ws)| WorkspaceEntry {
                        index: i + 1,
                        name: ws.name(),
                        active: ws.id() == current,
                    })
                    .collect(),
            };
            let mut out = serde_json::to_string(&doc)?;
            out.push('\n');
            Ok(out)
        }
    }
}
