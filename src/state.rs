//! The daemon's owned context.
//!
//! [`State`] is the `Data` of the event loop: every callback receives it
//! mutably, so the registry, the IPC server and the configuration are only
//! ever touched from the loop thread.

use crate::actions::{self, Action};
use crate::config::Config;
use crate::ipc::command::{CommandError, Request, Response};
use crate::ipc::event::Event;
use crate::ipc::server::{ClientId, IpcServer};
use crate::ipc::snapshot;
use crate::traits::Desktop;
use crate::workspaces::Workspaces;
use calloop::RegistrationToken;
use log::{debug, error, info, warn};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::mpsc;

pub struct State<D: Desktop> {
    pub workspaces: Workspaces<D>,
    ipc: Option<IpcServer>,
    config: Config,
    config_path: Option<PathBuf>,
    events: mpsc::Receiver<Event>,
    running: bool,
}

impl<D: Desktop> State<D> {
    /// Wire `workspaces` to the IPC server.  Without a server the daemon
    /// still runs; events are then discarded.
    pub fn new(
        mut workspaces: Workspaces<D>,
        ipc: Option<IpcServer>,
        config: Config,
        config_path: Option<PathBuf>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        workspaces.set_event_sink(tx);
        Self {
            workspaces,
            ipc,
            config,
            config_path,
            events: rx,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ipc(&self) -> Option<&IpcServer> {
        self.ipc.as_ref()
    }

    pub fn ipc_mut(&mut self) -> Option<&mut IpcServer> {
        self.ipc.as_mut()
    }

    //  Clients

    /// Accept pending connections and hand back a second handle to each
    /// socket for the event loop to watch.
    pub fn accept_clients(&mut self) -> Vec<(ClientId, UnixStream)> {
        let Some(ipc) = self.ipc.as_mut() else {
            return Vec::new();
        };
        let mut accepted = Vec::new();
        for id in ipc.accept() {
            let watch = ipc.client(id).map(|c| c.stream().try_clone());
            match watch {
                Some(Ok(stream)) => accepted.push((id, stream)),
                Some(Err(e)) => {
                    warn!("failed to watch {}: {}", id, e);
                    ipc.disconnect(id);
                }
                None => {}
            }
        }
        accepted
    }

    pub fn set_client_token(&mut self, id: ClientId, token: RegistrationToken) {
        if let Some(ipc) = self.ipc.as_mut() {
            ipc.set_token(id, token);
        }
    }

    pub fn drop_client(&mut self, id: ClientId) {
        if let Some(ipc) = self.ipc.as_mut() {
            ipc.disconnect(id);
        }
    }

    /// Event-loop sources of clients that went away.
    pub fn take_closed(&mut self) -> Vec<RegistrationToken> {
        self.ipc
            .as_mut()
            .map(IpcServer::take_closed)
            .unwrap_or_default()
    }

    /// Read from `id` and run every complete line it sent.
    ///
    /// Events caused by a command are broadcast before its reply is sent.
    pub fn handle_client_readable(&mut self, id: ClientId) {
        let lines = match self.ipc.as_mut() {
            Some(ipc) => ipc.receive(id),
            None => return,
        };
        for line in lines {
            if !self.ipc.as_ref().is_some_and(|ipc| ipc.is_connected(id)) {
                break;
            }
            let response = self.execute(id, &line);
            self.flush_events();
            if let (Some(response), Some(ipc)) = (response, self.ipc.as_mut()) {
                ipc.send(id, response.to_wire().as_bytes());
            }
        }
    }

    /// Run one request line from `id`.  Blank lines get no reply.
    pub fn execute(&mut self, id: ClientId, line: &[u8]) -> Option<Response> {
        let Ok(line) = std::str::from_utf8(line) else {
            warn!("{}: rejected request that is not UTF-8", id);
            return Some(CommandError::NotUtf8.into());
        };
        debug!("{}: {}", id, line.trim());
        let request = match Request::parse(line) {
            Ok(Some(request)) => request,
            Ok(None) => return None,
            Err(e) => {
                warn!("{}: rejected {:?}: {}", id, line.trim(), e);
                return Some(e.into());
            }
        };

        let response = match request {
            Request::Ping => Response::ok(),
            Request::SubscribeEvents => {
                if let Some(ipc) = self.ipc.as_mut() {
                    ipc.subscribe(id);
                }
                Response::Ok(Some("subscribed-events".to_string()))
            }
            Request::ListViews(format) => {
                bulk(snapshot::list_views(&self.workspaces, format))
            }
            Request::ListWorkspaces(format) => {
                bulk(snapshot::list_workspaces(&self.workspaces, format))
            }
            Request::WorkspaceAdd { name } => {
                self.workspaces.add(name.as_deref().unwrap_or(""));
                Response::ok()
            }
            Request::WorkspaceRename { index, name } => {
                match self.workspaces.rename(index, &name) {
                    Ok(_) => Response::ok(),
                    Err(e) => {
                        warn!("rename of workspace {} refused: {}", index, e);
                        CommandError::RenameFailed.into()
                    }
                }
            }
            Request::WorkspaceRemove { index } => match self.workspaces.remove(index) {
                Ok(()) => Response::ok(),
                Err(e) => {
                    warn!("removal of workspace {} refused: {}", index, e);
                    CommandError::RemoveFailed.into()
                }
            },
            Request::Action { name, args } => match Action::parse(&name, &args) {
                Ok(action) => {
                    self.run_action(action);
                    Response::ok()
                }
                Err(e) => {
                    warn!("{}: action {:?} refused: {}", id, name, e);
                    Response::error(e)
                }
            },
        };
        Some(response)
    }

    /// Execute a validated action.
    pub fn run_action(&mut self, action: Action) {
        debug!("running {:?}", action);
        match action {
            Action::GoToDesktop { to, wrap } => {
                actions::go_to_desktop(&mut self.workspaces, &to, wrap);
            }
            Action::SendToDesktop { to, follow, wrap } => {
                actions::send_to_desktop(&mut self.workspaces, &to, follow, wrap);
            }
            Action::Reconfigure => self.reconfigure(),
            Action::Exit => {
                info!("exit requested");
                self.stop();
            }
        }
    }

    /// Reload the configuration file and apply it.
    pub fn reconfigure(&mut self) {
        self.config = Config::load_or_default(self.config_path.as_deref());
        self.workspaces
            .set_popup_time(self.config.workspaces.popup_time());
        self.workspaces.reconfigure(&self.config.workspaces.names);
    }

    /// Broadcast every event queued by the registry.
    pub fn flush_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let Some(ipc) = self.ipc.as_mut() {
                ipc.broadcast(&event);
            }
        }
    }

    /// Close the socket and release the registry's external handles.
    pub fn shutdown(mut self) {
        self.flush_events();
        if let Some(ipc) = self.ipc.take() {
            ipc.finish();
        }
        self.workspaces.finish();
    }
}

fn bulk(body: Result<String, serde_json::Error>) -> Response {
    match body {
        Ok(body) => Response::Bulk(body),
        Err(e) => {
            error!("failed to serialize snapshot: {}", e);
            Response::error("internal error")
        }
    }
}
