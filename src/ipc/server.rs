//! Listening socket and client table.
//!
//! [`IpcServer`] owns the non-blocking listener and every accepted
//! [`Connection`].  It never blocks: the event loop tells it when the
//! listener or a client is readable, and everything else (replies, event
//! broadcast) is a direct write that drops the client on failure.

use crate::ipc::connection::{Connection, ReadStatus};
use crate::ipc::event::Event;
use calloop::RegistrationToken;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

/// Environment variable through which clients discover the socket.
pub const SOCKET_ENV: &str = "WORKSPACED_IPC_SOCKET";

/// Handle for one accepted client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Errors from setting up the IPC socket.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("{0} not set")]
    MissingEnv(&'static str),
    #[error("failed to bind {}: {source}", path.display())]
    Bind { path: PathBuf, source: io::Error },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Socket path for this session:
/// `$XDG_RUNTIME_DIR/workspaced-$WAYLAND_DISPLAY.sock`.
pub fn socket_path_from_env() -> Result<PathBuf, IpcError> {
    socket_path(
        std::env::var("XDG_RUNTIME_DIR").ok(),
        std::env::var("WAYLAND_DISPLAY").ok(),
    )
}

fn socket_path(runtime_dir: Option<String>, display: Option<String>) -> Result<PathBuf, IpcError> {
    let runtime_dir = runtime_dir
        .filter(|s| !s.is_empty())
        .ok_or(IpcError::MissingEnv("XDG_RUNTIME_DIR"))?;
    let display = display
        .filter(|s| !s.is_empty())
        .ok_or(IpcError::MissingEnv("WAYLAND_DISPLAY"))?;
    Ok(PathBuf::from(runtime_dir).join(format!("workspaced-{}.sock", display)))
}

pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
    clients: BTreeMap<ClientId, Connection>,
    next_id: u64,
    max_recv_buf: usize,
    closed: Vec<RegistrationToken>,
}

impl IpcServer {
    /// Bind a fresh socket at `path`, replacing a stale one.
    pub fn bind(path: impl AsRef<Path>, max_recv_buf: usize) -> Result<Self, IpcError> {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(|source| IpcError::Bind {
            path: path.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        info!("IPC listening on {}", path.display());
        Ok(Self {
            listener,
            path,
            clients: BTreeMap::new(),
            next_id: 1,
            max_recv_buf,
            closed: Vec::new(),
        })
    }

    /// Bind at [`socket_path_from_env`] and export the path as
    /// [`SOCKET_ENV`].
    pub fn from_env(max_recv_buf: usize) -> Result<Self, IpcError> {
        let server = Self::bind(socket_path_from_env()?, max_recv_buf)?;
        std::env::set_var(SOCKET_ENV, &server.path);
        Ok(server)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn listener(&self) -> &UnixListener {
        &self.listener
    }

    //  Clients

    /// Accept every pending connection.
    pub fn accept(&mut self) -> Vec<ClientId> {
        let mut accepted = Vec::new();
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => match self.adopt(stream) {
                    Ok(id) => accepted.push(id),
                    Err(e) => warn!("failed to configure IPC client: {}", e),
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("IPC accept failed: {}", e);
                    break;
                }
            }
        }
        accepted
    }

    /// Take ownership of an already-connected stream.
    pub fn adopt(&mut self, stream: UnixStream) -> io::Result<ClientId> {
        let conn = Connection::new(stream, self.max_recv_buf)?;
        let id = ClientId(self.next_id);
        self.next_id += 1;
        self.clients.insert(id, conn);
        debug!("{} connected", id);
        Ok(id)
    }

    pub fn client(&self, id: ClientId) -> Option<&Connection> {
        self.clients.get(&id)
    }

    pub fn is_connected(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Remember the event-loop source watching `id`.
    pub fn set_token(&mut self, id: ClientId, token: RegistrationToken) {
        if let Some(conn) = self.clients.get_mut(&id) {
            conn.set_token(token);
        }
    }

    /// Read what `id` has sent and return the complete lines.
    ///
    /// A hang-up, read error or oversize buffer disconnects the client;
    /// the oversize case first sends `ERROR line too long`.
    pub fn receive(&mut self, id: ClientId) -> Vec<Vec<u8>> {
        let Some(conn) = self.clients.get_mut(&id) else {
            return Vec::new();
        };
        match conn.fill() {
            ReadStatus::Data => std::iter::from_fn(|| conn.next_line()).collect(),
            ReadStatus::WouldBlock => Vec::new(),
            ReadStatus::Closed => {
                self.disconnect(id);
                Vec::new()
            }
            ReadStatus::Overflow => {
                warn!(
                    "{} sent {} bytes without a newline, disconnecting",
                    id,
                    conn.buffered()
                );
                let _ = conn.send(b"ERROR line too long\n");
                self.disconnect(id);
                Vec::new()
            }
        }
    }

    /// Write `data` to `id`.  A failed write disconnects the client.
    pub fn send(&mut self, id: ClientId, data: &[u8]) -> bool {
        let Some(conn) = self.clients.get_mut(&id) else {
            return false;
        };
        match conn.send(data) {
            Ok(()) => true,
            Err(e) => {
                debug!("write to {} failed: {}", id, e);
                self.disconnect(id);
                false
            }
        }
    }

    pub fn subscribe(&mut self, id: ClientId) {
        if let Some(conn) = self.clients.get_mut(&id) {
            conn.subscribe();
        }
    }

    /// Send `event` to every subscribed client.
    ///
    /// Clients whose write fails are dropped; the rest still get the event.
    pub fn broadcast(&mut self, event: &Event) {
        let line = event.to_line();
        let subscribers: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_subscribed())
            .map(|(id, _)| *id)
            .collect();
        for id in subscribers {
            self.send(id, line.as_bytes());
        }
    }

    /// Close `id` and queue its event-loop source for removal.
    pub fn disconnect(&mut self, id: ClientId) {
        if let Some(conn) = self.clients.remove(&id) {
            conn.close();
            if let Some(token) = conn.token() {
                self.closed.push(token);
            }
            debug!("{} disconnected", id);
        }
    }

    /// Sources of clients closed since the last call.
    pub fn take_closed(&mut self) -> Vec<RegistrationToken> {
        std::mem::take(&mut self.closed)
    }

    /// Close every client and remove the socket file.
    pub fn finish(mut self) {
        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        for id in ids {
            self.disconnect(id);
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("failed to remove {}: {}", self.path.display(), e);
            }
        }
        info!("IPC socket {} closed", self.path.display());
    }
}
