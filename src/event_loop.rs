//! The daemon's reactor.
//!
//! One calloop [`EventLoop`] multiplexes the listening socket, one source
//! per client, the activate-request channel and the indicator's auto-hide
//! deadline.  Everything runs on the calling thread.

use crate::ipc::server::ClientId;
use crate::state::State;
use crate::traits::{ActivateRequest, Desktop};
use calloop::channel::{self, Channel};
use calloop::generic::Generic;
use calloop::{EventLoop, Interest, LoopHandle, Mode, PostAction};
use log::{debug, error, info};
use std::os::unix::net::UnixStream;
use std::time::Instant;

/// Errors that stop the event loop.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("event loop error: {0}")]
    Calloop(#[from] calloop::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run until an `Exit` action stops `state`, then shut it down.
///
/// `activate` carries requests from the external workspace-group clients.
pub fn run<D: Desktop + 'static>(
    mut state: State<D>,
    activate: Channel<ActivateRequest>,
) -> Result<(), LoopError> {
    let mut event_loop: EventLoop<'static, State<D>> = EventLoop::try_new()?;
    let handle = event_loop.handle();

    if let Some(ipc) = state.ipc() {
        let listener = ipc.listener().try_clone()?;
        let clients = handle.clone();
        handle
            .insert_source(
                Generic::new(listener, Interest::READ, Mode::Level),
                move |_, _, state| {
                    for (id, stream) in state.accept_clients() {
                        watch_client(&clients, state, id, stream);
                    }
                    Ok(PostAction::Continue)
                },
            )
            .map_err(|e| e.error)?;
    }

    handle
        .insert_source(activate, |event, _, state| match event {
            channel::Event::Msg(request) => state.workspaces.handle_activate_request(request),
            channel::Event::Closed => debug!("activate-request channel closed"),
        })
        .map_err(|e| e.error)?;

    info!("workspaced running");
    let result = loop {
        if !state.is_running() {
            break Ok(());
        }
        let timeout = state
            .workspaces
            .indicator_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));
        if let Err(e) = event_loop.dispatch(timeout, &mut state) {
            break Err(e.into());
        }
        state.workspaces.tick(Instant::now());
        state.flush_events();
        for token in state.take_closed() {
            handle.remove(token);
        }
    };

    info!("shutting down");
    state.shutdown();
    result
}

fn watch_client<D: Desktop + 'static>(
    handle: &LoopHandle<'static, State<D>>,
    state: &mut State<D>,
    id: ClientId,
    stream: UnixStream,
) {
    let source = Generic::new(stream, Interest::READ, Mode::Level);
    match handle.insert_source(source, move |_, _, state: &mut State<D>| {
        state.handle_client_readable(id);
        Ok(PostAction::Continue)
    }) {
        Ok(token) => state.set_client_token(id, token),
        Err(e) => {
            error!("failed to watch {}: {}", id, e.error);
            state.drop_client(id);
        }
    }
}
