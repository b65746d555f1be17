//! Entry point for the **workspaced** daemon.
//!
//! Runs the workspace registry against the headless desktop and serves the
//! IPC socket until an `Exit` action arrives.

use log::{error, info, warn};
use std::path::PathBuf;
use workspaced::config::{self, Config};
use workspaced::headless::{HeadlessDesktop, LogGroup, LogIndicator};
use workspaced::ipc::server::IpcServer;
use workspaced::state::State;
use workspaced::traits::{ActivateRequest, WorkspaceGroup};
use workspaced::workspaces::persist::StateFile;
use workspaced::workspaces::Workspaces;

/// Load the config from `--config <path>` or the default location, falling
/// back to compiled-in defaults.
fn load_config() -> (Config, Option<PathBuf>) {
    let args: Vec<String> = std::env::args().collect();
    let explicit = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);
    let path = explicit.or_else(config::default_path);

    let Some(path) = path else {
        info!("no config location, using defaults");
        return (Config::default(), None);
    };
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            (cfg, Some(path))
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            (Config::default(), Some(path))
        }
    }
}

fn main() {
    env_logger::init();

    let (config, config_path) = load_config();

    let state_file = StateFile::from_env();
    if state_file.is_none() {
        warn!("neither XDG_STATE_HOME nor HOME is set, workspaces will not be saved");
    }

    let groups: Vec<Box<dyn WorkspaceGroup>> = vec![
        Box::new(LogGroup::new("ext-workspace")),
        Box::new(LogGroup::new("cosmic-workspace")),
    ];
    let mut workspaces = Workspaces::new(HeadlessDesktop::new(), groups, state_file);
    workspaces.set_indicator(Box::new(LogIndicator), config.workspaces.popup_time());

    let ipc = match IpcServer::from_env(config.ipc.max_recv_buf) {
        Ok(server) => Some(server),
        Err(e) => {
            error!("IPC disabled: {}", e);
            None
        }
    };

    let state = State::new(workspaces, ipc, config, config_path);

    // Kept alive for the lifetime of the loop; a compositor shell would
    // hand clones of it to its workspace-group protocol handlers.
    let (_activate_tx, activate_rx) = calloop::channel::channel::<ActivateRequest>();

    if let Err(e) = workspaced::event_loop::run(state, activate_rx) {
        error!("{}", e);
        std::process::exit(1);
    }
    info!("workspaced exited");
}
