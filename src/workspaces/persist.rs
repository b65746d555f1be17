//! On-disk workspace list.
//!
//! The registry's names are written one per line to
//! `$XDG_STATE_HOME/workspaced/workspaces.txt` (falling back to
//! `$HOME/.local/state/workspaced/workspaces.txt`).  Writes go to a
//! `.tmp` sibling first and are then renamed over the canonical file, so
//! readers never observe a half-written list.
//!
//! Names are stored verbatim; a name containing a newline does not survive
//! a round trip.

use log::error;
use std::fs::{self, DirBuilder, File};
use std::io::{self, Write};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "workspaced";
const STATE_FILE: &str = "workspaces.txt";

/// Errors from [`StateFile::save`].
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to create state dir {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to replace {}: {source}", path.display())]
    Rename { path: PathBuf, source: io::Error },
}

/// Location of the persisted workspace list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFile {
    dir: PathBuf,
}

impl StateFile {
    /// Use `dir` as the state directory.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Resolve the state directory from `XDG_STATE_HOME` / `HOME`.
    ///
    /// Returns `None` when neither variable is set to a non-empty value.
    pub fn from_env() -> Option<Self> {
        resolve_dir(
            std::env::var("XDG_STATE_HOME").ok(),
            std::env::var("HOME").ok(),
        )
        .map(|dir| Self { dir })
    }

    /// Full path of the canonical state file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", STATE_FILE))
    }

    /// Read the persisted names.
    ///
    /// Trailing `\r`/`\n` are stripped and empty lines skipped.  Returns
    /// `None` if the file is missing, unreadable or holds no names.
    pub fn load(&self) -> Option<Vec<String>> {
        let path = self.path();
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                error!("failed to open workspace state file {}: {}", path.display(), e);
                return None;
            }
        };
        let names: Vec<String> = contents
            .split('\n')
            .map(|line| line.trim_end_matches(['\r', '\n']))
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(names)
        }
    }

    /// Atomically replace the state file with `names`, one per line.
    pub fn save<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<(), PersistError> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.dir)
            .map_err(|source| PersistError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let tmp = self.tmp_path();
        if let Err(source) = write_lines(&tmp, names) {
            let _ = fs::remove_file(&tmp);
            return Err(PersistError::Write { path: tmp, source });
        }

        let path = self.path();
        if let Err(source) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(PersistError::Rename { path, source });
        }
        Ok(())
    }
}

fn write_lines<'a>(path: &Path, names: impl IntoIterator<Item = &'a str>) -> io::Result<()> {
    let mut file = io::BufWriter::new(File::create(path)?);
    for name in names {
        file.write_all(name.as_bytes())?;
        file.write_all(b"\n")?;
    }
    file.into_inner().map_err(|e| e.into_error())?.sync_all()
}

fn resolve_dir(xdg_state_home: Option<String>, home: Option<String>) -> Option<PathBuf> {
    if let Some(state) = xdg_state_home.filter(|s| !s.is_empty()) {
        return Some(PathBuf::from(state).join(APP_DIR));
    }
    home.filter(|h| !h.is_empty())
        .map(|h| PathBuf::from(h).join(".local/state").join(APP_DIR))
}
