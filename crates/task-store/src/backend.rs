use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use promptsmith_core_types::{PipelineError, Task};

/// Everything the controller keeps between launches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, alias = "doubaoPrefix")]
    pub prefix: String,
}

/// Storage engine behind the task store.
pub trait StateBackend: Send + Sync {
    /// Returns `None` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<PersistedState>, PipelineError>;
    fn save(&self, state: &PersistedState) -> Result<(), PipelineError>;

    /// Read-only backends hand out snapshots; the store leaves their state as loaded.
    fn is_writable(&self) -> bool {
        true
    }
}

/// Single JSON document on disk, replaced atomically on every save.
///
/// Writers hold an exclusive lock on `<path>.lock` for as long as the backend lives, so a
/// second process cannot load an older copy of the file and later write it back over tasks
/// it never saw.
pub struct JsonFileBackend {
    path: PathBuf,
    lock: Option<File>,
}

impl JsonFileBackend {
    /// Opens `path` for writing. Fails with [`PipelineError::Storage`] while another writer
    /// holds the file.
    pub fn exclusive(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let lock_path = lock_path(&path);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    PipelineError::Storage(format!("failed to create {}: {err}", parent.display()))
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|err| {
                PipelineError::Storage(format!("failed to open {}: {err}", lock_path.display()))
            })?;
        file.try_lock_exclusive().map_err(|err| {
            if err.kind() == fs2::lock_contended_error().kind() {
                PipelineError::Storage(format!(
                    "task store {} is in use by another promptsmith process",
                    path.display()
                ))
            } else {
                PipelineError::Storage(format!("failed to lock {}: {err}", lock_path.display()))
            }
        })?;
        Ok(Self {
            path,
            lock: Some(file),
        })
    }

    /// Opens `path` for reading only; every save is refused.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

impl StateBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<PersistedState>, PipelineError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(PipelineError::Storage(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )))
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw).map(Some).map_err(|err| {
            PipelineError::Format(format!("{} is not a task state file: {err}", self.path.display()))
        })
    }

    fn save(&self, state: &PersistedState) -> Result<(), PipelineError> {
        if self.lock.is_none() {
            return Err(PipelineError::Storage(format!(
                "{} was opened read-only",
                self.path.display()
            )));
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    PipelineError::Storage(format!("failed to create {}: {err}", parent.display()))
                })?;
            }
        }
        let body = serde_json::to_vec_pretty(state)
            .map_err(|err| PipelineError::Storage(format!("failed to encode state: {err}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|err| {
                PipelineError::Storage(format!("failed to write {}: {err}", self.path.display()))
            })
    }

    fn is_writable(&self) -> bool {
        self.lock.is_some()
    }
}

/// Keeps the last saved state in memory; used by tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<Option<PersistedState>>,
    saves: Mutex<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    pub fn saved(&self) -> Option<PersistedState> {
        self.state.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl StateBackend for MemoryBackend {
    fn load(&self) -> Result<Option<PersistedState>, PipelineError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &PersistedState) -> Result<(), PipelineError> {
        *self.state.lock() = Some(state.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
