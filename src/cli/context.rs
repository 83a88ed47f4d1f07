use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use promptsmith_event_bus::ActivityLog;
use promptsmith_task_store::{JsonFileBackend, TaskStore};
use tracing::debug;

use crate::config::AppConfig;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    store: OnceCell<Arc<TaskStore>>,
    activity: OnceCell<Arc<ActivityLog>>,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            store: OnceCell::new(),
            activity: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The persisted task store, opened for writing on first use. Holds the store lock until
    /// the process exits.
    pub fn store(&self) -> Result<Arc<TaskStore>> {
        self.store
            .get_or_try_init(|| {
                let path = self.config.store_path();
                debug!(path = %path.display(), "opening task store");
                let backend = JsonFileBackend::exclusive(&path)
                    .with_context(|| format!("cannot modify tasks at {}", path.display()))?;
                TaskStore::open(Arc::new(backend), &self.config.default_prefix)
                    .with_context(|| format!("failed to open task store at {}", path.display()))
            })
            .map(Arc::clone)
    }

    /// Read-only view of the task store. Works while another process holds the store.
    pub fn snapshot(&self) -> Result<Arc<TaskStore>> {
        if let Some(store) = self.store.get() {
            return Ok(Arc::clone(store));
        }
        let path = self.config.store_path();
        debug!(path = %path.display(), "reading task store");
        TaskStore::open(
            Arc::new(JsonFileBackend::read_only(&path)),
            &self.config.default_prefix,
        )
        .with_context(|| format!("failed to read task store at {}", path.display()))
    }

    pub fn activity(&self) -> Arc<ActivityLog> {
        Arc::clone(
            self.activity
                .get_or_init(|| ActivityLog::new(self.config.activity_capacity)),
        )
    }
}
