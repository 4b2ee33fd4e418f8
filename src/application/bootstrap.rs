use crate::infrastructure::config::{ensure_default_configs, load_countdown_config};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DATABASE_FILE: &str = "countdown.sqlite";

/// Paths of a prepared workspace: `config/app.json`, `state/countdown.sqlite` and `logs/`.
#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
}

impl BootstrapResult {
    fn under(workspace_root: &Path) -> Self {
        Self {
            workspace_root: workspace_root.to_path_buf(),
            config_dir: workspace_root.join("config"),
            logs_dir: workspace_root.join("logs"),
            database_path: workspace_root.join("state").join(DATABASE_FILE),
        }
    }
}

/// Creates missing directories, default config and schema. Existing files are kept.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let layout = BootstrapResult::under(workspace_root);
    let state_dir = layout
        .database_path
        .parent()
        .unwrap_or(workspace_root);
    for dir in [layout.config_dir.as_path(), state_dir, layout.logs_dir.as_path()] {
        fs::create_dir_all(dir)?;
    }

    ensure_default_configs(&layout.config_dir)?;
    load_countdown_config(&layout.config_dir)?;
    initialize_database(&layout.database_path)?;
    debug!("[COUNTDOWN] workspace ready at {}", workspace_root.display());
    Ok(layout)
}
