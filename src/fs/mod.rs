pub mod parser;
pub mod store;

use std::path::PathBuf;

pub use store::{FileTaskStore, TaskStore};

/// Get the data directory
/// `HXT_DATA_DIR` if set, otherwise ~/.helix-todo on all platforms
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HXT_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".helix-todo")
}

/// Get the tasks directory (<data_dir>/tasks)
pub fn tasks_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("tasks")
}
