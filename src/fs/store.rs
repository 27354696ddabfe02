use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::fs::parser::{parse_task_file, render_task_file};
use crate::models::{NewTask, Task, TaskId, TaskPatch};

/// Keyed record store for tasks.
///
/// Every call is atomic on its own; implementations serialize writers.
pub trait TaskStore: Send + Sync {
    /// Create a task; the store assigns the id.
    fn create(&self, fields: NewTask) -> Result<Task, StoreError>;

    /// All tasks, newest created first.
    fn list_all(&self) -> Result<Vec<Task>, StoreError>;

    fn get(&self, id: TaskId) -> Result<Task, StoreError> {
        self.list_all()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn update_by_id(&self, id: TaskId, patch: TaskPatch) -> Result<Task, StoreError>;

    fn delete_by_id(&self, id: TaskId) -> Result<(), StoreError>;

    /// Re-read backing storage (after an external edit).
    fn reload(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Sort newest created first; equal timestamps fall back to the higher id.
pub fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("title must not be empty".to_string()));
    }
    Ok(())
}

fn next_id(tasks: &[Task]) -> TaskId {
    TaskId(tasks.iter().map(|t| t.id.0).max().unwrap_or(0) + 1)
}

/// File-backed store: one markdown file per task under `<dir>/<id>.md`.
///
/// The whole task set is cached in memory; the cache mutex also serializes
/// writers, so conflicting updates to the same id never interleave.
pub struct FileTaskStore {
    dir: PathBuf,
    tasks: Mutex<Vec<Task>>,
    live_reload: bool,
}

impl FileTaskStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let tasks = load_tasks_from_dir(&dir)?;
        tracing::debug!(dir = %dir.display(), count = tasks.len(), "task store opened");

        Ok(Self {
            dir,
            tasks: Mutex::new(tasks),
            live_reload: false,
        })
    }

    /// Re-read the directory before every operation, so tasks written by
    /// another `hxt` process show up without an explicit reload and updates
    /// never overwrite them with a stale cached copy.
    pub fn with_live_reload(mut self) -> Self {
        self.live_reload = true;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the markdown file backing `id`.
    pub fn task_path(&self, id: TaskId) -> PathBuf {
        task_file_path(&self.dir, id)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Task>>, StoreError> {
        self.tasks
            .lock()
            .map_err(|_| StoreError::unavailable("task cache lock poisoned"))
    }

    /// Lock the cache; with live reload, refresh it from disk while holding
    /// the lock so the read and the following write form one step.
    fn lock_fresh(&self) -> Result<MutexGuard<'_, Vec<Task>>, StoreError> {
        let mut tasks = self.lock()?;
        if self.live_reload {
            *tasks = load_tasks_from_dir(&self.dir)?;
        }
        Ok(tasks)
    }
}

impl TaskStore for FileTaskStore {
    fn create(&self, fields: NewTask) -> Result<Task, StoreError> {
        validate_title(&fields.title)?;
        let mut tasks = self.lock_fresh()?;

        let task = Task::new(next_id(&tasks), fields);
        save_task(&self.dir, &task)?;
        tasks.push(task.clone());

        Ok(task)
    }

    fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.lock_fresh()?.clone();
        sort_newest_first(&mut tasks);
        Ok(tasks)
    }

    fn update_by_id(&self, id: TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        let mut tasks = self.lock_fresh()?;
        let idx = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;

        let mut updated = tasks[idx].clone();
        if updated.apply(patch) {
            // 先写盘，成功后再更新缓存
            save_task(&self.dir, &updated)?;
            tasks[idx] = updated.clone();
        }

        Ok(updated)
    }

    fn delete_by_id(&self, id: TaskId) -> Result<(), StoreError> {
        let mut tasks = self.lock_fresh()?;
        let idx = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;

        let path = task_file_path(&self.dir, id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tasks.remove(idx);

        Ok(())
    }

    fn reload(&self) -> Result<(), StoreError> {
        // 持锁读取，避免覆盖并发写入
        let mut tasks = self.lock()?;
        *tasks = load_tasks_from_dir(&self.dir)?;
        Ok(())
    }
}

fn task_file_path(dir: &Path, id: TaskId) -> PathBuf {
    dir.join(format!("{}.md", id))
}

/// Load all tasks from a directory, skipping files that fail to parse.
pub fn load_tasks_from_dir(dir: &Path) -> Result<Vec<Task>, StoreError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut tasks = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        match load_task(&path) {
            Ok(task) => tasks.push(task),
            Err(e) => tracing::warn!(error = %e, "skipping unreadable task file"),
        }
    }

    tasks.sort_by_key(|t| t.id);
    Ok(tasks)
}

/// Load a single task from a markdown file.
pub fn load_task(path: &Path) -> Result<Task, StoreError> {
    let content = fs::read_to_string(path)?;
    parse_task_file(&content).map_err(|reason| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    })
}

/// Write a task file; goes through a temporary file so readers never see a
/// half-written task.
pub fn save_task(dir: &Path, task: &Task) -> Result<PathBuf, StoreError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let content = render_task_file(task).map_err(StoreError::unavailable)?;
    let file_path = task_file_path(dir, task.id);
    let tmp_path = dir.join(format!(".{}.md.tmp", task.id));

    fs::write(&tmp_path, content)?;
    fs::rename(&tmp_path, &file_path)?;

    Ok(file_path)
}

/// In-memory store used by unit tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

#[cfg(test)]
impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed task, replacing any task with the same id.
    pub fn insert(&self, task: Task) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|t| t.id != task.id);
        tasks.push(task);
    }
}

#[cfg(test)]
impl TaskStore for MemoryTaskStore {
    fn create(&self, fields: NewTask) -> Result<Task, StoreError> {
        validate_title(&fields.title)?;
        let mut tasks = self.tasks.lock().unwrap();
        let task = Task::new(next_id(&tasks), fields);
        tasks.push(task.clone());
        Ok(task)
    }

    fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.tasks.lock().unwrap().clone();
        sort_newest_first(&mut tasks);
        Ok(tasks)
    }

    fn update_by_id(&self, id: TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        task.apply(patch);
        Ok(task.clone())
    }

    fn delete_by_id(&self, id: TaskId) -> Result<(), StoreError> {
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
