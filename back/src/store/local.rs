use std::{
    collections::HashMap,
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use recap_api::v1::{NewTodo, Todo, TodoPatch};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Sort, SortKey, StoreError, StoreResult, TodoFilter, TodoStore};

/// In-process store, optionally snapshotted to a RON file after every write.
#[derive(Debug, Default)]
pub struct LocalStore {
    path: Option<PathBuf>,
    todos: Mutex<HashMap<Uuid, Todo>>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens the data file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> eyre::Result<Self> {
        let path = path.into();

        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path: Some(path),
                    todos: Mutex::default(),
                });
            }
            Err(err) => eyre::bail!(err),
        };
        let data: DataOwned = ron::de::from_reader(file)?;

        let todos = match data {
            DataOwned::V1 { todos } => todos,
        };

        Ok(Self {
            path: Some(path),
            todos: Mutex::new(todos),
        })
    }

    async fn persist(&self, todos: &HashMap<Uuid, Todo>) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        write_snapshot(path, todos).await.map_err(|err| {
            tracing::error!(path = %path.display(), "failed to store data: {:?}", err);
            StoreError::Unavailable(format!("failed to write {}: {}", path.display(), err))
        })
    }
}

/// Sibling file the snapshot is written to before it replaces `path`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("data"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces the snapshot at `path` atomically, so a crash mid-write leaves the
/// previous snapshot intact.
async fn write_snapshot(path: &Path, todos: &HashMap<Uuid, Todo>) -> eyre::Result<()> {
    let data = DataBorrowed::V1 { todos };
    let ron = ron::ser::to_string_pretty(&data, Default::default())?;

    let staging = staging_path(path);
    tokio::fs::write(&staging, ron).await?;
    tokio::fs::rename(&staging, path).await?;

    Ok(())
}

#[async_trait]
impl TodoStore for LocalStore {
    async fn insert(&self, new: NewTodo) -> StoreResult<Todo> {
        let mut todos = self.todos.lock().await;
        let todo = Todo::new(new);
        todos.insert(todo.id, todo.clone());

        if let Err(err) = self.persist(&todos).await {
            todos.remove(&todo.id);
            return Err(err);
        }

        Ok(todo)
    }

    async fn list(&self, filter: TodoFilter, sort: Option<Sort>) -> StoreResult<Vec<Todo>> {
        let todos = self.todos.lock().await;
        let mut todos: Vec<_> = todos
            .values()
            .filter(|todo| filter.matches(todo))
            .cloned()
            .collect();

        // insertion order is the native order of this store
        Sort::ascending(SortKey::CreatedAt).apply(&mut todos);
        if let Some(sort) = sort {
            sort.apply(&mut todos);
        }

        Ok(todos)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Todo> {
        let todos = self.todos.lock().await;
        todos.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, id: Uuid, patch: TodoPatch) -> StoreResult<Todo> {
        let mut todos = self.todos.lock().await;
        let todo = todos.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let previous = todo.clone();
        todo.apply(patch);
        let updated = todo.clone();

        if let Err(err) = self.persist(&todos).await {
            todos.insert(id, previous);
            return Err(err);
        }

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut todos = self.todos.lock().await;
        let removed = todos.remove(&id).ok_or(StoreError::NotFound(id))?;

        if let Err(err) = self.persist(&todos).await {
            todos.insert(id, removed);
            return Err(err);
        }

        Ok(())
    }

    async fn count(&self, filter: TodoFilter) -> StoreResult<u64> {
        let todos = self.todos.lock().await;
        Ok(todos.values().filter(|todo| filter.matches(todo)).count() as u64)
    }
}

#[derive(Serialize)]
enum DataBorrowed<'a> {
    V1 { todos: &'a HashMap<Uuid, Todo> },
}

#[derive(Deserialize)]
enum DataOwned {
    V1 { todos: HashMap<Uuid, Todo> },
}
