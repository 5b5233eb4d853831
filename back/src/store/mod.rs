mod local;
mod mongo;

use std::cmp::Ordering;

use async_trait::async_trait;
use recap_api::v1::{NewTodo, Todo, TodoPatch};
use uuid::Uuid;

pub use local::LocalStore;
pub use mongo::MongoStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("todo {0} not found")]
    NotFound(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Predicate over todos. The default matches every record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub completed: Option<bool>,
}

impl TodoFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pending() -> Self {
        Self {
            completed: Some(false),
        }
    }

    pub fn completed() -> Self {
        Self {
            completed: Some(true),
        }
    }

    pub fn matches(&self, todo: &Todo) -> bool {
        self.completed.map_or(true, |c| todo.completed == c)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    Priority,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub direction: Direction,
}

impl Sort {
    pub fn descending(key: SortKey) -> Self {
        Self {
            key,
            direction: Direction::Descending,
        }
    }

    pub fn ascending(key: SortKey) -> Self {
        Self {
            key,
            direction: Direction::Ascending,
        }
    }

    pub fn compare(&self, a: &Todo, b: &Todo) -> Ordering {
        let ordering = match self.key {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Priority => a.priority.cmp(&b.priority),
        };

        match self.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }

    /// Stable in-process sort, used where the backend cannot order natively.
    pub fn apply(&self, todos: &mut [Todo]) {
        todos.sort_by(|a, b| self.compare(a, b));
    }
}

/// Durable keyed storage for todo records.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Persists a new record, assigning its id and timestamps.
    async fn insert(&self, new: NewTodo) -> StoreResult<Todo>;

    /// Records matching `filter`; `sort` of `None` keeps the store's native order.
    async fn list(&self, filter: TodoFilter, sort: Option<Sort>) -> StoreResult<Vec<Todo>>;

    async fn get(&self, id: Uuid) -> StoreResult<Todo>;

    async fn update(&self, id: Uuid, patch: TodoPatch) -> StoreResult<Todo>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    async fn count(&self, filter: TodoFilter) -> StoreResult<u64>;
}

/// Stand-in for a store that failed to initialize at startup.
///
/// Every operation fails with [`StoreError::Unavailable`], so requests fail
/// one by one while the server itself keeps running.
#[derive(Clone, Debug)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> StoreResult<T> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}

#[async_trait]
impl TodoStore for UnavailableStore {
    async fn insert(&self, _new: NewTodo) -> StoreResult<Todo> {
        self.fail()
    }

    async fn list(&self, _filter: TodoFilter, _sort: Option<Sort>) -> StoreResult<Vec<Todo>> {
        self.fail()
    }

    async fn get(&self, _id: Uuid) -> StoreResult<Todo> {
        self.fail()
    }

    async fn update(&self, _id: Uuid, _patch: TodoPatch) -> StoreResult<Todo> {
        self.fail()
    }

    async fn delete(&self, _id: Uuid) -> StoreResult<()> {
        self.fail()
    }

    async fn count(&self, _filter: TodoFilter) -> StoreResult<u64> {
        self.fail()
    }
}
