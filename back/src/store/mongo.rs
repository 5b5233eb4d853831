use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    options::{ClientOptions, FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, Collection, Database,
};
use recap_api::v1::{NewTodo, Priority, Todo, TodoPatch, DEFAULT_CATEGORY};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Direction, Sort, SortKey, StoreError, StoreResult, TodoFilter, TodoStore};

const COLLECTION_NAME: &str = "todos";

/// Todo as stored in MongoDB: the id lives in `_id`, timestamps are BSON dates.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default = "default_category")]
    category: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

fn default_category() -> String {
    String::from(DEFAULT_CATEGORY)
}

impl From<Todo> for TodoDocument {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id.to_string(),
            title: todo.title,
            description: todo.description,
            completed: todo.completed,
            priority: todo.priority,
            category: todo.category,
            created_at: truncate(todo.created_at),
            updated_at: truncate(todo.updated_at),
        }
    }
}

impl TryFrom<TodoDocument> for Todo {
    type Error = StoreError;

    fn try_from(document: TodoDocument) -> StoreResult<Self> {
        let id = Uuid::parse_str(&document.id).map_err(|err| {
            StoreError::Unavailable(format!("stored todo has malformed id {}: {err}", document.id))
        })?;

        Ok(Todo {
            id,
            title: document.title,
            description: document.description,
            completed: document.completed,
            priority: document.priority,
            category: document.category,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }
}

/// BSON dates carry millisecond precision; round the in-memory value the same way.
fn truncate(time: DateTime<Utc>) -> DateTime<Utc> {
    bson::DateTime::from_chrono(time).to_chrono()
}

fn unavailable(err: mongodb::error::Error) -> StoreError {
    tracing::error!("mongodb error: {}", err);
    StoreError::Unavailable(err.to_string())
}

fn filter_document(filter: TodoFilter) -> Document {
    let mut document = Document::new();
    if let Some(completed) = filter.completed {
        document.insert("completed", completed);
    }
    document
}

fn id_filter(id: Uuid) -> Document {
    doc! { "_id": id.to_string() }
}

fn set_document(patch: TodoPatch) -> Document {
    let mut set = Document::new();
    if let Some(title) = patch.title {
        set.insert("title", title.trim());
    }
    if let Some(description) = patch.description {
        set.insert("description", description);
    }
    if let Some(completed) = patch.completed {
        set.insert("completed", completed);
    }
    if let Some(priority) = patch.priority {
        set.insert("priority", priority.as_str());
    }
    if let Some(category) = patch.category {
        set.insert("category", category);
    }
    set.insert("updatedAt", bson::DateTime::now());
    set
}

#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, mongodb::error::Error> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        Ok(Self {
            database: client.database(database),
        })
    }

    pub async fn ping(&self) -> Result<(), mongodb::error::Error> {
        self.database.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    fn collection(&self) -> Collection<TodoDocument> {
        self.database.collection(COLLECTION_NAME)
    }
}

#[async_trait]
impl TodoStore for MongoStore {
    async fn insert(&self, new: NewTodo) -> StoreResult<Todo> {
        let document = TodoDocument::from(Todo::new(new));
        self.collection()
            .insert_one(&document, None)
            .await
            .map_err(unavailable)?;

        Todo::try_from(document)
    }

    async fn list(&self, filter: TodoFilter, sort: Option<Sort>) -> StoreResult<Vec<Todo>> {
        let options = match sort {
            Some(Sort {
                key: SortKey::CreatedAt,
                direction,
            }) => {
                let order = match direction {
                    Direction::Ascending => 1,
                    Direction::Descending => -1,
                };
                Some(FindOptions::builder().sort(doc! { "createdAt": order }).build())
            }
            _ => None,
        };

        let documents: Vec<TodoDocument> = self
            .collection()
            .find(filter_document(filter), options)
            .await
            .map_err(unavailable)?
            .try_collect()
            .await
            .map_err(unavailable)?;

        let mut todos = documents
            .into_iter()
            .map(Todo::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        // priorities are stored as strings, so their order is applied here
        if let Some(sort @ Sort {
            key: SortKey::Priority,
            ..
        }) = sort
        {
            sort.apply(&mut todos);
        }

        Ok(todos)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Todo> {
        let document = self
            .collection()
            .find_one(id_filter(id), None)
            .await
            .map_err(unavailable)?
            .ok_or(StoreError::NotFound(id))?;

        Todo::try_from(document)
    }

    async fn update(&self, id: Uuid, patch: TodoPatch) -> StoreResult<Todo> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let document = self
            .collection()
            .find_one_and_update(
                id_filter(id),
                doc! { "$set": set_document(patch) },
                options,
            )
            .await
            .map_err(unavailable)?
            .ok_or(StoreError::NotFound(id))?;

        Todo::try_from(document)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = self
            .collection()
            .delete_one(id_filter(id), None)
            .await
            .map_err(unavailable)?;

        if result.deleted_count == 0 {
            return Err(StoreError::NotFound(id));
        }

        Ok(())
    }

    async fn count(&self, filter: TodoFilter) -> StoreResult<u64> {
        self.collection()
            .count_documents(filter_document(filter), None)
            .await
            .map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use testcontainers::{
        core::{IntoContainerPort, WaitFor},
        runners::AsyncRunner,
        GenericImage,
    };

    use super::*;

    #[test]
    fn patch_sets_only_present_fields() {
        let set = set_document(TodoPatch {
            title: Some(String::from("  Trimmed ")),
            priority: Some(Priority::High),
            ..Default::default()
        });

        assert_eq!(set.get_str("title").unwrap(), "Trimmed");
        assert_eq!(set.get_str("priority").unwrap(), "high");
        assert!(set.get("completed").is_none());
        assert!(set.get("updatedAt").is_some());
    }

    #[test]
    fn filter_document_matches_completion() {
        assert!(filter_document(TodoFilter::all()).is_empty());
        assert!(!filter_document(TodoFilter::pending()).get_bool("completed").unwrap());
    }

    #[test]
    fn document_round_trips_to_todo() {
        let todo = Todo::new(NewTodo {
            title: String::from("Buy milk"),
            ..Default::default()
        });
        let back = Todo::try_from(TodoDocument::from(todo.clone())).unwrap();

        assert_eq!(back.id, todo.id);
        assert_eq!(back.created_at, back.updated_at);
        assert_eq!(back.created_at.timestamp_millis(), todo.created_at.timestamp_millis());
    }

    #[test]
    fn sparse_document_gets_defaults() {
        let id = Uuid::new_v4();
        let now = bson::DateTime::now();
        let document: TodoDocument = bson::from_document(doc! {
            "_id": id.to_string(),
            "title": "Old record",
            "createdAt": now,
            "updatedAt": now,
        })
        .unwrap();

        let todo = Todo::try_from(document).unwrap();
        assert_eq!(todo.id, id);
        assert_eq!(todo.description, "");
        assert!(!todo.completed);
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.category, "general");
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn crud_against_mongodb() {
        let container = GenericImage::new("mongo", "6.0.7")
            .with_exposed_port(27017_u16.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
            .start()
            .await
            .unwrap();
        let port = container.get_host_port_ipv4(27017_u16.tcp()).await.unwrap();

        let store = MongoStore::connect(&format!("mongodb://localhost:{port}"), "recap_test")
            .await
            .unwrap();
        store.ping().await.unwrap();

        let todo = store
            .insert(NewTodo {
                title: String::from("Write report"),
                priority: Some(Priority::High),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.get(todo.id).await.unwrap().title, "Write report");

        let updated = store.update(todo.id, TodoPatch::completed(true)).await.unwrap();
        assert!(updated.completed);
        assert_eq!(store.count(TodoFilter::completed()).await.unwrap(), 1);

        store.delete(todo.id).await.unwrap();
        assert!(matches!(store.get(todo.id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(todo.id).await, Err(StoreError::NotFound(_))));
    }
}
