//! Per-user document store contract.
//!
//! # Responsibility
//! - Define CRUD, query and live-subscription primitives over schema-loose
//!   JSON documents grouped into per-user collections.
//! - Keep repository code independent of the concrete backend.
//!
//! # Invariants
//! - Documents are addressed by `(user_id, collection, doc_id)`.
//! - Writes are last-write-wins per document; there are no cross-document
//!   transactions.
//! - Subscribers receive the full collection after every committed write and
//!   stop receiving updates once their `Subscription` is dropped.

use crate::db::DbError;
use crate::model::new_id;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod sqlite;

pub use sqlite::SqliteDocumentStore;

/// Loosely typed document body.
pub type Document = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Callback receiving the complete collection after a change.
pub type Listener = Arc<dyn Fn(&[StoredDocument]) + Send + Sync>;

/// Document groups known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Tasks,
    Sessions,
    /// Holds exactly one document per user.
    Profile,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Sessions => "sessions",
            Self::Profile => "profile",
        }
    }
}

/// Fully qualified document address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPath {
    pub user_id: String,
    pub collection: Collection,
    pub doc_id: String,
}

impl DocPath {
    pub fn new(user_id: &str, collection: Collection, doc_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            collection,
            doc_id: doc_id.to_string(),
        }
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "users/{}/{}/{}",
            self.user_id,
            self.collection.as_str(),
            self.doc_id
        )
    }
}

/// One document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

/// How `set` treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Replace,
    /// Overwrites only the top-level keys present in the new data.
    Merge,
}

/// Single-field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Equals { field: String, value: Value },
    /// Inclusive on both bounds.
    Between {
        field: String,
        start: Value,
        end: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Collection query. Results default to ascending document id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter::Equals {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn where_between(
        mut self,
        field: &str,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        self.filters.push(FieldFilter::Between {
            field: field.to_string(),
            start: start.into(),
            end: end.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Handle for a live collection subscription.
///
/// Dropping the handle cancels the subscription.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Store-level failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    NotFound(String),
    InvalidQuery(String),
    LockPoisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "document serialization failed: {err}"),
            Self::NotFound(path) => write!(f, "document not found: {path}"),
            Self::InvalidQuery(message) => write!(f, "invalid query: {message}"),
            Self::LockPoisoned => write!(f, "document store lock poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Contract for a per-user document database.
pub trait DocumentStore: Send + Sync {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>>;

    fn set(&self, path: &DocPath, data: Document, mode: SetMode) -> StoreResult<()>;

    /// Merges `fields` into an existing document.
    ///
    /// Fails with `StoreError::NotFound` when the document does not exist.
    fn update(&self, path: &DocPath, fields: Document) -> StoreResult<()>;

    /// Atomic read-modify-write of one existing document.
    ///
    /// Returns the document as written.
    fn update_with(
        &self,
        path: &DocPath,
        apply: &mut dyn FnMut(&mut Document),
    ) -> StoreResult<Document>;

    /// Stores `data` under a generated id and returns the id.
    fn add(&self, user_id: &str, collection: Collection, data: Document) -> StoreResult<String> {
        let doc_id = new_id();
        self.set(
            &DocPath::new(user_id, collection, &doc_id),
            data,
            SetMode::Replace,
        )?;
        Ok(doc_id)
    }

    /// Deletes a document. Deleting a missing document is not an error.
    fn delete(&self, path: &DocPath) -> StoreResult<()>;

    fn query(
        &self,
        user_id: &str,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Vec<StoredDocument>>;

    /// Delivers the current collection immediately, then after each change.
    fn subscribe(
        &self,
        user_id: &str,
        collection: Collection,
        listener: Listener,
    ) -> StoreResult<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::{Collection, DocPath, Subscription};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscription_cancels_once_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(subscription);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(Subscription::detached());
    }

    #[test]
    fn doc_path_renders_user_scoped_address() {
        let path = DocPath::new("u1", Collection::Sessions, "s9");
        assert_eq!(path.to_string(), "users/u1/sessions/s9");
    }
}
