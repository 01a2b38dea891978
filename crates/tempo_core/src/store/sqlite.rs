//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist JSON documents in the `documents` table.
//! - Translate `Query` filters into `json_extract` predicates.
//! - Fan out collection snapshots to live subscribers after each write.
//!
//! # Invariants
//! - Listeners run after commit and outside the connection lock, so they may
//!   call back into the store.
//! - Field names in queries are restricted to `[A-Za-z0-9_]`.

use super::{
    Collection, DocPath, Document, DocumentStore, FieldFilter, Listener, Query, SetMode,
    StoreError, StoreResult, StoredDocument, Subscription,
};
use log::{debug, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

struct ListenerEntry {
    user_id: String,
    collection: Collection,
    callback: Listener,
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: BTreeMap<u64, ListenerEntry>,
}

/// Document store over one migrated SQLite connection.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    listeners: Arc<Mutex<ListenerRegistry>>,
}

impl SqliteDocumentStore {
    /// Wraps a connection returned by `db::open_db*`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
        }
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        lock_registry(&self.listeners).entries.len()
    }

    fn lock_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn list_collection(
        &self,
        user_id: &str,
        collection: Collection,
    ) -> StoreResult<Vec<StoredDocument>> {
        self.query(user_id, collection, &Query::new())
    }

    fn notify(&self, user_id: &str, collection: Collection) {
        let callbacks: Vec<Listener> = lock_registry(&self.listeners)
            .entries
            .values()
            .filter(|entry| entry.user_id == user_id && entry.collection == collection)
            .map(|entry| Arc::clone(&entry.callback))
            .collect();
        if callbacks.is_empty() {
            return;
        }

        match self.list_collection(user_id, collection) {
            Ok(documents) => {
                for callback in callbacks {
                    callback(&documents);
                }
            }
            Err(err) => warn!(
                "event=store_notify module=store status=error collection={} error={err}",
                collection.as_str()
            ),
        }
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        let conn = self.lock_conn()?;
        read_body(&conn, path)
    }

    fn set(&self, path: &DocPath, data: Document, mode: SetMode) -> StoreResult<()> {
        {
            let mut conn = self.lock_conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let body = match (mode, read_body(&tx, path)?) {
                (SetMode::Merge, Some(mut existing)) => {
                    merge_into(&mut existing, data);
                    existing
                }
                _ => data,
            };
            write_body(&tx, path, &body)?;
            tx.commit()?;
        }
        self.notify(&path.user_id, path.collection);
        Ok(())
    }

    fn update(&self, path: &DocPath, fields: Document) -> StoreResult<()> {
        let mut fields = Some(fields);
        self.update_with(path, &mut |document: &mut Document| {
            if let Some(fields) = fields.take() {
                merge_into(document, fields);
            }
        })
        .map(|_| ())
    }

    fn update_with(
        &self,
        path: &DocPath,
        apply: &mut dyn FnMut(&mut Document),
    ) -> StoreResult<Document> {
        let written = {
            let mut conn = self.lock_conn()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(mut document) = read_body(&tx, path)? else {
                return Err(StoreError::NotFound(path.to_string()));
            };
            apply(&mut document);
            write_body(&tx, path, &document)?;
            tx.commit()?;
            document
        };
        self.notify(&path.user_id, path.collection);
        Ok(written)
    }

    fn delete(&self, path: &DocPath) -> StoreResult<()> {
        let changed = {
            let conn = self.lock_conn()?;
            conn.execute(
                "DELETE FROM documents
                 WHERE user_id = ?1 AND collection = ?2 AND doc_id = ?3;",
                params![path.user_id, path.collection.as_str(), path.doc_id],
            )?
        };
        if changed > 0 {
            self.notify(&path.user_id, path.collection);
        } else {
            debug!("event=store_delete module=store status=noop path={path}");
        }
        Ok(())
    }

    fn query(
        &self,
        user_id: &str,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Vec<StoredDocument>> {
        let mut sql = String::from(
            "SELECT doc_id, body
             FROM documents
             WHERE user_id = ? AND collection = ?",
        );
        let mut bind_values = vec![
            SqlValue::Text(user_id.to_string()),
            SqlValue::Text(collection.as_str().to_string()),
        ];

        for filter in &query.filters {
            match filter {
                FieldFilter::Equals {
                    field,
                    value: Value::Null,
                } => {
                    sql.push_str(" AND json_extract(body, ?) IS NULL");
                    bind_values.push(SqlValue::Text(json_path(field)?));
                }
                FieldFilter::Equals { field, value } => {
                    sql.push_str(" AND json_extract(body, ?) = ?");
                    bind_values.push(SqlValue::Text(json_path(field)?));
                    bind_values.push(to_sql_value(value)?);
                }
                FieldFilter::Between { field, start, end } => {
                    sql.push_str(" AND json_extract(body, ?) BETWEEN ? AND ?");
                    bind_values.push(SqlValue::Text(json_path(field)?));
                    bind_values.push(to_sql_value(start)?);
                    bind_values.push(to_sql_value(end)?);
                }
            }
        }

        match &query.order_by {
            Some(order) => {
                let direction = if order.descending { "DESC" } else { "ASC" };
                sql.push_str(&format!(
                    " ORDER BY json_extract(body, ?) {direction}, doc_id ASC"
                ));
                bind_values.push(SqlValue::Text(json_path(&order.field)?));
            }
            None => sql.push_str(" ORDER BY doc_id ASC"),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(SqlValue::Integer(i64::from(limit)));
        }

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            documents.push(StoredDocument {
                id,
                data: parse_body(&body)?,
            });
        }
        Ok(documents)
    }

    fn subscribe(
        &self,
        user_id: &str,
        collection: Collection,
        listener: Listener,
    ) -> StoreResult<Subscription> {
        let initial = self.list_collection(user_id, collection)?;

        let listener_id = {
            let mut registry = lock_registry(&self.listeners);
            registry.next_id += 1;
            let listener_id = registry.next_id;
            registry.entries.insert(
                listener_id,
                ListenerEntry {
                    user_id: user_id.to_string(),
                    collection,
                    callback: Arc::clone(&listener),
                },
            );
            listener_id
        };
        debug!(
            "event=store_subscribe module=store status=ok collection={} listener_id={listener_id}",
            collection.as_str()
        );

        listener(&initial);

        let registry: Weak<Mutex<ListenerRegistry>> = Arc::downgrade(&self.listeners);
        Ok(Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                lock_registry(&registry).entries.remove(&listener_id);
                debug!("event=store_unsubscribe module=store status=ok listener_id={listener_id}");
            }
        }))
    }
}

fn lock_registry(registry: &Mutex<ListenerRegistry>) -> MutexGuard<'_, ListenerRegistry> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read_body(conn: &Connection, path: &DocPath) -> StoreResult<Option<Document>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents
             WHERE user_id = ?1 AND collection = ?2 AND doc_id = ?3;",
            params![path.user_id, path.collection.as_str(), path.doc_id],
            |row| row.get(0),
        )
        .optional()?;
    body.as_deref().map(parse_body).transpose()
}

fn write_body(conn: &Connection, path: &DocPath, body: &Document) -> StoreResult<()> {
    let encoded = serde_json::to_string(body)?;
    conn.execute(
        "INSERT INTO documents (user_id, collection, doc_id, body)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id, collection, doc_id) DO UPDATE SET
            body = excluded.body,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![
            path.user_id,
            path.collection.as_str(),
            path.doc_id,
            encoded
        ],
    )?;
    Ok(())
}

fn parse_body(body: &str) -> StoreResult<Document> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidQuery(format!(
            "stored document is not an object: {other}"
        ))),
    }
}

fn merge_into(target: &mut Document, fields: Document) {
    for (key, value) in fields {
        target.insert(key, value);
    }
}

fn json_path(field: &str) -> StoreResult<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::InvalidQuery(format!(
            "unsupported field name `{field}`"
        )));
    }
    Ok(format!("$.{field}"))
}

fn to_sql_value(value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(SqlValue::Integer(integer))
            } else if let Some(real) = number.as_f64() {
                Ok(SqlValue::Real(real))
            } else {
                Err(StoreError::InvalidQuery(format!(
                    "unsupported number `{number}`"
                )))
            }
        }
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        other => Err(StoreError::InvalidQuery(format!(
            "unsupported filter value `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{json_path, to_sql_value};
    use serde_json::json;

    #[test]
    fn json_path_rejects_injection() {
        assert_eq!(json_path("startTime").unwrap(), "$.startTime");
        assert!(json_path("a') OR 1=1 --").is_err());
        assert!(json_path("").is_err());
    }

    #[test]
    fn filter_values_reject_nested_json() {
        assert!(to_sql_value(&json!(true)).is_ok());
        assert!(to_sql_value(&json!([1, 2])).is_err());
        assert!(to_sql_value(&json!({"a": 1})).is_err());
    }
}
