//! In-memory document store
//!
//! DashMap-backed implementation for tests and embedding. `update_if` runs
//! under the entry's write guard, so concurrent transitions on the same
//! document serialize and exactly one caller wins.

use std::cmp::Ordering;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::store::{DocumentStore, Filter, FilterOp, Order, StoreError};

/// In-memory storage implementation
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: DashMap<String, DashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

/// Partial order over JSON scalars; non-comparable pairs yield `None`
fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches(doc: &Value, filter: &Filter) -> bool {
    let Some(field) = doc.get(&filter.field) else {
        return false;
    };
    if filter.op == FilterOp::Eq {
        return field == &filter.value;
    }
    let Some(ord) = cmp_values(field, &filter.value) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => unreachable!(),
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Gte => ord != Ordering::Less,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Lte => ord != Ordering::Greater,
    }
}

/// Overwrite the document's top-level fields with the patch's
fn merge(doc: &mut Value, patch: &Value) -> Result<(), String> {
    let Some(patch) = patch.as_object() else {
        return Err("patch must be an object".to_string());
    };
    let Some(doc) = doc.as_object_mut() else {
        return Err("document is not an object".to_string());
    };
    for (key, value) in patch {
        doc.insert(key.clone(), value.clone());
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, collection: &str, mut doc: Value) -> Result<String, StoreError> {
        if !doc.is_object() {
            return Err(StoreError::Malformed {
                collection: collection.to_string(),
                reason: "document must be a JSON object".to_string(),
            });
        }

        let id = match doc.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                doc["id"] = Value::String(id.clone());
                id
            }
        };

        let col = self.collections.entry(collection.to_string()).or_default();
        if col.contains_key(&id) {
            return Err(StoreError::Backend(format!(
                "duplicate id in {collection}: {id}"
            )));
        }
        col.insert(id.clone(), doc);
        Ok(id)
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|col| col.get(id).map(|doc| doc.clone())))
    }

    async fn get_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>, StoreError> {
        let Some(col) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(col
            .iter()
            .filter(|doc| doc.get(field) == Some(value))
            .map(|doc| doc.clone())
            .collect())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let col = self.collections.entry(collection.to_string()).or_default();
        let Some(mut doc) = col.get_mut(id) else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        merge(&mut doc, &patch).map_err(|reason| StoreError::Malformed {
            collection: collection.to_string(),
            reason,
        })
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard_field: &str,
        expected: &Value,
        patch: Value,
    ) -> Result<bool, StoreError> {
        let col = self.collections.entry(collection.to_string()).or_default();
        // get_mut holds the entry's write guard for the whole check-and-merge
        let Some(mut doc) = col.get_mut(id) else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };
        if doc.get(guard_field) != Some(expected) {
            return Ok(false);
        }
        merge(&mut doc, &patch).map_err(|reason| StoreError::Malformed {
            collection: collection.to_string(),
            reason,
        })?;
        Ok(true)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let removed = self
            .collections
            .get(collection)
            .and_then(|col| col.remove(id));
        if removed.is_none() {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&Order>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError> {
        let Some(col) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut out: Vec<Value> = col
            .iter()
            .filter(|doc| filters.iter().all(|f| matches(doc, f)))
            .map(|doc| doc.clone())
            .collect();

        if let Some(order) = order {
            out.sort_by(|a, b| {
                let ord = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => cmp_values(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryStore::new();
        let id = store
            .insert("users", json!({"wallet_address": "GAXB", "credit_score": 650}))
            .await
            .unwrap();

        let doc = store.get_by_id("users", &id).await.unwrap().unwrap();
        assert_eq!(doc["wallet_address"], "GAXB");
        // The generated id is written back into the document
        assert_eq!(doc["id"], Value::String(id));
    }

    #[tokio::test]
    async fn test_insert_honors_existing_id() {
        let store = InMemoryStore::new();
        let id = store
            .insert("users", json!({"id": "fixed", "name": "Alice"}))
            .await
            .unwrap();
        assert_eq!(id, "fixed");

        let err = store
            .insert("users", json!({"id": "fixed", "name": "Bob"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = InMemoryStore::new();
        let id = store
            .insert("users", json!({"name": "Alice", "score": 500}))
            .await
            .unwrap();

        store
            .update("users", &id, json!({"score": 650}))
            .await
            .unwrap();

        let doc = store.get_by_id("users", &id).await.unwrap().unwrap();
        assert_eq!(doc["name"], "Alice");
        assert_eq!(doc["score"], 650);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = InMemoryStore::new();
        let err = store
            .update("users", "nope", json!({"score": 650}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_if_swaps_once() {
        let store = InMemoryStore::new();
        let id = store
            .insert("loan_requests", json!({"status": "pending"}))
            .await
            .unwrap();

        let won = store
            .update_if(
                "loan_requests",
                &id,
                "status",
                &json!("pending"),
                json!({"status": "funded"}),
            )
            .await
            .unwrap();
        assert!(won);

        // Second attempt observes the new state and loses
        let won = store
            .update_if(
                "loan_requests",
                &id,
                "status",
                &json!("pending"),
                json!({"status": "funded"}),
            )
            .await
            .unwrap();
        assert!(!won);
    }

    #[tokio::test]
    async fn test_get_by_field() {
        let store = InMemoryStore::new();
        store
            .insert("users", json!({"wallet_address": "GAXB", "name": "Alice"}))
            .await
            .unwrap();
        store
            .insert("users", json!({"wallet_address": "GCXD", "name": "Bob"}))
            .await
            .unwrap();

        let found = store
            .get_by_field("users", "wallet_address", &json!("GAXB"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], "Alice");
    }

    #[tokio::test]
    async fn test_query_filter_order_limit() {
        let store = InMemoryStore::new();
        for (name, score, status) in [
            ("a", 500, "open"),
            ("b", 700, "open"),
            ("c", 600, "open"),
            ("d", 800, "closed"),
        ] {
            store
                .insert("users", json!({"name": name, "score": score, "status": status}))
                .await
                .unwrap();
        }

        let out = store
            .query(
                "users",
                &[Filter::eq("status", json!("open"))],
                Some(&Order::desc("score")),
                Some(2),
            )
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["name"], "b");
        assert_eq!(out[1]["name"], "c");
    }

    #[tokio::test]
    async fn test_query_range_filter() {
        let store = InMemoryStore::new();
        for score in [450, 550, 650, 750] {
            store
                .insert("users", json!({"score": score}))
                .await
                .unwrap();
        }

        let out = store
            .query("users", &[Filter::gte("score", json!(600))], None, None)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();
        let id = store.insert("users", json!({"name": "Alice"})).await.unwrap();

        store.delete("users", &id).await.unwrap();
        assert!(store.get_by_id("users", &id).await.unwrap().is_none());

        let err = store.delete("users", &id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
