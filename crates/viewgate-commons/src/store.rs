//! Document-store collaborator interface.
//!
//! The store holding view/query/user/project metadata is an external system.
//! The gateway consumes it through this narrow trait and never caches its
//! results; one lookup per execution.

use crate::errors::Result;
use crate::models::StoredQuery;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Read-only access to stored view definitions.
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Fetch one stored query by id. `Ok(None)` when the id is unknown.
    async fn get_stored_query(&self, id: &str) -> Result<Option<StoredQuery>>;

    /// List stored queries, optionally filtered by owner and/or catalog.
    async fn list_by_filter(
        &self,
        user_id: Option<&str>,
        catalog_id: Option<&str>,
    ) -> Result<Vec<StoredQuery>>;
}

/// In-memory [`ViewStore`] used by tests and by deployments that load view
/// definitions from a file at startup.
#[derive(Default)]
pub struct InMemoryViewStore {
    views: RwLock<HashMap<String, StoredQuery>>,
}

impl InMemoryViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a view definition.
    pub fn register(&self, query: StoredQuery) {
        let mut views = self.views.write().unwrap_or_else(|e| e.into_inner());
        views.insert(query.id.clone(), query);
    }

    pub fn len(&self) -> usize {
        self.views.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ViewStore for InMemoryViewStore {
    async fn get_stored_query(&self, id: &str) -> Result<Option<StoredQuery>> {
        let views = self.views.read().unwrap_or_else(|e| e.into_inner());
        Ok(views.get(id).cloned())
    }

    async fn list_by_filter(
        &self,
        user_id: Option<&str>,
        catalog_id: Option<&str>,
    ) -> Result<Vec<StoredQuery>> {
        let views = self.views.read().unwrap_or_else(|e| e.into_inner());
        let mut matches: Vec<StoredQuery> = views
            .values()
            .filter(|v| match user_id {
                Some(uid) => v.owner_id.as_deref() == Some(uid),
                None => true,
            })
            .filter(|v| match catalog_id {
                Some(cid) => v.catalog_id.as_deref() == Some(cid),
                None => true,
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: &str, owner: Option<&str>, catalog: Option<&str>) -> StoredQuery {
        StoredQuery {
            id: id.to_string(),
            name: id.to_string(),
            sql: "SELECT 1".to_string(),
            fields: vec![],
            parameters: vec![],
            active: true,
            owner_id: owner.map(str::to_string),
            catalog_id: catalog.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_get_stored_query() {
        let store = InMemoryViewStore::new();
        store.register(view("v1", None, None));

        assert!(store.get_stored_query("v1").await.unwrap().is_some());
        assert!(store.get_stored_query("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_filter() {
        let store = InMemoryViewStore::new();
        store.register(view("v1", Some("alice"), Some("sales")));
        store.register(view("v2", Some("alice"), Some("ops")));
        store.register(view("v3", Some("bob"), Some("sales")));

        let all = store.list_by_filter(None, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let alice = store.list_by_filter(Some("alice"), None).await.unwrap();
        assert_eq!(alice.len(), 2);

        let alice_sales = store
            .list_by_filter(Some("alice"), Some("sales"))
            .await
            .unwrap();
        assert_eq!(alice_sales.len(), 1);
        assert_eq!(alice_sales[0].id, "v1");
    }
}
