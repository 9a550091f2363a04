use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Cart,
    TotalItems,
    TotalPrice,
    Zcoins,
}

impl QueryKey {
    /// Reads that go stale when a cart line changes.
    pub const CART_CHANGED: [QueryKey; 3] = [QueryKey::Cart, QueryKey::TotalItems, QueryKey::TotalPrice];
    /// Reads that go stale once an order is placed.
    pub const ORDER_PLACED: [QueryKey; 4] = [
        QueryKey::Cart,
        QueryKey::TotalItems,
        QueryKey::TotalPrice,
        QueryKey::Zcoins,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKey::Cart => "cart",
            QueryKey::TotalItems => "totalItems",
            QueryKey::TotalPrice => "totalPrice",
            QueryKey::Zcoins => "zcoins",
        }
    }
}

#[derive(Default)]
struct Entries {
    values: HashMap<QueryKey, Value>,
    invalidations: HashMap<QueryKey, u64>,
}

/// Client side cache of server reads, keyed the way the screens query them.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<Entries>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: QueryKey) -> Option<T> {
        let entries = self.entries.lock().await;
        entries
            .values
            .get(&key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub async fn set<T: Serialize>(&self, key: QueryKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries.lock().await.values.insert(key, value);
            }
            Err(err) => tracing::warn!("Not caching {}: {}", key.as_str(), err),
        }
    }

    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let fresh = fetch().await?;
        self.set(key, &fresh).await;
        Ok(fresh)
    }

    pub async fn invalidate(&self, keys: &[QueryKey]) {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.values.remove(key);
            *entries.invalidations.entry(*key).or_default() += 1;
        }
        tracing::debug!(
            "Invalidated queries: {}",
            keys.iter().map(|key| key.as_str()).collect::<Vec<_>>().join(", ")
        );
    }

    /// How many times `key` has been invalidated since the cache was created.
    pub async fn invalidations(&self, key: QueryKey) -> u64 {
        self.entries
            .lock()
            .await
            .invalidations
            .get(&key)
            .copied()
            .unwrap_or_default()
    }
}
