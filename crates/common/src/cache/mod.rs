//! Redis cache integration
//!
//! Provides:
//! - Generic JSON get/set operations with TTL
//! - Loader-style caching of EAD trees and record lookups

use crate::config::RedisConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Key prefix for namespacing
pub const KEY_PREFIX: &str = "viewer";

/// Redis cache client
pub struct Cache {
    connection: RwLock<MultiplexedConnection>,
    default_ttl_secs: u64,
}

impl Cache {
    /// Create a new cache client
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            default_ttl_secs: config.default_ttl_secs,
        })
    }

    fn key(key: &str) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = Self::key(key);
        let mut conn = self.connection.write().await;

        let value: Option<String> = conn.get(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to get key '{}': {}", full_key, e),
        })?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value: {}", e),
                })?;
                debug!(key = %full_key, "Cache hit");
                Ok(Some(parsed))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Set a value in cache with default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl_secs).await
    }

    /// Set a value in cache with custom TTL
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let full_key = Self::key(key);
        let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;

        let mut conn = self.connection.write().await;
        conn.set_ex::<_, _, ()>(&full_key, &json, ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = Self::key(key);
        let mut conn = self.connection.write().await;

        let deleted: i32 = conn.del(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to delete key '{}': {}", full_key, e),
        })?;

        debug!(key = %full_key, deleted = deleted > 0, "Cache delete");
        Ok(deleted > 0)
    }

    /// Get or set with a loader function; cache failures never fail the load
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl_secs: u64, cache_name: &str, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match self.get::<T>(key).await {
            Ok(Some(cached)) => {
                metrics::record_cache(true, cache_name);
                return Ok(cached);
            }
            Ok(None) => metrics::record_cache(false, cache_name),
            Err(e) => warn!(error = %e, "Cache read failed, loading from source"),
        }

        let value = loader().await?;

        if let Err(e) = self.set_with_ttl(key, &value, ttl_secs).await {
            warn!(error = %e, "Failed to cache value, continuing without cache");
        }

        Ok(value)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Cache key builder helpers
pub mod keys {
    /// Parsed EAD tree of a file in a BaseX database
    pub fn ead_tree(database: &str, file: &str) -> String {
        format!("ead:{}:{}", database, file)
    }

    /// Record document looked up by PI
    pub fn record(pi: &str) -> String {
        format!("record:{}", pi)
    }

    pub fn ead_databases() -> String {
        "ead:databases".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        assert_eq!(keys::ead_tree("archive", "estate.xml"), "ead:archive:estate.xml");
        assert_eq!(keys::record("PPN1"), "record:PPN1");
        assert_eq!(Cache::key(&keys::record("PPN1")), "viewer:record:PPN1");
    }
}
