//! In-memory storage backend implementation for the fulfillment engine.
//!
//! This module provides a memory-based implementation of the
//! StorageInterface trait, useful for testing and development scenarios
//! where persistence is not required.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// This implementation stores data in a HashMap in memory, providing
/// fast access but no persistence across restarts. Entries with a TTL
/// expire lazily on read and eagerly during cleanup sweeps.
pub struct MemoryStorage {
	/// The in-memory store protected by a read-write lock.
	store: Arc<RwLock<HashMap<String, StoredValue>>>,
}

struct StoredValue {
	bytes: Vec<u8>,
	expires_at: Option<Instant>,
}

impl StoredValue {
	fn is_expired(&self) -> bool {
		self.expires_at.is_some_and(|deadline| Instant::now() >= deadline)
	}
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		match store.get(key) {
			Some(value) if !value.is_expired() => Ok(value.bytes.clone()),
			_ => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.insert(
			key.to_string(),
			StoredValue {
				bytes: value,
				expires_at: ttl.map(|d| Instant::now() + d),
			},
		);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store.get(key).is_some_and(|value| !value.is_expired()))
	}

	async fn list_bytes(&self, namespace: &str) -> Result<Vec<Vec<u8>>, StorageError> {
		let prefix = format!("{}:", namespace);
		let store = self.store.read().await;
		Ok(store
			.iter()
			.filter(|(key, value)| key.starts_with(&prefix) && !value.is_expired())
			.map(|(_, value)| value.bytes.clone())
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut store = self.store.write().await;
		let before = store.len();
		store.retain(|_, value| !value.is_expired());
		Ok(before - store.len())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "orders:test";
		let value = b"test_value".to_vec();
		storage.set_bytes(key, value.clone(), None).await.unwrap();

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, value);

		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());

		let result = storage.get_bytes(key).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_list_bytes_filters_by_namespace() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("orders:1", b"a".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("orders:2", b"b".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("idempotency:1", b"c".to_vec(), None)
			.await
			.unwrap();

		let mut listed = storage.list_bytes("orders").await.unwrap();
		listed.sort();
		assert_eq!(listed, vec![b"a".to_vec(), b"b".to_vec()]);
	}

	#[tokio::test]
	async fn test_ttl_expiry() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("idempotency:x", b"v".to_vec(), Some(Duration::ZERO))
			.await
			.unwrap();

		assert!(!storage.exists("idempotency:x").await.unwrap());
		assert!(matches!(
			storage.get_bytes("idempotency:x").await,
			Err(StorageError::NotFound)
		));

		let removed = storage.cleanup_expired().await.unwrap();
		assert_eq!(removed, 1);
	}
}
