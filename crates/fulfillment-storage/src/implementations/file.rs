//! File-based storage backend implementation for the fulfillment engine.
//!
//! This module provides a file-backed implementation of the
//! StorageInterface trait for simple persistence without external
//! dependencies.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use fulfillment_types::{ConfigSchema, Field, FieldType, Schema, StorageKey, ValidationError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

/// Fixed-size file header for TTL support.
///
/// Binary layout (32 bytes total):
/// - bytes 0-3: magic "FULS"
/// - bytes 4-5: version (u16, little-endian)
/// - bytes 6-13: expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - bytes 14-31: reserved
#[derive(Debug, Clone)]
struct FileHeader {
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"FULS";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	/// Creates a new header with the given TTL.
	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0 // Permanent storage
		} else {
			now_unix_secs().saturating_add(ttl.as_secs())
		};
		Self { expires_at }
	}

	/// Serializes the header to bytes.
	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&Self::VERSION.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	/// Deserializes a header from bytes.
	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}
		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}
		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);
		Ok(Self {
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	/// Checks if the data has expired.
	fn is_expired(&self) -> bool {
		self.expires_at != 0 && now_unix_secs() >= self.expires_at
	}
}

fn now_unix_secs() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}

/// TTL configuration for different storage keys.
#[derive(Debug, Clone)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	/// Creates TTL config from TOML configuration.
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		if let Some(table) = config.as_table() {
			for storage_key in StorageKey::all() {
				let config_key = format!("ttl_{}", storage_key.as_str());
				if let Some(ttl_value) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.map(|v| v as u64)
				{
					ttls.insert(storage_key, Duration::from_secs(ttl_value));
				}
			}
		}

		Self { ttls }
	}

	/// Gets the TTL for a specific storage key.
	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
///
/// Stores each entry as a binary file with a small TTL header. Keys of
/// the form `namespace:id` map to `namespace_id.bin`, which keeps
/// namespace listing a cheap directory scan.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// TTL configuration for different storage keys.
	ttl_config: TtlConfig,
}

impl FileStorage {
	/// Creates a new FileStorage instance with the specified base path and TTL config.
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':'], "_");
		self.base_path.join(format!("{}.bin", safe_key))
	}

	/// Gets the TTL for a given key based on its namespace.
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");
		namespace
			.parse::<StorageKey>()
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	/// Reads a file and strips the header, honoring expiry.
	fn decode(data: Vec<u8>) -> Result<Vec<u8>, StorageError> {
		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Err(StorageError::NotFound);
		}
		Ok(data[FileHeader::SIZE..].to_vec())
	}

	/// Removes all expired files from storage.
	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut entries = fs::read_dir(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			match fs::read(&path).await {
				Ok(data) => {
					if let Ok(header) = FileHeader::deserialize(&data) {
						if header.is_expired() {
							if let Err(e) = fs::remove_file(&path).await {
								tracing::warn!("Failed to remove expired file {:?}: {}", path, e);
							} else {
								removed += 1;
							}
						}
					}
				},
				Err(e) => {
					tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
				},
			}
		}
		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		Self::decode(data)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		// Use provided TTL, or fall back to the namespace default.
		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));

		let header = FileHeader::new(ttl);
		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header.serialize());
		file_data.extend_from_slice(&value);

		// Write atomically by writing to temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		match self.get_bytes(key).await {
			Ok(_) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn list_bytes(&self, namespace: &str) -> Result<Vec<Vec<u8>>, StorageError> {
		let prefix = format!("{}_", namespace);
		let mut values = Vec::new();

		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(values),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			let name = entry.file_name();
			let name = name.to_string_lossy();
			if !name.starts_with(&prefix) || !name.ends_with(".bin") {
				continue;
			}
			let data = fs::read(&path)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
			match Self::decode(data) {
				Ok(bytes) => values.push(bytes),
				Err(StorageError::NotFound) => {}, // expired
				Err(e) => return Err(e),
			}
		}

		Ok(values)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];

		// TTL fields per storage namespace
		for storage_key in StorageKey::all() {
			optional_fields.push(Field::new(
				format!("ttl_{}", storage_key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `ttl_<namespace>`: TTL in seconds for a namespace (default: 0 = permanent)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	let ttl_config = TtlConfig::from_config(config);

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		ttl_config,
	)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	fn storage_in(dir: &tempfile::TempDir) -> FileStorage {
		FileStorage::new(
			dir.path().to_path_buf(),
			TtlConfig {
				ttls: HashMap::new(),
			},
		)
	}

	#[tokio::test]
	async fn test_round_trip_and_delete() {
		let dir = tempdir().unwrap();
		let storage = storage_in(&dir);

		storage
			.set_bytes("orders:abc", b"payload".to_vec(), None)
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("orders:abc").await.unwrap(), b"payload");
		assert!(storage.exists("orders:abc").await.unwrap());

		storage.delete("orders:abc").await.unwrap();
		assert!(!storage.exists("orders:abc").await.unwrap());
	}

	#[tokio::test]
	async fn test_list_bytes_scans_namespace() {
		let dir = tempdir().unwrap();
		let storage = storage_in(&dir);

		storage
			.set_bytes("orders:1", b"a".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("orders:2", b"b".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("gateway_events:1", b"c".to_vec(), None)
			.await
			.unwrap();

		let mut listed = storage.list_bytes("orders").await.unwrap();
		listed.sort();
		assert_eq!(listed, vec![b"a".to_vec(), b"b".to_vec()]);
	}

	#[tokio::test]
	async fn test_expired_entries_are_hidden_and_cleaned() {
		let dir = tempdir().unwrap();
		let storage = storage_in(&dir);

		storage
			.set_bytes(
				"idempotency:x",
				b"v".to_vec(),
				Some(Duration::from_nanos(1)),
			)
			.await
			.unwrap();
		tokio::time::sleep(Duration::from_millis(1100)).await;

		assert!(matches!(
			storage.get_bytes("idempotency:x").await,
			Err(StorageError::NotFound)
		));
		assert!(storage.list_bytes("idempotency").await.unwrap().is_empty());

		let removed = storage.cleanup_expired().await.unwrap();
		assert_eq!(removed, 1);
	}
}
