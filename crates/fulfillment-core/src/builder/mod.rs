//! Builder pattern for constructing fulfillment engines.
//!
//! Provides a flexible way to compose a FulfillmentEngine from pluggable
//! storage and gateway implementations using factory functions keyed by
//! the implementation names in the configuration.

use crate::engine::{event_bus::EventBus, FulfillmentEngine};
use fulfillment_config::Config;
use fulfillment_gateway::{GatewayError, GatewayInterface, GatewayService};
use fulfillment_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during engine construction.
///
/// These errors indicate problems with configuration or missing required
/// components when building an engine instance.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for all factory functions needed to build a FulfillmentEngine.
///
/// Each factory function takes a TOML configuration value and returns the
/// corresponding service implementation.
pub struct FulfillmentFactories<SF, GF> {
	pub storage_factories: HashMap<String, SF>,
	pub gateway_factories: HashMap<String, GF>,
}

/// Builder for constructing a FulfillmentEngine with pluggable implementations.
pub struct FulfillmentBuilder {
	config: Config,
}

impl FulfillmentBuilder {
	/// Creates a new FulfillmentBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the FulfillmentEngine using factories for each component type.
	pub fn build<SF, GF>(
		self,
		factories: FulfillmentFactories<SF, GF>,
	) -> Result<FulfillmentEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		GF: Fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>,
	{
		// Create storage implementations
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = factories.storage_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						// Validate the section against the implementation's schema
						if let Err(e) = implementation.config_schema().validate(config) {
							tracing::error!(
								component = "storage",
								implementation = %name,
								error = %e,
								"Invalid configuration for storage implementation"
							);
							return Err(BuilderError::Config(format!(
								"Invalid configuration for storage implementation '{}': {}",
								name, e
							)));
						}
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid storage implementations available".into(),
			));
		}

		// Get the primary storage implementation
		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;

		let storage = Arc::new(StorageService::new(storage_backend));

		// Create gateway implementations
		let mut gateway_impls = HashMap::new();
		for (name, config) in &self.config.gateway.implementations {
			if let Some(factory) = factories.gateway_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						if let Err(e) = implementation.config_schema().validate(config) {
							tracing::error!(
								component = "gateway",
								implementation = %name,
								error = %e,
								"Invalid configuration for gateway implementation"
							);
							return Err(BuilderError::Config(format!(
								"Invalid configuration for gateway implementation '{}': {}",
								name, e
							)));
						}
						gateway_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.gateway.primary == name;
						tracing::info!(component = "gateway", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "gateway",
							implementation = %name,
							error = %e,
							"Failed to create gateway implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create gateway implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		if gateway_impls.is_empty() {
			return Err(BuilderError::Config(
				"No valid gateway implementations available".into(),
			));
		}

		let primary_gateway = &self.config.gateway.primary;
		let gateway_backend = gateway_impls.remove(primary_gateway).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary gateway '{}' failed to load or has invalid configuration",
				primary_gateway
			))
		})?;

		let gateway = Arc::new(GatewayService::new(
			gateway_backend,
			Duration::from_secs(self.config.engine.gateway_timeout_seconds),
		));

		Ok(FulfillmentEngine::new(
			self.config,
			storage,
			gateway,
			EventBus::new(1000),
		))
	}
}
