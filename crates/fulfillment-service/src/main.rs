//! Main entry point for the fulfillment service.
//!
//! This binary runs the complete order fulfillment and payment settlement
//! engine: the background sweeps (stage advancer, reconciliation, storage
//! cleanup) and the HTTP API exposing the operator command and query
//! surface. Storage and gateway backends are pluggable implementations
//! selected by configuration.

use clap::Parser;
use fulfillment_config::Config;
use fulfillment_core::{FulfillmentBuilder, FulfillmentEngine, FulfillmentFactories};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

// Import implementations from individual crates
use fulfillment_gateway::implementations::mock::create_gateway as create_mock_gateway;
use fulfillment_storage::implementations::file::create_storage as create_file_storage;
use fulfillment_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the fulfillment service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the fulfillment service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the engine with all implementations
/// 5. Runs the engine until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	// Create env filter with default from args
	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started fulfillment service");

	// Load configuration
	let config = Config::from_file(args.config.to_str().unwrap_or("config.toml"))?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	// Build engine with implementations
	let engine = build_engine(config.clone())?;
	let engine = Arc::new(engine);

	// Check if API server should be started
	let api_config = config.api.clone().filter(|api| api.enabled);

	if let Some(api_config) = api_config {
		let api_engine = Arc::clone(&engine);

		// Start both the engine and the API server concurrently
		let engine_task = engine.run();
		let api_task = server::start_server(api_config, api_engine);

		// Run both tasks concurrently
		tokio::select! {
			result = engine_task => {
				tracing::info!("Engine finished");
				result?;
			}
			result = api_task => {
				tracing::info!("API server finished");
				result?;
			}
		}
	} else {
		// Run only the engine
		tracing::info!("Starting engine only");
		engine.run().await?;
	}

	tracing::info!("Stopped fulfillment service");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the fulfillment engine with all necessary implementations.
///
/// This function wires up the concrete implementations for:
/// - Storage backends (in-memory, file)
/// - Payment gateways (mock)
fn build_engine(config: Config) -> Result<FulfillmentEngine, Box<dyn std::error::Error>> {
	let builder = FulfillmentBuilder::new(config);

	let storage_factories = create_factory_map!(
		fulfillment_storage::StorageInterface,
		fulfillment_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let gateway_factories = create_factory_map!(
		fulfillment_gateway::GatewayInterface,
		fulfillment_gateway::GatewayError,
		"mock" => create_mock_gateway,
	);

	let factories = FulfillmentFactories {
		storage_factories,
		gateway_factories,
	};

	Ok(builder.build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	const TEST_CONFIG: &str = r#"
[service]
id = "fulfillment-test"

[engine]

[storage]
primary = "memory"
[storage.implementations.memory]

[gateway]
primary = "mock"
[gateway.implementations.mock]
"#;

	#[test]
	fn test_args_default_values() {
		let args = Args {
			config: PathBuf::from("config.toml"),
			log_level: "info".to_string(),
		};

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_create_factory_map_macro() {
		let factories = create_factory_map!(
			fulfillment_storage::StorageInterface,
			fulfillment_storage::StorageError,
			"file" => create_file_storage,
			"memory" => create_memory_storage,
		);

		assert_eq!(factories.len(), 2);
		assert!(factories.contains_key("file"));
		assert!(factories.contains_key("memory"));
	}

	#[test]
	fn test_build_engine_with_minimal_config() {
		let config: Config = TEST_CONFIG.parse().unwrap();

		let result = build_engine(config);
		assert!(result.is_ok(), "Failed to build engine: {:?}", result.err());

		let engine = result.unwrap();
		assert_eq!(engine.config().service.id, "fulfillment-test");
	}

	#[test]
	fn test_build_engine_with_file_storage() {
		let dir = tempfile::tempdir().unwrap();
		let config: Config = TEST_CONFIG
			.replace("primary = \"memory\"", "primary = \"file\"")
			.replace(
				"[storage.implementations.memory]",
				&format!(
					"[storage.implementations.file]\nstorage_path = {:?}",
					dir.path().to_string_lossy()
				),
			)
			.parse()
			.unwrap();

		assert!(build_engine(config).is_ok());
	}

	#[test]
	fn test_build_engine_rejects_mistyped_implementation_section() {
		let config: Config = TEST_CONFIG
			.replace(
				"[gateway.implementations.mock]",
				"[gateway.implementations.mock]\ndecline_all = \"yes\"",
			)
			.parse()
			.unwrap();

		assert!(build_engine(config).is_err());
	}

	#[test]
	fn test_build_engine_rejects_unknown_primary() {
		let config: Config = TEST_CONFIG
			.replace("primary = \"mock\"", "primary = \"real\"")
			.replace("[gateway.implementations.mock]", "[gateway.implementations.real]")
			.parse()
			.unwrap();

		let result = build_engine(config);
		assert!(result.is_err());
	}
}
