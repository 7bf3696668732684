// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the crashworks processor.
//!
//! Sources are merged in precedence order: built-in defaults, then the TOML
//! file given on the command line, then `CRASHWORKS_*` environment variables.
//! The same entry point is used at startup and on every reload.
//!
//! ```toml
//! [symbols]
//! root = "/srv/symbols"
//!
//! [broker]
//! url = "amqp://rabbit:5672/%2f"
//! post_exchange = "processed"
//!
//! [pipeline]
//! web_blacklist = ["^Rx\\.", "^zone\\."]
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ProcessorConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved processor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorConfig {
	pub symbols: SymbolsConfig,
	pub broker: BrokerConfig,
	pub store: StoreConfig,
	pub cache: CacheConfig,
	pub logging: LoggingConfig,
	pub pipeline: PipelineConfig,
	pub tools: ToolsConfig,
}

impl ProcessorConfig {
	/// Sections that differ from `other` but are only read at startup.
	pub fn restart_required_changes(&self, other: &ProcessorConfig) -> Vec<&'static str> {
		let mut changed = Vec::new();
		if self.symbols != other.symbols {
			changed.push("symbols");
		}
		if self.broker != other.broker {
			changed.push("broker");
		}
		if self.store != other.store {
			changed.push("store");
		}
		if self.cache != other.cache {
			changed.push("cache");
		}
		if self.tools != other.tools {
			changed.push("tools");
		}
		if self.logging.format != other.logging.format {
			changed.push("logging.format");
		}
		changed
	}
}

/// Load configuration with a config file path.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`CRASHWORKS_*`)
/// 2. The config file
/// 3. Built-in defaults
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ProcessorConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ProcessorConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ProcessorConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: ProcessorConfigLayer) -> Result<ProcessorConfig, ConfigError> {
	let config = ProcessorConfig {
		symbols: layer.symbols.unwrap_or_default().finalize(),
		broker: layer.broker.unwrap_or_default().finalize(),
		store: layer.store.unwrap_or_default().finalize(),
		cache: layer.cache.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize()?,
		pipeline: layer.pipeline.unwrap_or_default().finalize(),
		tools: layer.tools.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		symbols_root = %config.symbols.root.display(),
		queue = %config.broker.queue,
		post_exchange = config.broker.post_exchange.as_deref().unwrap_or("-"),
		store = %config.store.url,
		cache = config.cache.backend().kind(),
		log_level = %config.logging.level,
		web_blacklist = config.pipeline.web_blacklist.len(),
		"Processor configuration loaded"
	);

	Ok(config)
}

fn validate_config(config: &ProcessorConfig) -> Result<(), ConfigError> {
	if config.symbols.root.as_os_str().is_empty() {
		return Err(ConfigError::Validation(
			"symbols.root must be set (CRASHWORKS_SYMBOLS_ROOT)".to_string(),
		));
	}
	if config.broker.url.is_empty() {
		return Err(ConfigError::Validation("broker.url must not be empty".to_string()));
	}
	if config.broker.queue.is_empty() {
		return Err(ConfigError::Validation("broker.queue must not be empty".to_string()));
	}
	if config.tools.timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"tools.timeout_secs must be greater than zero".to_string(),
		));
	}
	Ok(())
}
