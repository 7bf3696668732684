// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ProcessorConfigLayer;
use crate::sections::{
	BrokerConfigLayer, CacheConfigLayer, LoggingConfigLayer, PipelineConfigLayer, StoreConfigLayer,
	SymbolsConfigLayer, ToolsConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ProcessorConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ProcessorConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ProcessorConfigLayer::default())
	}
}

/// TOML file source. The processor is always started with an explicit file,
/// so a missing file is an error rather than an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ProcessorConfigLayer, ConfigError> {
		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ProcessorConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CRASHWORKS_<SECTION>_<FIELD>. List values are comma-separated.
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn new() -> Self {
		Self { vars: None }
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn from_map(vars: HashMap<String, String>) -> Self {
		Self { vars: Some(vars) }
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid u64 value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn list(&self, name: &str) -> Option<Vec<String>> {
		self.var(name).map(|v| {
			v.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(String::from)
				.collect()
		})
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ProcessorConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ProcessorConfigLayer {
			symbols: Some(SymbolsConfigLayer {
				root: self.var("CRASHWORKS_SYMBOLS_ROOT").map(PathBuf::from),
			}),
			broker: Some(BrokerConfigLayer {
				url: self.var("CRASHWORKS_BROKER_URL"),
				queue: self.var("CRASHWORKS_BROKER_QUEUE"),
				post_exchange: self.var("CRASHWORKS_BROKER_POST_EXCHANGE"),
				post_exchange_type: self.var("CRASHWORKS_BROKER_POST_EXCHANGE_TYPE"),
			}),
			store: Some(StoreConfigLayer {
				url: self.var("CRASHWORKS_STORE_URL"),
				symbols_index: self.var("CRASHWORKS_STORE_SYMBOLS_INDEX"),
				reports_index: self.var("CRASHWORKS_STORE_REPORTS_INDEX"),
				request_timeout_secs: self.u64("CRASHWORKS_STORE_REQUEST_TIMEOUT_SECS")?,
			}),
			cache: Some(CacheConfigLayer {
				memcache: self.list("CRASHWORKS_CACHE_MEMCACHE"),
				redis_address: self.var("CRASHWORKS_CACHE_REDIS_ADDRESS"),
				redis_password: self.var("CRASHWORKS_CACHE_REDIS_PASSWORD"),
				ttl_secs: self.u64("CRASHWORKS_CACHE_TTL_SECS")?,
				timeout_ms: self.u64("CRASHWORKS_CACHE_TIMEOUT_MS")?,
			}),
			logging: Some(LoggingConfigLayer {
				level: self.var("CRASHWORKS_LOGGING_LEVEL"),
				format: self.var("CRASHWORKS_LOGGING_FORMAT"),
			}),
			pipeline: Some(PipelineConfigLayer {
				vendor_module_pattern: self.var("CRASHWORKS_PIPELINE_VENDOR_MODULE_PATTERN"),
				// Regexes may contain commas; the blacklist is file-only.
				web_blacklist: None,
			}),
			tools: Some(ToolsConfigLayer {
				native_stackwalker: self.var("CRASHWORKS_TOOLS_NATIVE_STACKWALKER"),
				web_stackwalker: self.var("CRASHWORKS_TOOLS_WEB_STACKWALKER"),
				timeout_secs: self.u64("CRASHWORKS_TOOLS_TIMEOUT_SECS")?,
			}),
		})
	}
}
