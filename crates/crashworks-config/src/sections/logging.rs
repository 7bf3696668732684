// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration section.

use std::str::FromStr;

use serde::Deserialize;
use tracing::level_filters::LevelFilter;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

impl FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"text" | "pretty" => Ok(Self::Text),
			"json" => Ok(Self::Json),
			other => Err(ConfigError::InvalidValue {
				key: "logging.format".to_string(),
				message: format!("unknown log format '{other}'"),
			}),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
	pub level: LevelFilter,
	pub format: LogFormat,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: LevelFilter::INFO,
			format: LogFormat::Text,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoggingConfigLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: LoggingConfigLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.format.is_some() {
			self.format = other.format;
		}
	}

	pub fn finalize(self) -> Result<LoggingConfig, ConfigError> {
		let level = match self.level {
			Some(level) => parse_level(&level)?,
			None => LevelFilter::INFO,
		};
		let format = match self.format {
			Some(format) => format.parse()?,
			None => LogFormat::Text,
		};
		Ok(LoggingConfig { level, format })
	}
}

fn parse_level(value: &str) -> Result<LevelFilter, ConfigError> {
	let normalized = match value.trim().to_ascii_lowercase().as_str() {
		"warning" => "warn".to_string(),
		other => other.to_string(),
	};
	LevelFilter::from_str(&normalized).map_err(|_| ConfigError::InvalidValue {
		key: "logging.level".to_string(),
		message: format!("unknown log level '{value}'"),
	})
}
