// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! External stack walker configuration section.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsConfig {
	pub native_stackwalker: String,
	pub web_stackwalker: String,
	pub timeout_secs: u64,
}

impl Default for ToolsConfig {
	fn default() -> Self {
		ToolsConfigLayer::default().finalize()
	}
}

impl ToolsConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolsConfigLayer {
	#[serde(default)]
	pub native_stackwalker: Option<String>,
	#[serde(default)]
	pub web_stackwalker: Option<String>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
}

impl ToolsConfigLayer {
	pub fn merge(&mut self, other: ToolsConfigLayer) {
		if other.native_stackwalker.is_some() {
			self.native_stackwalker = other.native_stackwalker;
		}
		if other.web_stackwalker.is_some() {
			self.web_stackwalker = other.web_stackwalker;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> ToolsConfig {
		ToolsConfig {
			native_stackwalker: self
				.native_stackwalker
				.unwrap_or_else(|| "stackwalker".to_string()),
			web_stackwalker: self
				.web_stackwalker
				.unwrap_or_else(|| "webstackwalker".to_string()),
			timeout_secs: self.timeout_secs.unwrap_or(120),
		}
	}
}
