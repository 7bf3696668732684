// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signature pipeline configuration section.
//!
//! Patterns are kept as strings here; they are compiled when the pipelines
//! are built so that a bad pattern fails the load or reload that introduced it.

use serde::Deserialize;

pub const DEFAULT_VENDOR_MODULE_PATTERN: &str = r"iq\s*option";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
	/// Module name pattern marking vendor frames in native crashes (case-insensitive).
	pub vendor_module_pattern: String,
	/// Function name patterns skipped when picking a web crash signature.
	pub web_blacklist: Vec<String>,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		PipelineConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineConfigLayer {
	#[serde(default)]
	pub vendor_module_pattern: Option<String>,
	#[serde(default)]
	pub web_blacklist: Option<Vec<String>>,
}

impl PipelineConfigLayer {
	pub fn merge(&mut self, other: PipelineConfigLayer) {
		if other.vendor_module_pattern.is_some() {
			self.vendor_module_pattern = other.vendor_module_pattern;
		}
		if other.web_blacklist.is_some() {
			self.web_blacklist = other.web_blacklist;
		}
	}

	pub fn finalize(self) -> PipelineConfig {
		PipelineConfig {
			vendor_module_pattern: self
				.vendor_module_pattern
				.filter(|s| !s.is_empty())
				.unwrap_or_else(|| DEFAULT_VENDOR_MODULE_PATTERN.to_string()),
			web_blacklist: self.web_blacklist.unwrap_or_default(),
		}
	}
}
