// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Document store configuration.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
	/// Base URL of the Elasticsearch-compatible document store.
	pub url: String,
	pub symbols_index: String,
	pub reports_index: String,
	pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
	fn default() -> Self {
		StoreConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StoreConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub symbols_index: Option<String>,
	#[serde(default)]
	pub reports_index: Option<String>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
}

impl StoreConfigLayer {
	pub fn merge(&mut self, other: StoreConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.symbols_index.is_some() {
			self.symbols_index = other.symbols_index;
		}
		if other.reports_index.is_some() {
			self.reports_index = other.reports_index;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	pub fn finalize(self) -> StoreConfig {
		StoreConfig {
			url: self
				.url
				.unwrap_or_else(|| "http://127.0.0.1:9200".to_string()),
			symbols_index: self
				.symbols_index
				.unwrap_or_else(|| "breakpad-symbols".to_string()),
			reports_index: self
				.reports_index
				.unwrap_or_else(|| "breakpad-crashes".to_string()),
			request_timeout_secs: self.request_timeout_secs.unwrap_or(30),
		}
	}
}
