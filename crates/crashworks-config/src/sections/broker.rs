// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Message broker configuration.

use serde::Deserialize;

const DEFAULT_URL: &str = "amqp://127.0.0.1:5672/%2f";
const DEFAULT_QUEUE: &str = "crashes";
const DEFAULT_POST_EXCHANGE_TYPE: &str = "fanout";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
	pub url: String,
	/// Durable queue the processor consumes tasks from.
	pub queue: String,
	/// Exchange processed reports are republished to; `None` disables republishing.
	pub post_exchange: Option<String>,
	pub post_exchange_type: String,
}

impl Default for BrokerConfig {
	fn default() -> Self {
		BrokerConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BrokerConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub queue: Option<String>,
	#[serde(default)]
	pub post_exchange: Option<String>,
	#[serde(default)]
	pub post_exchange_type: Option<String>,
}

impl BrokerConfigLayer {
	pub fn merge(&mut self, other: BrokerConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.queue.is_some() {
			self.queue = other.queue;
		}
		if other.post_exchange.is_some() {
			self.post_exchange = other.post_exchange;
		}
		if other.post_exchange_type.is_some() {
			self.post_exchange_type = other.post_exchange_type;
		}
	}

	pub fn finalize(self) -> BrokerConfig {
		BrokerConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
			queue: self.queue.unwrap_or_else(|| DEFAULT_QUEUE.to_string()),
			post_exchange: self.post_exchange.filter(|s| !s.is_empty()),
			post_exchange_type: self
				.post_exchange_type
				.unwrap_or_else(|| DEFAULT_POST_EXCHANGE_TYPE.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = BrokerConfig::default();
		assert_eq!(config.url, DEFAULT_URL);
		assert_eq!(config.queue, "crashes");
		assert!(config.post_exchange.is_none());
		assert_eq!(config.post_exchange_type, "fanout");
	}

	#[test]
	fn test_empty_exchange_disables_republish() {
		let config = BrokerConfigLayer {
			post_exchange: Some(String::new()),
			..Default::default()
		}
		.finalize();
		assert!(config.post_exchange.is_none());
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: BrokerConfigLayer = toml::from_str(
			r#"
queue = "dumps"
post_exchange = "processed"
"#,
		)
		.unwrap();
		assert_eq!(layer.queue.as_deref(), Some("dumps"));
		assert_eq!(layer.post_exchange.as_deref(), Some("processed"));
		assert!(layer.url.is_none());
	}
}
