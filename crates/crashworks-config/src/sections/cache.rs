// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lookup cache configuration section.

use serde::Deserialize;

/// 30 days.
const DEFAULT_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Cache flavor selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
	Memcache { servers: Vec<String> },
	Redis {
		address: String,
		password: Option<String>,
	},
	Memory,
}

impl CacheBackend {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Memcache { .. } => "memcache",
			Self::Redis { .. } => "redis",
			Self::Memory => "memory",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
	pub memcache: Vec<String>,
	pub redis_address: Option<String>,
	pub redis_password: Option<String>,
	pub ttl_secs: u64,
	/// Upper bound on a single cache call; a timeout is treated as a miss.
	pub timeout_ms: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		CacheConfigLayer::default().finalize()
	}
}

impl CacheConfig {
	/// Memcached wins over Redis; with neither configured the process keeps
	/// an in-memory map.
	pub fn backend(&self) -> CacheBackend {
		if !self.memcache.is_empty() {
			return CacheBackend::Memcache {
				servers: self.memcache.clone(),
			};
		}
		match &self.redis_address {
			Some(address) => CacheBackend::Redis {
				address: address.clone(),
				password: self.redis_password.clone(),
			},
			None => CacheBackend::Memory,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CacheConfigLayer {
	#[serde(default)]
	pub memcache: Option<Vec<String>>,
	#[serde(default)]
	pub redis_address: Option<String>,
	#[serde(default)]
	pub redis_password: Option<String>,
	#[serde(default)]
	pub ttl_secs: Option<u64>,
	#[serde(default)]
	pub timeout_ms: Option<u64>,
}

impl CacheConfigLayer {
	pub fn merge(&mut self, other: CacheConfigLayer) {
		if other.memcache.is_some() {
			self.memcache = other.memcache;
		}
		if other.redis_address.is_some() {
			self.redis_address = other.redis_address;
		}
		if other.redis_password.is_some() {
			self.redis_password = other.redis_password;
		}
		if other.ttl_secs.is_some() {
			self.ttl_secs = other.ttl_secs;
		}
		if other.timeout_ms.is_some() {
			self.timeout_ms = other.timeout_ms;
		}
	}

	pub fn finalize(self) -> CacheConfig {
		CacheConfig {
			memcache: self
				.memcache
				.unwrap_or_default()
				.into_iter()
				.filter(|s| !s.trim().is_empty())
				.collect(),
			redis_address: self.redis_address.filter(|s| !s.is_empty()),
			redis_password: self.redis_password.filter(|s| !s.is_empty()),
			ttl_secs: self.ttl_secs.unwrap_or(DEFAULT_TTL_SECS),
			timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
		}
	}
}
