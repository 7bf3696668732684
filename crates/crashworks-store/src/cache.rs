// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key/value lookup caches.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};
use tracing::info;

use crate::error::CacheError;

/// Memcached reads expirations above 30 days as absolute unix timestamps.
const MEMCACHE_MAX_RELATIVE_TTL: u64 = 30 * 24 * 60 * 60;

#[async_trait]
pub trait Cache: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
	async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

pub struct RedisCache {
	conn: ConnectionManager,
	ttl_secs: u64,
}

impl RedisCache {
	/// Connect to `address` (`host:port` or a `redis://` URL).
	pub async fn connect(
		address: &str,
		password: Option<String>,
		ttl_secs: u64,
	) -> Result<Self, CacheError> {
		let url = if address.contains("://") {
			address.to_string()
		} else {
			format!("redis://{address}")
		};
		let mut info = url.into_connection_info()?;
		if password.is_some() {
			info.redis.password = password;
		}

		let client = redis::Client::open(info)?;
		let conn = ConnectionManager::new(client).await?;
		info!(address, "connected to redis");
		Ok(Self { conn, ttl_secs })
	}
}

#[async_trait]
impl Cache for RedisCache {
	async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
		let mut conn = self.conn.clone();
		let value: Option<String> = conn.get(key).await?;
		Ok(value)
	}

	async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
		let mut conn = self.conn.clone();
		conn.set_ex::<_, _, ()>(key, value, self.ttl_secs).await?;
		Ok(())
	}
}

/// Memcached cache. The client is blocking, so every call runs on the
/// blocking thread pool.
pub struct MemcacheCache {
	client: Arc<memcache::Client>,
	ttl_secs: u32,
}

impl MemcacheCache {
	pub async fn connect(servers: &[String], ttl_secs: u64) -> Result<Self, CacheError> {
		let urls: Vec<String> = servers
			.iter()
			.map(|server| {
				if server.starts_with("memcache://") {
					server.clone()
				} else {
					format!("memcache://{server}")
				}
			})
			.collect();

		let client = tokio::task::spawn_blocking(move || memcache::Client::connect(urls)).await??;
		info!(servers = ?servers, "connected to memcached");
		Ok(Self {
			client: Arc::new(client),
			ttl_secs: ttl_secs.min(MEMCACHE_MAX_RELATIVE_TTL) as u32,
		})
	}
}

#[async_trait]
impl Cache for MemcacheCache {
	async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
		let client = Arc::clone(&self.client);
		let key = key.to_string();
		let value = tokio::task::spawn_blocking(move || client.get::<String>(&key)).await??;
		Ok(value)
	}

	async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
		let client = Arc::clone(&self.client);
		let key = key.to_string();
		let value = value.to_string();
		let ttl = self.ttl_secs;
		tokio::task::spawn_blocking(move || client.set(&key, value.as_str(), ttl)).await??;
		Ok(())
	}
}

