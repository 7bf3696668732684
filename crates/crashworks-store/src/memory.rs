// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process backends.
//!
//! `MemoryCache` is the fallback cache when no cache server is configured.
//! `MemoryDocumentStore` is a test double for the Elasticsearch store, with
//! switchable failures and write counting.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::Cache;
use crate::document::DocumentStore;
use crate::error::{CacheError, Result, StoreError};

#[derive(Default)]
pub struct MemoryCache {
	entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> std::result::Result<MutexGuard<'_, HashMap<String, String>>, CacheError> {
		self.entries
			.lock()
			.map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))
	}
}

#[async_trait]
impl Cache for MemoryCache {
	async fn get(&self, key: &str) -> std::result::Result<Option<String>, CacheError> {
		Ok(self.lock()?.get(key).cloned())
	}

	async fn set(&self, key: &str, value: &str) -> std::result::Result<(), CacheError> {
		self.lock()?.insert(key.to_string(), value.to_string());
		Ok(())
	}
}

/// Document store held in memory, with a switch that makes every call fail
/// as if the server were unreachable.
#[derive(Default)]
pub struct MemoryDocumentStore {
	collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
	writes: AtomicUsize,
	unavailable: AtomicBool,
}

impl MemoryDocumentStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Number of successful `put` calls.
	pub fn write_count(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	/// Every document in `collection`, ordered by id.
	pub fn documents(&self, collection: &str) -> Vec<Value> {
		self.collections
			.lock()
			.ok()
			.and_then(|c| c.get(collection).map(|docs| docs.values().cloned().collect()))
			.unwrap_or_default()
	}

	fn check_available(&self) -> Result<()> {
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(StoreError::Unavailable("connection refused".to_string()));
		}
		Ok(())
	}

	fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, BTreeMap<String, Value>>>> {
		self.collections
			.lock()
			.map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
	}
}

fn matches(document: &Value, terms: &[(&str, &str)]) -> bool {
	terms
		.iter()
		.all(|(field, value)| document.get(*field).and_then(Value::as_str) == Some(*value))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
	async fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
		self.check_available()?;
		self.lock()?
			.entry(collection.to_string())
			.or_default()
			.insert(id.to_string(), document.clone());
		self.writes.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
		self.check_available()?;
		Ok(self
			.lock()?
			.get(collection)
			.and_then(|docs| docs.get(id).cloned()))
	}

	async fn find(&self, collection: &str, terms: &[(&str, &str)]) -> Result<Vec<Value>> {
		self.check_available()?;
		Ok(self
			.lock()?
			.get(collection)
			.map(|docs| docs.values().filter(|d| matches(d, terms)).cloned().collect())
			.unwrap_or_default())
	}
}
