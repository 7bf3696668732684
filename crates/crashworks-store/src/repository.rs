// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository layer for symbol and report persistence.
//!
//! Symbol lookups go through a cache-aside layer keyed by debug id. The
//! cache only remembers `debug_id -> version`; the document store stays
//! authoritative and every cache failure degrades to a miss.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crashworks_core::{Report, ReportId, SymbolRecord};

use crate::cache::Cache;
use crate::document::DocumentStore;
use crate::error::{ReportWriteError, Result};

pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(500);

/// Keyword-mapped fields of the symbols index.
pub const SYMBOL_KEYWORD_FIELDS: &[&str] = &["debugId", "build", "platform", "path"];

/// Keyword-mapped fields of the reports index.
pub const REPORT_KEYWORD_FIELDS: &[&str] = &["signature", "build", "platform", "crash_type"];

#[async_trait]
pub trait CrashRepository: Send + Sync {
	async fn symbol_exists(&self, debug_id: &str) -> Result<bool>;

	/// Cache hits only carry `debug_id` and `version`.
	async fn get_symbol(&self, debug_id: &str) -> Result<Option<SymbolRecord>>;

	async fn add_symbol(&self, record: &SymbolRecord) -> Result<()>;

	/// First symbol set registered for `platform` with build `version`. Never cached.
	async fn get_symbol_for_platform(
		&self,
		platform: &str,
		version: &str,
	) -> Result<Option<SymbolRecord>>;

	async fn add_report(&self, report: &Report) -> std::result::Result<ReportId, ReportWriteError>;
}

pub struct CachedCrashRepository {
	store: Arc<dyn DocumentStore>,
	cache: Arc<dyn Cache>,
	symbols_index: String,
	reports_index: String,
	cache_timeout: Duration,
}

impl CachedCrashRepository {
	pub fn new(
		store: Arc<dyn DocumentStore>,
		cache: Arc<dyn Cache>,
		symbols_index: impl Into<String>,
		reports_index: impl Into<String>,
	) -> Self {
		Self {
			store,
			cache,
			symbols_index: symbols_index.into(),
			reports_index: reports_index.into(),
			cache_timeout: DEFAULT_CACHE_TIMEOUT,
		}
	}

	pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
		self.cache_timeout = timeout;
		self
	}

	async fn cached_version(&self, debug_id: &str) -> Option<String> {
		match tokio::time::timeout(self.cache_timeout, self.cache.get(debug_id)).await {
			Ok(Ok(version)) => version,
			Ok(Err(e)) => {
				warn!(debug_id, error = %e, "cache lookup failed");
				None
			}
			Err(_) => {
				warn!(debug_id, "cache lookup timed out");
				None
			}
		}
	}

	async fn remember(&self, debug_id: &str, version: &str) {
		match tokio::time::timeout(self.cache_timeout, self.cache.set(debug_id, version)).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => warn!(debug_id, error = %e, "cache write failed"),
			Err(_) => warn!(debug_id, "cache write timed out"),
		}
	}
}

fn decode_symbol(document: Value) -> Result<SymbolRecord> {
	Ok(serde_json::from_value(document)?)
}

#[async_trait]
impl CrashRepository for CachedCrashRepository {
	#[instrument(skip(self))]
	async fn symbol_exists(&self, debug_id: &str) -> Result<bool> {
		if self.cached_version(debug_id).await.is_some() {
			debug!("symbol found in cache");
			return Ok(true);
		}
		Ok(self.store.get(&self.symbols_index, debug_id).await?.is_some())
	}

	#[instrument(skip(self))]
	async fn get_symbol(&self, debug_id: &str) -> Result<Option<SymbolRecord>> {
		if let Some(version) = self.cached_version(debug_id).await {
			debug!("symbol found in cache");
			return Ok(Some(SymbolRecord::cached(debug_id, version)));
		}

		let Some(document) = self.store.get(&self.symbols_index, debug_id).await? else {
			return Ok(None);
		};
		let record = decode_symbol(document)?;
		self.remember(&record.debug_id, &record.version).await;
		Ok(Some(record))
	}

	#[instrument(skip(self, record), fields(debug_id = %record.debug_id, platform = %record.platform))]
	async fn add_symbol(&self, record: &SymbolRecord) -> Result<()> {
		let document = serde_json::to_value(record)?;
		self
			.store
			.put(&self.symbols_index, &record.debug_id, &document)
			.await?;
		self.remember(&record.debug_id, &record.version).await;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn get_symbol_for_platform(
		&self,
		platform: &str,
		version: &str,
	) -> Result<Option<SymbolRecord>> {
		let documents = self
			.store
			.find(&self.symbols_index, &[("platform", platform), ("build", version)])
			.await?;
		documents.into_iter().next().map(decode_symbol).transpose()
	}

	#[instrument(skip(self, report), fields(signature = %report.signature))]
	async fn add_report(&self, report: &Report) -> std::result::Result<ReportId, ReportWriteError> {
		let id = ReportId::new();
		let mut document = serde_json::to_value(report).map_err(|e| ReportWriteError {
			id,
			source: e.into(),
		})?;
		if let Value::Object(fields) = &mut document {
			fields.insert("id".to_string(), Value::String(id.to_string()));
		}
		self
			.store
			.put(&self.reports_index, &id.to_string(), &document)
			.await
			.map_err(|source| ReportWriteError { id, source })?;
		Ok(id)
	}
}
