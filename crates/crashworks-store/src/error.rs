// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for storage operations.

use crashworks_core::ReportId;
use thiserror::Error;

/// Errors raised by the document store and the repository built on it.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("document store request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("document store returned {status}: {body}")]
	Status { status: u16, body: String },

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("invalid document store url {url:?}: {reason}")]
	InvalidUrl { url: String, reason: String },

	#[error("invalid document id {0:?}")]
	InvalidId(String),

	#[error("document store unavailable: {0}")]
	Unavailable(String),
}

/// Errors raised by cache backends. Callers treat every variant as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
	#[error("redis error: {0}")]
	Redis(#[from] redis::RedisError),

	#[error("memcache error: {0}")]
	Memcache(#[from] memcache::MemcacheError),

	#[error("cache worker failed: {0}")]
	Worker(#[from] tokio::task::JoinError),

	#[error("cache unavailable: {0}")]
	Unavailable(String),
}

/// A report could not be persisted. Carries the id that was generated for it.
#[derive(Debug, Error)]
#[error("failed to persist report {id}: {source}")]
pub struct ReportWriteError {
	pub id: ReportId,
	#[source]
	pub source: StoreError,
}

pub type Result<T> = std::result::Result<T, StoreError>;
