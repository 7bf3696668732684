// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence for the crashworks processor.
//!
//! - [`DocumentStore`]: keyed JSON documents, backed by Elasticsearch
//! - [`Cache`]: advisory key/value lookups, backed by Redis, Memcached or memory
//! - [`CrashRepository`]: symbol and report operations on top of both

pub mod cache;
pub mod document;
pub mod error;
pub mod memory;
pub mod repository;

pub use cache::{Cache, MemcacheCache, RedisCache};
pub use document::{DocumentStore, ElasticDocumentStore};
pub use error::{CacheError, ReportWriteError, Result, StoreError};
pub use memory::{MemoryCache, MemoryDocumentStore};
pub use repository::{
	CachedCrashRepository, CrashRepository, DEFAULT_CACHE_TIMEOUT, REPORT_KEYWORD_FIELDS,
	SYMBOL_KEYWORD_FIELDS,
};
