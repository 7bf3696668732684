// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for core crashworks types.

use thiserror::Error;

/// Errors raised while decoding or encoding core types.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("malformed task: {0}")]
	MalformedTask(#[source] serde_json::Error),

	#[error("unknown task type: {0}")]
	UnknownTaskType(u32),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
