// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-submitted crash description (`info.json`).

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Version reported by internal developer builds. Dumps carrying it are
/// discarded without producing a report.
pub const DEVELOPER_VERSION: &str = "999.999.999";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuInfo {
	#[serde(default)]
	pub vendor: String,
	#[serde(default)]
	pub renderer: String,
}

/// Description of the crashing client, written by the uploader next to each dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
	pub version: String,
	pub browser: String,
	pub gpu: GpuInfo,
	pub platform: String,
	pub cpu: String,
	pub ram: String,
	#[serde(rename = "userid")]
	pub user_id: String,
}

impl Info {
	pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
		serde_json::from_slice(bytes)
	}

	pub fn is_developer_build(&self) -> bool {
		self.version == DEVELOPER_VERSION
	}

	/// Numeric user id; `0` when absent, `-1`, or unparsable.
	pub fn user_id(&self) -> u64 {
		if self.user_id.is_empty() || self.user_id == "-1" {
			return 0;
		}

		match self.user_id.parse() {
			Ok(id) => id,
			Err(e) => {
				warn!(user_id = %self.user_id, error = %e, "Can't convert user id to u64");
				0
			}
		}
	}
}
