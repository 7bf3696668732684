// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted crash reports.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Context;
use crate::info::GpuInfo;

/// Unique identifier of a persisted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Uuid);

impl ReportId {
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}
}

impl Default for ReportId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for ReportId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ReportId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// A stack walker context enriched with submitter metadata and a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
	#[serde(flatten)]
	pub context: Context,
	pub user_id: u64,
	#[serde(rename = "build")]
	pub build_version: String,
	pub platform: String,
	pub signature: String,
	pub source: String,
	pub crash_type: String,
	pub address: String,
	pub date_added: DateTime<Utc>,
	pub gpu: GpuInfo,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub ram: String,
	#[serde(default, rename = "raw_dump", skip_serializing_if = "String::is_empty")]
	pub raw_crash: String,
	#[serde(default, rename = "raw_log", skip_serializing_if = "String::is_empty")]
	pub log: String,
}

impl Report {
	/// Start a report from a context; enrichment fields are empty.
	pub fn new(context: Context, date_added: DateTime<Utc>) -> Self {
		Self {
			crash_type: context.crash_info.kind.clone(),
			address: context.crash_info.address.clone(),
			context,
			user_id: 0,
			build_version: String::new(),
			platform: String::new(),
			signature: String::new(),
			source: String::new(),
			date_added,
			gpu: GpuInfo::default(),
			ram: String::new(),
			raw_crash: String::new(),
			log: String::new(),
		}
	}

	pub fn crashing_frames(&self) -> &[crate::context::Frame] {
		&self.context.crashing_thread.frames
	}
}

/// A persisted report together with its generated id, as republished downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWithId {
	#[serde(flatten)]
	pub report: Report,
	pub id: ReportId,
}
