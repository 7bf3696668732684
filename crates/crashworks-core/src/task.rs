// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queue task wire format.
//!
//! Tasks are JSON objects tagged by an integer `type` field:
//!
//! | `type` | Variant   | Payload                                  |
//! |--------|-----------|------------------------------------------|
//! | 1      | Symbol    | `symbol?`, `paths[]`, `info`             |
//! | 2      | Dump      | `minidump`, `info`, `log?`, `time?`      |
//! | 4      | WebDump   | `webdump`, `info`, `time?`               |
//!
//! Decoding reads the discriminant first and only then the variant payload.
//! A missing `time` defaults to the current UTC time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

pub const TYPE_SYMBOL: u32 = 1;
pub const TYPE_DUMP: u32 = 2;
pub const TYPE_WEB_DUMP: u32 = 4;

/// A unit of work taken from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
	Symbol(SymbolTask),
	Dump(DumpTask),
	WebDump(WebDumpTask),
}

/// Registration of one or two symbol files plus their description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTask {
	#[serde(
		default,
		deserialize_with = "empty_path_as_none",
		skip_serializing_if = "Option::is_none"
	)]
	pub symbol: Option<PathBuf>,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub paths: Vec<PathBuf>,
	pub info: PathBuf,
}

/// A native minidump with its info file and optional client log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpTask {
	#[serde(rename = "minidump")]
	pub path: PathBuf,
	pub info: PathBuf,
	#[serde(
		default,
		deserialize_with = "empty_path_as_none",
		skip_serializing_if = "Option::is_none"
	)]
	pub log: Option<PathBuf>,
	#[serde(
		default = "Utc::now",
		deserialize_with = "time_or_now",
		serialize_with = "serialize_time"
	)]
	pub time: DateTime<Utc>,
}

/// A browser stack trace with its info file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebDumpTask {
	#[serde(rename = "webdump")]
	pub path: PathBuf,
	pub info: PathBuf,
	#[serde(
		default = "Utc::now",
		deserialize_with = "time_or_now",
		serialize_with = "serialize_time"
	)]
	pub time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Discriminant {
	#[serde(rename = "type")]
	kind: u32,
}

impl Task {
	/// Decode a task from its JSON wire representation.
	pub fn decode(bytes: &[u8]) -> Result<Self> {
		let Discriminant { kind } = serde_json::from_slice(bytes).map_err(CoreError::MalformedTask)?;

		match kind {
			TYPE_SYMBOL => serde_json::from_slice(bytes)
				.map(Task::Symbol)
				.map_err(CoreError::MalformedTask),
			TYPE_DUMP => serde_json::from_slice(bytes)
				.map(Task::Dump)
				.map_err(CoreError::MalformedTask),
			TYPE_WEB_DUMP => serde_json::from_slice(bytes)
				.map(Task::WebDump)
				.map_err(CoreError::MalformedTask),
			other => Err(CoreError::UnknownTaskType(other)),
		}
	}

	/// Encode the task into its JSON wire representation.
	pub fn encode(&self) -> Result<Vec<u8>> {
		let mut value = match self {
			Task::Symbol(t) => serde_json::to_value(t)?,
			Task::Dump(t) => serde_json::to_value(t)?,
			Task::WebDump(t) => serde_json::to_value(t)?,
		};

		if let serde_json::Value::Object(map) = &mut value {
			map.insert("type".to_string(), self.type_id().into());
		}

		Ok(serde_json::to_vec(&value)?)
	}

	/// Wire discriminant of this task.
	pub fn type_id(&self) -> u32 {
		match self {
			Task::Symbol(_) => TYPE_SYMBOL,
			Task::Dump(_) => TYPE_DUMP,
			Task::WebDump(_) => TYPE_WEB_DUMP,
		}
	}

	/// Short name used in logs.
	pub fn kind(&self) -> &'static str {
		match self {
			Task::Symbol(_) => "symbol",
			Task::Dump(_) => "dump",
			Task::WebDump(_) => "webdump",
		}
	}

	/// Every file referenced by the task.
	pub fn files(&self) -> Vec<&Path> {
		match self {
			Task::Symbol(t) => t.files(),
			Task::Dump(t) => t.files(),
			Task::WebDump(t) => t.files(),
		}
	}
}

impl SymbolTask {
	pub fn new(symbols: Vec<PathBuf>, info: impl Into<PathBuf>) -> Self {
		Self {
			symbol: None,
			paths: symbols,
			info: info.into(),
		}
	}

	/// Symbol files in submission order: the single `symbol` path, then `paths`.
	pub fn symbol_files(&self) -> Vec<&Path> {
		self
			.symbol
			.iter()
			.chain(self.paths.iter())
			.map(PathBuf::as_path)
			.collect()
	}

	pub fn files(&self) -> Vec<&Path> {
		let mut files = self.symbol_files();
		files.push(self.info.as_path());
		files
	}
}

impl DumpTask {
	pub fn new(path: impl Into<PathBuf>, info: impl Into<PathBuf>, log: Option<PathBuf>) -> Self {
		Self {
			path: path.into(),
			info: info.into(),
			log,
			time: Utc::now(),
		}
	}

	pub fn files(&self) -> Vec<&Path> {
		let mut files = vec![self.path.as_path(), self.info.as_path()];
		files.extend(self.log.as_deref());
		files
	}
}

impl WebDumpTask {
	pub fn new(path: impl Into<PathBuf>, info: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			info: info.into(),
			time: Utc::now(),
		}
	}

	pub fn files(&self) -> Vec<&Path> {
		vec![self.path.as_path(), self.info.as_path()]
	}
}

fn empty_path_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
	D: Deserializer<'de>,
{
	let value: Option<String> = Option::deserialize(deserializer)?;
	Ok(value.filter(|s| !s.is_empty()).map(PathBuf::from))
}

// Producers written against nil slices send `"paths": null`.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error>
where
	D: Deserializer<'de>,
{
	let value: Option<Vec<PathBuf>> = Option::deserialize(deserializer)?;
	Ok(value.unwrap_or_default())
}

fn time_or_now<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
	D: Deserializer<'de>,
{
	let value: Option<String> = Option::deserialize(deserializer)?;
	match value.as_deref() {
		None | Some("") => Ok(Utc::now()),
		Some(s) => DateTime::parse_from_rfc3339(s)
			.map(|dt| dt.with_timezone(&Utc))
			.map_err(|e| serde::de::Error::custom(format!("invalid time '{s}': {e}"))),
	}
}

fn serialize_time<S>(time: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
