// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack walker output: crash metadata, modules, threads and frames.
//!
//! Field names follow the JSON emitted by the native stack walker. Every
//! field is optional on input so that partial output still parses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashInfo {
	pub address: String,
	#[serde(rename = "crashing_thread")]
	pub thread: u32,
	#[serde(rename = "type")]
	pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Module {
	#[serde(rename = "base_addr")]
	pub base_address: String,
	pub code_id: String,
	pub debug_file: String,
	pub debug_id: String,
	#[serde(rename = "end_addr")]
	pub end_address: String,
	#[serde(rename = "filename")]
	pub file_name: String,
	pub version: String,
	pub loaded_symbols: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
	pub cpu_arch: String,
	pub cpu_count: u32,
	pub cpu_info: String,
	pub os: String,
	#[serde(rename = "os_ver")]
	pub os_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Frame {
	pub file: String,
	#[serde(rename = "frame")]
	pub index: u32,
	pub function: String,
	pub function_offset: String,
	pub line: u32,
	pub module: String,
	pub module_offset: String,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub registers: BTreeMap<String, String>,
	pub trust: String,
}

impl Frame {
	/// `file:line` location of the frame.
	pub fn source(&self) -> String {
		format!("{}:{}", self.file, self.line)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thread {
	pub frame_count: u32,
	pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashingThread {
	pub frames: Vec<Frame>,
	#[serde(rename = "threads_index")]
	pub thread_index: u32,
	pub total_frames: u32,
}

/// Snapshot of a crash as reported by a stack walker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
	pub crash_info: CrashInfo,
	pub crashing_thread: CrashingThread,
	pub main_module: u32,
	pub modules: Vec<Module>,
	pub status: String,
	pub system_info: SystemInfo,
	pub thread_count: u32,
	pub threads: Vec<Thread>,
}

impl Context {
	/// Debug id of the first module whose symbols were loaded, or an empty string.
	pub fn symbolicated_debug_id(&self) -> &str {
		self
			.modules
			.iter()
			.find(|m| m.loaded_symbols)
			.map(|m| m.debug_id.as_str())
			.unwrap_or("")
	}
}
