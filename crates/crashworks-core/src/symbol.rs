// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Symbol registration types.

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Platform tag of browser symbol sets.
pub const WEB_PLATFORM: &str = "web";

/// File name token shared by every stored browser symbol file.
pub const WEB_SYMBOL_FILE: &str = "file.symbol";

// MODULE <os> <arch> <debug id> <name>
static MODULE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"^MODULE (Linux|mac|Macintosh OSX|windows|Microsoft Windows) (?:x86|Intel IA-32|x86_64|AMD64/Intel 64|ppc|32-bit PowerPC|ppc64|64-bit PowerPC|arm|arm64|unknown) (\S+) (.*)",
	)
	.unwrap()
});

static LEADING_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w\s]+").unwrap());

/// Metadata stored for a registered symbol set.
///
/// Records served from the cache only carry `debug_id` and `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
	#[serde(rename = "debugId")]
	pub debug_id: String,
	#[serde(rename = "build", default)]
	pub version: String,
	#[serde(default)]
	pub platform: String,
	#[serde(rename = "path", default)]
	pub storage_dir: PathBuf,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub date_added: Option<DateTime<Utc>>,
}

impl SymbolRecord {
	pub fn new(
		debug_id: impl Into<String>,
		version: impl Into<String>,
		platform: impl Into<String>,
		storage_dir: impl Into<PathBuf>,
	) -> Self {
		Self {
			debug_id: debug_id.into(),
			version: version.into(),
			platform: platform.into(),
			storage_dir: storage_dir.into(),
			date_added: Some(Utc::now()),
		}
	}

	/// A record known only through the cache.
	pub fn cached(debug_id: impl Into<String>, version: impl Into<String>) -> Self {
		Self {
			debug_id: debug_id.into(),
			version: version.into(),
			platform: String::new(),
			storage_dir: PathBuf::new(),
			date_added: None,
		}
	}
}

/// Description file submitted with symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SymbolDescription {
	pub version: String,
	pub platform: String,
}

impl SymbolDescription {
	pub fn is_web(&self) -> bool {
		self.platform == WEB_PLATFORM
	}
}

/// First line of a Breakpad text symbol file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHeader {
	pub os: String,
	pub debug_id: String,
	pub name: String,
}

impl ModuleHeader {
	/// Parse a `MODULE` line. The debug id and module name become directory
	/// names, so a header whose id or name is not a single plain path
	/// component is rejected.
	pub fn parse(line: &str) -> Option<Self> {
		let caps = MODULE_HEADER.captures(line)?;
		let header = Self {
			os: caps[1].trim().to_string(),
			debug_id: caps[2].trim().to_string(),
			name: caps[3].trim().to_string(),
		};
		(is_path_component(&header.debug_id) && is_path_component(&header.name)).then_some(header)
	}

	/// File stem used for the stored `.sym` file: the leading run of word and
	/// space characters of the module name (`libfoo.so` → `libfoo`).
	pub fn file_stem(&self) -> &str {
		LEADING_NAME
			.find(&self.name)
			.map(|m| m.as_str())
			.filter(|s| !s.trim().is_empty())
			.unwrap_or("symbols")
	}
}

fn is_path_component(value: &str) -> bool {
	!value.is_empty()
		&& value != "."
		&& value != ".."
		&& !value.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_linux_header() {
		let header =
			ModuleHeader::parse("MODULE Linux x86_64 0D2FBC3D7A8A3C54F5DB7A5E1EC0F5BA0 libcore.so\n")
				.unwrap();
		assert_eq!(header.os, "Linux");
		assert_eq!(header.debug_id, "0D2FBC3D7A8A3C54F5DB7A5E1EC0F5BA0");
		assert_eq!(header.name, "libcore.so");
		assert_eq!(header.file_stem(), "libcore");
	}

	#[test]
	fn parses_windows_header_with_spaces() {
		let header =
			ModuleHeader::parse("MODULE windows x86 5A9832E5287241C1838ED98914E9B7FF1 My App.pdb")
				.unwrap();
		assert_eq!(header.os, "windows");
		assert_eq!(header.name, "My App.pdb");
		assert_eq!(header.file_stem(), "My App");
	}

	#[test]
	fn parses_mac_header() {
		let header = ModuleHeader::parse("MODULE mac x86_64 ABCDEF0123 Client").unwrap();
		assert_eq!(header.os, "mac");
		assert_eq!(header.file_stem(), "Client");
	}

	#[test]
	fn rejects_non_symbol_file() {
		assert!(ModuleHeader::parse("FILE 0 main.cpp").is_none());
		assert!(ModuleHeader::parse("MODULE Plan9 x86 ABC name").is_none());
		assert!(ModuleHeader::parse("").is_none());
	}

	#[test]
	fn rejects_names_that_leave_the_directory() {
		for line in [
			"MODULE Linux x86_64 ABC ../escaped",
			"MODULE Linux x86_64 ABC /etc/x",
			"MODULE Linux x86_64 ABC ..",
			"MODULE windows x86 ABC ..\\escaped.pdb",
			"MODULE Linux x86_64 ../ABC libcore.so",
			"MODULE Linux x86_64 .. libcore.so",
			"MODULE Linux x86_64 A/B libcore.so",
		] {
			assert!(ModuleHeader::parse(line).is_none(), "{line}");
		}
	}

	#[test]
	fn accepts_dotted_names() {
		let header = ModuleHeader::parse("MODULE Linux x86_64 ABC libc.so.6").unwrap();
		assert_eq!(header.name, "libc.so.6");
		assert_eq!(header.file_stem(), "libc");
	}

	#[test]
	fn file_stem_falls_back() {
		let header = ModuleHeader {
			os: "Linux".to_string(),
			debug_id: "ID".to_string(),
			name: ".hidden".to_string(),
		};
		assert_eq!(header.file_stem(), "symbols");
	}

	#[test]
	fn record_uses_store_field_names() {
		let record = SymbolRecord::new("ID1", "1.0.0", "Linux", "/symbols/libcore.so/ID1");
		let value = serde_json::to_value(&record).unwrap();
		assert_eq!(value["debugId"], "ID1");
		assert_eq!(value["build"], "1.0.0");
		assert_eq!(value["path"], "/symbols/libcore.so/ID1");
		assert!(value["date_added"].is_string());
	}

	#[test]
	fn description_detects_web() {
		let desc: SymbolDescription =
			serde_json::from_str(r#"{"version":"2.0","platform":"web"}"#).unwrap();
		assert!(desc.is_web());
	}
}
