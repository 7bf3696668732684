// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Symbol storage configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Symbol storage configuration (runtime, fully resolved).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolsConfig {
	/// Root of the canonical symbol tree; also passed to the native stack walker.
	pub root: PathBuf,
}

/// Symbol storage configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SymbolsConfigLayer {
	#[serde(default)]
	pub root: Option<PathBuf>,
}

impl SymbolsConfigLayer {
	pub fn merge(&mut self, other: SymbolsConfigLayer) {
		if other.root.is_some() {
			self.root = other.root;
		}
	}

	pub fn finalize(self) -> SymbolsConfig {
		SymbolsConfig {
			root: self.root.unwrap_or_default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_root_is_empty() {
		let config = SymbolsConfigLayer::default().finalize();
		assert!(config.root.as_os_str().is_empty());
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = SymbolsConfigLayer {
			root: Some("/old".into()),
		};
		base.merge(SymbolsConfigLayer {
			root: Some("/new".into()),
		});
		assert_eq!(base.finalize().root, PathBuf::from("/new"));
	}
}
