// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for crashworks-processor.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build id stamped by the release pipeline.
pub fn build_id() -> &'static str {
	option_env!("CRASHWORKS_GIT_SHA")
		.filter(|sha| !sha.is_empty())
		.unwrap_or("unknown")
}

/// Format version info for display.
pub fn format_version_info() -> String {
	format!(
		"crashworks-processor version: {}\n\
         Build:                        {}\n\
         Platform:                     {}-{}",
		VERSION,
		build_id(),
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}
