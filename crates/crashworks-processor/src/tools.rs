// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! External stack walker programs.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crashworks_config::ToolsConfig;
use crashworks_core::Context;

#[derive(Debug, Error)]
pub enum ToolError {
	#[error("{program} not found")]
	NotInstalled { program: String },

	#[error("failed to run {program}: {source}")]
	Io {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{program} exited with {status}: {stderr}")]
	Failed {
		program: String,
		status: String,
		stderr: String,
	},

	#[error("{program} did not finish within {timeout:?}")]
	TimedOut { program: String, timeout: Duration },

	#[error("unreadable output from {program}: {source}")]
	Parse {
		program: String,
		#[source]
		source: serde_json::Error,
	},
}

#[async_trait]
pub trait StackWalker: Send + Sync {
	/// Symbolicate a native minidump against the symbol tree.
	async fn walk_minidump(&self, dump: &Path, symbols_root: &Path) -> Result<Context, ToolError>;

	/// Resolve a browser stack trace; returns one function name per frame.
	async fn walk_webdump(
		&self,
		dump: &Path,
		symbol_files: &[PathBuf],
	) -> Result<Vec<String>, ToolError>;
}

/// Runs the stack walkers as child processes. A child still running when
/// the timeout expires is killed.
pub struct CommandStackWalker {
	native: String,
	web: String,
	timeout: Duration,
}

impl CommandStackWalker {
	pub fn new(native: impl Into<String>, web: impl Into<String>, timeout: Duration) -> Self {
		Self {
			native: native.into(),
			web: web.into(),
			timeout,
		}
	}

	pub fn from_config(config: &ToolsConfig) -> Self {
		Self::new(
			&config.native_stackwalker,
			&config.web_stackwalker,
			config.timeout(),
		)
	}
}

#[async_trait]
impl StackWalker for CommandStackWalker {
	async fn walk_minidump(&self, dump: &Path, symbols_root: &Path) -> Result<Context, ToolError> {
		let args = [dump.as_os_str(), symbols_root.as_os_str()];
		let stdout = run_tool(&self.native, &args, self.timeout).await?;
		serde_json::from_slice(&stdout).map_err(|source| ToolError::Parse {
			program: self.native.clone(),
			source,
		})
	}

	async fn walk_webdump(
		&self,
		dump: &Path,
		symbol_files: &[PathBuf],
	) -> Result<Vec<String>, ToolError> {
		let mut args: Vec<&OsStr> = Vec::with_capacity(symbol_files.len() + 1);
		args.push(dump.as_os_str());
		args.extend(symbol_files.iter().map(|p| p.as_os_str()));

		let stdout = run_tool(&self.web, &args, self.timeout).await?;
		serde_json::from_slice(&stdout).map_err(|source| ToolError::Parse {
			program: self.web.clone(),
			source,
		})
	}
}

async fn run_tool(program: &str, args: &[&OsStr], timeout: Duration) -> Result<Vec<u8>, ToolError> {
	let mut cmd = Command::new(program);
	cmd.args(args)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true);

	trace!(program, args = ?args, "running stack walker");

	let output = match tokio::time::timeout(timeout, cmd.output()).await {
		Ok(result) => result.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				warn!(program, "stack walker not found in PATH");
				ToolError::NotInstalled {
					program: program.to_string(),
				}
			} else {
				ToolError::Io {
					program: program.to_string(),
					source: e,
				}
			}
		})?,
		Err(_) => {
			return Err(ToolError::TimedOut {
				program: program.to_string(),
				timeout,
			})
		}
	};

	if !output.status.success() {
		return Err(ToolError::Failed {
			program: program.to_string(),
			status: output.status.to_string(),
			stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
		});
	}

	debug!(program, bytes = output.stdout.len(), "stack walker finished");
	Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;
	use std::os::unix::fs::PermissionsExt;

	fn script(dir: &Path, name: &str, body: &str) -> String {
		let path = dir.join(name);
		std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
		std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
		path.to_string_lossy().into_owned()
	}

	#[tokio::test]
	async fn parses_native_output() {
		let dir = tempfile::tempdir().unwrap();
		let native = script(
			dir.path(),
			"stackwalker",
			r#"echo '{"crash_info":{"type":"SIGSEGV","address":"0x0"},"modules":[]}'"#,
		);
		let walker = CommandStackWalker::new(native, "unused", Duration::from_secs(10));

		let context = walker
			.walk_minidump(Path::new("/dev/null"), dir.path())
			.await
			.unwrap();
		assert_eq!(context.crash_info.kind, "SIGSEGV");
	}

	#[tokio::test]
	async fn passes_symbol_files_to_web_walker() {
		let dir = tempfile::tempdir().unwrap();
		let web = script(
			dir.path(),
			"webstackwalker",
			r#"printf '['; first=1; for a in "$@"; do [ $first -eq 1 ] || printf ','; printf '"%s"' "$(basename "$a")"; first=0; done; printf ']'"#,
		);
		let walker = CommandStackWalker::new("unused", web, Duration::from_secs(10));

		let trace = walker
			.walk_webdump(
				Path::new("/tmp/dump.txt"),
				&[PathBuf::from("/s/file.symbol"), PathBuf::from("/s/1.file.symbol")],
			)
			.await
			.unwrap();
		assert_eq!(trace, vec!["dump.txt", "file.symbol", "1.file.symbol"]);
	}

	#[tokio::test]
	async fn nonzero_exit_is_failure() {
		let dir = tempfile::tempdir().unwrap();
		let native = script(dir.path(), "stackwalker", "echo broken >&2; exit 3");
		let walker = CommandStackWalker::new(native, "unused", Duration::from_secs(10));

		let err = walker
			.walk_minidump(Path::new("/dev/null"), dir.path())
			.await
			.unwrap_err();
		assert!(matches!(err, ToolError::Failed { ref stderr, .. } if stderr == "broken"));
	}

	#[tokio::test]
	async fn slow_tool_times_out() {
		let dir = tempfile::tempdir().unwrap();
		let native = script(dir.path(), "stackwalker", "sleep 5");
		let walker = CommandStackWalker::new(native, "unused", Duration::from_millis(100));

		let err = walker
			.walk_minidump(Path::new("/dev/null"), dir.path())
			.await
			.unwrap_err();
		assert!(matches!(err, ToolError::TimedOut { .. }));
	}

	#[tokio::test]
	async fn missing_tool_is_reported() {
		let walker = CommandStackWalker::new(
			"/nonexistent/stackwalker",
			"unused",
			Duration::from_secs(1),
		);
		let err = walker
			.walk_minidump(Path::new("/dev/null"), Path::new("/tmp"))
			.await
			.unwrap_err();
		assert!(matches!(err, ToolError::NotInstalled { .. }));
	}

	#[tokio::test]
	async fn garbage_output_is_parse_error() {
		let dir = tempfile::tempdir().unwrap();
		let web = script(dir.path(), "webstackwalker", "echo not-json");
		let walker = CommandStackWalker::new("unused", web, Duration::from_secs(10));

		let err = walker
			.walk_webdump(Path::new("/dev/null"), &[])
			.await
			.unwrap_err();
		assert!(matches!(err, ToolError::Parse { .. }));
	}
}
