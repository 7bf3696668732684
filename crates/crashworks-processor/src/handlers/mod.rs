// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Task handlers.
//!
//! Handlers own every file referenced by their task and remove what is left
//! of them on return. Business rejections (developer builds, unknown
//! symbols, stack walker failures) are logged and end the task normally; only
//! losing the symbol registry is reported as an error.

mod minidump;
mod symbol;
mod webdump;

pub use minidump::MinidumpHandler;
pub use symbol::SymbolHandler;
pub use webdump::WebdumpHandler;

use std::io;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crashworks_config::ProcessorConfig;
use crashworks_core::{Info, ReportWithId, Task};
use crashworks_store::{CrashRepository, StoreError};

use crate::pipeline::{Pipeline, PipelineError};
use crate::tools::StackWalker;

/// Failures that must stop the processor. The task is returned to the queue.
#[derive(Debug, Error)]
pub enum HandlerError {
	#[error("can't check symbol {debug_id} in repository: {source}")]
	SymbolLookup {
		debug_id: String,
		#[source]
		source: StoreError,
	},

	#[error("can't register symbol {debug_id}: {source}")]
	SymbolRegistration {
		debug_id: String,
		#[source]
		source: StoreError,
	},
}

/// One handler per task kind, built together from a single configuration.
pub struct Handlers {
	symbol: SymbolHandler,
	minidump: MinidumpHandler,
	webdump: WebdumpHandler,
}

impl Handlers {
	pub fn build(
		config: &ProcessorConfig,
		repository: Arc<dyn CrashRepository>,
		walker: Arc<dyn StackWalker>,
	) -> Result<Self, PipelineError> {
		let native = Pipeline::native(&config.pipeline.vendor_module_pattern)?;
		let web = Pipeline::web(&config.pipeline.web_blacklist)?;
		let symbols_root = config.symbols.root.clone();

		Ok(Self {
			symbol: SymbolHandler::new(symbols_root.clone(), Arc::clone(&repository)),
			minidump: MinidumpHandler::new(
				symbols_root,
				Arc::clone(&repository),
				Arc::clone(&walker),
				native,
			),
			webdump: WebdumpHandler::new(repository, walker, web),
		})
	}

	/// Process one task. `Ok(Some(_))` carries a persisted report to republish.
	pub async fn handle(&self, task: Task) -> Result<Option<ReportWithId>, HandlerError> {
		match task {
			Task::Symbol(task) => self.symbol.handle(task).await.map(|()| None),
			Task::Dump(task) => Ok(self.minidump.handle(task).await),
			Task::WebDump(task) => Ok(self.webdump.handle(task).await),
		}
	}

	#[cfg(test)]
	pub(crate) fn web_pipeline(&self) -> &Pipeline {
		self.webdump.pipeline()
	}
}

/// Move `from` to `to`, copying across filesystems when a rename is refused.
pub(crate) async fn relocate(from: &Path, to: &Path) -> io::Result<()> {
	match tokio::fs::rename(from, to).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
		Err(e) => {
			debug!(from = %from.display(), to = %to.display(), error = %e, "rename failed, copying");
			tokio::fs::copy(from, to).await?;
			if let Err(e) = tokio::fs::remove_file(from).await {
				warn!(path = %from.display(), error = %e, "Can't remove relocated file");
			}
			Ok(())
		}
	}
}

pub(crate) async fn read_info(path: &Path) -> io::Result<Info> {
	let bytes = tokio::fs::read(path).await?;
	Ok(Info::from_slice(&bytes)?)
}

/// Short platform tag from a stack walker OS name.
pub(crate) fn normalize_platform(os: &str) -> String {
	let os = os.to_lowercase();
	if os.contains("linux") {
		"lin".to_string()
	} else if os.contains("mac") {
		"mac".to_string()
	} else if os.contains("windows") {
		"win".to_string()
	} else {
		os
	}
}

#[cfg(test)]
pub(crate) mod testing {
	//! Fakes shared by the handler and service tests.

	use std::collections::VecDeque;
	use std::path::{Path, PathBuf};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	use async_trait::async_trait;
	use crashworks_core::Context;

	use crate::tools::{StackWalker, ToolError};

	/// Stack walker that replays canned results and counts invocations.
	#[derive(Default)]
	pub struct ScriptedWalker {
		pub native: Mutex<VecDeque<Result<Context, ToolError>>>,
		pub web: Mutex<VecDeque<Result<Vec<String>, ToolError>>>,
		pub web_args: Mutex<Vec<PathBuf>>,
		pub calls: AtomicUsize,
	}

	impl ScriptedWalker {
		pub fn with_context(context: Context) -> Self {
			let walker = Self::default();
			walker.native.lock().unwrap().push_back(Ok(context));
			walker
		}

		pub fn with_trace(trace: &[&str]) -> Self {
			let walker = Self::default();
			walker
				.web
				.lock()
				.unwrap()
				.push_back(Ok(trace.iter().map(|s| s.to_string()).collect()));
			walker
		}

		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}

	fn exhausted(program: &str) -> ToolError {
		ToolError::NotInstalled {
			program: program.to_string(),
		}
	}

	#[async_trait]
	impl StackWalker for ScriptedWalker {
		async fn walk_minidump(&self, _dump: &Path, _root: &Path) -> Result<Context, ToolError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.native
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or_else(|| Err(exhausted("stackwalker")))
		}

		async fn walk_webdump(
			&self,
			_dump: &Path,
			symbol_files: &[PathBuf],
		) -> Result<Vec<String>, ToolError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.web_args.lock().unwrap().extend_from_slice(symbol_files);
			self.web
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or_else(|| Err(exhausted("webstackwalker")))
		}
	}
}
