// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Native minidump processing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use crashworks_core::{Context, DumpTask, Info, Report, ReportWithId};
use crashworks_store::CrashRepository;

use super::{normalize_platform, read_info};
use crate::cleanup::TaskFiles;
use crate::pipeline::Pipeline;
use crate::tools::StackWalker;

const NO_LOG: &str = "No log";

pub struct MinidumpHandler {
	symbols_root: PathBuf,
	repository: Arc<dyn CrashRepository>,
	walker: Arc<dyn StackWalker>,
	pipeline: Pipeline,
}

impl MinidumpHandler {
	pub fn new(
		symbols_root: PathBuf,
		repository: Arc<dyn CrashRepository>,
		walker: Arc<dyn StackWalker>,
		pipeline: Pipeline,
	) -> Self {
		Self {
			symbols_root,
			repository,
			walker,
			pipeline,
		}
	}

	#[instrument(skip(self, task), fields(dump = %task.path.display()))]
	pub async fn handle(&self, task: DumpTask) -> Option<ReportWithId> {
		let _files = TaskFiles::new(task.files());

		let info = read_info(&task.info).await.unwrap_or_else(|e| {
			debug!(error = %e, "Can't read info file, using defaults");
			Info::default()
		});
		if info.is_developer_build() {
			debug!("Skipped developers' dump");
			return None;
		}

		let context = match self.walker.walk_minidump(&task.path, &self.symbols_root).await {
			Ok(context) => context,
			Err(e) => {
				error!(error = %e, "Can't read stackwalker output");
				return None;
			}
		};
		if context.modules.is_empty() {
			debug!(status = %context.status, "Crash report has no modules");
			return None;
		}

		let debug_id = context.symbolicated_debug_id().to_string();
		let version = match self.repository.get_symbol(&debug_id).await {
			Ok(Some(symbol)) => symbol.version,
			Ok(None) => {
				warn!(debug_id = %debug_id, version = %info.version, "No symbols registered for debug id");
				return None;
			}
			Err(e) => {
				warn!(debug_id = %debug_id, error = %e, "Can't get version for debug id");
				return None;
			}
		};

		let log = read_log(task.log.as_deref()).await;
		let report = self.build_report(context, version, &info, log, &task);

		match self.repository.add_report(&report).await {
			Ok(id) => {
				debug!(report_id = %id, signature = %report.signature, "stored crash report");
				Some(ReportWithId { report, id })
			}
			Err(e) => {
				error!(report_id = %e.id, error = %e.source, "Can't store crash report");
				None
			}
		}
	}

	fn build_report(
		&self,
		context: Context,
		version: String,
		info: &Info,
		log: String,
		task: &DumpTask,
	) -> Report {
		let platform = normalize_platform(&context.system_info.os);
		let mut report = Report::new(context, task.time);
		report.user_id = info.user_id();
		report.build_version = version;
		report.platform = platform;
		report.gpu = info.gpu.clone();
		report.ram = info.ram.clone();
		report.log = log;

		self.pipeline.run(&mut report, info);
		report.context.system_info.cpu_info = info.cpu.clone();
		report
	}
}

async fn read_log(path: Option<&Path>) -> String {
	let Some(path) = path else {
		return NO_LOG.to_string();
	};
	match tokio::fs::read(path).await {
		Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
		Err(e) => {
			warn!(path = %path.display(), error = %e, "Can't read log file");
			NO_LOG.to_string()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::testing::ScriptedWalker;
	use crashworks_core::{Frame, Module, SymbolRecord, SystemInfo, DEVELOPER_VERSION};
	use crashworks_store::{CachedCrashRepository, MemoryCache, MemoryDocumentStore};

	struct Fixture {
		staging: tempfile::TempDir,
		store: Arc<MemoryDocumentStore>,
		repository: Arc<CachedCrashRepository>,
	}

	fn fixture() -> Fixture {
		let store = Arc::new(MemoryDocumentStore::new());
		let repository = Arc::new(CachedCrashRepository::new(
			store.clone(),
			Arc::new(MemoryCache::new()),
			"symbols",
			"reports",
		));
		Fixture {
			staging: tempfile::tempdir().unwrap(),
			store,
			repository,
		}
	}

	impl Fixture {
		fn handler(&self, walker: Arc<ScriptedWalker>) -> MinidumpHandler {
			MinidumpHandler::new(
				PathBuf::from("/srv/symbols"),
				self.repository.clone(),
				walker,
				Pipeline::native(r"iq\s*option").unwrap(),
			)
		}

		fn task(&self, info: &str, log: Option<&str>) -> DumpTask {
			let dump = self.staging.path().join("d1.dmp");
			let info_path = self.staging.path().join("d1.json");
			std::fs::write(&dump, b"MDMP").unwrap();
			std::fs::write(&info_path, info).unwrap();
			let log = log.map(|content| {
				let path = self.staging.path().join("d1.log");
				std::fs::write(&path, content).unwrap();
				path
			});
			DumpTask::new(dump, info_path, log)
		}

		fn staged_files(&self) -> usize {
			std::fs::read_dir(self.staging.path()).unwrap().count()
		}

		async fn register(&self, debug_id: &str, version: &str) {
			self
				.repository
				.add_symbol(&SymbolRecord::new(debug_id, version, "windows", "/srv/symbols/app"))
				.await
				.unwrap();
		}
	}

	fn context() -> Context {
		let mut context = Context {
			modules: vec![
				Module {
					debug_id: "AAA".to_string(),
					..Default::default()
				},
				Module {
					debug_id: "BBB".to_string(),
					loaded_symbols: true,
					..Default::default()
				},
			],
			system_info: SystemInfo {
				os: "Windows NT".to_string(),
				..Default::default()
			},
			..Default::default()
		};
		context.crash_info.kind = "EXCEPTION_ACCESS_VIOLATION_READ".to_string();
		context.crash_info.address = "0x0".to_string();
		context.crashing_thread.frames = vec![
			Frame {
				function: "memcpy".to_string(),
				module: "ntdll.dll".to_string(),
				file: "memcpy.asm".to_string(),
				line: 3,
				..Default::default()
			},
			Frame {
				function: "Chart::draw".to_string(),
				module: "IQOption.exe".to_string(),
				file: "chart.cpp".to_string(),
				line: 88,
				..Default::default()
			},
		];
		context
	}

	const INFO: &str = r#"{"version":"5.1.0","cpu":"Intel i7","ram":"16GB","userid":"77","gpu":{"vendor":"NVIDIA","renderer":"GTX"}}"#;

	#[tokio::test]
	async fn builds_and_persists_report() {
		let f = fixture();
		f.register("BBB", "5.1.0-build7").await;
		let handler = f.handler(Arc::new(ScriptedWalker::with_context(context())));

		let published = handler.handle(f.task(INFO, Some("line1\nline2"))).await.unwrap();
		let report = &published.report;

		assert_eq!(report.build_version, "5.1.0-build7");
		assert_eq!(report.platform, "win");
		assert_eq!(report.signature, "Chart::draw");
		assert_eq!(report.source, "chart.cpp:88");
		assert_eq!(report.crash_type, "EXCEPTION_ACCESS_VIOLATION_READ");
		assert_eq!(report.address, "0x0");
		assert_eq!(report.user_id, 77);
		assert_eq!(report.gpu.vendor, "NVIDIA");
		assert_eq!(report.ram, "16GB");
		assert_eq!(report.log, "line1\nline2");
		assert_eq!(report.context.system_info.cpu_info, "Intel i7");

		let stored = f.store.documents("reports");
		assert_eq!(stored.len(), 1);
		assert_eq!(stored[0]["id"], published.id.to_string());
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn missing_log_is_marked() {
		let f = fixture();
		f.register("BBB", "5.1.0").await;
		let handler = f.handler(Arc::new(ScriptedWalker::with_context(context())));

		let published = handler.handle(f.task(INFO, None)).await.unwrap();
		assert_eq!(published.report.log, "No log");
	}

	#[tokio::test]
	async fn developer_build_is_discarded_without_work() {
		let f = fixture();
		let walker = Arc::new(ScriptedWalker::with_context(context()));
		let handler = f.handler(walker.clone());
		let info = format!(r#"{{"version":"{DEVELOPER_VERSION}"}}"#);

		assert!(handler.handle(f.task(&info, Some("log"))).await.is_none());
		assert_eq!(walker.calls(), 0);
		assert_eq!(f.store.write_count(), 0);
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn unknown_debug_id_produces_no_report() {
		let f = fixture();
		let handler = f.handler(Arc::new(ScriptedWalker::with_context(context())));

		assert!(handler.handle(f.task(INFO, None)).await.is_none());
		assert!(f.store.documents("reports").is_empty());
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn walker_failure_produces_no_report() {
		let f = fixture();
		let handler = f.handler(Arc::new(ScriptedWalker::default()));

		assert!(handler.handle(f.task(INFO, Some("log"))).await.is_none());
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn context_without_modules_produces_no_report() {
		let f = fixture();
		let handler = f.handler(Arc::new(ScriptedWalker::with_context(Context::default())));

		assert!(handler.handle(f.task(INFO, None)).await.is_none());
		assert_eq!(f.store.write_count(), 0);
	}

	#[tokio::test]
	async fn unreadable_info_falls_back_to_defaults() {
		let f = fixture();
		f.register("BBB", "5.1.0").await;
		let handler = f.handler(Arc::new(ScriptedWalker::with_context(context())));

		let published = handler.handle(f.task("garbage", None)).await.unwrap();
		assert_eq!(published.report.user_id, 0);
		assert!(published.report.context.system_info.cpu_info.is_empty());
	}

	#[tokio::test]
	async fn persist_failure_is_not_republished() {
		let f = fixture();
		f.register("BBB", "5.1.0").await;
		let handler = f.handler(Arc::new(ScriptedWalker::with_context(context())));
		f.store.set_unavailable(true);

		assert!(handler.handle(f.task(INFO, None)).await.is_none());
		assert_eq!(f.staged_files(), 0);
	}
}
