// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Browser crash processing.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, error, instrument, warn};

use crashworks_core::{
	Context, Frame, Info, Report, ReportWithId, Thread, WebDumpTask, WEB_PLATFORM, WEB_SYMBOL_FILE,
};
use crashworks_store::CrashRepository;

use super::read_info;
use crate::cleanup::TaskFiles;
use crate::pipeline::Pipeline;
use crate::tools::StackWalker;

const UNKNOWN: &str = "unknown";

static BROWSER_TOKEN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)(?:firefox|chrome)/[\d.]+").unwrap());

pub struct WebdumpHandler {
	repository: Arc<dyn CrashRepository>,
	walker: Arc<dyn StackWalker>,
	pipeline: Pipeline,
}

impl WebdumpHandler {
	pub fn new(
		repository: Arc<dyn CrashRepository>,
		walker: Arc<dyn StackWalker>,
		pipeline: Pipeline,
	) -> Self {
		Self {
			repository,
			walker,
			pipeline,
		}
	}

	#[cfg(test)]
	pub(crate) fn pipeline(&self) -> &Pipeline {
		&self.pipeline
	}

	#[instrument(skip(self, task), fields(dump = %task.path.display()))]
	pub async fn handle(&self, task: WebDumpTask) -> Option<ReportWithId> {
		let _files = TaskFiles::new(task.files());

		let info = match read_info(&task.info).await {
			Ok(info) => info,
			Err(e) => {
				error!(error = %e, "Can't read webinfo");
				return None;
			}
		};
		if info.is_developer_build() {
			debug!("Skipped developers' dump");
			return None;
		}

		let symbols = match self
			.repository
			.get_symbol_for_platform(WEB_PLATFORM, &info.version)
			.await
		{
			Ok(Some(symbols)) => symbols,
			Ok(None) => {
				debug!(version = %info.version, "No web symbols for version");
				return None;
			}
			Err(e) => {
				warn!(version = %info.version, error = %e, "Can't search symbols for web");
				return None;
			}
		};

		let symbol_files = list_symbol_files(&symbols.storage_dir).await;
		let trace = match self.walker.walk_webdump(&task.path, &symbol_files).await {
			Ok(trace) => trace,
			Err(e) => {
				error!(symbols = %symbols.storage_dir.display(), error = %e, "Can't run web stack walker");
				return None;
			}
		};

		let raw_dump = match tokio::fs::read(&task.path).await {
			Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
			Err(e) => {
				warn!(error = %e, "Can't read web dump");
				return None;
			}
		};

		let report = self.build_report(&trace, &info, raw_dump, &task);
		match self.repository.add_report(&report).await {
			Ok(id) => {
				debug!(report_id = %id, signature = %report.signature, "stored web crash report");
				Some(ReportWithId { report, id })
			}
			Err(e) => {
				error!(report_id = %e.id, error = %e.source, "Can't store web crash report");
				None
			}
		}
	}

	fn build_report(&self, trace: &[String], info: &Info, raw_dump: String, task: &WebDumpTask) -> Report {
		let mut report = Report::new(synthesize_context(trace, info), task.time);
		report.platform = WEB_PLATFORM.to_string();
		report.build_version = info.version.clone();
		report.gpu = info.gpu.clone();
		report.user_id = info.user_id();
		report.raw_crash = raw_dump;

		self.pipeline.run(&mut report, info);

		// Short single-message dumps are their own signature.
		if report.signature.is_empty() && report.raw_crash.matches('\n').count() <= 2 {
			report.signature = report.raw_crash.clone();
		}
		report
	}
}

fn browser_token(browser: &str) -> &str {
	BROWSER_TOKEN
		.find(browser)
		.map(|m| m.as_str())
		.unwrap_or(browser)
}

fn synthesize_context(trace: &[String], info: &Info) -> Context {
	let frames: Vec<Frame> = trace
		.iter()
		.enumerate()
		.map(|(i, function)| Frame {
			index: i as u32,
			function: function.clone(),
			..Default::default()
		})
		.collect();

	let mut context = Context::default();
	context.system_info.cpu_count = 1;
	context.system_info.os = info.platform.clone();
	context.system_info.os_version = browser_token(&info.browser).to_string();
	context.crash_info.address = UNKNOWN.to_string();
	context.crash_info.kind = UNKNOWN.to_string();
	context.crash_info.thread = 1;
	context.threads = vec![Thread {
		frame_count: frames.len() as u32,
		frames: frames.clone(),
	}];
	context.crashing_thread.frames = frames;
	context
}

/// Files of a web symbol set, in name order.
async fn list_symbol_files(dir: &Path) -> Vec<PathBuf> {
	let mut entries = match tokio::fs::read_dir(dir).await {
		Ok(entries) => entries,
		Err(e) => {
			warn!(path = %dir.display(), error = %e, "Can't list web symbols");
			return Vec::new();
		}
	};

	let mut files = Vec::new();
	loop {
		match entries.next_entry().await {
			Ok(Some(entry)) => {
				if entry.file_name().to_string_lossy().contains(WEB_SYMBOL_FILE) {
					files.push(entry.path());
				}
			}
			Ok(None) => break,
			Err(e) => {
				warn!(path = %dir.display(), error = %e, "Can't list web symbols");
				break;
			}
		}
	}
	files.sort();
	files
}
