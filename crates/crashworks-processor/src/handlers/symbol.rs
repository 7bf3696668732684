// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Symbol registration.
//!
//! Native symbol files are stored as `<root>/<module>/<debug id>/<stem>.sym`
//! and deduplicated by debug id. Browser symbol sets have no debug id and get
//! a fresh directory under `<root>/WebSymbols/` on every submission.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crashworks_core::{ModuleHeader, SymbolDescription, SymbolRecord, SymbolTask, WEB_PLATFORM, WEB_SYMBOL_FILE};
use crashworks_store::CrashRepository;

use super::{relocate, HandlerError};
use crate::cleanup::TaskFiles;

const WEB_SYMBOLS_DIR: &str = "WebSymbols";
const DESCRIPTION_FILE: &str = "info.json";

pub struct SymbolHandler {
	symbols_root: PathBuf,
	repository: Arc<dyn CrashRepository>,
}

impl SymbolHandler {
	pub fn new(symbols_root: PathBuf, repository: Arc<dyn CrashRepository>) -> Self {
		Self {
			symbols_root,
			repository,
		}
	}

	#[instrument(skip(self, task), fields(info = %task.info.display()))]
	pub async fn handle(&self, task: SymbolTask) -> Result<(), HandlerError> {
		let _files = TaskFiles::new(task.files());

		let description = match read_description(&task.info).await {
			Ok(description) => description,
			Err(e) => {
				warn!(error = %e, "Can't read symbol description file");
				return Ok(());
			}
		};
		debug!(platform = %description.platform, version = %description.version, "handling symbols");

		if description.is_web() {
			self.store_web(&task, &description).await
		} else {
			self.store_native(&task, &description).await
		}
	}

	async fn store_web(
		&self,
		task: &SymbolTask,
		description: &SymbolDescription,
	) -> Result<(), HandlerError> {
		let id = Uuid::now_v7().to_string();
		let dir = self.symbols_root.join(WEB_SYMBOLS_DIR).join(&id);
		if let Err(e) = tokio::fs::create_dir_all(&dir).await {
			error!(path = %dir.display(), error = %e, "Can't create target symbols dir");
			return Ok(());
		}

		for (i, file) in task.symbol_files().into_iter().enumerate() {
			let name = if i == 0 {
				WEB_SYMBOL_FILE.to_string()
			} else {
				format!("{i}.{WEB_SYMBOL_FILE}")
			};
			if let Err(e) = relocate(file, &dir.join(name)).await {
				error!(path = %file.display(), error = %e, "Can't move symbol file into target dir");
				return Ok(());
			}
		}
		if let Err(e) = relocate(&task.info, &dir.join(DESCRIPTION_FILE)).await {
			error!(path = %task.info.display(), error = %e, "Can't move info file into target dir");
			return Ok(());
		}

		self
			.register(SymbolRecord::new(id, &description.version, WEB_PLATFORM, dir))
			.await
	}

	async fn store_native(
		&self,
		task: &SymbolTask,
		description: &SymbolDescription,
	) -> Result<(), HandlerError> {
		let Some(symbol_file) = task.symbol_files().into_iter().next() else {
			warn!("Symbol task carries no symbol file");
			return Ok(());
		};

		let header = match read_header(symbol_file).await {
			Some(header) => header,
			None => {
				warn!(path = %symbol_file.display(), "Can't extract info from symbol file");
				return Ok(());
			}
		};

		let exists = self
			.repository
			.symbol_exists(&header.debug_id)
			.await
			.map_err(|source| HandlerError::SymbolLookup {
				debug_id: header.debug_id.clone(),
				source,
			})?;
		if exists {
			warn!(debug_id = %header.debug_id, "Symbol file already registered");
			return Ok(());
		}

		let dir = self.symbols_root.join(&header.name).join(&header.debug_id);
		if let Err(e) = tokio::fs::create_dir_all(&dir).await {
			error!(path = %dir.display(), error = %e, "Can't create target symbols dir");
			return Ok(());
		}

		let target = dir.join(format!("{}.sym", header.file_stem()));
		if let Err(e) = relocate(symbol_file, &target).await {
			error!(path = %symbol_file.display(), error = %e, "Can't move symbol file into target dir");
			return Ok(());
		}
		if let Err(e) = relocate(&task.info, &dir.join(DESCRIPTION_FILE)).await {
			error!(path = %task.info.display(), error = %e, "Can't move info file into target dir");
			return Ok(());
		}

		self
			.register(SymbolRecord::new(
				&header.debug_id,
				&description.version,
				&header.os,
				dir,
			))
			.await
	}

	async fn register(&self, record: SymbolRecord) -> Result<(), HandlerError> {
		self
			.repository
			.add_symbol(&record)
			.await
			.map_err(|source| HandlerError::SymbolRegistration {
				debug_id: record.debug_id.clone(),
				source,
			})?;
		info!(
			debug_id = %record.debug_id,
			platform = %record.platform,
			version = %record.version,
			path = %record.storage_dir.display(),
			"registered symbols"
		);
		Ok(())
	}
}

async fn read_description(path: &Path) -> std::io::Result<SymbolDescription> {
	let bytes = tokio::fs::read(path).await?;
	Ok(serde_json::from_slice(&bytes)?)
}

async fn read_header(path: &Path) -> Option<ModuleHeader> {
	let file = match tokio::fs::File::open(path).await {
		Ok(file) => file,
		Err(e) => {
			error!(path = %path.display(), error = %e, "Can't open symbol file");
			return None;
		}
	};

	let mut line = String::new();
	if let Err(e) = BufReader::new(file).read_line(&mut line).await {
		error!(path = %path.display(), error = %e, "Can't read symbol file");
		return None;
	}
	ModuleHeader::parse(&line)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crashworks_store::{CachedCrashRepository, MemoryCache, MemoryDocumentStore};

	const HEADER: &str = "MODULE Linux x86_64 0D2FBC3D7A8A3C54F5DB7A5E1EC0F5BA0 libcore.so\nFILE 0 core.cpp\n";
	const DEBUG_ID: &str = "0D2FBC3D7A8A3C54F5DB7A5E1EC0F5BA0";

	struct Fixture {
		staging: tempfile::TempDir,
		symbols: tempfile::TempDir,
		store: Arc<MemoryDocumentStore>,
		handler: SymbolHandler,
	}

	fn fixture() -> Fixture {
		let staging = tempfile::tempdir().unwrap();
		let symbols = tempfile::tempdir().unwrap();
		let store = Arc::new(MemoryDocumentStore::new());
		let repository = Arc::new(CachedCrashRepository::new(
			store.clone(),
			Arc::new(MemoryCache::new()),
			"symbols",
			"reports",
		));
		let handler = SymbolHandler::new(symbols.path().to_path_buf(), repository);
		Fixture {
			staging,
			symbols,
			store,
			handler,
		}
	}

	impl Fixture {
		fn stage(&self, name: &str, content: &str) -> PathBuf {
			let path = self.staging.path().join(name);
			std::fs::write(&path, content).unwrap();
			path
		}

		fn native_task(&self, tag: &str) -> SymbolTask {
			let sym = self.stage(&format!("{tag}.sym"), HEADER);
			let info = self.stage(&format!("{tag}.json"), r#"{"version":"1.2.3","platform":"linux"}"#);
			SymbolTask::new(vec![sym], info)
		}

		fn staged_files(&self) -> usize {
			std::fs::read_dir(self.staging.path()).unwrap().count()
		}
	}

	#[tokio::test]
	async fn stores_native_symbol() {
		let f = fixture();
		f.handler.handle(f.native_task("a")).await.unwrap();

		let dir = f.symbols.path().join("libcore.so").join(DEBUG_ID);
		assert!(dir.join("libcore.sym").exists());
		assert!(dir.join("info.json").exists());
		assert_eq!(f.staged_files(), 0);

		let docs = f.store.documents("symbols");
		assert_eq!(docs.len(), 1);
		assert_eq!(docs[0]["debugId"], DEBUG_ID);
		assert_eq!(docs[0]["platform"], "Linux");
		assert_eq!(docs[0]["build"], "1.2.3");
	}

	#[tokio::test]
	async fn duplicate_debug_id_is_dropped() {
		let f = fixture();
		f.handler.handle(f.native_task("a")).await.unwrap();
		f.handler.handle(f.native_task("b")).await.unwrap();

		assert_eq!(f.store.write_count(), 1);
		assert_eq!(f.staged_files(), 0);
		let dir = f.symbols.path().join("libcore.so").join(DEBUG_ID);
		assert_eq!(std::fs::read_dir(dir).unwrap().count(), 2);
	}

	#[tokio::test]
	async fn unreachable_registry_is_fatal() {
		let f = fixture();
		f.store.set_unavailable(true);

		let err = f.handler.handle(f.native_task("a")).await.unwrap_err();
		assert!(matches!(err, HandlerError::SymbolLookup { ref debug_id, .. } if debug_id == DEBUG_ID));
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn non_symbol_file_is_discarded() {
		let f = fixture();
		let sym = f.stage("bad.sym", "PK\x03\x04 not a symbol file\n");
		let info = f.stage("bad.json", r#"{"version":"1.0","platform":"linux"}"#);

		f.handler.handle(SymbolTask::new(vec![sym], info)).await.unwrap();

		assert_eq!(f.store.write_count(), 0);
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn header_cannot_escape_symbols_root() {
		let f = fixture();
		let outer = tempfile::tempdir().unwrap();
		let root = outer.path().join("symbols");
		let repository = Arc::new(CachedCrashRepository::new(
			f.store.clone(),
			Arc::new(MemoryCache::new()),
			"symbols",
			"reports",
		));
		let handler = SymbolHandler::new(root.clone(), repository);

		for (tag, header) in [
			("rel", "MODULE Linux x86_64 ABC ../escaped\n"),
			("abs", "MODULE Linux x86_64 ABC /tmp/escaped\n"),
			("id", "MODULE Linux x86_64 ../../escaped libcore.so\n"),
		] {
			let sym = f.stage(&format!("{tag}.sym"), header);
			let info = f.stage(&format!("{tag}.json"), r#"{"version":"1.0","platform":"linux"}"#);
			handler.handle(SymbolTask::new(vec![sym], info)).await.unwrap();
		}

		assert!(!outer.path().join("escaped").exists());
		assert!(!root.exists());
		assert_eq!(f.store.write_count(), 0);
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn unreadable_description_is_discarded() {
		let f = fixture();
		let sym = f.stage("a.sym", HEADER);
		let info = f.stage("a.json", "not json");

		f.handler.handle(SymbolTask::new(vec![sym], info)).await.unwrap();

		assert_eq!(f.store.write_count(), 0);
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn stores_web_symbol_set() {
		let f = fixture();
		let first = f.stage("main.map", "{}");
		let second = f.stage("vendor.map", "{}");
		let info = f.stage("web.json", r#"{"version":"2.0","platform":"web"}"#);

		f.handler
			.handle(SymbolTask::new(vec![first, second], info))
			.await
			.unwrap();

		let docs = f.store.documents("symbols");
		assert_eq!(docs.len(), 1);
		assert_eq!(docs[0]["platform"], "web");
		assert_eq!(docs[0]["build"], "2.0");

		let dir = PathBuf::from(docs[0]["path"].as_str().unwrap());
		assert!(dir.starts_with(f.symbols.path().join("WebSymbols")));
		assert!(dir.join("file.symbol").exists());
		assert!(dir.join("1.file.symbol").exists());
		assert!(dir.join("info.json").exists());
		assert_eq!(f.staged_files(), 0);
	}

	#[tokio::test]
	async fn web_symbols_are_never_deduplicated() {
		let f = fixture();
		for tag in ["a", "b"] {
			let sym = f.stage(&format!("{tag}.map"), "{}");
			let info = f.stage(&format!("{tag}.json"), r#"{"version":"2.0","platform":"web"}"#);
			f.handler.handle(SymbolTask::new(vec![sym], info)).await.unwrap();
		}
		assert_eq!(f.store.write_count(), 2);
	}
}
