// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash processing worker binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use crashworks_config::{load_config_with_file, CacheBackend};
use crashworks_processor::{
	logging, spawn_signal_forwarder, AmqpBroker, CommandStackWalker, ProcessorService,
};
use crashworks_store::{
	Cache, CachedCrashRepository, ElasticDocumentStore, MemcacheCache, MemoryCache, RedisCache,
	REPORT_KEYWORD_FIELDS, SYMBOL_KEYWORD_FIELDS,
};

mod version;

/// Crashworks processor - turns uploaded dumps and symbols into crash reports.
#[derive(Parser, Debug)]
#[command(
	name = "crashworks-processor",
	about = "Crash processing worker",
	version
)]
struct Args {
	/// Path to the TOML configuration file
	#[arg(long, env = "CRASHWORKS_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	let config_path = args
		.config
		.context("--config (or CRASHWORKS_CONFIG) is required")?;
	let config = load_config_with_file(&config_path)
		.with_context(|| format!("loading {}", config_path.display()))?;

	let log_control = Arc::new(logging::init(&config.logging));

	tracing::info!(
		version = version::VERSION,
		build = version::build_id(),
		queue = %config.broker.queue,
		store = %config.store.url,
		cache = config.cache.backend().kind(),
		"starting crashworks-processor"
	);

	tokio::fs::create_dir_all(&config.symbols.root)
		.await
		.with_context(|| format!("creating symbols root {}", config.symbols.root.display()))?;

	let store = ElasticDocumentStore::new(
		&config.store.url,
		Duration::from_secs(config.store.request_timeout_secs),
	)?;
	store
		.ensure_index(&config.store.symbols_index, SYMBOL_KEYWORD_FIELDS)
		.await
		.context("creating symbols index")?;
	store
		.ensure_index(&config.store.reports_index, REPORT_KEYWORD_FIELDS)
		.await
		.context("creating reports index")?;

	let cache: Arc<dyn Cache> = match config.cache.backend() {
		CacheBackend::Memcache { servers } => {
			Arc::new(MemcacheCache::connect(&servers, config.cache.ttl_secs).await?)
		}
		CacheBackend::Redis { address, password } => {
			Arc::new(RedisCache::connect(&address, password, config.cache.ttl_secs).await?)
		}
		CacheBackend::Memory => Arc::new(MemoryCache::new()),
	};

	let repository = Arc::new(
		CachedCrashRepository::new(
			Arc::new(store),
			cache,
			config.store.symbols_index.clone(),
			config.store.reports_index.clone(),
		)
		.with_cache_timeout(Duration::from_millis(config.cache.timeout_ms)),
	);
	let walker = Arc::new(CommandStackWalker::from_config(&config.tools));
	let broker = AmqpBroker::connect(&config.broker)
		.await
		.context("connecting to broker")?;

	let signals = spawn_signal_forwarder().context("installing signal handlers")?;
	let service = ProcessorService::new(config_path, config, broker, repository, walker)?
		.with_log_control(log_control);

	service.run(signals).await?;
	tracing::info!("crashworks-processor stopped");
	Ok(())
}
