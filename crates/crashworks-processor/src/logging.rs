// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing subscriber setup with a runtime-adjustable level.

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crashworks_config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
	#[error("can't swap log filter: {0}")]
	Reload(#[from] reload::Error),
}

/// Changes the active log level of a running process.
pub trait LogControl: Send + Sync {
	fn set_level(&self, level: LevelFilter) -> Result<(), LoggingError>;
}

pub struct FilterHandle(reload::Handle<EnvFilter, Registry>);

impl LogControl for FilterHandle {
	fn set_level(&self, level: LevelFilter) -> Result<(), LoggingError> {
		self.0.reload(EnvFilter::default().add_directive(level.into()))?;
		Ok(())
	}
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level until the first reload that changes it.
pub fn init(config: &LoggingConfig) -> FilterHandle {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::default().add_directive(config.level.into()));
	let (filter, handle) = reload::Layer::new(filter);
	let registry = tracing_subscriber::registry().with(filter);

	match config.format {
		LogFormat::Json => registry.with(fmt::layer().json()).init(),
		LogFormat::Text => registry.with(fmt::layer()).init(),
	}

	FilterHandle(handle)
}
