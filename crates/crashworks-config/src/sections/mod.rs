// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod broker;
mod cache;
mod logging;
mod pipeline;
mod store;
mod symbols;
mod tools;

pub use broker::{BrokerConfig, BrokerConfigLayer};
pub use cache::{CacheBackend, CacheConfig, CacheConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use pipeline::{PipelineConfig, PipelineConfigLayer, DEFAULT_VENDOR_MODULE_PATTERN};
pub use store::{StoreConfig, StoreConfigLayer};
pub use symbols::{SymbolsConfig, SymbolsConfigLayer};
pub use tools::{ToolsConfig, ToolsConfigLayer};
