// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration merged from every source.

use serde::Deserialize;

use crate::sections::{
	BrokerConfigLayer, CacheConfigLayer, LoggingConfigLayer, PipelineConfigLayer, StoreConfigLayer,
	SymbolsConfigLayer, ToolsConfigLayer,
};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfigLayer {
	#[serde(default)]
	pub symbols: Option<SymbolsConfigLayer>,
	#[serde(default)]
	pub broker: Option<BrokerConfigLayer>,
	#[serde(default)]
	pub store: Option<StoreConfigLayer>,
	#[serde(default)]
	pub cache: Option<CacheConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub pipeline: Option<PipelineConfigLayer>,
	#[serde(default)]
	pub tools: Option<ToolsConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $field:ident) => {
		if let Some(next) = $other.$field {
			$self.$field.get_or_insert_with(Default::default).merge(next);
		}
	};
}

impl ProcessorConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ProcessorConfigLayer) {
		merge_section!(self, other, symbols);
		merge_section!(self, other, broker);
		merge_section!(self, other, store);
		merge_section!(self, other, cache);
		merge_section!(self, other, logging);
		merge_section!(self, other, pipeline);
		merge_section!(self, other, tools);
	}
}
