// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signature derivation.
//!
//! A pipeline is an ordered list of stages. Each stage may rewrite the
//! report's signature and source, and returns `true` to stop the chain.

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, trace};

use crashworks_core::{Info, Report};

#[derive(Debug, Error)]
#[error("invalid pattern {pattern:?}: {source}")]
pub struct PipelineError {
	pub pattern: String,
	#[source]
	pub source: regex::Error,
}

pub trait Stage: Send + Sync {
	fn name(&self) -> &'static str;

	/// Returns `true` to halt the pipeline.
	fn process(&self, report: &mut Report, info: &Info) -> bool;
}

/// Takes signature and source from the top crashing frame.
pub struct DefaultFrameStage;

impl Stage for DefaultFrameStage {
	fn name(&self) -> &'static str {
		"default-frame"
	}

	fn process(&self, report: &mut Report, _info: &Info) -> bool {
		if let Some(frame) = report.crashing_frames().first() {
			let (signature, source) = (frame.function.clone(), frame.source());
			report.signature = signature;
			report.source = source;
		}
		false
	}
}

/// Prefers the first crashing frame inside a vendor module.
///
/// Halts whenever the crashing thread has frames, even if no frame matched,
/// leaving the previous stage's signature in place.
pub struct VendorFrameStage {
	pattern: Regex,
}

impl VendorFrameStage {
	pub fn new(pattern: &str) -> Result<Self, PipelineError> {
		let pattern = RegexBuilder::new(pattern)
			.case_insensitive(true)
			.build()
			.map_err(|source| PipelineError {
				pattern: pattern.to_string(),
				source,
			})?;
		Ok(Self { pattern })
	}
}

impl Stage for VendorFrameStage {
	fn name(&self) -> &'static str {
		"vendor-frame"
	}

	fn process(&self, report: &mut Report, _info: &Info) -> bool {
		let frames = report.crashing_frames();
		if frames.is_empty() {
			return false;
		}

		if let Some(frame) = frames.iter().find(|f| self.pattern.is_match(&f.module)) {
			let (signature, source) = (frame.function.clone(), frame.source());
			report.signature = signature;
			report.source = source;
		}
		true
	}
}

/// Picks the first crashing frame whose function matches no blacklisted pattern.
pub struct BlacklistStage {
	patterns: Vec<Regex>,
}

impl BlacklistStage {
	pub fn new(patterns: &[String]) -> Result<Self, PipelineError> {
		let patterns = patterns
			.iter()
			.map(|pattern| {
				trace!(pattern, "compiling blacklist pattern");
				Regex::new(pattern).map_err(|source| PipelineError {
					pattern: pattern.clone(),
					source,
				})
			})
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self { patterns })
	}

	fn is_blacklisted(&self, function: &str) -> bool {
		self.patterns.iter().any(|p| p.is_match(function))
	}
}

impl Stage for BlacklistStage {
	fn name(&self) -> &'static str {
		"blacklist"
	}

	fn process(&self, report: &mut Report, _info: &Info) -> bool {
		if self.patterns.is_empty() {
			return false;
		}
		let frames = report.crashing_frames();
		let Some(first) = frames.first() else {
			return false;
		};

		let signature = frames
			.iter()
			.find(|f| !self.is_blacklisted(&f.function))
			.unwrap_or(first)
			.function
			.clone();
		report.signature = signature;
		true
	}
}

pub struct Pipeline {
	stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
	pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
		Self { stages }
	}

	/// Native crashes: top frame, then the vendor frame override.
	pub fn native(vendor_module_pattern: &str) -> Result<Self, PipelineError> {
		Ok(Self::new(vec![
			Box::new(DefaultFrameStage),
			Box::new(VendorFrameStage::new(vendor_module_pattern)?),
		]))
	}

	/// Browser crashes: the first frame outside the blacklist.
	pub fn web(blacklist: &[String]) -> Result<Self, PipelineError> {
		Ok(Self::new(vec![Box::new(BlacklistStage::new(blacklist)?)]))
	}

	pub fn run(&self, report: &mut Report, info: &Info) {
		for stage in &self.stages {
			if stage.process(report, info) {
				debug!(stage = stage.name(), signature = %report.signature, "pipeline halted");
				return;
			}
		}
	}

	#[cfg(test)]
	fn stage_names(&self) -> Vec<&'static str> {
		self.stages.iter().map(|s| s.name()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use crashworks_core::{Context, Frame};
	use proptest::prelude::*;

	fn frame(function: &str, module: &str, file: &str, line: u32) -> Frame {
		Frame {
			function: function.to_string(),
			module: module.to_string(),
			file: file.to_string(),
			line,
			..Default::default()
		}
	}

	fn report(frames: Vec<Frame>) -> Report {
		let mut context = Context::default();
		context.crashing_thread.frames = frames;
		Report::new(context, Utc::now())
	}

	fn blacklist(patterns: &[&str]) -> Vec<String> {
		patterns.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn native_prefers_vendor_frame() {
		let pipeline = Pipeline::native(r"iq\s*option").unwrap();
		let mut report = report(vec![
			frame("memcpy", "libc.so.6", "memcpy.S", 10),
			frame("Chart::draw", "IQ Option.exe", "chart.cpp", 42),
		]);

		pipeline.run(&mut report, &Info::default());

		assert_eq!(report.signature, "Chart::draw");
		assert_eq!(report.source, "chart.cpp:42");
	}

	#[test]
	fn native_keeps_top_frame_without_vendor_frame() {
		let pipeline = Pipeline::native(r"iq\s*option").unwrap();
		let mut report = report(vec![
			frame("memcpy", "libc.so.6", "memcpy.S", 10),
			frame("start", "ld.so", "", 0),
		]);

		pipeline.run(&mut report, &Info::default());

		assert_eq!(report.signature, "memcpy");
		assert_eq!(report.source, "memcpy.S:10");
	}

	#[test]
	fn native_without_frames_leaves_report_untouched() {
		let pipeline = Pipeline::native(r"iq\s*option").unwrap();
		let mut report = report(Vec::new());
		pipeline.run(&mut report, &Info::default());
		assert!(report.signature.is_empty());
		assert!(report.source.is_empty());
	}

	#[test]
	fn vendor_stage_halts_even_without_match() {
		let stage = VendorFrameStage::new("vendor").unwrap();
		let mut report = report(vec![frame("f", "other", "a.c", 1)]);
		assert!(stage.process(&mut report, &Info::default()));
		assert!(report.signature.is_empty());
	}

	#[test]
	fn blacklist_skips_matching_frames() {
		let pipeline = Pipeline::web(&blacklist(&[r"^Rx\.", "zone"])).unwrap();
		let mut report = report(vec![
			frame("Rx.Observable.subscribe", "", "", 0),
			frame("zone.run", "", "", 0),
			frame("App.render", "", "", 0),
		]);

		pipeline.run(&mut report, &Info::default());
		assert_eq!(report.signature, "App.render");
	}

	#[test]
	fn blacklist_falls_back_to_first_frame() {
		let pipeline = Pipeline::web(&blacklist(&["^Rx"])).unwrap();
		let mut report = report(vec![frame("Rx.a", "", "", 0), frame("Rx.b", "", "", 0)]);
		pipeline.run(&mut report, &Info::default());
		assert_eq!(report.signature, "Rx.a");
	}

	#[test]
	fn empty_blacklist_does_nothing() {
		let pipeline = Pipeline::web(&[]).unwrap();
		let mut report = report(vec![frame("a", "", "", 0)]);
		pipeline.run(&mut report, &Info::default());
		assert!(report.signature.is_empty());
	}

	#[test]
	fn invalid_pattern_fails_construction() {
		let err = Pipeline::web(&blacklist(&["ok", "(unclosed"])).err().unwrap();
		assert_eq!(err.pattern, "(unclosed");
		assert!(Pipeline::native("[").is_err());
	}

	#[test]
	fn stage_order() {
		assert_eq!(
			Pipeline::native(r"iq\s*option").unwrap().stage_names(),
			vec!["default-frame", "vendor-frame"]
		);
		assert_eq!(Pipeline::web(&[]).unwrap().stage_names(), vec!["blacklist"]);
	}

	fn is_vendor_module(module: &str) -> bool {
		let lower = module.to_lowercase();
		lower
			.match_indices("iq")
			.any(|(i, _)| lower[i + 2..].trim_start().starts_with("option"))
	}

	fn is_blacklisted_web_function(function: &str) -> bool {
		function.starts_with("Rx.") || function.contains("zone")
	}

	fn function_strategy() -> impl Strategy<Value = String> {
		prop_oneof![
			prop_oneof![
				Just("Rx.map"),
				Just("Rx.Subscriber.next"),
				Just("zone.run"),
				Just("ngzone.invoke"),
			]
			.prop_map(str::to_string),
			prop_oneof![Just("App.render"), Just("main"), Just("Zone.run"), Just("rx.map")]
				.prop_map(str::to_string),
			"[A-Za-z.]{1,10}",
		]
	}

	fn module_strategy() -> impl Strategy<Value = String> {
		prop_oneof![
			Just("IQ Option.exe"),
			Just("iqoption.dll"),
			Just("IQOPTION"),
			Just("iq\toption.so"),
			Just("libc.so.6"),
			Just("kernel32.dll"),
			Just("option.dll"),
			Just("iq.dll"),
		]
		.prop_map(str::to_string)
	}

	proptest! {
		#[test]
		fn web_signature_is_first_frame_off_the_blacklist(
			functions in proptest::collection::vec(function_strategy(), 0..8),
		) {
			let pipeline = Pipeline::web(&blacklist(&[r"^Rx\.", "zone"])).unwrap();
			let frames: Vec<Frame> = functions.iter().map(|f| frame(f, "", "", 0)).collect();
			let mut report = report(frames);
			pipeline.run(&mut report, &Info::default());

			let expected = match functions.first() {
				None => String::new(),
				Some(first) => functions
					.iter()
					.find(|f| !is_blacklisted_web_function(f))
					.unwrap_or(first)
					.clone(),
			};
			prop_assert_eq!(report.signature, expected);
			prop_assert!(report.source.is_empty());
		}

		#[test]
		fn native_signature_prefers_first_vendor_frame(
			frames in proptest::collection::vec(
				(function_strategy(), module_strategy(), 0u32..500),
				0..8,
			),
		) {
			let pipeline = Pipeline::native(r"iq\s*option").unwrap();
			let frames: Vec<Frame> = frames
				.iter()
				.enumerate()
				.map(|(i, (f, m, line))| frame(f, m, &format!("src{i}.cpp"), *line))
				.collect();
			let mut report = report(frames.clone());
			pipeline.run(&mut report, &Info::default());

			let (signature, source) = match frames.first() {
				None => (String::new(), String::new()),
				Some(first) => {
					let chosen = frames
						.iter()
						.find(|f| is_vendor_module(&f.module))
						.unwrap_or(first);
					(chosen.function.clone(), format!("{}:{}", chosen.file, chosen.line))
				}
			};
			prop_assert_eq!(report.signature, signature);
			prop_assert_eq!(report.source, source);
		}
	}
}
