// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the crashworks crash processing pipeline.
//!
//! This crate holds the types shared between the upload front-end, the
//! processor and the storage layer:
//!
//! - [`Task`]: the queue wire format, tagged by an integer `type`
//! - [`Info`]: the submitter's description of the crashing client
//! - [`Context`]: stack walker output (modules, threads, frames)
//! - [`Report`]: an enriched, persisted crash record
//! - [`SymbolRecord`]: metadata for a registered symbol set

pub mod context;
pub mod error;
pub mod info;
pub mod report;
pub mod symbol;
pub mod task;

pub use context::{Context, CrashInfo, CrashingThread, Frame, Module, SystemInfo, Thread};
pub use error::{CoreError, Result};
pub use info::{GpuInfo, Info, DEVELOPER_VERSION};
pub use report::{Report, ReportId, ReportWithId};
pub use symbol::{ModuleHeader, SymbolDescription, SymbolRecord, WEB_PLATFORM, WEB_SYMBOL_FILE};
pub use task::{DumpTask, SymbolTask, Task, WebDumpTask};
