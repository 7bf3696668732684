// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash processing worker.
//!
//! Consumes tasks from the broker one at a time and routes them to the
//! symbol, minidump and webdump handlers. Processed reports are persisted
//! through the repository and republished downstream.

pub mod broker;
pub mod cleanup;
pub mod handlers;
pub mod logging;
pub mod pipeline;
pub mod service;
pub mod tools;

pub use broker::{AmqpBroker, Broker, BrokerError, Delivery};
pub use handlers::{HandlerError, Handlers};
pub use logging::{FilterHandle, LogControl, LoggingError};
pub use pipeline::{Pipeline, PipelineError, Stage};
pub use service::{spawn_signal_forwarder, ControlSignal, ProcessorService, ServiceError};
pub use tools::{CommandStackWalker, StackWalker, ToolError};
