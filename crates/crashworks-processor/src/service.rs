// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The processor control loop.
//!
//! One delivery is handled to completion (ack or nack) before the next one
//! is awaited. Control signals are only observed between deliveries, so a
//! reload never swaps handlers under an in-flight task.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crashworks_config::{load_config_with_file, ProcessorConfig};
use crashworks_core::{ReportWithId, Task};
use crashworks_store::CrashRepository;

use crate::broker::{Broker, BrokerError, Delivery};
use crate::handlers::{HandlerError, Handlers};
use crate::logging::LogControl;
use crate::pipeline::PipelineError;
use crate::tools::StackWalker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
	Reload,
	Terminate,
}

#[derive(Debug, Error)]
pub enum ServiceError {
	#[error("broker closed the task stream")]
	BrokerClosed,

	#[error(transparent)]
	Broker(#[from] BrokerError),

	#[error("fatal handler error: {0}")]
	Handler(#[from] HandlerError),

	#[error(transparent)]
	Pipeline(#[from] PipelineError),
}

enum Event {
	Delivery(Option<Result<Delivery, BrokerError>>),
	Signal(Option<ControlSignal>),
}

pub struct ProcessorService<B> {
	config_path: PathBuf,
	config: ProcessorConfig,
	handlers: Handlers,
	broker: B,
	repository: Arc<dyn CrashRepository>,
	walker: Arc<dyn StackWalker>,
	log_control: Option<Arc<dyn LogControl>>,
}

impl<B: Broker> ProcessorService<B> {
	pub fn new(
		config_path: impl Into<PathBuf>,
		config: ProcessorConfig,
		broker: B,
		repository: Arc<dyn CrashRepository>,
		walker: Arc<dyn StackWalker>,
	) -> Result<Self, ServiceError> {
		let handlers = Handlers::build(&config, Arc::clone(&repository), Arc::clone(&walker))?;
		Ok(Self {
			config_path: config_path.into(),
			config,
			handlers,
			broker,
			repository,
			walker,
			log_control: None,
		})
	}

	pub fn with_log_control(mut self, control: Arc<dyn LogControl>) -> Self {
		self.log_control = Some(control);
		self
	}

	/// Run until terminated, the broker goes away, or a handler fails fatally.
	pub async fn run(mut self, mut signals: mpsc::Receiver<ControlSignal>) -> Result<(), ServiceError> {
		info!(queue = %self.config.broker.queue, "processor started");
		let mut signals_open = true;

		loop {
			let event = tokio::select! {
				biased;
				signal = signals.recv(), if signals_open => Event::Signal(signal),
				delivery = self.broker.next_delivery() => Event::Delivery(delivery),
			};

			match event {
				Event::Signal(Some(ControlSignal::Reload)) => self.reload(),
				Event::Signal(Some(ControlSignal::Terminate)) => {
					info!("terminating processor");
					return Ok(());
				}
				Event::Signal(None) => {
					debug!("signal channel closed");
					signals_open = false;
				}
				Event::Delivery(Some(Ok(delivery))) => self.process(delivery).await?,
				Event::Delivery(Some(Err(e))) => return Err(e.into()),
				Event::Delivery(None) => return Err(ServiceError::BrokerClosed),
			}
		}
	}

	#[instrument(skip(self, delivery), fields(tag = delivery.tag))]
	async fn process(&mut self, delivery: Delivery) -> Result<(), ServiceError> {
		let task = match Task::decode(&delivery.payload) {
			Ok(task) => task,
			Err(e) => {
				warn!(error = %e, "Invalid task");
				self.broker.nack(delivery.tag, true).await?;
				return Ok(());
			}
		};

		let kind = task.kind();
		debug!(kind, "handling task");
		match self.handlers.handle(task).await {
			Ok(report) => {
				if let Some(report) = report {
					self.republish(&report).await;
				}
				self.broker.ack(delivery.tag).await?;
				Ok(())
			}
			Err(e) => {
				error!(kind, error = %e, "task failed");
				self.broker.nack(delivery.tag, true).await?;
				Err(e.into())
			}
		}
	}

	async fn republish(&self, report: &ReportWithId) {
		let payload = match serde_json::to_vec(report) {
			Ok(payload) => payload,
			Err(e) => {
				error!(report_id = %report.id, error = %e, "Can't serialize report");
				return;
			}
		};
		if let Err(e) = self.broker.publish(&payload).await {
			error!(report_id = %report.id, error = %e, "Can't send crash to next stage");
		}
	}

	/// Reload the configuration file. Pipelines and the log level are only
	/// replaced once everything they need was built; any failure leaves the
	/// running configuration untouched.
	fn reload(&mut self) {
		info!(path = %self.config_path.display(), "reloading configuration");
		let next = match load_config_with_file(&self.config_path) {
			Ok(config) => config,
			Err(e) => {
				error!(error = %e, "Error reading configuration file");
				return;
			}
		};

		let mut effective = self.config.clone();
		effective.logging.level = next.logging.level;
		effective.pipeline = next.pipeline.clone();

		let handlers = match Handlers::build(
			&effective,
			Arc::clone(&self.repository),
			Arc::clone(&self.walker),
		) {
			Ok(handlers) => handlers,
			Err(e) => {
				error!(error = %e, "Can't build pipelines from new configuration");
				return;
			}
		};

		if effective.logging.level != self.config.logging.level {
			if let Some(control) = &self.log_control {
				if let Err(e) = control.set_level(effective.logging.level) {
					error!(error = %e, "Can't change log level");
					return;
				}
			}
			info!(
				old_level = %self.config.logging.level,
				new_level = %effective.logging.level,
				"changed log level"
			);
		}

		let pending = self.config.restart_required_changes(&next);
		if !pending.is_empty() {
			warn!(sections = ?pending, "changed settings take effect after a restart");
		}

		self.handlers = handlers;
		self.config = effective;
		info!("Reloaded configuration");
	}
}

/// Forward SIGHUP as [`ControlSignal::Reload`] and SIGTERM/SIGINT as
/// [`ControlSignal::Terminate`].
pub fn spawn_signal_forwarder() -> std::io::Result<mpsc::Receiver<ControlSignal>> {
	use tokio::signal::unix::{signal, SignalKind};

	let mut hangup = signal(SignalKind::hangup())?;
	let mut terminate = signal(SignalKind::terminate())?;
	let mut interrupt = signal(SignalKind::interrupt())?;
	let (tx, rx) = mpsc::channel(8);

	tokio::spawn(async move {
		loop {
			let signal = tokio::select! {
				_ = hangup.recv() => ControlSignal::Reload,
				_ = terminate.recv() => ControlSignal::Terminate,
				_ = interrupt.recv() => ControlSignal::Terminate,
			};
			info!(signal = ?signal, "caught signal");
			if tx.send(signal).await.is_err() {
				break;
			}
		}
	});

	Ok(rx)
}
