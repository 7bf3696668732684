// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Task queue and report republishing over AMQP.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
	BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
	ExchangeDeclareOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use thiserror::Error;
use tracing::{debug, info};

use crashworks_config::BrokerConfig;

const CONSUMER_TAG: &str = "crashworks-processor";
const REPORT_CONTENT_TYPE: &str = "text/json";

#[derive(Debug, Error)]
pub enum BrokerError {
	#[error("amqp error: {0}")]
	Amqp(#[from] lapin::Error),
}

/// A message taken from the task queue, not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
	pub tag: u64,
	pub payload: Vec<u8>,
}

#[async_trait]
pub trait Broker: Send + Sync {
	/// Next queued task; `None` once the consumer is cancelled.
	async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>>;

	async fn ack(&self, tag: u64) -> Result<(), BrokerError>;

	async fn nack(&self, tag: u64, requeue: bool) -> Result<(), BrokerError>;

	/// Send a processed report downstream. No-op without a post exchange.
	async fn publish(&self, payload: &[u8]) -> Result<(), BrokerError>;
}

pub struct AmqpBroker {
	_connection: Connection,
	channel: Channel,
	consumer: Consumer,
	post: Option<(Channel, String)>,
}

impl AmqpBroker {
	/// Connect, declare the durable task queue with prefetch 1 and start
	/// consuming with manual acknowledgement.
	pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
		let connection = Connection::connect(&config.url, ConnectionProperties::default()).await?;
		let channel = connection.create_channel().await?;

		channel
			.queue_declare(
				&config.queue,
				QueueDeclareOptions {
					durable: true,
					..Default::default()
				},
				FieldTable::default(),
			)
			.await?;
		channel.basic_qos(1, BasicQosOptions::default()).await?;
		let consumer = channel
			.basic_consume(
				&config.queue,
				CONSUMER_TAG,
				BasicConsumeOptions::default(),
				FieldTable::default(),
			)
			.await?;

		let post = match &config.post_exchange {
			Some(exchange) => {
				let post_channel = connection.create_channel().await?;
				post_channel
					.exchange_declare(
						exchange,
						exchange_kind(&config.post_exchange_type),
						ExchangeDeclareOptions {
							durable: true,
							auto_delete: true,
							..Default::default()
						},
						FieldTable::default(),
					)
					.await?;
				info!(exchange = %exchange, kind = %config.post_exchange_type, "declared post exchange");
				Some((post_channel, exchange.clone()))
			}
			None => None,
		};

		info!(queue = %config.queue, "consuming tasks");
		Ok(Self {
			_connection: connection,
			channel,
			consumer,
			post,
		})
	}
}

fn exchange_kind(kind: &str) -> ExchangeKind {
	match kind.to_ascii_lowercase().as_str() {
		"fanout" => ExchangeKind::Fanout,
		"direct" => ExchangeKind::Direct,
		"topic" => ExchangeKind::Topic,
		"headers" => ExchangeKind::Headers,
		_ => ExchangeKind::Custom(kind.to_string()),
	}
}

#[async_trait]
impl Broker for AmqpBroker {
	async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
		let delivery = self.consumer.next().await?;
		Some(
			delivery
				.map(|d| Delivery {
					tag: d.delivery_tag,
					payload: d.data,
				})
				.map_err(BrokerError::from),
		)
	}

	async fn ack(&self, tag: u64) -> Result<(), BrokerError> {
		self.channel.basic_ack(tag, BasicAckOptions::default()).await?;
		Ok(())
	}

	async fn nack(&self, tag: u64, requeue: bool) -> Result<(), BrokerError> {
		self.channel
			.basic_nack(
				tag,
				BasicNackOptions {
					requeue,
					..Default::default()
				},
			)
			.await?;
		Ok(())
	}

	async fn publish(&self, payload: &[u8]) -> Result<(), BrokerError> {
		let Some((channel, exchange)) = &self.post else {
			return Ok(());
		};
		channel
			.basic_publish(
				exchange,
				"",
				BasicPublishOptions::default(),
				payload,
				BasicProperties::default().with_content_type(REPORT_CONTENT_TYPE.into()),
			)
			.await?
			.await?;
		debug!(exchange = %exchange, bytes = payload.len(), "published report");
		Ok(())
	}
}
