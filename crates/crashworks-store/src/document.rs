// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Document store capability and its Elasticsearch implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use crate::error::{Result, StoreError};

/// Keyed JSON document storage with exact-match search.
#[async_trait]
pub trait DocumentStore: Send + Sync {
	/// Insert or replace a document. The write is visible to subsequent reads
	/// once this returns.
	async fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()>;

	async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

	/// Documents whose fields equal every `(field, value)` pair.
	async fn find(&self, collection: &str, terms: &[(&str, &str)]) -> Result<Vec<Value>>;
}

/// Document store backed by the Elasticsearch REST API.
#[derive(Clone)]
pub struct ElasticDocumentStore {
	client: Client,
	base_url: Url,
}

impl ElasticDocumentStore {
	pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
		let base_url = base_url.into();
		let parsed = Url::parse(&base_url).map_err(|e| StoreError::InvalidUrl {
			url: base_url.clone(),
			reason: e.to_string(),
		})?;
		if parsed.cannot_be_a_base() {
			return Err(StoreError::InvalidUrl {
				url: base_url,
				reason: "not a hierarchical url".to_string(),
			});
		}

		let client = Client::builder()
			.user_agent(concat!("crashworks/", env!("CARGO_PKG_VERSION")))
			.timeout(request_timeout)
			.build()?;
		Ok(Self {
			client,
			base_url: parsed,
		})
	}

	/// Append `segments` to the base url, percent-encoding each one.
	fn url(&self, segments: &[&str]) -> Result<Url> {
		if let Some(bad) = segments
			.iter()
			.find(|s| s.is_empty() || **s == "." || **s == "..")
		{
			return Err(StoreError::InvalidId((*bad).to_string()));
		}

		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|()| StoreError::InvalidUrl {
				url: self.base_url.to_string(),
				reason: "not a hierarchical url".to_string(),
			})?
			.pop_if_empty()
			.extend(segments);
		Ok(url)
	}

	/// Create `index` with keyword mappings for `keyword_fields` unless it exists.
	#[instrument(skip(self, keyword_fields), fields(base_url = %self.base_url))]
	pub async fn ensure_index(&self, index: &str, keyword_fields: &[&str]) -> Result<()> {
		let properties: Map<String, Value> = keyword_fields
			.iter()
			.map(|field| (field.to_string(), json!({ "type": "keyword" })))
			.collect();
		let body = json!({ "mappings": { "properties": properties } });

		let response = self.client.put(self.url(&[index])?).json(&body).send().await?;
		let status = response.status();
		if status.is_success() {
			info!(index, "created index");
			return Ok(());
		}

		let text = response.text().await.unwrap_or_default();
		if status == StatusCode::BAD_REQUEST && text.contains("resource_already_exists_exception") {
			debug!(index, "index already exists");
			return Ok(());
		}
		Err(StoreError::Status {
			status: status.as_u16(),
			body: text,
		})
	}
}

async fn check(response: Response) -> Result<Response> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}
	let body = response.text().await.unwrap_or_default();
	Err(StoreError::Status {
		status: status.as_u16(),
		body,
	})
}

fn search_body(terms: &[(&str, &str)]) -> Value {
	let must: Vec<Value> = terms
		.iter()
		.map(|(field, value)| json!({ "term": { *field: *value } }))
		.collect();
	json!({
		"query": {
			"constant_score": {
				"filter": { "bool": { "must": must } }
			}
		}
	})
}

#[async_trait]
impl DocumentStore for ElasticDocumentStore {
	#[instrument(skip(self, document))]
	async fn put(&self, collection: &str, id: &str, document: &Value) -> Result<()> {
		let response = self
			.client
			.put(self.url(&[collection, "_doc", id])?)
			.query(&[("refresh", "true")])
			.json(document)
			.send()
			.await?;
		check(response).await?;
		Ok(())
	}

	#[instrument(skip(self))]
	async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
		let response = self
			.client
			.get(self.url(&[collection, "_doc", id])?)
			.send()
			.await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		let mut body: Value = check(response).await?.json().await?;
		if body.get("found").and_then(Value::as_bool) == Some(false) {
			return Ok(None);
		}
		Ok(body.get_mut("_source").map(Value::take))
	}

	#[instrument(skip(self))]
	async fn find(&self, collection: &str, terms: &[(&str, &str)]) -> Result<Vec<Value>> {
		let response = self
			.client
			.post(self.url(&[collection, "_search"])?)
			.json(&search_body(terms))
			.send()
			.await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(Vec::new());
		}

		let mut body: Value = check(response).await?.json().await?;
		let hits = match body.pointer_mut("/hits/hits").map(Value::take) {
			Some(Value::Array(hits)) => hits,
			_ => return Ok(Vec::new()),
		};
		Ok(hits
			.into_iter()
			.filter_map(|mut hit| hit.get_mut("_source").map(Value::take))
			.collect())
	}
}
