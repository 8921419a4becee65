//! HTTP implementation of [`RemoteClient`] against the hosted backend's
//! REST data API.
//!
//! Every transport failure, including the per-request timeout, maps to
//! [`RemoteError::Network`]; HTTP rejections map onto the structured error
//! taxonomy by status code, never by message text.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::{
	config::SyncConfig,
	item::EntityTable,
	remote::{RemoteClient, RemoteError, RemoteId},
	Error,
};

/// Supplies the current bearer token for data-API requests. The auth flow
/// itself lives outside this crate; the engine only needs whatever token is
/// valid right now.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync + 'static {
	async fn access_token(&self) -> Option<String>;
}

/// Fixed token, for tools and tests.
pub struct StaticTokenProvider(pub String);

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
	async fn access_token(&self) -> Option<String> {
		Some(self.0.clone())
	}
}

pub struct HttpRemoteClient {
	base_url: String,
	http: reqwest::Client,
	tokens: std::sync::Arc<dyn AccessTokenProvider>,
}

impl HttpRemoteClient {
	pub fn new(
		config: &SyncConfig,
		tokens: std::sync::Arc<dyn AccessTokenProvider>,
	) -> Result<Self, Error> {
		let http = reqwest::Client::builder()
			.timeout(config.request_timeout)
			.build()?;

		Ok(Self {
			base_url: config.backend_url.trim_end_matches('/').to_string(),
			http,
			tokens,
		})
	}

	fn collection_url(&self, table: EntityTable) -> String {
		format!("{}/rest/v1/{table}", self.base_url)
	}

	fn record_url(&self, table: EntityTable, record_id: &str) -> String {
		format!("{}/rest/v1/{table}/{record_id}", self.base_url)
	}

	async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
		let request = match self.tokens.access_token().await {
			Some(token) => request.bearer_auth(token),
			None => request,
		};

		let response = request
			.send()
			.await
			.map_err(|e| RemoteError::Network(e.to_string()))?;

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let body = response.text().await.unwrap_or_default();
		Err(classify_status(status, &body))
	}
}

/// Map an HTTP rejection onto the error taxonomy. Anything not clearly a
/// client-side problem (5xx, rate limits) stays a network failure so it will
/// be retried.
fn classify_status(status: StatusCode, body: &str) -> RemoteError {
	let detail = format!("HTTP {status}: {body}");

	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth(detail),
		StatusCode::NOT_FOUND | StatusCode::GONE => RemoteError::NotFound(detail),
		StatusCode::CONFLICT => RemoteError::Conflict(detail),
		StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
			RemoteError::Validation(detail)
		}
		_ => RemoteError::Network(detail),
	}
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
	async fn create(&self, table: EntityTable, data: &Value) -> Result<RemoteId, RemoteError> {
		let response = self
			.send(self.http.post(self.collection_url(table)).json(data))
			.await?;

		let body: Value = response
			.json()
			.await
			.map_err(|e| RemoteError::Network(format!("invalid create response: {e}")))?;

		// The backend returns the stored record; the id may be a string or
		// a numeric key.
		let remote_id = match body.get("id") {
			Some(Value::String(id)) => Some(id.clone()),
			Some(Value::Number(id)) => Some(id.to_string()),
			_ => None,
		}
		.ok_or_else(|| {
			RemoteError::Network("invalid create response: missing record id".to_string())
		})?;

		debug!(%table, %remote_id, "created remote record");

		Ok(remote_id)
	}

	async fn update(
		&self,
		table: EntityTable,
		record_id: &str,
		data: &Value,
	) -> Result<(), RemoteError> {
		self.send(self.http.patch(self.record_url(table, record_id)).json(data))
			.await?;

		Ok(())
	}

	async fn delete(&self, table: EntityTable, record_id: &str) -> Result<(), RemoteError> {
		self.send(self.http.delete(self.record_url(table, record_id)))
			.await?;

		Ok(())
	}
}
