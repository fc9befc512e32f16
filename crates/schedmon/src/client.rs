// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client for the monitoring API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, Response, Url};
use schedmon_common_http::{RetryConfig, Timeouts};
use schedmon_common_secret::SecretString;
use schedmon_core::{HeartbeatPayload, SyncRequest, SyncResponse};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::error::{MonitorError, Result};

/// SDK version for identification.
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

const HEARTBEAT_PATH: &str = "/api/heartbeat";
const SYNC_PATH: &str = "/api/sync";
const STATUS_PATH: &str = "/api/status";

/// Configuration for the monitor client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
	pub timeouts: Timeouts,
	pub retry_config: RetryConfig,
}

/// Builder for constructing a [`MonitorClient`].
pub struct MonitorClientBuilder {
	api_token: Option<SecretString>,
	base_url: Option<String>,
	config: ClientConfig,
}

impl MonitorClientBuilder {
	pub fn new() -> Self {
		Self {
			api_token: None,
			base_url: None,
			config: ClientConfig::default(),
		}
	}

	/// Sets the bearer token sent with every request.
	pub fn api_token(mut self, token: impl Into<String>) -> Self {
		self.api_token = Some(SecretString::new(token.into()));
		self
	}

	pub fn api_token_secret(mut self, token: SecretString) -> Self {
		self.api_token = Some(token);
		self
	}

	/// Sets the base URL of the monitoring service.
	///
	/// Example: `https://your-monitor-app.pages.dev`
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());
		self
	}

	/// Overall request timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.config.timeouts.request = timeout;
		self
	}

	pub fn connect_timeout(mut self, timeout: Duration) -> Self {
		self.config.timeouts.connect = timeout;
		self
	}

	pub fn retry_config(mut self, config: RetryConfig) -> Self {
		self.config.retry_config = config;
		self
	}

	pub fn build(self) -> Result<MonitorClient> {
		let api_token = self
			.api_token
			.filter(|t| !t.is_blank())
			.ok_or(MonitorError::InvalidAuthToken)?;
		let base_url = self
			.base_url
			.ok_or_else(|| MonitorError::InvalidBaseUrl("no base URL configured".to_string()))?;

		let base_url = base_url.trim().trim_end_matches('/').to_string();
		let parsed =
			Url::parse(&base_url).map_err(|e| MonitorError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
		if !matches!(parsed.scheme(), "http" | "https") {
			return Err(MonitorError::InvalidBaseUrl(format!(
				"{base_url}: scheme must be http or https"
			)));
		}

		let http_client = schedmon_common_http::new_client(self.config.timeouts)?;

		info!(
			base_url = %base_url,
			sdk_version = SDK_VERSION,
			max_attempts = self.config.retry_config.max_attempts,
			"Monitor client initialized"
		);

		Ok(MonitorClient {
			inner: Arc::new(MonitorClientInner {
				api_token,
				base_url,
				http_client,
				config: self.config,
			}),
		})
	}
}

impl Default for MonitorClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct MonitorClientInner {
	api_token: SecretString,
	base_url: String,
	http_client: Client,
	config: ClientConfig,
}

/// Client for the monitoring API.
///
/// # Example
///
/// ```ignore
/// use schedmon::{MonitorClient, HeartbeatPayload, HeartbeatStatus};
///
/// let client = MonitorClient::builder()
///     .api_token("your_api_token")
///     .base_url("https://your-monitor-app.pages.dev")
///     .build()?;
///
/// client
///     .post_heartbeat(&HeartbeatPayload::new("php artisan emails:send", HeartbeatStatus::Success, Some(1.2)))
///     .await?;
/// ```
#[derive(Clone)]
pub struct MonitorClient {
	inner: Arc<MonitorClientInner>,
}

impl std::fmt::Debug for MonitorClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MonitorClient")
			.field("base_url", &self.inner.base_url)
			.field("api_token", &self.inner.api_token)
			.finish()
	}
}

impl MonitorClient {
	pub fn builder() -> MonitorClientBuilder {
		MonitorClientBuilder::new()
	}

	pub fn base_url(&self) -> &str {
		&self.inner.base_url
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Reports one job execution. Any 2xx counts as delivered.
	#[instrument(skip(self, payload), fields(job = %payload.job, status = %payload.status))]
	pub async fn post_heartbeat(&self, payload: &HeartbeatPayload) -> Result<()> {
		self
			.send(Method::POST, HEARTBEAT_PATH, Some(payload))
			.await?;
		debug!("Heartbeat delivered");
		Ok(())
	}

	/// Submits the full set of monitored jobs. The service computes the
	/// created, updated and removed sets.
	#[instrument(skip(self, request), fields(job_count = request.jobs.len()))]
	pub async fn post_sync(&self, request: &SyncRequest) -> Result<SyncResponse> {
		let response = self.send(Method::POST, SYNC_PATH, Some(request)).await?;
		let body = response.text().await?;
		let sync: SyncResponse = serde_json::from_str(&body)?;
		info!(job_count = sync.job_count, synced_at = %sync.synced_at, "Jobs synced");
		Ok(sync)
	}

	/// Fetches the service's view of the registry.
	#[instrument(skip(self))]
	pub async fn get_status(&self) -> Result<serde_json::Value> {
		let response = self.send(Method::GET, STATUS_PATH, None::<&()>).await?;
		let body = response.text().await?;
		Ok(serde_json::from_str(&body)?)
	}

	/// Sends one request with retry. Connection failures and 5xx are retried;
	/// any other non-success status fails at once.
	async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response>
	where
		B: Serialize + ?Sized,
	{
		let url = format!("{}{}", self.inner.base_url, path);

		debug!(url = %url, method = %method, "Sending request");

		let response = schedmon_common_http::retry(&self.inner.config.retry_config, || async {
			let mut request = self
				.inner
				.http_client
				.request(method.clone(), &url)
				.bearer_auth(self.inner.api_token.expose())
				.header(header::ACCEPT, "application/json");
			if let Some(body) = body {
				request = request.json(body);
			}

			let response = request.send().await?;
			let status = response.status();
			if status.is_server_error() {
				let body = response.text().await.unwrap_or_default();
				return Err(MonitorError::Server {
					status: status.as_u16(),
					body,
				});
			}
			Ok::<_, MonitorError>(response)
		})
		.await
		.inspect_err(|err| error!(url = %url, error = %err, "Request failed"))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			error!(url = %url, status = status.as_u16(), body = %body, "Request rejected");
			return Err(MonitorError::Client {
				status: status.as_u16(),
				body,
			});
		}

		Ok(response)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use schedmon_core::{HeartbeatStatus, JobDescriptor};
	use serde_json::json;
	use wiremock::matchers::{body_json, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn client_for(server: &MockServer, attempts: u32) -> MonitorClient {
		MonitorClient::builder()
			.api_token("test-token")
			.base_url(server.uri())
			.retry_config(RetryConfig::fixed(attempts, Duration::from_millis(5)))
			.build()
			.unwrap()
	}

	#[test]
	fn builder_requires_api_token() {
		let result = MonitorClientBuilder::new()
			.base_url("https://example.com")
			.build();
		assert!(matches!(result, Err(MonitorError::InvalidAuthToken)));

		let result = MonitorClientBuilder::new()
			.api_token("  ")
			.base_url("https://example.com")
			.build();
		assert!(matches!(result, Err(MonitorError::InvalidAuthToken)));
	}

	#[test]
	fn builder_requires_valid_base_url() {
		let result = MonitorClientBuilder::new().api_token("t").build();
		assert!(matches!(result, Err(MonitorError::InvalidBaseUrl(_))));

		let result = MonitorClientBuilder::new()
			.api_token("t")
			.base_url("not a url")
			.build();
		assert!(matches!(result, Err(MonitorError::InvalidBaseUrl(_))));

		let result = MonitorClientBuilder::new()
			.api_token("t")
			.base_url("ftp://example.com")
			.build();
		assert!(matches!(result, Err(MonitorError::InvalidBaseUrl(_))));
	}

	#[test]
	fn builder_normalizes_base_url() {
		let client = MonitorClientBuilder::new()
			.api_token("t")
			.base_url("https://example.com/")
			.build()
			.unwrap();
		assert_eq!(client.base_url(), "https://example.com");
	}

	#[test]
	fn debug_output_redacts_token() {
		let client = MonitorClientBuilder::new()
			.api_token("super-secret-token")
			.base_url("https://example.com")
			.build()
			.unwrap();
		let debug = format!("{client:?}");
		assert!(!debug.contains("super-secret-token"));
		assert!(debug.contains("[REDACTED]"));
	}

	#[test]
	fn default_config_matches_documented_values() {
		let config = ClientConfig::default();
		assert_eq!(config.timeouts.request, Duration::from_secs(5));
		assert_eq!(config.timeouts.connect, Duration::from_secs(2));
		assert_eq!(config.retry_config.max_attempts, 3);
		assert_eq!(config.retry_config.delay, Duration::from_secs(3));
	}

	#[tokio::test]
	async fn heartbeat_sends_bearer_token_and_payload() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/heartbeat"))
			.and(header("authorization", "Bearer test-token"))
			.and(body_json(json!({
				"job": "php artisan emails:send",
				"status": "success",
				"runtime": 1.25
			})))
			.respond_with(ResponseTemplate::new(202))
			.expect(1)
			.mount(&server)
			.await;

		let payload = HeartbeatPayload::new(
			"php artisan emails:send",
			HeartbeatStatus::Success,
			Some(1.25),
		);
		client_for(&server, 3).post_heartbeat(&payload).await.unwrap();
	}

	#[tokio::test]
	async fn server_errors_are_retried_until_success() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/heartbeat"))
			.respond_with(ResponseTemplate::new(503))
			.up_to_n_times(2)
			.expect(2)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/api/heartbeat"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let payload = HeartbeatPayload::new("backup:run", HeartbeatStatus::Success, None);
		client_for(&server, 3).post_heartbeat(&payload).await.unwrap();

		assert_eq!(server.received_requests().await.unwrap().len(), 3);
	}

	#[tokio::test]
	async fn client_errors_are_not_retried() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/heartbeat"))
			.respond_with(ResponseTemplate::new(404).set_body_string("unknown job"))
			.expect(1)
			.mount(&server)
			.await;

		let payload = HeartbeatPayload::new("backup:run", HeartbeatStatus::Failure, None);
		let err = client_for(&server, 3)
			.post_heartbeat(&payload)
			.await
			.unwrap_err();

		assert!(matches!(err, MonitorError::Client { status: 404, .. }));
		assert_eq!(err.body(), Some("unknown job"));
		assert_eq!(server.received_requests().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn last_server_error_is_returned_after_exhausting_attempts() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/heartbeat"))
			.respond_with(ResponseTemplate::new(500).set_body_string("boom"))
			.expect(2)
			.mount(&server)
			.await;

		let payload = HeartbeatPayload::new("backup:run", HeartbeatStatus::Success, None);
		let err = client_for(&server, 2)
			.post_heartbeat(&payload)
			.await
			.unwrap_err();
		assert!(matches!(err, MonitorError::Server { status: 500, .. }));
	}

	#[tokio::test]
	async fn connection_failure_is_a_transport_error() {
		let client = MonitorClient::builder()
			.api_token("t")
			.base_url("http://127.0.0.1:9")
			.retry_config(RetryConfig::fixed(2, Duration::from_millis(1)))
			.build()
			.unwrap();

		let payload = HeartbeatPayload::new("backup:run", HeartbeatStatus::Success, None);
		let err = client.post_heartbeat(&payload).await.unwrap_err();
		assert!(matches!(err, MonitorError::Transport(_)));
	}

	#[tokio::test]
	async fn sync_posts_jobs_and_decodes_stats() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/sync"))
			.and(body_json(json!({
				"jobs": [{
					"name": "php artisan emails:send",
					"description": null,
					"schedule": "*/5 * * * *",
					"graceMinutes": 15,
					"isMonitored": true
				}]
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"jobCount": 1,
				"syncedAt": "2025-06-01T12:00:00Z",
				"stats": {"created": 1, "updated": 0, "removed": 2}
			})))
			.expect(1)
			.mount(&server)
			.await;

		let request = SyncRequest {
			jobs: vec![JobDescriptor {
				name: "php artisan emails:send".to_string(),
				description: None,
				schedule_expression: "*/5 * * * *".to_string(),
				grace_minutes: 15,
				monitored: true,
			}],
		};
		let response = client_for(&server, 1).post_sync(&request).await.unwrap();
		assert_eq!(response.job_count, 1);
		assert_eq!(response.stats.map(|s| s.removed), Some(2));
	}

	#[tokio::test]
	async fn sync_with_invalid_body_is_a_decode_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/sync"))
			.respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
			.mount(&server)
			.await;

		let err = client_for(&server, 1)
			.post_sync(&SyncRequest::default())
			.await
			.unwrap_err();
		assert!(matches!(err, MonitorError::Decode(_)));
	}

	#[tokio::test]
	async fn status_returns_raw_json() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/status"))
			.and(header("authorization", "Bearer test-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobs": [], "healthy": true})))
			.mount(&server)
			.await;

		let status = client_for(&server, 1).get_status().await.unwrap();
		assert_eq!(status["healthy"], json!(true));
	}
}
