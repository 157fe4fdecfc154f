// Copyright 2025 Tracebench Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blocking HTTP span client
//!
//! Implements [`SpanSink`] against the backend's batch ingestion API. Units
//! of work accumulate in a local buffer while open; `flush` ships every
//! closed span in a single POST and blocks until the backend accepts it.
//! Retry/backoff is deliberately absent: a failed flush fails the run.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use tracebench_replay::{SinkError, SpanHandle, SpanSink};

use crate::types::{IngestResponse, SpanExport};

/// Environment variable holding the backend API key.
pub const API_KEY_ENV: &str = "TRACEBENCH_API_KEY";

/// Client construction errors. Failures after login surface through
/// [`SinkError`], which is what the replay engine propagates.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{API_KEY_ENV} is not set in the environment")]
    MissingApiKey,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend server
    pub url: String,
    /// Project the replayed traces are logged under
    pub project: String,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a new client configuration.
    pub fn new(url: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            project: project.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Buffering span client for the backend ingestion API.
pub struct TraceClient {
    config: ClientConfig,
    api_key: String,
    http: reqwest::blocking::Client,
    next_handle: u64,
    open: HashMap<u64, SpanExport>,
    buffer: Vec<SpanExport>,
}

impl TraceClient {
    /// Authenticate from the environment and build a client.
    ///
    /// A missing `TRACEBENCH_API_KEY` is fatal here, before any trace data
    /// is parsed or replayed.
    pub fn login(config: ClientConfig) -> crate::Result<Self> {
        let api_key =
            std::env::var(API_KEY_ENV).map_err(|_| ClientError::MissingApiKey)?;
        Self::with_api_key(config, api_key)
    }

    /// Build a client with an explicit API key.
    pub fn with_api_key(config: ClientConfig, api_key: impl Into<String>) -> crate::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            api_key: api_key.into(),
            http,
            next_handle: 0,
            open: HashMap::new(),
            buffer: Vec::new(),
        })
    }

    /// Generate a unique span ID: millisecond timestamp in the high bits,
    /// 16 random bits in the low, hex-encoded.
    fn generate_span_id() -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let random_bits: u16 = rand::thread_rng().gen();
        let span_id = ((timestamp as u64) << 16) | (random_bits as u64);
        format!("{:x}", span_id)
    }

    /// Current timestamp in microseconds.
    fn now_microseconds() -> i64 {
        chrono::Utc::now().timestamp_micros()
    }

    fn open_span(&mut self, parent: Option<&SpanHandle>, name: &str) -> Result<SpanHandle, SinkError> {
        let (trace_id, parent_span_id) = match parent {
            Some(parent) => {
                let parent_span = self
                    .open
                    .get(&parent.raw())
                    .ok_or(SinkError::UnknownHandle(parent.raw()))?;
                (parent_span.trace_id.clone(), Some(parent_span.span_id.clone()))
            }
            // a root span starts a fresh trace identified by its own span id
            None => (String::new(), None),
        };

        let span_id = Self::generate_span_id();
        let trace_id = if trace_id.is_empty() { span_id.clone() } else { trace_id };

        let span = SpanExport {
            span_id,
            trace_id,
            parent_span_id,
            name: name.to_string(),
            start_time: Self::now_microseconds(),
            end_time: None,
            attributes: HashMap::new(),
        };

        self.next_handle += 1;
        let handle = SpanHandle::new(self.next_handle);
        self.open.insert(handle.raw(), span);
        Ok(handle)
    }

    /// Number of closed spans waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn attribute_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            _ => value.to_string(),
        }
    }
}

impl SpanSink for TraceClient {
    fn open_root(&mut self, name: &str) -> Result<SpanHandle, SinkError> {
        self.open_span(None, name)
    }

    fn open_child(&mut self, parent: &SpanHandle, name: &str) -> Result<SpanHandle, SinkError> {
        self.open_span(Some(parent), name)
    }

    fn attach(
        &mut self,
        handle: &SpanHandle,
        input: &Value,
        output: &Value,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<(), SinkError> {
        let span = self
            .open
            .get_mut(&handle.raw())
            .ok_or(SinkError::UnknownHandle(handle.raw()))?;

        if !input.is_null() {
            span.attributes.insert("input".to_string(), input.to_string());
        }
        if !output.is_null() {
            span.attributes.insert("output".to_string(), output.to_string());
        }
        if let Some(metadata) = metadata {
            for (key, value) in metadata {
                span.attributes
                    .insert(format!("metadata.{}", key), Self::attribute_value(value));
            }
        }
        Ok(())
    }

    fn close(&mut self, handle: SpanHandle) -> Result<(), SinkError> {
        let mut span = self
            .open
            .remove(&handle.raw())
            .ok_or(SinkError::UnknownHandle(handle.raw()))?;
        span.end_time = Some(Self::now_microseconds());
        self.buffer.push(span);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch_size = self.buffer.len();
        debug!("Flushing batch of {} spans to backend", batch_size);

        let endpoint = format!(
            "{}/api/v1/traces",
            self.config.url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Project-Name", &self.config.project)
            .json(&json!({ "spans": self.buffer }))
            .send()
            .map_err(|e| SinkError::Transport(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let result: IngestResponse = response
            .json()
            .map_err(|e| SinkError::Transport(Box::new(e)))?;
        debug!(
            "Backend accepted {} spans, rejected {}",
            result.accepted, result.rejected
        );

        self.buffer.clear();
        Ok(())
    }
}
