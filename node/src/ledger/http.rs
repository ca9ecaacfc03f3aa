// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! HTTP client for the dispatcher.
//!
//! Live subscriptions are NDJSON streams (one `LogRecord` per line); the
//! rest is plain JSON request/response.

use super::{
    DispatcherCall, EventKind, LedgerError, LedgerEvent, LedgerGateway, LogRecord, Result,
    Subscription, TopicFilter, SUBSCRIPTION_BUFFER,
};
use airport_kernel::types::AirportCode;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

/// Query string shared by the history and stream endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQuery {
    pub kind: EventKind,
    pub topic: AirportCode,
    #[serde(default)]
    pub from_block: Option<u64>,
    #[serde(default)]
    pub to_block: Option<u64>,
}

impl EventQuery {
    pub fn filter(&self) -> TopicFilter {
        TopicFilter {
            kind: self.kind,
            topic: self.topic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadResponse {
    pub block: u64,
}

/// Splits an NDJSON byte stream into lines. Bytes stay raw until a whole
/// line is buffered, so a character may straddle two chunks.
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Next complete line, without its `\n`.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.bytes.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.bytes.drain(..=end).collect();
        line.pop();
        Some(line)
    }
}

#[derive(Debug, Clone)]
pub struct HttpLedger {
    base_url: String,
    client: Client,
    auth_token: Option<String>,
}

impl HttpLedger {
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            auth_token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        let resp = builder
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            Err(LedgerError::Rejected(format!("{}: {}", status, body)))
        } else {
            Err(LedgerError::Transport(format!("dispatcher returned {}", status)))
        }
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    /// Publish an event through the dispatcher (operators and tests).
    pub async fn emit(&self, event: &LedgerEvent) -> Result<LogRecord> {
        Self::send_json(self.request(Method::POST, "/v1/events").json(event)).await
    }

    /// Calls the dispatcher has accepted so far.
    pub async fn calls(&self) -> Result<Vec<DispatcherCall>> {
        Self::send_json(self.request(Method::GET, "/v1/calls")).await
    }
}

#[async_trait]
impl LedgerGateway for HttpLedger {
    async fn subscribe(&self, filter: TopicFilter) -> Result<Subscription> {
        let query = EventQuery {
            kind: filter.kind,
            topic: filter.topic,
            from_block: None,
            to_block: None,
        };
        let resp = Self::send(self.request(Method::GET, "/v1/events/stream").query(&query)).await?;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let pump = tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(item) = stream.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(LedgerError::Transport(e.to_string()))).await;
                        return;
                    }
                };
                lines.push(&chunk);

                while let Some(line) = lines.next_line() {
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    let parsed = serde_json::from_slice::<LogRecord>(&line)
                        .map_err(|e| LedgerError::Decode(e.to_string()));
                    if tx.send(parsed).await.is_err() {
                        return;
                    }
                }
            }
            tracing::debug!("Ledger stream for {} ended", filter.kind);
        });

        Ok(Subscription::new(rx, pump))
    }

    async fn query_history(
        &self,
        filter: TopicFilter,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<LogRecord>> {
        let query = EventQuery {
            kind: filter.kind,
            topic: filter.topic,
            from_block: Some(from_block),
            to_block,
        };
        Self::send_json(self.request(Method::GET, "/v1/events").query(&query)).await
    }

    async fn head_block(&self) -> Result<u64> {
        let head: HeadResponse = Self::send_json(self.request(Method::GET, "/v1/head")).await?;
        Ok(head.block)
    }

    async fn submit(&self, call: DispatcherCall) -> Result<()> {
        Self::send(self.request(Method::POST, "/v1/calls").json(&call)).await?;
        Ok(())
    }
}
