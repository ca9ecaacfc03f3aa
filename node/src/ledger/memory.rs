// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-process ledger.
//!
//! A single ordered log with one event per block. Live subscribers are fed
//! from a broadcast channel that is written under the same lock as the log,
//! so history and live delivery never disagree on order.

use super::{
    DispatcherCall, LedgerError, LedgerEvent, LedgerGateway, LogRecord, Result, Subscription,
    TopicFilter, SUBSCRIPTION_BUFFER,
};
use airport_kernel::digest::Digest;
use airport_kernel::types::{AirportCode, Destination, Nonce};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};

const LIVE_CAPACITY: usize = 1024;

#[derive(Default)]
struct LedgerState {
    log: Vec<LogRecord>,
    calls: Vec<DispatcherCall>,
}

pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    live: broadcast::Sender<Result<LogRecord>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            state: Mutex::new(LedgerState::default()),
            live,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Transport("ledger state poisoned".to_string()))
    }

    /// Append an event in its own block and fan it out to live subscribers.
    pub fn emit(&self, event: LedgerEvent) -> Result<LogRecord> {
        let mut state = self.lock()?;
        let record = LogRecord {
            block_number: state.log.len() as u64 + 1,
            log_index: 0,
            event,
        };
        state.log.push(record.clone());
        // No receivers is fine.
        let _ = self.live.send(Ok(record.clone()));
        tracing::debug!(
            "Ledger: block {} {}",
            record.block_number,
            record.event.kind()
        );
        Ok(record)
    }

    /// Push a transport error to every open subscription.
    pub fn interrupt_subscriptions(&self, reason: &str) {
        let _ = self.live.send(Err(LedgerError::Transport(reason.to_string())));
    }

    /// Every call submitted so far, in submission order.
    pub fn calls(&self) -> Vec<DispatcherCall> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// `(destination, nonce, digest)` of every attestation sent by `code`.
    pub fn attestations(&self, code: AirportCode) -> Vec<(Destination, Nonce, Digest)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DispatcherCall::ReportPos {
                    code: reporter,
                    destination,
                    nonce,
                    digest,
                } if reporter == code => Some((destination, nonce, digest)),
                _ => None,
            })
            .collect()
    }

    pub fn history(
        &self,
        filter: TopicFilter,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<LogRecord>> {
        let state = self.lock()?;
        let to_block = to_block.unwrap_or(u64::MAX);
        Ok(state
            .log
            .iter()
            .filter(|r| r.block_number >= from_block && r.block_number <= to_block)
            .filter(|r| filter.matches(&r.event))
            .cloned()
            .collect())
    }

    pub fn head(&self) -> Result<u64> {
        Ok(self.lock()?.log.len() as u64)
    }

    pub fn record_call(&self, call: DispatcherCall) -> Result<()> {
        tracing::debug!("Ledger: call {}", call.function_name());
        self.lock()?.calls.push(call);
        Ok(())
    }

    /// Open a subscription synchronously. Everything emitted after this
    /// returns reaches the subscriber.
    pub fn open_subscription(&self, filter: TopicFilter) -> Subscription {
        let mut live_rx = self.live.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let pump = tokio::spawn(async move {
            loop {
                let item = match live_rx.recv().await {
                    Ok(Ok(record)) if filter.matches(&record.event) => Ok(record),
                    Ok(Ok(_)) => continue,
                    Ok(Err(e)) => Err(e),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        Err(LedgerError::Transport(format!("subscriber lagged by {} events", n)))
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        Subscription::new(rx, pump)
    }
}

#[async_trait]
impl LedgerGateway for MemoryLedger {
    async fn subscribe(&self, filter: TopicFilter) -> Result<Subscription> {
        Ok(self.open_subscription(filter))
    }

    async fn query_history(
        &self,
        filter: TopicFilter,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<LogRecord>> {
        self.history(filter, from_block, to_block)
    }

    async fn head_block(&self) -> Result<u64> {
        self.head()
    }

    async fn submit(&self, call: DispatcherCall) -> Result<()> {
        self.record_call(call)
    }
}
