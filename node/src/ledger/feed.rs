// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Resilient event feed over one topic filter.
//!
//! Wraps a [`Subscription`] with what every listener needs:
//! - termination is checked before each wait and wins every race
//! - stream errors back off; repeated errors or a closed stream resubscribe
//! - after a resubscribe the gap is back-filled from history
//! - records at or before the last delivered position are dropped
//!
//! Too many consecutive failures surface as [`FeedItem::Failed`]. The owner
//! either gives up or calls [`EventFeed::recover`] and keeps reading.

use super::{LedgerError, LogRecord, SharedLedger, Subscription, TopicFilter};
use crate::retry::{Backoff, BackoffStep, RetryPolicy};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum FeedItem {
    Record(LogRecord),
    Cancelled,
    Failed(LedgerError),
}

pub struct EventFeed {
    gateway: SharedLedger,
    filter: TopicFilter,
    subscription: Option<Subscription>,
    backoff: Backoff,
    resubscribe_after: u32,
    cancel: CancellationToken,
    pending: VecDeque<LogRecord>,
    last_position: Option<(u64, u64)>,
}

impl EventFeed {
    pub fn new(gateway: SharedLedger, filter: TopicFilter, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        let resubscribe_after = (retry.max_attempts / 2).max(1);
        Self {
            gateway,
            filter,
            subscription: None,
            backoff: Backoff::new(retry),
            resubscribe_after,
            cancel,
            pending: VecDeque::new(),
            last_position: None,
        }
    }

    /// Start from an already-open subscription.
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Treat every record up to and including `block` as delivered.
    pub fn skip_through(&mut self, block: u64) {
        let mark = (block, u64::MAX);
        if self.last_position.map_or(true, |last| last < mark) {
            self.last_position = Some(mark);
        }
    }

    /// Start delivering after `block`: earlier records are dropped and
    /// anything the ledger already holds past it is queued from history.
    pub async fn resume_after(&mut self, block: u64) -> Result<(), LedgerError> {
        self.skip_through(block);
        let missed = self.gateway.query_history(self.filter, block.saturating_add(1), None).await?;
        self.pending.extend(missed);
        Ok(())
    }

    /// Clear the failure count after [`FeedItem::Failed`]. The next read
    /// resubscribes and back-fills from the last delivered block.
    pub fn recover(&mut self) {
        self.backoff.reset();
        self.subscription = None;
    }

    pub async fn next(&mut self) -> FeedItem {
        loop {
            if self.cancel.is_cancelled() {
                return FeedItem::Cancelled;
            }

            if let Some(record) = self.pending.pop_front() {
                if let Some(record) = self.accept(record) {
                    return FeedItem::Record(record);
                }
                continue;
            }

            if self.subscription.is_none() {
                let cancel = self.cancel.clone();
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return FeedItem::Cancelled,
                    outcome = self.resubscribe() => outcome,
                };
                if let Err(e) = outcome {
                    tracing::warn!("Subscribe to {} failed: {}", self.filter.kind, e);
                    if let Some(item) = self.back_off(e).await {
                        return item;
                    }
                }
                continue;
            }

            let Some(subscription) = self.subscription.as_mut() else {
                continue;
            };
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return FeedItem::Cancelled,
                item = subscription.next() => item,
            };

            match item {
                Some(Ok(record)) => {
                    self.backoff.reset();
                    if let Some(record) = self.accept(record) {
                        return FeedItem::Record(record);
                    }
                }
                Some(Err(LedgerError::Decode(reason))) => {
                    tracing::error!("Dropping undecodable {} event: {}", self.filter.kind, reason);
                }
                Some(Err(e)) => {
                    tracing::warn!("{} stream error: {}", self.filter.kind, e);
                    if let Some(item) = self.back_off(e).await {
                        return item;
                    }
                    if self.backoff.failures() >= self.resubscribe_after {
                        self.subscription = None;
                    }
                }
                None => {
                    tracing::warn!("{} stream closed, resubscribing", self.filter.kind);
                    self.subscription = None;
                    if let Some(item) = self.back_off(LedgerError::Closed).await {
                        return item;
                    }
                }
            }
        }
    }

    /// `None` means try again.
    async fn back_off(&mut self, error: LedgerError) -> Option<FeedItem> {
        match self.backoff.wait(&self.cancel).await {
            BackoffStep::Retry => None,
            BackoffStep::Cancelled => Some(FeedItem::Cancelled),
            BackoffStep::Exhausted => Some(FeedItem::Failed(error)),
        }
    }

    async fn resubscribe(&mut self) -> Result<(), LedgerError> {
        let subscription = self.gateway.subscribe(self.filter).await?;
        if let Some((block, _)) = self.last_position {
            let missed = self.gateway.query_history(self.filter, block, None).await?;
            if !missed.is_empty() {
                tracing::info!("Back-filling {} {} events since block {}", missed.len(), self.filter.kind, block);
            }
            self.pending.extend(missed);
        }
        self.subscription = Some(subscription);
        Ok(())
    }

    fn accept(&mut self, record: LogRecord) -> Option<LogRecord> {
        let position = record.position();
        if let Some(last) = self.last_position {
            if position <= last {
                tracing::debug!("Skipping already delivered event at block {}", record.block_number);
                return None;
            }
        }
        self.last_position = Some(position);
        Some(record)
    }
}
