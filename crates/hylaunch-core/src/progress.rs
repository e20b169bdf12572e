//! Progress reporting for long-running pipeline steps
//!
//! Producers push [`TransferProgress`] events into a bounded channel with
//! `try_send`. They never wait on the consumer: when the channel is full or the
//! receiver is gone the event is dropped.

use serde::Serialize;
use tokio::sync::mpsc;

/// Default channel capacity used by [`ProgressReporter::channel`] callers
pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// A single progress event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub message: Option<String>,
    /// 0–100
    pub percent: Option<f64>,
    pub bytes_per_second: Option<f64>,
    pub bytes_transferred: Option<u64>,
    pub total_bytes: Option<u64>,
}

/// Cloneable handle that forwards progress events to an optional channel
///
/// A scoped reporter rescales percentages into a sub-range of its parent and
/// prefixes messages, so nested steps can report 0–100 on their own.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: Option<mpsc::Sender<TransferProgress>>,
    prefix: Option<String>,
    offset: f64,
    span: f64,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ProgressReporter {
    pub fn new(sender: mpsc::Sender<TransferProgress>) -> Self {
        Self {
            sender: Some(sender),
            prefix: None,
            offset: 0.0,
            span: 100.0,
        }
    }

    /// A reporter that discards every event
    pub fn disabled() -> Self {
        Self {
            sender: None,
            prefix: None,
            offset: 0.0,
            span: 100.0,
        }
    }

    /// Create a reporter together with the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TransferProgress>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Derive a reporter whose 0–100 maps onto `offset..offset + span` of this one
    pub fn scoped(&self, prefix: Option<&str>, offset: f64, span: f64) -> Self {
        let prefix = match (&self.prefix, prefix) {
            (Some(outer), Some(inner)) => Some(format!("{}: {}", outer, inner)),
            (Some(outer), None) => Some(outer.clone()),
            (None, Some(inner)) => Some(inner.to_string()),
            (None, None) => None,
        };

        Self {
            sender: self.sender.clone(),
            prefix,
            offset: self.offset + offset * self.span / 100.0,
            span: span * self.span / 100.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    pub fn report(&self, mut event: TransferProgress) {
        let Some(sender) = &self.sender else {
            return;
        };

        event.percent = event
            .percent
            .map(|p| self.offset + p.clamp(0.0, 100.0) * self.span / 100.0);
        if let (Some(prefix), Some(message)) = (&self.prefix, event.message.as_ref()) {
            event.message = Some(format!("{}: {}", prefix, message));
        }

        if let Err(mpsc::error::TrySendError::Full(dropped)) = sender.try_send(event) {
            log::trace!("Progress channel full, dropping event {:?}", dropped.message);
        }
    }

    /// Report a status message with an optional percentage
    pub fn message(&self, message: impl Into<String>, percent: Option<f64>) {
        self.report(TransferProgress {
            message: Some(message.into()),
            percent,
            ..Default::default()
        });
    }
}
