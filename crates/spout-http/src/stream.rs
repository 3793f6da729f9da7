//! Streaming response body backed by a live subscription.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::Stream;
use spout_attach::Subscription;
use spout_logs::{LogRecord, TypeFilter};
use tokio::sync::mpsc;

use crate::format::LineFormatter;

/// Body stream yielding one rendered line per accepted record.
///
/// Owns the subscription: when the client goes away the body is dropped
/// and the listener is unregistered with it. The stream ends when the
/// subscription ends and the channel is drained.
#[derive(Debug)]
pub struct RecordStream {
    records: mpsc::Receiver<Arc<LogRecord>>,
    types: TypeFilter,
    formatter: LineFormatter,
    _subscription: Subscription,
}

impl RecordStream {
    /// Wraps the receiving side of a subscription.
    #[must_use]
    pub fn new(
        records: mpsc::Receiver<Arc<LogRecord>>,
        subscription: Subscription,
        types: TypeFilter,
        formatter: LineFormatter,
    ) -> Self {
        Self {
            records,
            types,
            formatter,
            _subscription: subscription,
        }
    }
}

impl Stream for RecordStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            let Some(record) = ready!(this.records.poll_recv(cx)) else {
                return Poll::Ready(None);
            };
            if !this.types.accepts(record.stream) {
                continue;
            }
            let line = this.formatter.format(&record);
            if !line.is_empty() {
                return Poll::Ready(Some(Ok(Bytes::from(line))));
            }
        }
    }
}
