//! Record streaming over a connection.
//!
//! [`RecordStream`] is a thin adapter over the async primitives in
//! [`Connection`](super::Connection): it pulls batches on demand and hands
//! out one record at a time, either through [`RecordStream::next`] or as a
//! [`futures::Stream`]. All I/O still happens on the borrowed connection,
//! so single-connection serialisation is preserved.

use std::collections::VecDeque;

use futures::Stream;

use crate::bolt::error::BoltResult;
use crate::bolt::message::{Record, Success, TxOptions};
use crate::bolt::packstream::Value;
use crate::transport::Transport;

use super::connection::Connection;

/// Default number of records fetched per PULL.
pub const DEFAULT_FETCH_SIZE: i64 = 1000;

/// Lazily pulls a result stream, batch by batch.
pub struct RecordStream<'a, T: Transport> {
    connection: &'a mut Connection<T>,
    qid: i64,
    fetch_size: i64,
    buffer: VecDeque<Record>,
    summary: Option<Success>,
    exhausted: bool,
}

impl<'a, T: Transport> RecordStream<'a, T> {
    pub(crate) fn new(connection: &'a mut Connection<T>, qid: i64, fetch_size: i64) -> Self {
        Self {
            connection,
            qid,
            fetch_size,
            buffer: VecDeque::new(),
            summary: None,
            exhausted: false,
        }
    }

    /// The next record, or `None` once the stream is drained. The first
    /// error also ends the stream.
    pub async fn next(&mut self) -> Option<BoltResult<Record>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            if self.exhausted {
                return None;
            }

            match self.connection.pull(self.fetch_size, self.qid).await {
                Ok(batch) => {
                    self.buffer.extend(batch.records);
                    if !batch.has_more {
                        self.summary = Some(batch.summary);
                        self.exhausted = true;
                    }
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Drain the rest of the stream into a vector.
    pub async fn collect_remaining(mut self) -> BoltResult<(Vec<Record>, Success)> {
        let mut records = Vec::new();
        while let Some(item) = self.next().await {
            records.push(item?);
        }
        let summary = self.summary.unwrap_or_default();
        Ok((records, summary))
    }

    /// The closing summary, present once the stream is drained.
    pub fn summary(&self) -> Option<&Success> {
        self.summary.as_ref()
    }

    /// Adapt into a [`futures::Stream`] of records.
    pub fn into_stream(self) -> impl Stream<Item = BoltResult<Record>> + 'a {
        futures::stream::unfold(self, |mut inner| async move {
            inner.next().await.map(|item| (item, inner))
        })
    }
}

impl<T: Transport> Connection<T> {
    /// Execute a statement and stream its records in batches of
    /// `fetch_size` (`-1` pulls everything at once).
    pub async fn run_stream(
        &mut self,
        statement: impl Into<String>,
        parameters: std::collections::HashMap<String, Value>,
        options: TxOptions,
        fetch_size: i64,
    ) -> BoltResult<RecordStream<'_, T>> {
        let summary = self.run(statement, parameters, options).await?;
        let qid = summary.qid().unwrap_or(-1);
        Ok(RecordStream::new(self, qid, fetch_size))
    }
}
