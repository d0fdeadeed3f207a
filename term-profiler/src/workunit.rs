//! Work units and the lazy stream that emits them.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, FusedStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One profiling result record, produced by the profiler service.
///
/// The orchestrator never inspects or alters the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Unique id of the record
    pub id: String,
    /// Dataset identifier of the profiled table
    pub dataset_name: String,
    /// Opaque profile produced by the service
    pub payload: serde_json::Value,
}

impl WorkUnit {
    pub fn new(
        id: impl Into<String>,
        dataset_name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            dataset_name: dataset_name.into(),
            payload,
        }
    }
}

/// Outcome of one profiling job: a work unit, or nothing when the table's
/// failure was isolated and reported.
pub(crate) type JobOutcome = Result<Option<WorkUnit>>;

/// Lazy, single-pass sequence of work units for one profiling pass.
///
/// Units arrive in completion order, not catalog order. Nothing runs until
/// the stream is polled. The stream ends after the first fatal error, and
/// dropping it early cancels in-flight jobs and releases their connections.
pub struct WorkUnitStream {
    inner: Option<BoxStream<'static, JobOutcome>>,
}

impl WorkUnitStream {
    pub(crate) fn new(inner: BoxStream<'static, JobOutcome>) -> Self {
        Self { inner: Some(inner) }
    }

    /// A stream that yields nothing.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Drains the stream, stopping at the first fatal error.
    pub async fn try_collect_units(mut self) -> Result<Vec<WorkUnit>> {
        let mut units = Vec::new();
        while let Some(unit) = self.next().await {
            units.push(unit?);
        }
        Ok(units)
    }
}

impl std::fmt::Debug for WorkUnitStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkUnitStream")
            .field("terminated", &self.inner.is_none())
            .finish()
    }
}

impl Stream for WorkUnitStream {
    type Item = Result<WorkUnit>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match inner.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(Some(unit)))) => return Poll::Ready(Some(Ok(unit))),
                Poll::Ready(Some(Ok(None))) => continue,
                Poll::Ready(Some(Err(e))) => {
                    this.inner = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.inner = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for WorkUnitStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}
