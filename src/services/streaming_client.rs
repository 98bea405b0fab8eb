//! Cancellable access to the transformation service.
//!
//! [`StreamingTransformClient::invoke`] establishes a stream (retrying
//! transient failures) and hands back a [`TransformStream`] that stops as soon
//! as the caller's cancellation token fires. Errors after establishment are
//! delivered as stream items and never retried.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{Stream, StreamExt, TakeUntil};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::errors::{ComposerError, TransformError};
use crate::domain::models::session::Chunk;
use crate::domain::ports::{ChunkStream, TransformRequest, TransformService};
use crate::infrastructure::transform::{RetryFailure, RetryPolicy};

/// Established chunk stream bound to a cancellation token.
///
/// Lazy and single-pass. Once the token is cancelled no further chunk is
/// yielded, and dropping the stream releases the underlying connection.
pub struct TransformStream {
    inner: TakeUntil<ChunkStream, BoxFuture<'static, ()>>,
    cancel: CancellationToken,
    ended: bool,
    cancelled: bool,
}

impl TransformStream {
    fn new(chunks: ChunkStream, cancel: CancellationToken) -> Self {
        let token = cancel.clone();
        let cancelled = async move { token.cancelled().await }.boxed();
        Self {
            inner: chunks.take_until(cancelled),
            cancel,
            ended: false,
            cancelled: false,
        }
    }

    /// True if the stream ended because the token fired before the service
    /// finished sending.
    pub const fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Stream for TransformStream {
    type Item = Result<Chunk, TransformError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.ended {
            return Poll::Ready(None);
        }

        let item = ready!(self.inner.poll_next_unpin(cx));
        if item.is_none() {
            // a natural end also leaves `TakeUntil` stopped
            self.ended = true;
            self.cancelled = self.cancel.is_cancelled();
        }
        Poll::Ready(item)
    }
}

#[derive(Clone)]
pub struct StreamingTransformClient {
    service: Arc<dyn TransformService>,
    retry_policy: RetryPolicy,
}

impl StreamingTransformClient {
    pub fn new(service: Arc<dyn TransformService>, retry_policy: RetryPolicy) -> Self {
        Self {
            service,
            retry_policy,
        }
    }

    pub fn service_name(&self) -> &str {
        self.service.service_name()
    }

    /// Open a stream for `request`.
    ///
    /// # Errors
    /// - [`ComposerError::Cancelled`] if `cancel` fires before the stream is up
    /// - [`ComposerError::StreamEstablish`] once retries are exhausted or on a
    ///   permanent failure
    pub async fn invoke(
        &self,
        request: &TransformRequest,
        cancel: CancellationToken,
    ) -> Result<TransformStream, ComposerError> {
        debug!(
            service = self.service.service_name(),
            action = %request.action.kind(),
            input_chars = request.text.chars().count(),
            "Opening transform stream"
        );

        let chunks = self
            .retry_policy
            .execute(&cancel, || self.service.open_stream(request))
            .await
            .map_err(|RetryFailure { attempts, error }| match error {
                TransformError::Cancelled => ComposerError::Cancelled,
                source => ComposerError::StreamEstablish { attempts, source },
            })?;

        info!(service = self.service.service_name(), "Transform stream established");
        Ok(TransformStream::new(chunks, cancel))
    }
}
