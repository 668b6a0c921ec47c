//! Order-preserving body relay.
//!
//! `RelayBody` wraps one direction of an exchange. Frames pass through in the
//! order they are polled, untouched. For the upstream → client direction it
//! also owns the exchange and the upstream connection lease, so the upstream
//! connection closes as soon as the response body ends, fails, or is dropped
//! by a departing client.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::oneshot;
use tokio::time::{Instant, Sleep};

use crate::proxy::connector::ConnectionLease;
use crate::proxy::exchange::Exchange;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which way a body is flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client request body → upstream.
    Inbound,
    /// Upstream response body → client.
    Outbound,
}

/// The upstream went quiet for longer than the idle timeout.
#[derive(Debug)]
pub struct IdleTimeout(pub Duration);

impl fmt::Display for IdleTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream idle for more than {}s", self.0.as_secs())
    }
}

impl std::error::Error for IdleTimeout {}

struct IdleTimer {
    after: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl IdleTimer {
    fn new(after: Duration) -> Self {
        Self {
            after,
            sleep: Box::pin(tokio::time::sleep(after)),
        }
    }

    fn reset(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.after);
    }
}

/// A body adapter that relays frames and tracks the exchange.
pub struct RelayBody<B: Body> {
    inner: B,
    direction: Direction,
    bytes: u64,
    idle: Option<IdleTimer>,
    exchange: Option<Exchange>,
    lease: Option<ConnectionLease>,
    end_signal: Option<oneshot::Sender<()>>,
    done: bool,
}

impl<B: Body> RelayBody<B> {
    pub fn new(inner: B, direction: Direction) -> Self {
        Self {
            inner,
            direction,
            bytes: 0,
            idle: None,
            exchange: None,
            lease: None,
            end_signal: None,
            done: false,
        }
    }

    /// Fail the body if no frame arrives within `after`. Must be called
    /// inside a tokio runtime.
    pub fn with_idle_timeout(mut self, after: Option<Duration>) -> Self {
        self.idle = after.map(IdleTimer::new);
        self
    }

    /// End `exchange` together with this body.
    pub fn with_exchange(mut self, exchange: Exchange) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Keep the upstream connection open exactly as long as this body.
    pub fn with_lease(mut self, lease: ConnectionLease) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Fire `signal` once the body reaches end-of-stream. It is dropped
    /// unsent if the body fails or is dropped early.
    pub fn with_end_signal(mut self, signal: oneshot::Sender<()>) -> Self {
        self.end_signal = Some(signal);
        self
    }

    /// Data bytes relayed so far.
    pub fn bytes_relayed(&self) -> u64 {
        self.bytes
    }

    fn finish(&mut self) {
        self.done = true;
        self.lease = None;
        if let Some(signal) = self.end_signal.take() {
            let _ = signal.send(());
        }
        if let Some(mut exchange) = self.exchange.take() {
            exchange.complete(self.bytes);
        }
        tracing::trace!(direction = ?self.direction, bytes = self.bytes, "Body relay finished");
    }

    fn abort(&mut self, reason: &BoxError) {
        self.done = true;
        self.lease = None;
        self.end_signal = None;
        match self.exchange.take() {
            Some(mut exchange) => exchange.fail(None, reason),
            None => tracing::debug!(
                direction = ?self.direction,
                bytes = self.bytes,
                error = %reason,
                "Body relay aborted"
            ),
        }
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes += data.len() as u64;
                }
                if let Some(idle) = this.idle.as_mut() {
                    idle.reset();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                let err = e.into();
                this.abort(&err);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => {
                if let Some(idle) = this.idle.as_mut() {
                    if idle.sleep.as_mut().poll(cx).is_ready() {
                        let err: BoxError = Box::new(IdleTimeout(idle.after));
                        this.abort(&err);
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Poll::Pending
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        if self.done {
            SizeHint::with_exact(0)
        } else {
            self.inner.size_hint()
        }
    }
}

impl<B: Body> Drop for RelayBody<B> {
    fn drop(&mut self) {
        if let Some(mut exchange) = self.exchange.take() {
            // A body that reported end-of-stream up front may never be polled.
            if self.inner.is_end_stream() {
                exchange.complete(self.bytes);
            } else {
                exchange.fail(None, &"client went away mid-relay");
            }
        }
    }
}

impl<B: Body> fmt::Debug for RelayBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBody")
            .field("direction", &self.direction)
            .field("bytes", &self.bytes)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt, Empty, Full, StreamBody};
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_frames_relayed_in_order() {
        let chunks: Vec<Result<Frame<Bytes>, Infallible>> = vec![
            Ok(Frame::data(Bytes::from_static(b"one,"))),
            Ok(Frame::data(Bytes::from_static(b"two,"))),
            Ok(Frame::data(Bytes::from_static(b"three"))),
        ];
        let inner = StreamBody::new(futures_util::stream::iter(chunks));
        let mut body = RelayBody::new(inner, Direction::Outbound);

        let mut seen = Vec::new();
        while let Some(frame) = body.frame().await {
            seen.push(frame.unwrap().into_data().unwrap());
        }
        assert_eq!(seen, vec!["one,", "two,", "three"]);
        assert_eq!(body.bytes_relayed(), 13);
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_full_body_passthrough() {
        let body = RelayBody::new(Full::new(Bytes::from_static(b"{\"ok\":true}")), Direction::Inbound);
        assert_eq!(body.size_hint().exact(), Some(11));
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"{\"ok\":true}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_fires() {
        let inner = StreamBody::new(futures_util::stream::pending::<Result<Frame<Bytes>, Infallible>>());
        let mut body = RelayBody::new(inner, Direction::Outbound)
            .with_idle_timeout(Some(Duration::from_secs(5)));

        let err = body.frame().await.unwrap().unwrap_err();
        assert!(err.is::<IdleTimeout>());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_end_signal_fires_after_last_frame() {
        let (tx, mut rx) = oneshot::channel();
        let chunks: Vec<Result<Frame<Bytes>, Infallible>> =
            vec![Ok(Frame::data(Bytes::from_static(b"upload")))];
        let mut body = RelayBody::new(StreamBody::new(futures_util::stream::iter(chunks)), Direction::Inbound)
            .with_end_signal(tx);

        body.frame().await.unwrap().unwrap();
        assert!(rx.try_recv().is_err());
        assert!(body.frame().await.is_none());
        assert_eq!(rx.try_recv(), Ok(()));
    }

    #[tokio::test]
    async fn test_end_signal_dropped_with_unfinished_body() {
        let (tx, rx) = oneshot::channel();
        let inner = StreamBody::new(futures_util::stream::pending::<Result<Frame<Bytes>, Infallible>>());
        let body = RelayBody::new(inner, Direction::Inbound).with_end_signal(tx);

        drop(body);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_empty_body_is_end_stream() {
        let body = RelayBody::new(Empty::<Bytes>::new(), Direction::Inbound);
        assert!(body.is_end_stream());
    }
}
