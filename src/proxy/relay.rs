//! Streaming response relay.
//!
//! Wraps the upstream body so frames flow to the client under the flush
//! discipline the response calls for, and maps end-of-body trailers
//! against what was announced before the status line went out.
//!
//! The debounce mode is a two-state machine — idle, or pending with an
//! armed timer; the body is polled by a single connection task, so the
//! state needs no lock.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use axum::http::header::{HeaderMap, HeaderName, CONTENT_LENGTH, CONTENT_TYPE};
use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame};
use hyper::body::Incoming;
use tokio::time::Sleep;

/// Prefix applied to trailers the upstream sent without announcing them,
/// so the client can tell declared trailers from late ones.
pub const LATE_TRAILER_PREFIX: &str = "x-unannounced-trailer-";

/// Upper bound on buffered bytes per relayed response while debouncing.
const MAX_PENDING: usize = 32 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How eagerly body frames are pushed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushMode {
    /// Every upstream frame is forwarded as soon as it arrives.
    PerWrite,
    /// No forced cadence; the connection buffers as it sees fit.
    Passthrough,
    /// Frames accumulate and go out at most once per interval.
    Debounced(Duration),
}

/// Server-Sent Events and unknown-length streams flush per write; bounded
/// bodies follow the configured interval (none by default).
pub(crate) fn select_flush_mode(headers: &HeaderMap, configured: Duration) -> FlushMode {
    let media_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok());

    if let Some(media_type) = media_type {
        if media_type.essence_str() == mime::TEXT_EVENT_STREAM.essence_str() {
            return FlushMode::PerWrite;
        }
    }

    if !headers.contains_key(CONTENT_LENGTH) {
        return FlushMode::PerWrite;
    }

    if configured.is_zero() {
        FlushMode::Passthrough
    } else {
        FlushMode::Debounced(configured)
    }
}

pub(crate) struct RelayBody {
    upstream: Incoming,
    announced: usize,
    mode: FlushMode,
    pending: BytesMut,
    delay: Option<Pin<Box<Sleep>>>,
    held_trailers: Option<HeaderMap>,
    upstream_done: bool,
}

impl RelayBody {
    pub(crate) fn new(upstream: Incoming, announced: usize, mode: FlushMode) -> Self {
        Self {
            upstream,
            announced,
            mode,
            pending: BytesMut::new(),
            delay: None,
            held_trailers: None,
            upstream_done: false,
        }
    }

    /// Announced trailers pass through untouched; any mismatch marks the
    /// whole set as late.
    fn map_trailers(&self, observed: HeaderMap) -> HeaderMap {
        if observed.keys().count() == self.announced {
            return observed;
        }

        let mut late = HeaderMap::with_capacity(observed.len());

        for (name, value) in observed.iter() {
            let renamed = format!("{LATE_TRAILER_PREFIX}{name}");

            if let Ok(renamed) = HeaderName::from_bytes(renamed.as_bytes()) {
                late.append(renamed, value.clone());
            }
        }

        late
    }

    fn take_pending(&mut self) -> Frame<Bytes> {
        self.delay = None;
        Frame::data(self.pending.split().freeze())
    }
}

impl Body for RelayBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        let interval = match this.mode {
            // Flush-through modes forward upstream frames one-to-one.
            FlushMode::PerWrite | FlushMode::Passthrough => {
                return match ready!(Pin::new(&mut this.upstream).poll_frame(cx)) {
                    Some(Ok(frame)) => match frame.into_trailers() {
                        Ok(trailers) => {
                            Poll::Ready(Some(Ok(Frame::trailers(this.map_trailers(trailers)))))
                        }
                        Err(frame) => Poll::Ready(Some(Ok(frame))),
                    },
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "aborting with incomplete response");
                        Poll::Ready(Some(Err(e.into())))
                    }
                    None => Poll::Ready(None),
                };
            }
            FlushMode::Debounced(interval) => interval,
        };

        loop {
            if this.upstream_done {
                if !this.pending.is_empty() {
                    return Poll::Ready(Some(Ok(this.take_pending())));
                }

                return match this.held_trailers.take() {
                    Some(trailers) => {
                        Poll::Ready(Some(Ok(Frame::trailers(this.map_trailers(trailers)))))
                    }
                    None => Poll::Ready(None),
                };
            }

            match Pin::new(&mut this.upstream).poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => match frame.into_trailers() {
                    Ok(trailers) => {
                        this.held_trailers = Some(trailers);
                        this.upstream_done = true;
                    }
                    Err(frame) => {
                        if let Ok(data) = frame.into_data() {
                            this.pending.extend_from_slice(&data);

                            if this.pending.len() >= MAX_PENDING {
                                return Poll::Ready(Some(Ok(this.take_pending())));
                            }

                            if this.delay.is_none() {
                                this.delay = Some(Box::pin(tokio::time::sleep(interval)));
                            }
                        }
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    tracing::error!(error = %e, "aborting with incomplete response");
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    this.upstream_done = true;
                }
                Poll::Pending => {
                    // Nothing new from upstream; release the buffer if the
                    // debounce window has elapsed.
                    if let Some(delay) = this.delay.as_mut() {
                        if delay.as_mut().poll(cx).is_ready() {
                            if this.pending.is_empty() {
                                this.delay = None;
                            } else {
                                return Poll::Ready(Some(Ok(this.take_pending())));
                            }
                        }
                    }

                    return Poll::Pending;
                }
            }
        }
    }
}
