use super::MultiMap;
use bytes::Bytes;
use may::sync::mpsc;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Canonical reason phrase for the statuses the dispatcher produces.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Status line and headers, mutable until the response ends.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: MultiMap,
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self {
            status: 200,
            headers: MultiMap::case_insensitive(),
        }
    }
}

/// A completed response as delivered to the transport.
#[derive(Debug, Clone)]
pub struct SentResponse {
    pub status: u16,
    pub headers: MultiMap,
    pub body: Bytes,
}

impl SentResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Where an ended response goes.
pub trait ResponseSink: Send {
    fn send(&mut self, response: SentResponse);
}

impl<F> ResponseSink for F
where
    F: FnMut(SentResponse) + Send,
{
    fn send(&mut self, response: SentResponse) {
        self(response)
    }
}

/// Sink that forwards the response over a may channel, like a handler reply channel.
pub struct ChannelSink {
    tx: mpsc::Sender<SentResponse>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport reads from.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<SentResponse>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl ResponseSink for ChannelSink {
    fn send(&mut self, response: SentResponse) {
        if self.tx.send(response).is_err() {
            debug!("response receiver dropped before the response ended");
        }
    }
}

type HeadersEndHook = Box<dyn FnOnce(&mut ResponseHead) + Send>;
type EndHook = Box<dyn FnOnce() + Send>;

struct ResponseState {
    head: ResponseHead,
    sink: Option<Box<dyn ResponseSink>>,
    ended: bool,
    headers_end: Vec<HeadersEndHook>,
    end_hooks: Vec<EndHook>,
}

/// Shared writer for one response.
///
/// Cloning shares the same response. The first `end` wins: headers-end hooks run
/// once, right before the head is frozen, and later `end` calls return `false`.
#[derive(Clone)]
pub struct ResponseHandle {
    inner: Arc<Mutex<ResponseState>>,
}

impl ResponseHandle {
    pub fn new(sink: impl ResponseSink + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResponseState {
                head: ResponseHead::default(),
                sink: Some(Box::new(sink)),
                ended: false,
                headers_end: Vec::new(),
                end_hooks: Vec::new(),
            })),
        }
    }

    /// A handle backed by a [`ChannelSink`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<SentResponse>) {
        let (sink, rx) = ChannelSink::new();
        (Self::new(sink), rx)
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.inner.lock().head.status
    }

    pub fn set_status(&self, status: u16) {
        self.inner.lock().head.status = status;
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner.lock().head.headers.get(name).map(str::to_string)
    }

    /// Replace a header value.
    pub fn put_header(&self, name: &str, value: impl Into<String>) {
        self.inner.lock().head.headers.set(name, value);
    }

    #[must_use]
    pub fn ended(&self) -> bool {
        self.inner.lock().ended
    }

    /// Register a hook that runs once when the headers are about to be sent.
    pub fn headers_end_handler(&self, hook: impl FnOnce(&mut ResponseHead) + Send + 'static) {
        self.inner.lock().headers_end.push(Box::new(hook));
    }

    /// Register a hook that runs after the response has been handed to the sink.
    pub fn end_handler(&self, hook: impl FnOnce() + Send + 'static) {
        self.inner.lock().end_hooks.push(Box::new(hook));
    }

    /// End with a body. Returns `false` if the response had already ended.
    pub fn end(&self, body: impl Into<Bytes>) -> bool {
        let body = body.into();
        let (sink, sent, end_hooks) = {
            let mut state = self.inner.lock();
            if state.ended {
                return false;
            }
            state.ended = true;
            state
                .head
                .headers
                .set("content-length", body.len().to_string());
            let hooks = std::mem::take(&mut state.headers_end);
            for hook in hooks {
                hook(&mut state.head);
            }
            let sent = SentResponse {
                status: state.head.status,
                headers: state.head.headers.clone(),
                body,
            };
            (
                state.sink.take(),
                sent,
                std::mem::take(&mut state.end_hooks),
            )
        };
        if let Some(mut sink) = sink {
            sink.send(sent);
        }
        for hook in end_hooks {
            hook();
        }
        true
    }

    /// End without a body.
    pub fn end_empty(&self) -> bool {
        self.end(Bytes::new())
    }
}

impl std::fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ResponseHandle")
            .field("status", &state.head.status)
            .field("ended", &state.ended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(415), "Unsupported Media Type");
    }

    #[test]
    fn test_end_is_single_shot_and_runs_hooks_once() {
        let (response, rx) = ResponseHandle::channel();
        response.headers_end_handler(|head| head.headers.set("x-hook", "1"));
        response.set_status(201);
        assert!(response.end("first"));
        assert!(!response.end("second"));
        let sent = rx.recv().unwrap();
        assert_eq!(sent.status, 201);
        assert_eq!(sent.text(), "first");
        assert_eq!(sent.header("x-hook"), Some("1"));
        assert_eq!(sent.header("content-length"), Some("5"));
        assert!(rx.try_recv().is_err());
    }
}
