//! # Call Lifecycle Module
//!
//! A [`MethodCaller`] wraps one resolved (descriptor, arguments) pair and ends the
//! request exactly once:
//!
//! ```text
//! Pending ──end_with_call──▶ Invoking ──result──▶ Ended
//!    │                           │
//!    └──────end_with_fail────────┴──────────────▶ Ended
//! ```
//!
//! Whichever transition into `Ended` wins writes the response; every later attempt is
//! a no-op, so a late blocking result or a duplicate failure never double-writes.

use crate::context::ContextValue;
use crate::descriptor::{Args, HandlerDescriptor, Reply};
use crate::error::RestError;
use crate::middleware::ResponseFilter;
use crate::serializer::Serializer;
use crate::server::{ResponseHandle, RestRequest};
use crate::worker_pool::BlockingExecutor;
use anyhow::anyhow;
use parking_lot::Mutex;
use serde_json::json;
use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

const PENDING: u8 = 0;
const INVOKING: u8 = 1;
const ENDED: u8 = 2;

/// Observable state of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Invoking,
    Ended,
}

/// A failure outcome: status plus the error to report, if any.
#[derive(Debug)]
pub struct Failure {
    pub status: u16,
    pub error: Option<RestError>,
}

impl Failure {
    /// A bare status without a diagnostic body.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            error: None,
        }
    }

    /// Status derived from the error kind.
    #[must_use]
    pub fn from_error(error: RestError) -> Self {
        Self {
            status: error.status(),
            error: Some(error),
        }
    }

    /// Explicit status with an attached error.
    #[must_use]
    pub fn with_error(status: u16, error: RestError) -> Self {
        Self {
            status,
            error: Some(error),
        }
    }
}

/// Writes failure outcomes to the response.
pub trait FailureHandler: Send + Sync {
    fn handle_failure(
        &self,
        request: &RestRequest,
        response: &ResponseHandle,
        failure: &Failure,
        serializer: &dyn Serializer,
    );
}

/// Writes the status and, when an error is attached, `{"error": message}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFailureHandler;

impl FailureHandler for DefaultFailureHandler {
    fn handle_failure(
        &self,
        request: &RestRequest,
        response: &ResponseHandle,
        failure: &Failure,
        serializer: &dyn Serializer,
    ) {
        if response.ended() {
            return;
        }
        let status = if failure.status == 0 {
            500
        } else {
            failure.status
        };
        response.set_status(status);
        let Some(err) = &failure.error else {
            response.end_empty();
            return;
        };
        match serializer.serialize(&json!({ "error": err.to_string() })) {
            Ok(body) => {
                if response.header("content-type").is_none() {
                    response.put_header(
                        "content-type",
                        format!("{};charset={}", serializer.media_type(), serializer.media_encode()),
                    );
                }
                response.end(body);
            }
            Err(e) => {
                error!(
                    request_id = %request.request_id(),
                    error = %e,
                    "failed to serialize failure body"
                );
                response.end_empty();
            }
        }
    }
}

/// Everything a [`MethodCaller`] needs.
pub struct CallParts {
    pub descriptor: Arc<HandlerDescriptor>,
    pub route_key: Arc<str>,
    pub resource: ContextValue,
    pub args: Args,
    pub request: Arc<RestRequest>,
    pub response: ResponseHandle,
    pub serializer: Arc<dyn Serializer>,
    pub failure_handler: Arc<dyn FailureHandler>,
    pub executor: Option<Arc<dyn BlockingExecutor>>,
}

/// Per-request call controller.
pub struct MethodCaller {
    descriptor: Arc<HandlerDescriptor>,
    route_key: Arc<str>,
    resource: ContextValue,
    args: Mutex<Option<Args>>,
    request: Arc<RestRequest>,
    response: ResponseHandle,
    serializer: Arc<dyn Serializer>,
    failure_handler: Arc<dyn FailureHandler>,
    executor: Option<Arc<dyn BlockingExecutor>>,
    state: AtomicU8,
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl MethodCaller {
    #[must_use]
    pub fn new(parts: CallParts) -> Arc<Self> {
        Arc::new(Self {
            descriptor: parts.descriptor,
            route_key: parts.route_key,
            resource: parts.resource,
            args: Mutex::new(Some(parts.args)),
            request: parts.request,
            response: parts.response,
            serializer: parts.serializer,
            failure_handler: parts.failure_handler,
            executor: parts.executor,
            state: AtomicU8::new(PENDING),
        })
    }

    #[must_use]
    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn route_key(&self) -> &str {
        &self.route_key
    }

    #[must_use]
    pub fn request(&self) -> &RestRequest {
        &self.request
    }

    #[must_use]
    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    #[must_use]
    pub fn state(&self) -> CallState {
        match self.state.load(Ordering::Acquire) {
            PENDING => CallState::Pending,
            INVOKING => CallState::Invoking,
            _ => CallState::Ended,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == CallState::Pending
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state() == CallState::Ended
    }

    /// Register the headers-end hook: default content type, then the response filter.
    ///
    /// The content type is only set when none is present and the body is not empty.
    pub fn install_headers_end(&self, response_filter: Option<Arc<dyn ResponseFilter>>) {
        let request = Arc::clone(&self.request);
        let serializer = Arc::clone(&self.serializer);
        self.response.headers_end_handler(move |head| {
            let empty = head.headers.get("content-length") == Some("0");
            if !empty && !head.headers.contains("content-type") {
                let media_type = request
                    .acceptable_content_type()
                    .unwrap_or_else(|| serializer.media_type());
                head.headers.set(
                    "content-type",
                    format!("{};charset={}", media_type, serializer.media_encode()),
                );
            }
            if let Some(filter) = response_filter {
                filter.filter(&request, head);
            }
        });
    }

    /// Invoke the handler and write its result.
    ///
    /// Blocking handlers are handed to the executor; ordered ones use the route key as
    /// their ordering key. Returns `false` if the call had already left `Pending`.
    pub fn end_with_call(self: &Arc<Self>) -> bool {
        if self
            .state
            .compare_exchange(PENDING, INVOKING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if !self.descriptor.is_blocking() {
            self.invoke_and_finish();
            return true;
        }
        let Some(executor) = self.executor.as_ref() else {
            warn!(
                handler = %self.descriptor.name(),
                "no blocking executor available, invoking inline"
            );
            self.invoke_and_finish();
            return true;
        };
        let ordering_key = self
            .descriptor
            .is_ordered()
            .then(|| self.route_key.as_ref());
        let this = Arc::clone(self);
        if let Err(err) = executor.execute(ordering_key, Box::new(move || this.invoke_and_finish()))
        {
            self.end_with_failure(Failure::from_error(err));
        }
        true
    }

    /// End with a bare status.
    pub fn end_with_fail_status(&self, status: u16) -> bool {
        self.end_with_failure(Failure::status(status))
    }

    /// End with an error; the status comes from the error kind.
    pub fn end_with_fail(&self, error: RestError) -> bool {
        self.end_with_failure(Failure::from_error(error))
    }

    /// End with a failure unless the call has already ended.
    pub fn end_with_failure(&self, failure: Failure) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        while current != ENDED {
            match self.state.compare_exchange(
                current,
                ENDED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.write_failure(&failure);
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
        debug!(
            request_id = %self.request.request_id(),
            status = failure.status,
            "call already ended, failure ignored"
        );
        false
    }

    fn invoke_and_finish(&self) {
        let args = self.args.lock().take().unwrap_or_default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.descriptor.invoke(&self.resource, args)
        }));
        let outcome = match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(RestError::Invocation(err)),
            Err(panic) => Err(RestError::Invocation(anyhow!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };
        self.finish(outcome);
    }

    fn finish(&self, outcome: Result<Reply, RestError>) {
        if self
            .state
            .compare_exchange(INVOKING, ENDED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(
                request_id = %self.request.request_id(),
                handler = %self.descriptor.name(),
                "call already ended, late result dropped"
            );
            return;
        }
        match outcome {
            Ok(_) if self.descriptor.handles_end() => {}
            Ok(Some(value)) => match self.serializer.serialize(&value) {
                Ok(body) => {
                    self.response.end(body);
                }
                Err(err) => self.write_failure(&Failure::from_error(err)),
            },
            Ok(None) => {
                self.response.end_empty();
            }
            Err(err) => {
                error!(
                    request_id = %self.request.request_id(),
                    handler = %self.descriptor.name(),
                    error = %err,
                    "handler invocation failed"
                );
                self.write_failure(&Failure::from_error(err));
            }
        }
    }

    fn write_failure(&self, failure: &Failure) {
        self.failure_handler.handle_failure(
            &self.request,
            &self.response,
            failure,
            self.serializer.as_ref(),
        );
    }
}

impl std::fmt::Debug for MethodCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodCaller")
            .field("handler", &self.descriptor.name())
            .field("route_key", &self.route_key)
            .field("state", &self.state())
            .finish()
    }
}
