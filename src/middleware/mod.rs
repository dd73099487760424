//! # Middleware Module
//!
//! Cross-cutting hooks resolved from the context registry on every dispatch:
//!
//! - [`RequestFilter`] - mutates the inbound request once, before routing
//! - [`MethodInterceptor`] - sees the resolved [`MethodCaller`] before invocation and
//!   may end it itself (e.g. an authorization check)
//! - [`ResponseFilter`] - mutates the response head right before it is sent
//!
//! Closures implement the filter traits directly.

use crate::caller::MethodCaller;
use crate::server::{ResponseHead, RestRequest};
use std::sync::Arc;

/// What the dispatcher does after an interceptor returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// Invoke the handler unless the interceptor already ended the call
    Proceed,
    /// The interceptor owns the call and will end it
    Handled,
}

/// Hook around handler invocation.
pub trait MethodInterceptor: Send + Sync {
    fn intercept(&self, caller: &Arc<MethodCaller>) -> Interception;
}

/// Pre-dispatch mutation of the inbound request.
pub trait RequestFilter: Send + Sync {
    fn filter(&self, request: &mut RestRequest);
}

/// Pre-send mutation of the outbound response head.
pub trait ResponseFilter: Send + Sync {
    fn filter(&self, request: &RestRequest, head: &mut ResponseHead);
}

impl<F> RequestFilter for F
where
    F: Fn(&mut RestRequest) + Send + Sync,
{
    fn filter(&self, request: &mut RestRequest) {
        self(request)
    }
}

impl<F> ResponseFilter for F
where
    F: Fn(&RestRequest, &mut ResponseHead) + Send + Sync,
{
    fn filter(&self, request: &RestRequest, head: &mut ResponseHead) {
        self(request, head)
    }
}

impl<F> MethodInterceptor for F
where
    F: Fn(&Arc<MethodCaller>) -> Interception + Send + Sync,
{
    fn intercept(&self, caller: &Arc<MethodCaller>) -> Interception {
        self(caller)
    }
}
