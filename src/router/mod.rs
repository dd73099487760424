//! # Router Module
//!
//! A reference route table standing in for the transport-side router: it registers one
//! [`RouteHandler`] per [`RouteSpec`](crate::spec::RouteSpec), matches inbound requests
//! by verb and path, negotiates `Content-Type` / `Accept` against the route's consumes and
//! produces lists, and extracts path parameters.
//!
//! ## Path Syntax
//!
//! - Plain paths: literal segments plus `:name` parameters (`/users/:id`)
//! - Regex paths: anchored as written; named groups become parameters by name, unnamed
//!   groups become `param0`, `param1`, ...
//!
//! ## Example
//!
//! ```rust,ignore
//! use restmapper::router::Router;
//! use restmapper::server::{ResponseHandle, RestRequest};
//!
//! let mut router = Router::new();
//! mapper.apply_to(&mut router)?;
//!
//! let (response, rx) = ResponseHandle::channel();
//! router.accept(RestRequest::new(http::Method::GET, "/same?p1=x"), &response);
//! let sent = rx.recv()?;
//! ```

mod core;

pub use core::{Dispatch, ParamVec, RouteHandler, Router, MAX_INLINE_PARAMS};
