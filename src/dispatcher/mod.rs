//! # Dispatcher Module
//!
//! A [`RouteGroup`] owns every handler overload registered under one route key and turns
//! a routed request into a single handler call.
//!
//! ## Request Flow
//!
//! 1. Resolve the serializer and coercion registry from the context registry
//! 2. Seed the per-request context map (`RestRequest`, `ResponseHandle`, `RequestId`)
//! 3. Run two-phase overload resolution over the sorted descriptors
//! 4. Resolve the resource instance and build a [`MethodCaller`](crate::caller::MethodCaller)
//! 5. Install the headers-end hook (default content type, response filter)
//! 6. Hand the caller to the interceptor, or invoke it directly
//!
//! When no overload binds, the group declines and the router moves on. Configuration
//! errors (an unresolvable context type) end the request with a 500.
//!
//! ## Ordering
//!
//! The default comparator ranks overloads with more non-map parameters first, then those
//! with fewer defaulted parameters, then those with more map parameters. With overloads
//! `(p1)`, `(p1, p2 = "d2")` and `()` on `/same`, a request carrying only `p1` resolves
//! to `(p1)` in the first phase.

mod core;

pub use core::{compare_descriptors, default_method_comparator, MethodComparator, RouteGroup};
