//! # restmapper
//!
//! **restmapper** is a declarative HTTP dispatch engine built on the `may` coroutine runtime.
//! Resources declare their handler methods once (verb, path, content types, parameter
//! sources); the engine resolves each inbound request to the right overload, binds request
//! data into typed arguments, invokes the handler and serializes its result.
//!
//! ## Architecture
//!
//! - **[`coerce`]** - string to typed value conversion (scalars, arrays, lists, bracketed and
//!   nested separators) through an extensible registry
//! - **[`descriptor`]** - per-method binding descriptors, ranking counts and argument building
//! - **[`dispatcher`]** - route groups and the two-phase overload resolution
//! - **[`caller`]** - the per-request call lifecycle and failure translation
//! - **[`mapper`]** - resource declarations, mount chains and route-table construction
//! - **[`context`]** - typed dependency injection, lazily constructed and cached
//! - **[`router`]** - a reference route table with content negotiation
//! - **[`server`]** - request, response and multi-map types shared with the transport
//! - **[`worker_pool`]** - may-coroutine executor for blocking handlers, with ordered lanes
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant Router
//!     participant Group as RouteGroup
//!     participant Caller as MethodCaller
//!     participant Handler
//!
//!     Transport->>Router: accept(request, response)
//!     Router->>Router: body limit, request filter
//!     Router->>Router: match verb + path, negotiate
//!     Router->>Group: handle(request)
//!     Group->>Group: phase 1 (no defaults)
//!     Group->>Group: phase 2 (defaults), if needed
//!     alt no overload binds
//!         Group-->>Router: Declined
//!         Router-->>Transport: 404
//!     else resolved
//!         Group->>Caller: interceptor or end_with_call
//!         Caller->>Handler: invoke (inline or blocking pool)
//!         Handler-->>Caller: Option<Value> / error
//!         Caller-->>Transport: serialized body or failure
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use restmapper::descriptor::Param;
//! use restmapper::mapper::{Resource, ResourceDecl, RestMapper};
//! use restmapper::router::Router;
//! use restmapper::server::{ResponseHandle, RestRequest};
//! use restmapper::spec::UrlSpec;
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct SameUrl;
//!
//! impl Resource for SameUrl {
//!     fn declare(decl: &mut ResourceDecl<Self>) {
//!         decl.url(UrlSpec::new("/same"))
//!             .method("one", |m| {
//!                 m.get()
//!                     .param(Param::query("p1"))
//!                     .handler(|_, args| Ok(Some(json!({ "p1": args.str(0) }))))
//!             })
//!             .method("none", |m| m.get().handler(|_, _| Ok(Some(json!("none")))));
//!     }
//! }
//!
//! let mut mapper = RestMapper::new();
//! mapper.add_resource::<SameUrl>();
//! let mut router = Router::new();
//! mapper.apply_to(&mut router)?;
//!
//! let (response, rx) = ResponseHandle::channel();
//! router.accept(RestRequest::new(http::Method::GET, "/same?p1=x"), &response);
//! assert_eq!(rx.recv()?.json()?, json!({ "p1": "x" }));
//! ```
//!
//! ## Configuration
//!
//! Runtime settings come from `RESTMAP_*` environment variables (see [`runtime_config`]
//! and [`logging`]); request handling options load from YAML or JSON via
//! [`runtime_config::ServerOptions::load`].

pub mod caller;
pub mod coerce;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod mapper;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod serializer;
pub mod server;
pub mod spec;
pub mod worker_pool;

pub use caller::{DefaultFailureHandler, Failure, FailureHandler, MethodCaller};
pub use context::{ContextKey, ContextRegistry};
pub use descriptor::{Args, Param, Reply};
pub use error::RestError;
pub use mapper::{Resource, ResourceDecl, RestMapper};
pub use middleware::{Interception, MethodInterceptor, RequestFilter, ResponseFilter};
pub use router::{Dispatch, Router};
pub use serializer::{JsonSerializer, Serializer};
pub use server::{ResponseHandle, RestRequest};
pub use spec::UrlSpec;
