//! # Route Declaration Module
//!
//! Declarative path metadata and the route keys derived from it.
//!
//! - [`UrlSpec`] - a path declaration on a resource or method (plain or regex, auto-deploy
//!   flag, optional mounted child resource)
//! - [`RoutePath`] - the result of joining declarations down a mount chain
//! - [`RouteSpec`] - verb + path + consumes/produces; its [`RouteSpec::key`] identifies one
//!   route group
//!
//! ## Joining
//!
//! Leading and trailing slashes are trimmed from every segment and empty segments are
//! skipped, so `/root/` + `child` + `/` resolves to `/root/child`. As soon as a regex
//! segment joins, the path becomes a regex and all literal text is escaped.

mod route;
mod url;

pub use route::{normalize_media_types, RouteSpec};
pub use url::{RoutePath, UrlSpec};
