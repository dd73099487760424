//! Route table and request acceptance.

use crate::caller::{DefaultFailureHandler, Failure, FailureHandler};
use crate::error::RestError;
use crate::middleware::RequestFilter;
use crate::runtime_config::ServerOptions;
use crate::serializer::{JsonSerializer, Serializer};
use crate::server::{ResponseHandle, RestRequest};
use crate::spec::RouteSpec;
use regex::Regex;
use smallvec::SmallVec;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, debug_span, info, warn};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Path parameters extracted by the router.
///
/// Names come from the route table, so they are shared `Arc<str>`s.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Outcome of handing a request to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The route took the request
    Handled,
    /// Nothing matched; the router moves on to the next route
    Declined,
}

/// Receives requests that matched a route's verb, path and content negotiation.
pub trait RouteHandler: Send + Sync {
    fn handle(&self, request: Arc<RestRequest>, response: &ResponseHandle) -> Dispatch;
}

struct RouteEntry {
    spec: RouteSpec,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    handler: Arc<dyn RouteHandler>,
}

impl RouteEntry {
    fn match_path(&self, path: &str) -> Option<ParamVec> {
        let captures = self.regex.captures(path)?;
        let mut params = ParamVec::new();
        for (index, name) in self.param_names.iter().enumerate() {
            if let Some(value) = captures.get(index + 1) {
                params.push((Arc::clone(name), value.as_str().to_string()));
            }
        }
        Some(params)
    }

    fn consumes(&self, content_type: Option<&str>) -> bool {
        if self.spec.consumes.is_empty() {
            return true;
        }
        content_type.is_some_and(|ct| self.spec.consumes.iter().any(|c| media_matches(c, ct)))
    }

    /// `None` when nothing acceptable is produced, `Some(None)` when the route declares
    /// no produces types.
    fn negotiate(&self, accept: Option<&str>) -> Option<Option<String>> {
        if self.spec.produces.is_empty() {
            return Some(None);
        }
        let accepted = parse_accept(accept.unwrap_or(""));
        if accepted.is_empty() {
            return Some(self.spec.produces.first().cloned());
        }
        for wanted in accepted {
            if let Some(produced) = self.spec.produces.iter().find(|p| media_matches(wanted, p)) {
                return Some(Some(produced.clone()));
            }
        }
        None
    }
}

/// True when `pattern` (possibly with `*` parts) covers `actual`.
pub(crate) fn media_matches(pattern: &str, actual: &str) -> bool {
    let strip = |t: &str| t.split(';').next().unwrap_or(t).trim().to_ascii_lowercase();
    let (pattern, actual) = (strip(pattern), strip(actual));
    let mut p = pattern.splitn(2, '/');
    let mut a = actual.splitn(2, '/');
    let part = |p: Option<&str>, a: Option<&str>| match (p, a) {
        (Some("*"), _) => true,
        (Some(p), Some(a)) => p == a,
        (None, None) => true,
        _ => false,
    };
    part(p.next(), a.next()) && part(p.next(), a.next())
}

/// Media types from an `Accept` header, highest quality first.
fn parse_accept(header: &str) -> Vec<&str> {
    let mut entries: Vec<(&str, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let media = parts.next()?.trim();
            if media.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((media, quality))
        })
        .filter(|(_, q)| *q > 0.0)
        .collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.into_iter().map(|(media, _)| media).collect()
}

/// Compile a route path into an anchored regex plus one parameter name per group.
///
/// Plain paths turn `:name` segments into `([^/]+)` and escape everything else. Regex
/// paths are used as written; unnamed groups are exposed as `param0`, `param1`, ...
pub(crate) fn path_to_regex(path: &str, is_regex: bool) -> Result<(Regex, Vec<Arc<str>>), regex::Error> {
    if is_regex {
        let regex = Regex::new(&format!("^{}$", path))?;
        let mut unnamed = 0;
        let names = regex
            .capture_names()
            .skip(1)
            .map(|name| match name {
                Some(name) => Arc::from(name),
                None => {
                    let name: Arc<str> = Arc::from(format!("param{}", unnamed).as_str());
                    unnamed += 1;
                    name
                }
            })
            .collect();
        return Ok((regex, names));
    }

    if path == "/" {
        return Ok((Regex::new(r"^/$")?, Vec::new()));
    }

    let mut pattern = String::with_capacity(path.len() + 5);
    pattern.push('^');
    let mut names = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        pattern.push('/');
        match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => {
                pattern.push_str("([^/]+)");
                names.push(Arc::from(name));
            }
            _ => pattern.push_str(&regex::escape(segment)),
        }
    }
    pattern.push('$');
    Ok((Regex::new(&pattern)?, names))
}

/// Verb + path route table in front of the dispatch engine.
///
/// Applies [`ServerOptions`] (body limit, form merging, upload cleanup), runs the
/// pre-handlers once, then offers the request to every matching route in registration
/// order until one handles it. Negotiation failures end the response through the
/// failure handler: 405 for a wrong verb, 415 for an unsupported content type, 406 when
/// nothing acceptable is produced, 404 otherwise.
pub struct Router {
    routes: Vec<RouteEntry>,
    pre_handlers: Vec<Arc<dyn RequestFilter>>,
    failure_handler: Arc<dyn FailureHandler>,
    serializer: Arc<dyn Serializer>,
    options: ServerOptions,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ServerOptions::default())
    }

    #[must_use]
    pub fn with_options(options: ServerOptions) -> Self {
        Self {
            routes: Vec::new(),
            pre_handlers: Vec::new(),
            failure_handler: Arc::new(DefaultFailureHandler),
            serializer: Arc::new(JsonSerializer),
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Register `handler` for `spec`. Fails when the path does not compile.
    pub fn route(&mut self, spec: RouteSpec, handler: Arc<dyn RouteHandler>) -> Result<(), RestError> {
        let (regex, param_names) = path_to_regex(&spec.path, spec.regex)
            .map_err(|e| RestError::configuration(&spec.key(), format!("invalid route path: {}", e)))?;
        debug!(route_key = %spec.key(), params = ?param_names, "route registered");
        self.routes.push(RouteEntry {
            spec,
            regex,
            param_names,
            handler,
        });
        Ok(())
    }

    /// Run `filter` on every request before routing.
    pub fn add_pre_handler(&mut self, filter: Arc<dyn RequestFilter>) {
        self.pre_handlers.push(filter);
    }

    pub fn set_failure_handler(&mut self, handler: Arc<dyn FailureHandler>) {
        self.failure_handler = handler;
    }

    pub fn set_serializer(&mut self, serializer: Arc<dyn Serializer>) {
        self.serializer = serializer;
    }

    /// Registered route specs, in matching order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.iter().map(|r| &r.spec)
    }

    /// Log the route table.
    pub fn dump_routes(&self) {
        info!(count = self.routes.len(), "route table");
        for entry in &self.routes {
            info!(route_key = %entry.spec.key(), "route");
        }
    }

    /// Route `request` and write its response through `response`.
    ///
    /// Returns [`Dispatch::Declined`] when no route handled the request; the failure
    /// response has been written in that case.
    pub fn accept(&self, mut request: RestRequest, response: &ResponseHandle) -> Dispatch {
        let span = debug_span!(
            "accept",
            request_id = %request.request_id(),
            method = %request.method(),
            path = %request.path()
        );
        let _enter = span.enter();

        if let Some(body) = request.raw_body() {
            if self.options.exceeds_body_limit(body.len()) {
                warn!(
                    body_len = body.len(),
                    body_limit = self.options.body_limit,
                    "request body exceeds limit"
                );
                self.fail(&request, response, Failure::status(413));
                return Dispatch::Declined;
            }
        }
        if self.options.merge_form_attributes {
            request.merge_form_into_query();
        }
        if self.options.delete_uploaded_files_on_end && !request.uploads().is_empty() {
            let files: Vec<PathBuf> = request
                .uploads()
                .iter()
                .map(|u| u.uploaded_file_name.clone())
                .filter(|file| {
                    let owned = self.options.owns_upload(file);
                    if !owned {
                        warn!(file = %file.display(), "upload outside upload path, not deleting");
                    }
                    owned
                })
                .collect();
            response.end_handler(move || {
                for file in files {
                    if let Err(e) = std::fs::remove_file(&file) {
                        debug!(file = %file.display(), error = %e, "failed to delete upload");
                    }
                }
            });
        }
        for filter in &self.pre_handlers {
            filter.filter(&mut request);
        }

        let (mut path_matched, mut verb_matched, mut consumes_matched, mut produces_matched) =
            (false, false, false, false);
        for entry in &self.routes {
            let Some(params) = entry.match_path(request.path()) else {
                continue;
            };
            path_matched = true;
            if entry.spec.verb != *request.method() {
                continue;
            }
            verb_matched = true;
            if !entry.consumes(request.content_type()) {
                continue;
            }
            consumes_matched = true;
            let Some(acceptable) = entry.negotiate(request.headers().get("accept")) else {
                continue;
            };
            produces_matched = true;

            let mut routed = request.clone();
            routed.set_path_params(params);
            routed.set_acceptable_content_type(acceptable);
            match entry.handler.handle(Arc::new(routed), response) {
                Dispatch::Handled => return Dispatch::Handled,
                Dispatch::Declined => {
                    debug!(route_key = %entry.spec.key(), "route declined request")
                }
            }
        }

        let failure = if !path_matched {
            Failure::from_error(RestError::NoRouteMatched {
                method: request.method().to_string(),
                path: request.path().to_string(),
            })
        } else if !verb_matched {
            Failure::status(405)
        } else if !consumes_matched {
            Failure::status(415)
        } else if !produces_matched {
            Failure::status(406)
        } else {
            Failure::from_error(RestError::NoRouteMatched {
                method: request.method().to_string(),
                path: request.path().to_string(),
            })
        };
        debug!(status = failure.status, "no route handled request");
        self.fail(&request, response, failure);
        Dispatch::Declined
    }

    fn fail(&self, request: &RestRequest, response: &ResponseHandle, failure: Failure) {
        self.failure_handler
            .handle_failure(request, response, &failure, self.serializer.as_ref());
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.iter().map(|r| r.spec.key()).collect::<Vec<_>>())
            .field("pre_handlers", &self.pre_handlers.len())
            .field("options", &self.options)
            .finish()
    }
}
