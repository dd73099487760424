use crate::caller::{CallParts, DefaultFailureHandler, Failure, FailureHandler, MethodCaller};
use crate::coerce::{Coercer, CoercionRegistry};
use crate::context::{ContextMap, ContextRegistry};
use crate::descriptor::{Args, BindContext, HandlerDescriptor};
use crate::error::RestError;
use crate::middleware::{Interception, MethodInterceptor, ResponseFilter};
use crate::router::{Dispatch, RouteHandler};
use crate::serializer::{JsonSerializer, Serializer};
use crate::server::{ResponseHandle, RestRequest};
use crate::spec::RouteSpec;
use crate::worker_pool::BlockingExecutor;
use arc_swap::ArcSwap;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, debug_span, error};

/// Ranking of descriptors inside a route group; `Less` sorts first and wins.
pub type MethodComparator =
    Arc<dyn Fn(&HandlerDescriptor, &HandlerDescriptor) -> Ordering + Send + Sync>;

/// More non-map parameters first, then fewer defaulted ones, then more maps.
#[must_use]
pub fn compare_descriptors(a: &HandlerDescriptor, b: &HandlerDescriptor) -> Ordering {
    b.non_map_count()
        .cmp(&a.non_map_count())
        .then_with(|| a.default_count().cmp(&b.default_count()))
        .then_with(|| b.map_count().cmp(&a.map_count()))
}

#[must_use]
pub fn default_method_comparator() -> MethodComparator {
    Arc::new(compare_descriptors)
}

/// All handler overloads registered under one route key.
///
/// The descriptor list is kept sorted by the comparator; that order is the resolution
/// priority. Registration swaps in a freshly sorted list, so readers never observe a
/// partially sorted one.
pub struct RouteGroup {
    spec: RouteSpec,
    key: Arc<str>,
    descriptors: ArcSwap<Vec<Arc<HandlerDescriptor>>>,
    comparator: MethodComparator,
    registry: Arc<ContextRegistry>,
}

impl RouteGroup {
    pub fn new(spec: RouteSpec, registry: Arc<ContextRegistry>, comparator: MethodComparator) -> Self {
        let key = Arc::from(spec.key().as_str());
        Self {
            spec,
            key,
            descriptors: ArcSwap::from_pointee(Vec::new()),
            comparator,
            registry,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Snapshot of the descriptors in resolution order.
    #[must_use]
    pub fn descriptors(&self) -> Arc<Vec<Arc<HandlerDescriptor>>> {
        self.descriptors.load_full()
    }

    /// Insert `descriptor` and re-sort. The sort is stable, so equal-ranked overloads
    /// keep registration order.
    pub fn add_descriptor(&self, descriptor: Arc<HandlerDescriptor>) {
        self.descriptors.rcu(|current| {
            let mut next: Vec<Arc<HandlerDescriptor>> = current.iter().map(Arc::clone).collect();
            next.push(Arc::clone(&descriptor));
            next.sort_by(|a, b| (self.comparator)(a, b));
            next
        });
        debug!(
            route_key = %self.key,
            handler = %descriptor.name(),
            overloads = self.descriptors.load().len(),
            "handler added to route group"
        );
    }

    fn attempt(
        &self,
        descriptor: &HandlerDescriptor,
        request: &RestRequest,
        ctx: &BindContext<'_>,
        allow_defaults: bool,
    ) -> Result<Option<Args>, RestError> {
        match descriptor.build_arguments(request, ctx, allow_defaults) {
            Ok(args) => Ok(Some(args)),
            Err(err) if err.is_bind_failure() => {
                debug!(
                    route_key = %self.key,
                    handler = %descriptor.name(),
                    allow_defaults,
                    error = %err,
                    "overload did not bind"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Pick the overload for `request` and bind its arguments.
    ///
    /// Phase 1 ignores defaults and stops early at the first overload without non-map
    /// parameters unless a defaulted overload has failed before it. Phase 2 runs only in
    /// that case, with defaults, over the defaulted and parameterless overloads.
    /// `Ok(None)` means no overload matched; errors other than bind failures abort.
    pub fn resolve(
        &self,
        request: &RestRequest,
        ctx: &BindContext<'_>,
    ) -> Result<Option<(Arc<HandlerDescriptor>, Args)>, RestError> {
        let descriptors = self.descriptors.load();
        let mut second_phase = false;
        for descriptor in descriptors.iter() {
            if let Some(args) = self.attempt(descriptor, request, ctx, false)? {
                return Ok(Some((Arc::clone(descriptor), args)));
            }
            if descriptor.has_defaults() {
                second_phase = true;
            } else if !descriptor.has_non_map_params() && !second_phase {
                break;
            }
        }
        if !second_phase {
            return Ok(None);
        }
        for descriptor in descriptors
            .iter()
            .filter(|d| d.has_defaults() || !d.has_non_map_params())
        {
            if let Some(args) = self.attempt(descriptor, request, ctx, true)? {
                return Ok(Some((Arc::clone(descriptor), args)));
            }
        }
        Ok(None)
    }

    fn serializer(&self) -> Result<Arc<dyn Serializer>, RestError> {
        Ok(self
            .registry
            .resolve::<dyn Serializer>()?
            .unwrap_or_else(|| Arc::new(JsonSerializer) as Arc<dyn Serializer>))
    }

    fn failure_handler(&self) -> Result<Arc<dyn FailureHandler>, RestError> {
        Ok(self
            .registry
            .resolve::<dyn FailureHandler>()?
            .unwrap_or_else(|| Arc::new(DefaultFailureHandler) as Arc<dyn FailureHandler>))
    }

    fn dispatch(
        &self,
        request: &Arc<RestRequest>,
        response: &ResponseHandle,
    ) -> Result<Dispatch, RestError> {
        let serializer = self.serializer()?;
        let coercions = self
            .registry
            .resolve::<CoercionRegistry>()?
            .unwrap_or_default();

        let mut context_map = ContextMap::new();
        context_map.insert(Arc::clone(request));
        context_map.insert(Arc::new(response.clone()));
        context_map.insert(Arc::new(request.request_id()));
        let ctx = BindContext {
            coercer: Coercer::new(&coercions, serializer.as_ref()),
            registry: &self.registry,
            context_map: &context_map,
        };

        let Some((descriptor, args)) = self.resolve(request, &ctx)? else {
            debug!(route_key = %self.key, "no overload matched, declining");
            return Ok(Dispatch::Declined);
        };
        debug!(route_key = %self.key, handler = %descriptor.name(), "overload resolved");

        let resource_key = descriptor.resource();
        let resource = self.registry.resolve_key(&resource_key)?.ok_or_else(|| {
            RestError::configuration(resource_key.name(), "resource type is not registered")
        })?;
        let executor = if descriptor.is_blocking() {
            self.registry.resolve::<dyn BlockingExecutor>()?
        } else {
            None
        };

        let caller = MethodCaller::new(CallParts {
            descriptor,
            route_key: Arc::clone(&self.key),
            resource,
            args,
            request: Arc::clone(request),
            response: response.clone(),
            serializer,
            failure_handler: self.failure_handler()?,
            executor,
        });
        caller.install_headers_end(self.registry.resolve::<dyn ResponseFilter>()?);

        match self.registry.resolve::<dyn MethodInterceptor>()? {
            Some(interceptor) => {
                if interceptor.intercept(&caller) == Interception::Proceed && caller.is_pending() {
                    caller.end_with_call();
                }
            }
            None => {
                caller.end_with_call();
            }
        }
        Ok(Dispatch::Handled)
    }
}

impl RouteHandler for RouteGroup {
    fn handle(&self, request: Arc<RestRequest>, response: &ResponseHandle) -> Dispatch {
        let span = debug_span!(
            "route_group",
            route_key = %self.key,
            request_id = %request.request_id()
        );
        let _enter = span.enter();

        match self.dispatch(&request, response) {
            Ok(dispatch) => dispatch,
            Err(err) => {
                error!(route_key = %self.key, error = %err, "dispatch failed");
                let serializer = self
                    .serializer()
                    .unwrap_or_else(|_| Arc::new(JsonSerializer) as Arc<dyn Serializer>);
                let handler = self
                    .failure_handler()
                    .unwrap_or_else(|_| Arc::new(DefaultFailureHandler) as Arc<dyn FailureHandler>);
                handler.handle_failure(
                    &request,
                    response,
                    &Failure::from_error(err),
                    serializer.as_ref(),
                );
                Dispatch::Handled
            }
        }
    }
}

impl std::fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGroup")
            .field("key", &self.key)
            .field("descriptors", &self.descriptors.load().len())
            .finish()
    }
}
