use super::resource::{Resource, ResourceDefinition, ResourceType};
use crate::caller::{DefaultFailureHandler, FailureHandler};
use crate::coerce::CoercionRegistry;
use crate::context::{ContextKey, ContextProvider, ContextRegistry};
use crate::descriptor::HandlerDescriptor;
use crate::dispatcher::{default_method_comparator, MethodComparator, RouteGroup};
use crate::error::RestError;
use crate::middleware::{MethodInterceptor, RequestFilter, ResponseFilter};
use crate::router::{RouteHandler, Router};
use crate::serializer::{JsonSerializer, Serializer};
use crate::server::RestRequest;
use crate::spec::{RoutePath, RouteSpec};
use crate::worker_pool::{BlockingExecutor, WorkerPool, WorkerPoolConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Path and negotiation lists inherited down a mount chain.
#[derive(Debug, Clone, Default)]
struct Inherited {
    path: RoutePath,
    consumes: Option<Vec<String>>,
    produces: Option<Vec<String>>,
}

/// Route groups under construction, indexed by route key.
#[derive(Default)]
struct RouteTable {
    groups: Vec<Arc<RouteGroup>>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    fn group(
        &mut self,
        spec: RouteSpec,
        registry: &Arc<ContextRegistry>,
        comparator: &MethodComparator,
    ) -> Arc<RouteGroup> {
        let key = spec.key();
        if let Some(group) = self.index.get(&key).and_then(|&i| self.groups.get(i)) {
            return Arc::clone(group);
        }
        let group = Arc::new(RouteGroup::new(
            spec,
            Arc::clone(registry),
            Arc::clone(comparator),
        ));
        self.index.insert(key, self.groups.len());
        self.groups.push(Arc::clone(&group));
        group
    }
}

/// Route registry and context provider.
///
/// Collects resource types, builds one [`RouteGroup`] per route key and owns the
/// [`ContextRegistry`] that supplies resource instances, injected arguments and the
/// cross-cutting collaborators (serializer, interceptor, filters, failure handler,
/// blocking executor).
pub struct RestMapper {
    registry: Arc<ContextRegistry>,
    resources: Vec<ResourceType>,
    instances: Vec<ContextKey>,
    comparator: MethodComparator,
}

impl Default for RestMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl RestMapper {
    /// A mapper with the default serializer, coercions and failure handler, and a
    /// lazily started worker pool as blocking executor.
    #[must_use]
    pub fn new() -> Self {
        let registry = Arc::new(ContextRegistry::new());
        registry.insert::<dyn Serializer>(Arc::new(JsonSerializer));
        registry.insert(Arc::new(CoercionRegistry::default()));
        registry.insert::<dyn FailureHandler>(Arc::new(DefaultFailureHandler));
        registry.insert_factory::<dyn BlockingExecutor, _>(|_| {
            Ok(Arc::new(WorkerPool::new("blocking", WorkerPoolConfig::from_env()))
                as Arc<dyn BlockingExecutor>)
        });
        Self {
            registry,
            resources: Vec::new(),
            instances: Vec::new(),
            comparator: default_method_comparator(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    fn push_resource(&mut self, resource: ResourceType) {
        if !self.resources.contains(&resource) {
            self.resources.push(resource);
        }
    }

    /// Register a resource type built with `R::default()` and injected on first use.
    pub fn add_resource<R: Resource + Default>(&mut self) -> &mut Self {
        let resource = ResourceType::of::<R>();
        if let Err(err) = resource.ensure_registered(&self.registry) {
            error!(resource = resource.name(), error = %err, "failed to register resource");
        }
        self.push_resource(resource);
        self
    }

    /// Register a ready resource instance. It is injected when routes are applied.
    pub fn add_resource_instance<R: Resource>(&mut self, resource: R) -> &mut Self {
        let slot = Mutex::new(Some(resource));
        self.registry.insert_factory::<R, _>(move |registry| {
            let mut instance = slot.lock().take().ok_or_else(|| {
                RestError::configuration(std::any::type_name::<R>(), "instance already consumed")
            })?;
            instance.inject(registry)?;
            Ok(Arc::new(instance))
        });
        let key = ContextKey::of::<R>();
        if !self.instances.contains(&key) {
            self.instances.push(key);
        }
        self.push_resource(ResourceType::instance::<R>());
        self
    }

    /// Register a context value, replacing any previous one of the same type.
    pub fn add_context_instance<T>(&self, value: Arc<T>) -> &Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.registry.insert(value);
        self
    }

    /// Register a context type built with `T::default()` on first resolution.
    pub fn add_context_class<T>(&self) -> &Self
    where
        T: Default + Send + Sync + 'static,
    {
        self.registry.insert_default::<T>();
        self
    }

    /// Resolve a context value, constructing and caching it on first use.
    pub fn provide_context<T: ?Sized + 'static>(&self) -> Result<Option<Arc<T>>, RestError> {
        self.registry.resolve::<T>()
    }

    /// Replace the serializer; `None` restores the JSON default.
    pub fn set_serializer(&self, serializer: Option<Arc<dyn Serializer>>) {
        self.registry.insert::<dyn Serializer>(
            serializer.unwrap_or_else(|| Arc::new(JsonSerializer) as Arc<dyn Serializer>),
        );
    }

    pub fn set_coercions(&self, coercions: CoercionRegistry) {
        self.registry.insert(Arc::new(coercions));
    }

    /// Install or clear the method interceptor.
    pub fn set_method_interceptor(&self, interceptor: Option<Arc<dyn MethodInterceptor>>) {
        match interceptor {
            Some(interceptor) => self.registry.insert::<dyn MethodInterceptor>(interceptor),
            None => {
                self.registry.remove::<dyn MethodInterceptor>();
            }
        }
    }

    pub fn set_request_filter(&self, filter: Option<Arc<dyn RequestFilter>>) {
        match filter {
            Some(filter) => self.registry.insert::<dyn RequestFilter>(filter),
            None => {
                self.registry.remove::<dyn RequestFilter>();
            }
        }
    }

    pub fn set_response_filter(&self, filter: Option<Arc<dyn ResponseFilter>>) {
        match filter {
            Some(filter) => self.registry.insert::<dyn ResponseFilter>(filter),
            None => {
                self.registry.remove::<dyn ResponseFilter>();
            }
        }
    }

    /// Replace the failure handler; `None` restores the default.
    pub fn set_failure_handler(&self, handler: Option<Arc<dyn FailureHandler>>) {
        self.registry.insert::<dyn FailureHandler>(
            handler.unwrap_or_else(|| Arc::new(DefaultFailureHandler) as Arc<dyn FailureHandler>),
        );
    }

    pub fn set_blocking_executor(&self, executor: Arc<dyn BlockingExecutor>) {
        self.registry.insert::<dyn BlockingExecutor>(executor);
    }

    pub fn set_extra_context_provider(&self, provider: Option<Arc<dyn ContextProvider>>) {
        self.registry.set_extra_provider(provider);
    }

    /// Replace the overload comparator for groups built afterwards; `None` restores
    /// the default ranking.
    pub fn set_method_comparator(&mut self, comparator: Option<MethodComparator>) {
        self.comparator = comparator.unwrap_or_else(default_method_comparator);
    }

    /// Walk every auto-deployed resource and its mounts into route groups.
    pub fn build_routes(&self) -> Result<Vec<Arc<RouteGroup>>, RestError> {
        let mut table = RouteTable::default();
        for resource in &self.resources {
            let definition = resource.describe();
            if !definition.url.is_auto() {
                debug!(resource = resource.name(), "resource deploys only through mounts");
                continue;
            }
            let mut chain = Vec::new();
            self.walk(
                resource,
                &definition,
                &Inherited::default(),
                &mut chain,
                &mut table,
            )?;
        }
        info!(
            resources = self.resources.len(),
            route_groups = table.groups.len(),
            "route table built"
        );
        Ok(table.groups)
    }

    fn walk(
        &self,
        resource: &ResourceType,
        definition: &ResourceDefinition,
        parent: &Inherited,
        chain: &mut Vec<ContextKey>,
        table: &mut RouteTable,
    ) -> Result<(), RestError> {
        if chain.contains(&resource.key()) {
            error!(resource = resource.name(), "mount cycle detected");
            return Err(RestError::configuration(resource.name(), "mount cycle"));
        }
        chain.push(resource.key());
        resource.ensure_registered(&self.registry)?;

        let base = Inherited {
            path: parent.path.join(&definition.url),
            consumes: definition.consumes.clone().or_else(|| parent.consumes.clone()),
            produces: definition.produces.clone().or_else(|| parent.produces.clone()),
        };
        if let Some(child) = definition.url.child() {
            self.walk(child, &child.describe(), &base, chain, table)?;
        }

        for method in &definition.methods {
            let scope = Inherited {
                path: match &method.url {
                    Some(url) => base.path.join(url),
                    None => base.path.clone(),
                },
                consumes: method.consumes.clone().or_else(|| base.consumes.clone()),
                produces: method.produces.clone().or_else(|| base.produces.clone()),
            };
            if let Some(child) = method.url.as_ref().and_then(|url| url.child()) {
                self.walk(child, &child.describe(), &scope, chain, table)?;
            }
            if method.verbs.is_empty() {
                continue;
            }
            let handler = method.handler.clone().ok_or_else(|| {
                RestError::configuration(
                    resource.name(),
                    format!("method {} declares verbs but no handler", method.name),
                )
            })?;
            let descriptor = Arc::new(HandlerDescriptor::new(
                format!("{}::{}", resource.name(), method.name),
                resource.key(),
                &method.params,
                method.flags.clone(),
                handler,
            )?);
            for verb in &method.verbs {
                let consumes = verb
                    .consumes
                    .clone()
                    .or_else(|| scope.consumes.clone())
                    .unwrap_or_default();
                let produces = verb
                    .produces
                    .clone()
                    .or_else(|| scope.produces.clone())
                    .unwrap_or_default();
                let spec = RouteSpec::new(verb.method.clone(), &scope.path)
                    .consumes(consumes)
                    .produces(produces);
                table
                    .group(spec, &self.registry, &self.comparator)
                    .add_descriptor(Arc::clone(&descriptor));
            }
        }

        chain.pop();
        Ok(())
    }

    /// Build the route groups and register them on `router`, together with the
    /// request-filter pre-handler, serializer and failure handler.
    ///
    /// Resource instances added with [`add_resource_instance`](Self::add_resource_instance)
    /// are injected here, before the first request.
    pub fn apply_to(&self, router: &mut Router) -> Result<Vec<Arc<RouteGroup>>, RestError> {
        for key in &self.instances {
            self.registry.resolve_key(key)?;
        }
        let groups = self.build_routes()?;
        for group in &groups {
            router.route(
                group.spec().clone(),
                Arc::clone(group) as Arc<dyn RouteHandler>,
            )?;
        }

        let registry = Arc::clone(&self.registry);
        router.add_pre_handler(Arc::new(move |request: &mut RestRequest| {
            match registry.resolve::<dyn RequestFilter>() {
                Ok(Some(filter)) => filter.filter(request),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "request filter unavailable"),
            }
        }));
        if let Some(serializer) = self.registry.resolve::<dyn Serializer>()? {
            router.set_serializer(serializer);
        }
        if let Some(handler) = self.registry.resolve::<dyn FailureHandler>()? {
            router.set_failure_handler(handler);
        }

        info!(route_groups = groups.len(), "rest mapper applied to router");
        Ok(groups)
    }
}

impl std::fmt::Debug for RestMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestMapper")
            .field("resources", &self.resources)
            .field("registry", &self.registry)
            .finish()
    }
}
