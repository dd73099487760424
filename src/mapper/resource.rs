use crate::context::{downcast_context, ContextKey, ContextRegistry, ContextValue};
use crate::descriptor::{Args, HandlerFn, MethodFlags, Param, Reply};
use crate::error::RestError;
use crate::spec::{normalize_media_types, UrlSpec};
use anyhow::anyhow;
use http::Method;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type exposing handler methods.
///
/// `declare` describes the routes once at registration; `inject` runs once on every
/// instance the mapper resolves, before it serves any request.
pub trait Resource: Send + Sync + 'static {
    fn declare(decl: &mut ResourceDecl<Self>)
    where
        Self: Sized;

    /// Populate fields from the context registry.
    fn inject(&mut self, _context: &ContextRegistry) -> Result<(), RestError> {
        Ok(())
    }
}

/// One verb marker, optionally with its own negotiation lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbDecl {
    pub method: Method,
    pub consumes: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
}

/// Type-erased method declaration.
#[derive(Clone)]
pub struct MethodDefinition {
    pub name: String,
    pub verbs: Vec<VerbDecl>,
    pub url: Option<UrlSpec>,
    pub consumes: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
    pub flags: MethodFlags,
    pub params: Vec<Param>,
    pub handler: Option<HandlerFn>,
}

impl std::fmt::Debug for MethodDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDefinition")
            .field("name", &self.name)
            .field("verbs", &self.verbs)
            .field("url", &self.url)
            .field("params", &self.params.len())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Type-erased resource declaration.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    pub url: UrlSpec,
    pub consumes: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
    pub methods: Vec<MethodDefinition>,
}

/// Resource-level declaration builder passed to [`Resource::declare`].
pub struct ResourceDecl<R> {
    definition: ResourceDefinition,
    _resource: PhantomData<fn(&R)>,
}

impl<R: Resource> ResourceDecl<R> {
    pub(crate) fn new() -> Self {
        Self {
            definition: ResourceDefinition {
                url: UrlSpec::default(),
                consumes: None,
                produces: None,
                methods: Vec::new(),
            },
            _resource: PhantomData,
        }
    }

    pub fn url(&mut self, url: UrlSpec) -> &mut Self {
        self.definition.url = url;
        self
    }

    pub fn consumes<I, S>(&mut self, types: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.definition.consumes = Some(normalize_media_types(types));
        self
    }

    pub fn produces<I, S>(&mut self, types: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.definition.produces = Some(normalize_media_types(types));
        self
    }

    /// Declare a handler method.
    pub fn method(
        &mut self,
        name: impl Into<String>,
        build: impl FnOnce(MethodDecl<R>) -> MethodDecl<R>,
    ) -> &mut Self {
        let decl = build(MethodDecl::new(name.into()));
        self.definition.methods.push(decl.definition);
        self
    }

    pub(crate) fn finish(self) -> ResourceDefinition {
        self.definition
    }
}

/// Method-level declaration builder.
pub struct MethodDecl<R> {
    definition: MethodDefinition,
    _resource: PhantomData<fn(&R)>,
}

impl<R: Resource> MethodDecl<R> {
    fn new(name: String) -> Self {
        Self {
            definition: MethodDefinition {
                name,
                verbs: Vec::new(),
                url: None,
                consumes: None,
                produces: None,
                flags: MethodFlags::default(),
                params: Vec::new(),
                handler: None,
            },
            _resource: PhantomData,
        }
    }

    /// Add a verb marker.
    #[must_use]
    pub fn verb(self, method: Method) -> Self {
        self.verb_with(method, None, None)
    }

    /// Add a verb marker carrying its own consumes/produces lists.
    #[must_use]
    pub fn verb_with(
        mut self,
        method: Method,
        consumes: Option<&[&str]>,
        produces: Option<&[&str]>,
    ) -> Self {
        self.definition.verbs.push(VerbDecl {
            method,
            consumes: consumes.map(|c| normalize_media_types(c.iter())),
            produces: produces.map(|p| normalize_media_types(p.iter())),
        });
        self
    }

    #[must_use]
    pub fn get(self) -> Self {
        self.verb(Method::GET)
    }

    #[must_use]
    pub fn post(self) -> Self {
        self.verb(Method::POST)
    }

    #[must_use]
    pub fn put(self) -> Self {
        self.verb(Method::PUT)
    }

    #[must_use]
    pub fn patch(self) -> Self {
        self.verb(Method::PATCH)
    }

    #[must_use]
    pub fn delete(self) -> Self {
        self.verb(Method::DELETE)
    }

    #[must_use]
    pub fn head(self) -> Self {
        self.verb(Method::HEAD)
    }

    #[must_use]
    pub fn options(self) -> Self {
        self.verb(Method::OPTIONS)
    }

    #[must_use]
    pub fn url(mut self, url: UrlSpec) -> Self {
        self.definition.url = Some(url);
        self
    }

    #[must_use]
    pub fn consumes<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.definition.consumes = Some(normalize_media_types(types));
        self
    }

    #[must_use]
    pub fn produces<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.definition.produces = Some(normalize_media_types(types));
        self
    }

    /// Run on the blocking executor; `ordered` keeps submission order per route.
    #[must_use]
    pub fn blocking(mut self, ordered: bool) -> Self {
        self.definition.flags.blocking = true;
        self.definition.flags.ordered = ordered;
        self
    }

    /// The handler ends the response itself; its return value is not written.
    #[must_use]
    pub fn handles_end(mut self) -> Self {
        self.definition.flags.handles_end = true;
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.definition.flags.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.definition.params.push(param);
        self
    }

    #[must_use]
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&R, Args) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        let erased: HandlerFn = Arc::new(move |resource: &ContextValue, args: Args| {
            let resource = downcast_context::<R>(resource).ok_or_else(|| {
                anyhow!("resource instance is not a {}", std::any::type_name::<R>())
            })?;
            handler(resource.as_ref(), args)
        });
        self.definition.handler = Some(erased);
        self
    }
}

fn describe<R: Resource>() -> ResourceDefinition {
    let mut decl = ResourceDecl::<R>::new();
    R::declare(&mut decl);
    decl.finish()
}

fn register_default<R: Resource + Default>(registry: &ContextRegistry) {
    registry.insert_factory::<R, _>(|registry| {
        let mut resource = R::default();
        resource.inject(registry)?;
        Ok(Arc::new(resource))
    });
}

/// Runtime handle on a resource type: its key, its declarations and, for
/// default-constructible types, how to register it on demand.
#[derive(Clone, Copy)]
pub struct ResourceType {
    key: ContextKey,
    describe: fn() -> ResourceDefinition,
    register: Option<fn(&ContextRegistry)>,
}

impl ResourceType {
    #[must_use]
    pub fn of<R: Resource + Default>() -> Self {
        Self {
            key: ContextKey::of::<R>(),
            describe: describe::<R>,
            register: Some(register_default::<R>),
        }
    }

    /// A type registered from a ready instance only.
    pub(crate) fn instance<R: Resource>() -> Self {
        Self {
            key: ContextKey::of::<R>(),
            describe: describe::<R>,
            register: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> ContextKey {
        self.key
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    #[must_use]
    pub fn describe(&self) -> ResourceDefinition {
        (self.describe)()
    }

    /// Register the type in `registry` unless it is already present.
    pub(crate) fn ensure_registered(&self, registry: &ContextRegistry) -> Result<(), RestError> {
        if registry.contains_key(&self.key) {
            return Ok(());
        }
        match self.register {
            Some(register) => {
                register(registry);
                Ok(())
            }
            None => Err(RestError::configuration(
                self.name(),
                "resource has no zero-argument constructor and no registered instance",
            )),
        }
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ResourceType {}

impl std::fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ResourceType").field(&self.name()).finish()
    }
}
