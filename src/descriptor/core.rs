use super::args::{Arg, Args};
use super::binding::{BindingKind, ParamBinding, Source};
use super::param::{BodyTarget, Param};
use crate::coerce::Coercer;
use crate::context::{ContextKey, ContextMap, ContextRegistry, ContextValue};
use crate::error::RestError;
use crate::server::{MultiMap, RestRequest};
use serde_json::Value;
use std::sync::Arc;

/// Handler result: a value to serialize, or nothing for an empty success.
pub type Reply = Option<Value>;

/// Type-erased handler. The first argument is the resolved resource instance.
pub type HandlerFn = Arc<dyn Fn(&ContextValue, Args) -> anyhow::Result<Reply> + Send + Sync>;

/// Method-level execution markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFlags {
    /// Run the invocation on the blocking executor
    pub blocking: bool,
    /// Keep submission order among blocking calls of the same route
    pub ordered: bool,
    /// The handler writes and ends the response itself
    pub handles_end: bool,
    /// Application markers, readable by interceptors
    pub tags: Vec<String>,
}

/// Collaborators needed to bind arguments for one request.
pub struct BindContext<'a> {
    pub coercer: Coercer<'a>,
    pub registry: &'a ContextRegistry,
    pub context_map: &'a ContextMap,
}

/// Introspected metadata and binder for one handler method.
///
/// Built once at registration; the counts drive overload ranking.
pub struct HandlerDescriptor {
    name: String,
    resource: ContextKey,
    bindings: Vec<ParamBinding>,
    flags: MethodFlags,
    bound_count: usize,
    map_count: usize,
    file_count: usize,
    default_count: usize,
    handler: HandlerFn,
}

impl HandlerDescriptor {
    /// Classify `params` and precompute the ranking counts.
    ///
    /// Fails when a parameter carries no binding marker and no declared type.
    pub fn new(
        name: impl Into<String>,
        resource: ContextKey,
        params: &[Param],
        flags: MethodFlags,
        handler: HandlerFn,
    ) -> Result<Self, RestError> {
        let name = name.into();
        let mut bindings = Vec::with_capacity(params.len());
        for (index, param) in params.iter().enumerate() {
            let binding = ParamBinding::scan(param).ok_or_else(|| {
                RestError::configuration(
                    &name,
                    format!("parameter {} has no binding marker and no declared type", index),
                )
            })?;
            bindings.push(binding);
        }

        let (mut bound_count, mut map_count, mut file_count, mut default_count) = (0, 0, 0, 0);
        for binding in bindings.iter().filter(|b| b.kind.is_counted()) {
            bound_count += 1;
            if binding.kind.is_map() {
                map_count += 1;
            } else if binding.kind == BindingKind::File {
                file_count += 1;
            } else if binding.default_value().is_some() {
                default_count += 1;
            }
        }

        Ok(Self {
            name,
            resource,
            bindings,
            flags,
            bound_count,
            map_count,
            file_count,
            default_count,
            handler,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context key of the resource type that owns this handler.
    #[must_use]
    pub fn resource(&self) -> ContextKey {
        self.resource
    }

    #[must_use]
    pub fn bindings(&self) -> &[ParamBinding] {
        &self.bindings
    }

    #[must_use]
    pub fn flags(&self) -> &MethodFlags {
        &self.flags
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.flags.blocking
    }

    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.flags.ordered
    }

    #[must_use]
    pub fn handles_end(&self) -> bool {
        self.flags.handles_end
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.flags.tags.iter().any(|t| t == tag)
    }

    /// Parameters bound from the request, maps included.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.bound_count
    }

    #[must_use]
    pub fn map_count(&self) -> usize {
        self.map_count
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    #[must_use]
    pub fn default_count(&self) -> usize {
        self.default_count
    }

    #[must_use]
    pub fn non_map_count(&self) -> usize {
        self.bound_count - self.map_count
    }

    #[must_use]
    pub fn has_non_map_params(&self) -> bool {
        self.non_map_count() > 0
    }

    #[must_use]
    pub fn has_defaults(&self) -> bool {
        self.default_count > 0
    }

    /// Bind every parameter from `request`.
    ///
    /// With `allow_defaults` false, configured defaults are ignored. A missing value
    /// is a [`RestError::Bind`]; a malformed one a [`RestError::Coercion`]. Context
    /// lookups never fail the attempt unless construction itself fails.
    pub fn build_arguments(
        &self,
        request: &RestRequest,
        ctx: &BindContext<'_>,
        allow_defaults: bool,
    ) -> Result<Args, RestError> {
        let mut args = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            match bind(binding, request, ctx, allow_defaults)? {
                Some(arg) => args.push(arg),
                None => {
                    return Err(RestError::Bind {
                        param: binding.display_name(),
                    })
                }
            }
        }
        Ok(Args::new(args))
    }

    /// Call the handler on `resource`.
    pub fn invoke(&self, resource: &ContextValue, args: Args) -> anyhow::Result<Reply> {
        (self.handler)(resource, args)
    }
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("resource", &self.resource.name())
            .field("bindings", &self.bindings.len())
            .field("bound", &self.bound_count)
            .field("maps", &self.map_count)
            .field("defaults", &self.default_count)
            .field("flags", &self.flags)
            .finish()
    }
}

fn map_arg(map: &MultiMap, multi: bool) -> Arg {
    if multi {
        Arg::MultiMap(map.clone())
    } else {
        Arg::Map(map.to_single_map())
    }
}

fn bind(
    binding: &ParamBinding,
    request: &RestRequest,
    ctx: &BindContext<'_>,
    allow_defaults: bool,
) -> Result<Option<Arg>, RestError> {
    let default = if allow_defaults {
        binding.default_value()
    } else {
        None
    };
    let shape = &binding.shape;
    let separator = binding.separator.as_ref();
    let arg = match (binding.kind, &binding.source) {
        (BindingKind::Query, Source::Named { name, .. }) => ctx
            .coercer
            .coerce_values(&request.query().get_all(name), default, shape, separator)?
            .map(Arg::Value),
        (BindingKind::Header, Source::Named { name, .. }) => ctx
            .coercer
            .coerce_values(&request.headers().get_all(name), default, shape, separator)?
            .map(Arg::Value),
        (BindingKind::FormField, Source::Named { name, .. }) => ctx
            .coercer
            .coerce_values(&request.form().get_all(name), default, shape, separator)?
            .map(Arg::Value),
        (BindingKind::PathSegment, Source::Named { name, .. }) => ctx
            .coercer
            .coerce_value(request.get_path_param(name), default, shape, separator)?
            .map(Arg::Value),
        (BindingKind::Body, Source::Body { target, .. }) => match target {
            BodyTarget::Text => ctx
                .coercer
                .coerce_value(request.body_text()?, default, shape, separator)?
                .map(Arg::Value),
            BodyTarget::Json => request.body_json()?.map(Arg::Value),
            BodyTarget::Object => request
                .body_json()?
                .filter(Value::is_object)
                .map(Arg::Value),
            BodyTarget::Array => request.body_json()?.filter(Value::is_array).map(Arg::Value),
            BodyTarget::Bytes => request.raw_body().cloned().map(Arg::Bytes),
            BodyTarget::Upload => request.uploads().first().cloned().map(Arg::Upload),
        },
        (BindingKind::File, Source::File { name, many }) => {
            let mut matching = request.uploads().iter().filter(|u| &u.name == name);
            if *many {
                Some(Arg::Uploads(matching.cloned().collect()))
            } else {
                matching.next().cloned().map(Arg::Upload)
            }
        }
        (BindingKind::FileSet, _) => Some(Arg::Uploads(request.uploads().to_vec())),
        (BindingKind::FileMap, _) => Some(Arg::UploadMap(
            request
                .uploads()
                .iter()
                .map(|u| (u.name.clone(), u.clone()))
                .collect(),
        )),
        (BindingKind::QueryMap, Source::Map { multi }) => Some(map_arg(request.query(), *multi)),
        (BindingKind::HeaderMap, Source::Map { multi }) => {
            Some(map_arg(request.headers(), *multi))
        }
        (BindingKind::FormMap, Source::Map { multi }) => Some(map_arg(request.form(), *multi)),
        (BindingKind::PathMap, _) => Some(Arg::Map(
            request
                .path_params()
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )),
        (BindingKind::Context, Source::Context(key)) => {
            let value = match ctx.context_map.get(key) {
                Some(value) => Some(value),
                None => ctx.registry.resolve_key(key)?,
            };
            Some(Arg::Context(value))
        }
        _ => None,
    };
    Ok(arg)
}
