use crate::coerce::{Separator, Shape};
use crate::context::ContextKey;

/// How a body parameter reads the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTarget {
    /// Any JSON value
    Json,
    /// A JSON object
    Object,
    /// A JSON array
    Array,
    /// The raw bytes
    Bytes,
    /// The first uploaded file
    Upload,
    /// Body text coerced to the parameter shape
    Text,
}

/// One declarative marker attached to a handler parameter.
///
/// Markers are scanned in declaration order and the first binding marker decides
/// where the value comes from. `Separator` and `Tag` never bind on their own.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamMarker {
    Query { name: String, default: Option<String> },
    Header { name: String, default: Option<String> },
    Field { name: String, default: Option<String> },
    Path { name: String, default: Option<String> },
    Body { target: BodyTarget, default: Option<String> },
    File { name: String, many: bool },
    FileSet,
    FileMap,
    QueryMap { multi: bool },
    HeaderMap { multi: bool },
    FieldMap { multi: bool },
    PathMap,
    Context(ContextKey),
    Separator(Separator),
    Tag(String),
}

/// Declaration of one handler parameter.
///
/// ```rust
/// use restmapper::descriptor::Param;
/// use restmapper::coerce::{Separator, Shape};
///
/// let ids = Param::query("ids")
///     .default_value("1")
///     .shape(Shape::array_of(Shape::i64()))
///     .separator(Separator::new(","));
/// assert_eq!(ids.markers().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    markers: Vec<ParamMarker>,
    shape: Shape,
    declared_type: Option<ContextKey>,
}

impl Param {
    fn with_marker(marker: ParamMarker) -> Self {
        Self {
            markers: vec![marker],
            shape: Shape::default(),
            declared_type: None,
        }
    }

    /// A parameter built from raw markers, scanned in order.
    pub fn from_markers(markers: Vec<ParamMarker>) -> Self {
        Self {
            markers,
            shape: Shape::default(),
            declared_type: None,
        }
    }

    /// An unmarked parameter of type `T`; it is injected from the context.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            markers: Vec::new(),
            shape: Shape::default(),
            declared_type: Some(ContextKey::of::<T>()),
        }
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::with_marker(ParamMarker::Query {
            name: name.into(),
            default: None,
        })
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::with_marker(ParamMarker::Header {
            name: name.into(),
            default: None,
        })
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::with_marker(ParamMarker::Field {
            name: name.into(),
            default: None,
        })
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::with_marker(ParamMarker::Path {
            name: name.into(),
            default: None,
        })
    }

    /// Body text coerced to the parameter shape.
    pub fn body() -> Self {
        Self::body_as(BodyTarget::Text)
    }

    pub fn body_as(target: BodyTarget) -> Self {
        Self::with_marker(ParamMarker::Body {
            target,
            default: None,
        })
    }

    /// The first upload of the named form field.
    pub fn file(name: impl Into<String>) -> Self {
        Self::with_marker(ParamMarker::File {
            name: name.into(),
            many: false,
        })
    }

    /// Every upload of the named form field.
    pub fn files(name: impl Into<String>) -> Self {
        Self::with_marker(ParamMarker::File {
            name: name.into(),
            many: true,
        })
    }

    pub fn file_set() -> Self {
        Self::with_marker(ParamMarker::FileSet)
    }

    pub fn file_map() -> Self {
        Self::with_marker(ParamMarker::FileMap)
    }

    /// All query parameters, one value per name.
    pub fn query_map() -> Self {
        Self::with_marker(ParamMarker::QueryMap { multi: false })
    }

    pub fn query_multimap() -> Self {
        Self::with_marker(ParamMarker::QueryMap { multi: true })
    }

    pub fn header_map() -> Self {
        Self::with_marker(ParamMarker::HeaderMap { multi: false })
    }

    pub fn header_multimap() -> Self {
        Self::with_marker(ParamMarker::HeaderMap { multi: true })
    }

    pub fn field_map() -> Self {
        Self::with_marker(ParamMarker::FieldMap { multi: false })
    }

    pub fn field_multimap() -> Self {
        Self::with_marker(ParamMarker::FieldMap { multi: true })
    }

    pub fn path_map() -> Self {
        Self::with_marker(ParamMarker::PathMap)
    }

    /// Inject `T` from the per-request context or the registry.
    pub fn context<T: ?Sized + 'static>() -> Self {
        let mut param = Self::with_marker(ParamMarker::Context(ContextKey::of::<T>()));
        param.declared_type = Some(ContextKey::of::<T>());
        param
    }

    /// Attach a default to the most recent query/header/field/path/body marker.
    ///
    /// An empty string is a real default, distinct from having none.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        let slot = self.markers.iter_mut().rev().find_map(|m| match m {
            ParamMarker::Query { default, .. }
            | ParamMarker::Header { default, .. }
            | ParamMarker::Field { default, .. }
            | ParamMarker::Path { default, .. }
            | ParamMarker::Body { default, .. } => Some(default),
            _ => None,
        });
        if let Some(slot) = slot {
            *slot = Some(value);
        }
        self
    }

    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn separator(mut self, separator: Separator) -> Self {
        self.markers.push(ParamMarker::Separator(separator));
        self
    }

    /// Attach an application marker; the dispatcher ignores it.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.markers.push(ParamMarker::Tag(tag.into()));
        self
    }

    /// Append any marker.
    pub fn marker(mut self, marker: ParamMarker) -> Self {
        self.markers.push(marker);
        self
    }

    #[must_use]
    pub fn markers(&self) -> &[ParamMarker] {
        &self.markers
    }

    #[must_use]
    pub fn declared_shape(&self) -> &Shape {
        &self.shape
    }

    #[must_use]
    pub fn declared_type(&self) -> Option<ContextKey> {
        self.declared_type
    }
}
