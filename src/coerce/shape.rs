use std::fmt;

/// Target shape of a coerced parameter.
///
/// `Named` covers the built-in scalars (`i32`, `f64`, `bool`, `string`, ...) as well as
/// application shapes that fall through to the serializer. `Array` has a fixed element
/// shape, while the element of a `List` may be overridden by [`Separator::element`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Named(String),
    Array(Box<Shape>),
    List(Box<Shape>),
}

impl Shape {
    pub fn named(name: impl Into<String>) -> Self {
        Shape::Named(name.into())
    }

    pub fn string() -> Self {
        Shape::named("string")
    }

    pub fn boolean() -> Self {
        Shape::named("bool")
    }

    pub fn i32() -> Self {
        Shape::named("i32")
    }

    pub fn i64() -> Self {
        Shape::named("i64")
    }

    pub fn f64() -> Self {
        Shape::named("f64")
    }

    pub fn array_of(element: Shape) -> Self {
        Shape::Array(Box::new(element))
    }

    pub fn list_of(element: Shape) -> Self {
        Shape::List(Box::new(element))
    }

    /// True for `Array` and `List`.
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        matches!(self, Shape::Array(_) | Shape::List(_))
    }

    /// True for the plain `string` shape, which is never trimmed.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Shape::Named(name) if name == "string")
    }

    /// Element shape of a sequence, honoring a separator's element override for lists.
    #[must_use]
    pub fn element<'a>(&'a self, separator: Option<&'a Separator>) -> Option<&'a Shape> {
        match self {
            Shape::Array(element) => Some(element),
            Shape::List(element) => Some(
                separator
                    .and_then(|s| s.element.as_ref())
                    .unwrap_or(element),
            ),
            Shape::Named(_) => None,
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::string()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Named(name) => write!(f, "{}", name),
            Shape::Array(element) => write!(f, "array<{}>", element),
            Shape::List(element) => write!(f, "list<{}>", element),
        }
    }
}

/// Composite value syntax: a literal separator plus optional element brackets.
///
/// `"[1|2],[3|4]"` is described by `Separator::new(",").brackets("[", "]")` with an
/// inner `Separator::new("|")`. Without an inner separator, nested elements are split
/// with this same separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator {
    pub value: String,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Element shape for `List` targets
    pub element: Option<Shape>,
    pub inner: Option<Box<Separator>>,
}

impl Separator {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            start: None,
            end: None,
            element: None,
            inner: None,
        }
    }

    /// Set the element brackets. Empty strings mean "no bracket".
    pub fn brackets(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start = Some(start.into()).filter(|s| !s.is_empty());
        self.end = Some(end.into()).filter(|s| !s.is_empty());
        self
    }

    pub fn element(mut self, shape: Shape) -> Self {
        self.element = Some(shape);
        self
    }

    pub fn inner(mut self, inner: Separator) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Separator used for the next nesting level.
    #[must_use]
    pub fn nested(&self) -> &Separator {
        self.inner.as_deref().unwrap_or(self)
    }

    pub(crate) fn start(&self) -> Option<&str> {
        self.start.as_deref().filter(|s| !s.is_empty())
    }

    pub(crate) fn end(&self) -> Option<&str> {
        self.end.as_deref().filter(|s| !s.is_empty())
    }
}
