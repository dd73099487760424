use super::param::{BodyTarget, Param, ParamMarker};
use crate::coerce::{Separator, Shape};
use crate::context::ContextKey;
use std::fmt;

/// Which part of the request a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Query,
    Header,
    FormField,
    PathSegment,
    Body,
    File,
    FileSet,
    QueryMap,
    HeaderMap,
    FormMap,
    FileMap,
    PathMap,
    Context,
}

impl BindingKind {
    /// True for the kinds that bind a whole name/value map.
    #[must_use]
    pub fn is_map(self) -> bool {
        matches!(
            self,
            BindingKind::QueryMap
                | BindingKind::HeaderMap
                | BindingKind::FormMap
                | BindingKind::FileMap
                | BindingKind::PathMap
        )
    }

    /// True for the kinds counted when ranking overloads.
    #[must_use]
    pub fn is_counted(self) -> bool {
        !matches!(self, BindingKind::FileSet | BindingKind::Context)
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BindingKind::Query => "query",
            BindingKind::Header => "header",
            BindingKind::FormField => "form field",
            BindingKind::PathSegment => "path segment",
            BindingKind::Body => "body",
            BindingKind::File => "file",
            BindingKind::FileSet => "file set",
            BindingKind::QueryMap => "query map",
            BindingKind::HeaderMap => "header map",
            BindingKind::FormMap => "form map",
            BindingKind::FileMap => "file map",
            BindingKind::PathMap => "path map",
            BindingKind::Context => "context",
        };
        write!(f, "{}", s)
    }
}

/// Resolved source of one parameter, fixed at registration.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Named {
        name: String,
        default: Option<String>,
    },
    Body {
        target: BodyTarget,
        default: Option<String>,
    },
    File {
        name: String,
        many: bool,
    },
    Map {
        multi: bool,
    },
    Context(ContextKey),
    Whole,
}

/// Binding of one handler parameter: kind, source details and target shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBinding {
    pub kind: BindingKind,
    pub source: Source,
    pub shape: Shape,
    pub separator: Option<Separator>,
    pub tags: Vec<String>,
}

impl ParamBinding {
    /// Scan the markers of `param`; the first binding marker wins.
    ///
    /// Unmarked parameters with a declared type become context injections. `None`
    /// means the parameter can never be bound.
    pub fn scan(param: &Param) -> Option<Self> {
        let mut chosen: Option<(BindingKind, Source)> = None;
        let mut separator = None;
        let mut tags = Vec::new();
        for marker in param.markers() {
            let candidate = match marker {
                ParamMarker::Query { name, default } => Some((
                    BindingKind::Query,
                    Source::Named {
                        name: name.clone(),
                        default: default.clone(),
                    },
                )),
                ParamMarker::Header { name, default } => Some((
                    BindingKind::Header,
                    Source::Named {
                        name: name.clone(),
                        default: default.clone(),
                    },
                )),
                ParamMarker::Field { name, default } => Some((
                    BindingKind::FormField,
                    Source::Named {
                        name: name.clone(),
                        default: default.clone(),
                    },
                )),
                ParamMarker::Path { name, default } => Some((
                    BindingKind::PathSegment,
                    Source::Named {
                        name: name.clone(),
                        default: default.clone(),
                    },
                )),
                ParamMarker::Body { target, default } => Some((
                    BindingKind::Body,
                    Source::Body {
                        target: *target,
                        default: default.clone(),
                    },
                )),
                ParamMarker::File { name, many } => Some((
                    BindingKind::File,
                    Source::File {
                        name: name.clone(),
                        many: *many,
                    },
                )),
                ParamMarker::FileSet => Some((BindingKind::FileSet, Source::Whole)),
                ParamMarker::FileMap => Some((BindingKind::FileMap, Source::Whole)),
                ParamMarker::QueryMap { multi } => {
                    Some((BindingKind::QueryMap, Source::Map { multi: *multi }))
                }
                ParamMarker::HeaderMap { multi } => {
                    Some((BindingKind::HeaderMap, Source::Map { multi: *multi }))
                }
                ParamMarker::FieldMap { multi } => {
                    Some((BindingKind::FormMap, Source::Map { multi: *multi }))
                }
                ParamMarker::PathMap => Some((BindingKind::PathMap, Source::Whole)),
                ParamMarker::Context(key) => Some((BindingKind::Context, Source::Context(*key))),
                ParamMarker::Separator(sep) => {
                    if separator.is_none() {
                        separator = Some(sep.clone());
                    }
                    None
                }
                ParamMarker::Tag(tag) => {
                    tags.push(tag.clone());
                    None
                }
            };
            if chosen.is_none() {
                chosen = candidate;
            }
        }
        let (kind, source) = match chosen {
            Some(found) => found,
            None => {
                let key = param.declared_type()?;
                (BindingKind::Context, Source::Context(key))
            }
        };
        Some(Self {
            kind,
            source,
            shape: param.declared_shape().clone(),
            separator,
            tags,
        })
    }

    /// Configured default, if this binding carries one.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        match &self.source {
            Source::Named { default, .. } | Source::Body { default, .. } => default.as_deref(),
            _ => None,
        }
    }

    /// Source name used in diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.source {
            Source::Named { name, .. } | Source::File { name, .. } => name.clone(),
            Source::Context(key) => key.name().to_string(),
            _ => self.kind.to_string(),
        }
    }
}
