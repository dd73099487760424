//! Error taxonomy shared by binding, resolution and the call lifecycle.

use std::fmt;

/// Errors raised while resolving, binding or invoking a handler.
///
/// `Bind` and `Coercion` are recovered locally by overload resolution and only
/// surface in diagnostics. The remaining variants end the request.
#[derive(Debug)]
pub enum RestError {
    /// A required parameter was absent from the request
    Bind {
        /// Source name of the parameter (query key, header name, ...)
        param: String,
    },
    /// A raw value was present but malformed for its target shape
    Coercion {
        /// The offending raw text
        value: String,
        /// Name of the target shape
        shape: String,
        /// Parser diagnostic
        reason: String,
    },
    /// The handler returned an error or panicked
    Invocation(anyhow::Error),
    /// No route group, or no descriptor within it, accepted the request
    NoRouteMatched {
        /// Request verb
        method: String,
        /// Request path
        path: String,
    },
    /// A context type could not be constructed
    Configuration {
        /// Rust type name of the context entry
        type_name: String,
        /// Why construction failed
        reason: String,
    },
    /// A handler result could not be serialized
    Serialization(String),
    /// The blocking executor refused work
    Unavailable(String),
}

impl RestError {
    /// Build a coercion error for `value` against the named shape.
    pub fn coercion(value: &str, shape: impl Into<String>, reason: impl fmt::Display) -> Self {
        RestError::Coercion {
            value: value.to_string(),
            shape: shape.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a configuration error for the context type `type_name`.
    pub fn configuration(type_name: &str, reason: impl Into<String>) -> Self {
        RestError::Configuration {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status used when this error ends a request.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            RestError::Bind { .. } | RestError::Coercion { .. } => 400,
            RestError::NoRouteMatched { .. } => 404,
            RestError::Unavailable(_) => 503,
            RestError::Invocation(_)
            | RestError::Configuration { .. }
            | RestError::Serialization(_) => 500,
        }
    }

    /// True for errors that only mean "this overload does not match".
    #[must_use]
    pub fn is_bind_failure(&self) -> bool {
        matches!(self, RestError::Bind { .. } | RestError::Coercion { .. })
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::Bind { param } => write!(f, "missing required parameter '{}'", param),
            RestError::Coercion {
                value,
                shape,
                reason,
            } => write!(f, "cannot convert '{}' to {}: {}", value, shape, reason),
            RestError::Invocation(err) => write!(f, "{}", err),
            RestError::NoRouteMatched { method, path } => {
                write!(f, "no route matched {} {}", method, path)
            }
            RestError::Configuration { type_name, reason } => {
                write!(f, "context {} cannot be provided: {}", type_name, reason)
            }
            RestError::Serialization(msg) => write!(f, "serialization failed: {}", msg),
            RestError::Unavailable(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RestError::Invocation(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for RestError {
    fn from(err: anyhow::Error) -> Self {
        RestError::Invocation(err)
    }
}
