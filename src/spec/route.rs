use super::url::RoutePath;
use http::Method;
use std::fmt;

/// Trim media types and drop blank entries.
pub fn normalize_media_types<I, S>(types: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    types
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Verb, resolved path and content negotiation of one route group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub verb: Method,
    pub path: String,
    pub regex: bool,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
}

impl RouteSpec {
    pub fn new(verb: Method, path: &RoutePath) -> Self {
        Self {
            verb,
            path: path.pattern().to_string(),
            regex: path.is_regex(),
            consumes: Vec::new(),
            produces: Vec::new(),
        }
    }

    #[must_use]
    pub fn consumes<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.consumes = normalize_media_types(types);
        self
    }

    #[must_use]
    pub fn produces<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.produces = normalize_media_types(types);
        self
    }

    /// Identity of the route group: verb, path and negotiation signature.
    ///
    /// `GET /same`, `POST ~/files/(.*) consumes=[application/json]`
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.verb)?;
        if self.regex {
            f.write_str("~")?;
        }
        f.write_str(&self.path)?;
        if !self.consumes.is_empty() {
            write!(f, " consumes=[{}]", self.consumes.join(","))?;
        }
        if !self.produces.is_empty() {
            write!(f, " produces=[{}]", self.produces.join(","))?;
        }
        Ok(())
    }
}
