use crate::mapper::{Resource, ResourceType};

/// Path declaration on a resource or handler method.
///
/// `value` is a plain path (with optional `:name` segments) or, when `regex` is set,
/// a regular expression. `auto` controls whether a resource deploys on its own or only
/// through a mount; `child` mounts another resource type under this path.
#[derive(Debug, Clone)]
pub struct UrlSpec {
    value: String,
    regex: bool,
    auto: bool,
    child: Option<ResourceType>,
}

impl Default for UrlSpec {
    fn default() -> Self {
        Self {
            value: "/".to_string(),
            regex: false,
            auto: true,
            child: None,
        }
    }
}

impl UrlSpec {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// A regular-expression path.
    pub fn regex(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            regex: true,
            ..Self::default()
        }
    }

    /// Deploy only when mounted by another resource.
    #[must_use]
    pub fn auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    /// Deploy resource `C` under this path.
    #[must_use]
    pub fn mount<C: Resource + Default>(mut self) -> Self {
        self.child = Some(ResourceType::of::<C>());
        self
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn is_regex(&self) -> bool {
        self.regex
    }

    #[must_use]
    pub fn is_auto(&self) -> bool {
        self.auto
    }

    #[must_use]
    pub fn child(&self) -> Option<&ResourceType> {
        self.child.as_ref()
    }

    fn trimmed(&self) -> &str {
        let separator = if self.regex { "\\/" } else { "/" };
        let mut value = self.value.trim();
        while let Some(rest) = value.strip_prefix(separator).or_else(|| value.strip_prefix('/')) {
            value = rest;
        }
        while let Some(rest) = value.strip_suffix(separator).or_else(|| value.strip_suffix('/')) {
            value = rest;
        }
        value
    }
}

/// A fully joined route path.
///
/// Once any joined segment is a regex the whole path becomes a regex: the literal
/// prefix is escaped at that point and later literal segments are escaped as they join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    pattern: String,
    regex: bool,
}

impl Default for RoutePath {
    fn default() -> Self {
        Self::root()
    }
}

impl RoutePath {
    #[must_use]
    pub fn root() -> Self {
        Self {
            pattern: "/".to_string(),
            regex: false,
        }
    }

    /// Append `url`, normalizing slashes. Empty segments leave the path unchanged.
    #[must_use]
    pub fn join(&self, url: &UrlSpec) -> Self {
        let segment = url.trimmed();
        if segment.is_empty() {
            return self.clone();
        }
        let mut regex = self.regex;
        let mut pattern = self.pattern.clone();
        if url.is_regex() && !regex {
            regex = true;
            pattern = regex::escape(&pattern);
        }
        let segment = if regex && !url.is_regex() {
            regex::escape(segment)
        } else {
            segment.to_string()
        };
        let base = pattern.trim_end_matches('/');
        Self {
            pattern: format!("{}/{}", base, segment),
            regex,
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn is_regex(&self) -> bool {
        self.regex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_normalizes_slashes() {
        let path = RoutePath::root()
            .join(&UrlSpec::new("/root/"))
            .join(&UrlSpec::new("child"))
            .join(&UrlSpec::new("/"));
        assert_eq!(path.pattern(), "/root/child");
        assert!(!path.is_regex());
        assert_eq!(RoutePath::root().join(&UrlSpec::default()).pattern(), "/");
    }

    #[test]
    fn test_regex_segment_escapes_literal_sides() {
        let path = RoutePath::root()
            .join(&UrlSpec::new("v1.0"))
            .join(&UrlSpec::regex("items/(\\d+)"))
            .join(&UrlSpec::new("a.b"));
        assert!(path.is_regex());
        assert_eq!(path.pattern(), "/v1\\.0/items/(\\d+)/a\\.b");
    }

    #[test]
    fn test_regex_separator_trimmed() {
        let path = RoutePath::root().join(&UrlSpec::regex("\\/files\\/(.*)"));
        assert_eq!(path.pattern(), "/files\\/(.*)");
    }
}
