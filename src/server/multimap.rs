use serde::Serialize;
use std::collections::HashMap;

/// Ordered multi-valued name/value map.
///
/// Header maps compare names case-insensitively; query and form maps do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MultiMap {
    entries: Vec<(String, String)>,
    #[serde(skip)]
    case_insensitive: bool,
}

impl MultiMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A map whose name lookups ignore ASCII case.
    #[must_use]
    pub fn case_insensitive() -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive: true,
        }
    }

    fn matches(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        let ci = self.case_insensitive;
        self.entries.retain(|(k, _)| {
            if ci {
                !k.eq_ignore_ascii_case(name)
            } else {
                k != name
            }
        });
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| self.matches(k, name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| self.matches(k, name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| self.matches(k, name))
    }

    /// Distinct names in first-seen order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (k, _) in &self.entries {
            if !names.iter().any(|n| self.matches(n, k)) {
                names.push(k);
            }
        }
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every entry of `other`.
    pub fn extend_from(&mut self, other: &MultiMap) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Collapse to one value per name; later values win.
    #[must_use]
    pub fn to_single_map(&self) -> HashMap<String, String> {
        self.entries.iter().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MultiMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            case_insensitive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multimap_preserves_order_and_duplicates() {
        let mut map = MultiMap::new();
        map.add("a", "1");
        map.add("b", "2");
        map.add("a", "3");
        assert_eq!(map.get("a"), Some("1"));
        assert_eq!(map.get_all("a"), vec!["1", "3"]);
        assert_eq!(map.names(), vec!["a", "b"]);
        assert_eq!(map.to_single_map().get("a").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_case_insensitive_headers() {
        let mut headers = MultiMap::case_insensitive();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        headers.set("CONTENT-TYPE", "application/json");
        assert_eq!(headers.get_all("Content-Type"), vec!["application/json"]);
        headers.remove("content-type");
        assert!(headers.is_empty());
    }
}
