use super::{Separator, Shape};
use crate::error::RestError;
use crate::serializer::Serializer;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Parser for one named shape.
pub type CoerceFn = Arc<dyn Fn(&str) -> Result<Value, RestError> + Send + Sync>;

/// Maps shape names to parse functions.
///
/// Pre-populated with the integer, float, boolean and string families. Shapes that are
/// not registered fall through to [`Serializer::deserialize`].
#[derive(Clone)]
pub struct CoercionRegistry {
    parsers: HashMap<String, CoerceFn>,
}

fn integer<T>(name: &'static str) -> CoerceFn
where
    T: std::str::FromStr + Into<Value> + 'static,
    T::Err: std::fmt::Display,
{
    Arc::new(move |text: &str| {
        text.parse::<T>()
            .map(Into::into)
            .map_err(|e| RestError::coercion(text, name, e))
    })
}

fn float(name: &'static str) -> CoerceFn {
    Arc::new(move |text: &str| {
        let parsed = text
            .parse::<f64>()
            .map_err(|e| RestError::coercion(text, name, e))?;
        serde_json::Number::from_f64(parsed)
            .map(Value::Number)
            .ok_or_else(|| RestError::coercion(text, name, "not a finite number"))
    })
}

impl CoercionRegistry {
    /// An empty registry: every shape goes to the serializer.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Register or replace the parser for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, parser: F)
    where
        F: Fn(&str) -> Result<Value, RestError> + Send + Sync + 'static,
    {
        self.parsers.insert(name.into(), Arc::new(parser));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parsers.contains_key(name)
    }

    fn parser(&self, name: &str) -> Option<&CoerceFn> {
        self.parsers.get(name)
    }
}

impl Default for CoercionRegistry {
    fn default() -> Self {
        let mut parsers: HashMap<String, CoerceFn> = HashMap::new();
        parsers.insert("i8".into(), integer::<i8>("i8"));
        parsers.insert("i16".into(), integer::<i16>("i16"));
        parsers.insert("i32".into(), integer::<i32>("i32"));
        parsers.insert("i64".into(), integer::<i64>("i64"));
        parsers.insert("u8".into(), integer::<u8>("u8"));
        parsers.insert("u16".into(), integer::<u16>("u16"));
        parsers.insert("u32".into(), integer::<u32>("u32"));
        parsers.insert("u64".into(), integer::<u64>("u64"));
        parsers.insert("f32".into(), float("f32"));
        parsers.insert("f64".into(), float("f64"));
        parsers.insert(
            "bool".into(),
            Arc::new(|text: &str| {
                if text.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(RestError::coercion(text, "bool", "expected true or false"))
                }
            }),
        );
        parsers.insert(
            "string".into(),
            Arc::new(|text: &str| Ok(Value::String(text.to_string()))),
        );
        Self { parsers }
    }
}

impl std::fmt::Debug for CoercionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.parsers.keys().collect();
        names.sort();
        f.debug_struct("CoercionRegistry")
            .field("shapes", &names)
            .finish()
    }
}

/// Split on a literal separator, dropping only a trailing empty piece.
#[must_use]
pub fn split_literal<'a>(content: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return if content.is_empty() {
            Vec::new()
        } else {
            vec![content]
        };
    }
    let mut pieces: Vec<&str> = content.split(separator).collect();
    if pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    pieces
}

/// Drop everything up to the first `start` and from the last `end`.
///
/// An `end` found at offset zero is ignored so that a lone closing bracket is kept.
#[must_use]
pub fn strip_brackets<'a>(content: &'a str, start: Option<&str>, end: Option<&str>) -> &'a str {
    let mut content = content;
    if let Some(start) = start.filter(|s| !s.is_empty()) {
        if let Some(index) = content.find(start) {
            content = &content[index + start.len()..];
        }
    }
    if let Some(end) = end.filter(|s| !s.is_empty()) {
        if let Some(index) = content.rfind(end) {
            if index > 0 {
                content = &content[..index];
            }
        }
    }
    content
}

/// Split a composite whose elements keep their brackets, e.g. `"[1|2], [3|4]"`
/// into `["[1|2]", "[3|4]"]`.
///
/// Elements are separated where a closing bracket, the separator and an opening bracket
/// meet, so the outer brackets may already have been stripped (`"1|2], [3|4"`).
pub fn split_bracketed(content: &str, separator: &Separator) -> Result<Vec<String>, RestError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let sep = regex::escape(&separator.value);
    let (pattern, reopen, reclose) = match (separator.start(), separator.end()) {
        (Some(s), Some(e)) => (
            format!(r"{}\s*{}\s*{}", regex::escape(e), sep, regex::escape(s)),
            Some(s),
            Some(e),
        ),
        (Some(s), None) => (format!(r"{}\s*{}", sep, regex::escape(s)), Some(s), None),
        (None, Some(e)) => (format!(r"{}\s*{}", regex::escape(e), sep), None, Some(e)),
        (None, None) => {
            return Ok(split_literal(content, &separator.value)
                .into_iter()
                .map(str::to_string)
                .collect())
        }
    };
    let splitter =
        Regex::new(&pattern).map_err(|e| RestError::coercion(content, "separator", e))?;
    let pieces: Vec<&str> = splitter.split(trimmed).collect();
    let last = pieces.len().saturating_sub(1);
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut element = String::with_capacity(piece.len() + 2);
            if let Some(s) = reopen.filter(|_| i > 0) {
                element.push_str(s);
            }
            element.push_str(piece);
            if let Some(e) = reclose.filter(|_| i < last) {
                element.push_str(e);
            }
            element
        })
        .collect())
}

/// Converts raw request text into values of a target [`Shape`].
pub struct Coercer<'a> {
    registry: &'a CoercionRegistry,
    serializer: &'a dyn Serializer,
}

impl<'a> Coercer<'a> {
    pub fn new(registry: &'a CoercionRegistry, serializer: &'a dyn Serializer) -> Self {
        Self {
            registry,
            serializer,
        }
    }

    /// Coerce every value of a multi-valued source (query, header, form field).
    ///
    /// `Ok(None)` means there was nothing to bind and no default to fall back to.
    pub fn coerce_values(
        &self,
        values: &[&str],
        default: Option<&str>,
        target: &Shape,
        separator: Option<&Separator>,
    ) -> Result<Option<Value>, RestError> {
        if values.is_empty() && default.is_none() {
            return Ok(None);
        }
        if !target.is_sequence() {
            return self.coerce_value(values.first().copied(), default, target, separator);
        }
        let mut items = Vec::new();
        match separator {
            Some(sep) => {
                for value in values {
                    items.extend(self.coerce_sequence(value, target, sep)?);
                }
                if items.is_empty() {
                    match default {
                        Some(default) => items = self.coerce_sequence(default, target, sep)?,
                        None => return Ok(None),
                    }
                }
            }
            None => {
                let element = target.element(None).cloned().unwrap_or_default();
                for value in values {
                    items.push(self.coerce_text(value, &element, None)?);
                }
                if items.is_empty() {
                    if let Some(default) = default {
                        items.push(self.coerce_text(default, &element, None)?);
                    }
                }
            }
        }
        Ok(Some(Value::Array(items)))
    }

    /// Coerce a single-valued source (path segment, body text).
    pub fn coerce_value(
        &self,
        raw: Option<&str>,
        default: Option<&str>,
        target: &Shape,
        separator: Option<&Separator>,
    ) -> Result<Option<Value>, RestError> {
        match raw.or(default) {
            Some(content) => self.coerce_text(content, target, separator).map(Some),
            None => Ok(None),
        }
    }

    fn coerce_text(
        &self,
        content: &str,
        target: &Shape,
        separator: Option<&Separator>,
    ) -> Result<Value, RestError> {
        match (target, separator) {
            (Shape::Named(_), Some(sep)) => {
                self.coerce_scalar(strip_brackets(content, sep.start(), sep.end()), target)
            }
            (Shape::Named(_), None) => self.coerce_scalar(content, target),
            (_, Some(sep)) => self.coerce_sequence(content, target, sep).map(Value::Array),
            (_, None) => {
                let element = target.element(None).cloned().unwrap_or_default();
                Ok(Value::Array(vec![self.coerce_text(content, &element, None)?]))
            }
        }
    }

    fn coerce_sequence(
        &self,
        content: &str,
        target: &Shape,
        sep: &Separator,
    ) -> Result<Vec<Value>, RestError> {
        let element = target.element(Some(sep)).cloned().unwrap_or_default();
        let whole = strip_brackets(content, sep.start(), sep.end());
        if element.is_sequence() {
            let nested = sep.nested();
            return split_bracketed(whole, sep)?
                .iter()
                .map(|piece| {
                    let inner = strip_brackets(piece, sep.start(), sep.end());
                    self.coerce_sequence(inner, &element, nested)
                        .map(Value::Array)
                })
                .collect();
        }
        split_literal(whole, &sep.value)
            .into_iter()
            .map(|piece| {
                self.coerce_scalar(strip_brackets(piece, sep.start(), sep.end()), &element)
            })
            .collect()
    }

    fn coerce_scalar(&self, content: &str, shape: &Shape) -> Result<Value, RestError> {
        let name = match shape {
            Shape::Named(name) => name,
            _ => return self.coerce_text(content, shape, None),
        };
        let text = if shape.is_string() {
            content
        } else {
            content.trim()
        };
        match self.registry.parser(name) {
            Some(parse) => parse(text),
            None => self.serializer.deserialize(text, shape),
        }
    }
}
