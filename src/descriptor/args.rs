use crate::context::{downcast_context, ContextValue};
use crate::server::{FileUpload, MultiMap};
use anyhow::{anyhow, Context as _};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One bound argument.
#[derive(Clone)]
pub enum Arg {
    Value(Value),
    Bytes(Bytes),
    Upload(FileUpload),
    Uploads(Vec<FileUpload>),
    UploadMap(HashMap<String, FileUpload>),
    Map(HashMap<String, String>),
    MultiMap(MultiMap),
    /// Context injection; `None` when nothing was registered for the type
    Context(Option<ContextValue>),
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Arg::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Arg::Upload(u) => f.debug_tuple("Upload").field(&u.name).finish(),
            Arg::Uploads(u) => f.debug_tuple("Uploads").field(&u.len()).finish(),
            Arg::UploadMap(m) => f.debug_tuple("UploadMap").field(&m.len()).finish(),
            Arg::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Arg::MultiMap(m) => f.debug_tuple("MultiMap").field(m).finish(),
            Arg::Context(c) => f.debug_tuple("Context").field(&c.is_some()).finish(),
        }
    }
}

/// Arguments for one handler invocation, aligned with its declared parameters.
#[derive(Debug, Clone, Default)]
pub struct Args {
    args: Vec<Arg>,
}

impl Args {
    #[must_use]
    pub fn new(args: Vec<Arg>) -> Self {
        Self { args }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.args.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.args.iter()
    }

    /// The coerced value at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.args.get(index) {
            Some(Arg::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Deserialize the value at `index` into `T`.
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> anyhow::Result<T> {
        let value = self
            .value(index)
            .ok_or_else(|| anyhow!("argument {} is not a value", index))?;
        serde_json::from_value(value.clone()).with_context(|| format!("argument {}", index))
    }

    /// The value at `index` when it is a string.
    #[must_use]
    pub fn str(&self, index: usize) -> Option<&str> {
        self.value(index).and_then(Value::as_str)
    }

    #[must_use]
    pub fn bytes(&self, index: usize) -> Option<&Bytes> {
        match self.args.get(index) {
            Some(Arg::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn upload(&self, index: usize) -> Option<&FileUpload> {
        match self.args.get(index) {
            Some(Arg::Upload(u)) => Some(u),
            _ => None,
        }
    }

    #[must_use]
    pub fn uploads(&self, index: usize) -> Option<&[FileUpload]> {
        match self.args.get(index) {
            Some(Arg::Uploads(u)) => Some(u),
            _ => None,
        }
    }

    #[must_use]
    pub fn upload_map(&self, index: usize) -> Option<&HashMap<String, FileUpload>> {
        match self.args.get(index) {
            Some(Arg::UploadMap(m)) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn map(&self, index: usize) -> Option<&HashMap<String, String>> {
        match self.args.get(index) {
            Some(Arg::Map(m)) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn multi_map(&self, index: usize) -> Option<&MultiMap> {
        match self.args.get(index) {
            Some(Arg::MultiMap(m)) => Some(m),
            _ => None,
        }
    }

    /// The injected context value at `index`.
    #[must_use]
    pub fn context<T: ?Sized + 'static>(&self, index: usize) -> Option<Arc<T>> {
        match self.args.get(index) {
            Some(Arg::Context(Some(value))) => downcast_context::<T>(value),
            _ => None,
        }
    }
}
