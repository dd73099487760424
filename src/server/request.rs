use super::MultiMap;
use crate::error::RestError;
use crate::ids::RequestId;
use crate::router::ParamVec;
use bytes::Bytes;
use http::Method;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Header carrying an inbound request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// One uploaded file, already written to disk by the body-handling layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUpload {
    /// Form field name
    pub name: String,
    /// Client-side file name
    pub file_name: String,
    /// Location of the stored upload
    pub uploaded_file_name: PathBuf,
    pub content_type: String,
    pub charset: Option<String>,
    pub size: u64,
}

impl FileUpload {
    pub fn new(
        name: impl Into<String>,
        file_name: impl Into<String>,
        uploaded_file_name: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            uploaded_file_name: uploaded_file_name.into(),
            content_type: "application/octet-stream".to_string(),
            charset: None,
            size: 0,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// Parse the query component of a request target into a [`MultiMap`].
///
/// Everything after the first `?` is URL-decoded; repeated keys keep every value.
#[must_use]
pub fn parse_query_params(target: &str) -> MultiMap {
    match target.find('?') {
        Some(pos) => url::form_urlencoded::parse(target[pos + 1..].as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => MultiMap::new(),
    }
}

/// An inbound request as handed over by the transport.
///
/// Built once per request by the server layer; the router fills in the path
/// parameters and the negotiated response type before dispatch.
#[derive(Debug, Clone)]
pub struct RestRequest {
    request_id: RequestId,
    method: Method,
    path: String,
    query: MultiMap,
    headers: MultiMap,
    form: MultiMap,
    path_params: ParamVec,
    body: Option<Bytes>,
    uploads: Vec<FileUpload>,
    acceptable_content_type: Option<String>,
}

impl RestRequest {
    /// Create a request for `target`, a path with an optional query string.
    pub fn new(method: Method, target: &str) -> Self {
        let path = target.split('?').next().unwrap_or("/").to_string();
        Self {
            request_id: RequestId::new(),
            method,
            path,
            query: parse_query_params(target),
            headers: MultiMap::case_insensitive(),
            form: MultiMap::new(),
            path_params: ParamVec::new(),
            body: None,
            uploads: Vec::new(),
            acceptable_content_type: None,
        }
    }

    /// Add a header. An `x-request-id` header replaces the generated id when it parses.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if name.eq_ignore_ascii_case(REQUEST_ID_HEADER) {
            if let Ok(id) = value.parse::<RequestId>() {
                self.request_id = id;
            }
        }
        self.headers.add(name, value);
        self
    }

    pub fn form_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.add(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body and its content type.
    pub fn json(self, body: &Value) -> Self {
        self.header("content-type", "application/json")
            .body(body.to_string())
    }

    pub fn upload(mut self, upload: FileUpload) -> Self {
        self.uploads.push(upload);
        self
    }

    pub fn path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &MultiMap {
        &self.query
    }

    #[must_use]
    pub fn headers(&self) -> &MultiMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut MultiMap {
        &mut self.headers
    }

    #[must_use]
    pub fn form(&self) -> &MultiMap {
        &self.form
    }

    #[must_use]
    pub fn path_params(&self) -> &ParamVec {
        &self.path_params
    }

    /// Value of the named path segment.
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn raw_body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Body as UTF-8 text; `None` when absent or empty.
    pub fn body_text(&self) -> Result<Option<&str>, RestError> {
        match self.body.as_ref().filter(|b| !b.is_empty()) {
            Some(body) => std::str::from_utf8(body)
                .map(Some)
                .map_err(|e| RestError::coercion(&String::from_utf8_lossy(body), "utf-8 text", e)),
            None => Ok(None),
        }
    }

    /// Body parsed as JSON; `None` when absent or empty, a coercion error when malformed.
    pub fn body_json(&self) -> Result<Option<Value>, RestError> {
        match self.body.as_ref().filter(|b| !b.is_empty()) {
            Some(body) => serde_json::from_slice(body)
                .map(Some)
                .map_err(|e| RestError::coercion(&String::from_utf8_lossy(body), "json", e)),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn uploads(&self) -> &[FileUpload] {
        &self.uploads
    }

    /// Media type of the body without parameters.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    /// Response type chosen by content negotiation, if the route declares produces types.
    #[must_use]
    pub fn acceptable_content_type(&self) -> Option<&str> {
        self.acceptable_content_type.as_deref()
    }

    pub(crate) fn set_acceptable_content_type(&mut self, content_type: Option<String>) {
        self.acceptable_content_type = content_type;
    }

    pub(crate) fn set_path_params(&mut self, params: ParamVec) {
        self.path_params = params;
    }

    /// Copy form attributes into the query map.
    pub(crate) fn merge_form_into_query(&mut self) {
        let form = self.form.clone();
        self.query.extend_from(&form);
    }
}
