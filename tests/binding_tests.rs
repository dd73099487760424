#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Parameter binding tests
//!
//! # Test Coverage
//!
//! - Named sources: query, header (case-insensitive), form field, path segment, body text
//! - Defaults only applied when allowed; an empty default is still a default
//! - Maps and multi-maps, upload bindings (single, many, set, map)
//! - Context injection from the per-request map and the registry
//! - Ranking counts computed at registration
//! - Missing values versus malformed values, bodies included

use http::Method;
use restmapper::coerce::{Coercer, CoercionRegistry, Separator, Shape};
use restmapper::context::{ContextKey, ContextMap, ContextRegistry, ContextValue};
use restmapper::descriptor::{
    Args, BindContext, BodyTarget, HandlerDescriptor, HandlerFn, MethodFlags, Param, ParamMarker,
    Reply,
};
use restmapper::serializer::JsonSerializer;
use restmapper::server::{FileUpload, RestRequest};
use restmapper::RestError;
use serde_json::json;
use std::sync::Arc;

struct Clock(&'static str);

fn noop() -> HandlerFn {
    Arc::new(|_: &ContextValue, _: Args| -> anyhow::Result<Reply> { Ok(None) })
}

fn descriptor(params: &[Param]) -> HandlerDescriptor {
    HandlerDescriptor::new(
        "Binding::probe",
        ContextKey::of::<()>(),
        params,
        MethodFlags::default(),
        noop(),
    )
    .unwrap()
}

fn bind_with(
    params: &[Param],
    request: &RestRequest,
    registry: &ContextRegistry,
    allow_defaults: bool,
) -> Result<Args, RestError> {
    let coercions = CoercionRegistry::default();
    let serializer = JsonSerializer;
    let mut context_map = ContextMap::new();
    context_map.insert(Arc::new(request.clone()));
    let ctx = BindContext {
        coercer: Coercer::new(&coercions, &serializer),
        registry,
        context_map: &context_map,
    };
    descriptor(params).build_arguments(request, &ctx, allow_defaults)
}

fn bind(params: &[Param], request: &RestRequest, allow_defaults: bool) -> Result<Args, RestError> {
    bind_with(params, request, &ContextRegistry::new(), allow_defaults)
}

#[test]
fn test_named_sources() {
    let request = RestRequest::new(Method::POST, "/things?q=query")
        .header("X-Token", "secret")
        .form_attribute("field", "form")
        .path_param("id", "12")
        .body("42");
    let args = bind(
        &[
            Param::query("q"),
            Param::header("x-token"),
            Param::field("field"),
            Param::path("id").shape(Shape::i64()),
            Param::body().shape(Shape::i32()),
        ],
        &request,
        false,
    )
    .unwrap();
    assert_eq!(args.str(0), Some("query"));
    assert_eq!(args.str(1), Some("secret"));
    assert_eq!(args.str(2), Some("form"));
    assert_eq!(args.value(3), Some(&json!(12)));
    assert_eq!(args.value(4), Some(&json!(42)));
}

#[test]
fn test_defaults_only_when_allowed() {
    let request = RestRequest::new(Method::GET, "/things");
    let params = [Param::query("limit").default_value("5").shape(Shape::i32())];

    let err = bind(&params, &request, false).unwrap_err();
    assert!(matches!(err, RestError::Bind { ref param } if param == "limit"));

    let args = bind(&params, &request, true).unwrap();
    assert_eq!(args.value(0), Some(&json!(5)));
}

#[test]
fn test_empty_default_is_a_value() {
    let request = RestRequest::new(Method::GET, "/things");
    let args = bind(&[Param::query("q").default_value("")], &request, true).unwrap();
    assert_eq!(args.str(0), Some(""));
}

#[test]
fn test_repeated_values_and_separators() {
    let request = RestRequest::new(Method::GET, "/things?id=1&id=2&csv=3,4,5");
    let args = bind(
        &[
            Param::query("id").shape(Shape::array_of(Shape::i32())),
            Param::query("csv")
                .shape(Shape::list_of(Shape::i64()))
                .separator(Separator::new(",")),
            Param::query("id"),
        ],
        &request,
        false,
    )
    .unwrap();
    assert_eq!(args.value(0), Some(&json!([1, 2])));
    assert_eq!(args.value(1), Some(&json!([3, 4, 5])));
    assert_eq!(args.str(2), Some("1"));
}

#[test]
fn test_malformed_value_is_coercion_error() {
    let request = RestRequest::new(Method::GET, "/things?n=abc");
    let err = bind(&[Param::query("n").shape(Shape::i32())], &request, false).unwrap_err();
    assert!(matches!(err, RestError::Coercion { ref value, .. } if value == "abc"));
    assert!(err.is_bind_failure());
}

#[test]
fn test_malformed_body_is_coercion_error() {
    let request = RestRequest::new(Method::POST, "/things")
        .header("content-type", "application/json")
        .body("{ \"name\": ");
    let err = bind(&[Param::body_as(BodyTarget::Json)], &request, false).unwrap_err();
    assert!(matches!(err, RestError::Coercion { ref shape, .. } if shape == "json"));
    assert!(err.is_bind_failure());

    let missing = RestRequest::new(Method::POST, "/things");
    let err = bind(&[Param::body_as(BodyTarget::Json)], &missing, false).unwrap_err();
    assert!(matches!(err, RestError::Bind { .. }));

    let binary = RestRequest::new(Method::POST, "/things").body(vec![0xc3, 0x28]);
    let err = bind(&[Param::body()], &binary, false).unwrap_err();
    assert!(matches!(err, RestError::Coercion { .. }));
}

#[test]
fn test_maps_and_multimaps() {
    let request = RestRequest::new(Method::GET, "/things?a=1&a=2&b=3")
        .header("Accept", "text/plain")
        .path_param("id", "9");
    let args = bind(
        &[
            Param::query_map(),
            Param::query_multimap(),
            Param::header_map(),
            Param::path_map(),
            Param::field_map(),
        ],
        &request,
        false,
    )
    .unwrap();
    assert_eq!(args.map(0).unwrap().get("b").map(String::as_str), Some("3"));
    assert_eq!(args.multi_map(1).unwrap().get_all("a"), vec!["1", "2"]);
    assert_eq!(args.map(2).unwrap().len(), 1);
    assert_eq!(args.map(3).unwrap().get("id").map(String::as_str), Some("9"));
    assert!(args.map(4).unwrap().is_empty());
}

#[test]
fn test_upload_bindings() {
    let request = RestRequest::new(Method::POST, "/upload")
        .upload(FileUpload::new("doc", "a.txt", "/tmp/u1"))
        .upload(FileUpload::new("doc", "b.txt", "/tmp/u2"))
        .upload(FileUpload::new("img", "c.png", "/tmp/u3").content_type("image/png"));
    let args = bind(
        &[
            Param::file("img"),
            Param::files("doc"),
            Param::files("missing"),
            Param::file_set(),
            Param::file_map(),
            Param::body_as(BodyTarget::Upload),
        ],
        &request,
        false,
    )
    .unwrap();
    assert_eq!(args.upload(0).unwrap().content_type, "image/png");
    assert_eq!(args.uploads(1).unwrap().len(), 2);
    assert!(args.uploads(2).unwrap().is_empty());
    assert_eq!(args.uploads(3).unwrap().len(), 3);
    assert!(args.upload_map(4).unwrap().contains_key("img"));
    assert_eq!(args.upload(5).unwrap().file_name, "a.txt");

    let err = bind(&[Param::file("missing")], &request, false).unwrap_err();
    assert!(matches!(err, RestError::Bind { .. }));
}

#[test]
fn test_context_injection() {
    let registry = ContextRegistry::new();
    registry.insert(Arc::new(Clock("utc")));
    let request = RestRequest::new(Method::GET, "/things");
    let args = bind_with(
        &[
            Param::context::<RestRequest>(),
            Param::of::<Clock>(),
            Param::context::<String>(),
        ],
        &request,
        &registry,
        false,
    )
    .unwrap();
    assert_eq!(args.context::<RestRequest>(0).unwrap().path(), "/things");
    assert_eq!(args.context::<Clock>(1).unwrap().0, "utc");
    assert!(args.context::<String>(2).is_none());
}

#[test]
fn test_declared_context_fails_binding() {
    let registry = ContextRegistry::new();
    registry.declare::<Clock>();
    let request = RestRequest::new(Method::GET, "/things");
    let err = bind_with(&[Param::of::<Clock>()], &request, &registry, false).unwrap_err();
    assert!(matches!(err, RestError::Configuration { .. }));
    assert!(!err.is_bind_failure());
}

#[test]
fn test_ranking_counts() {
    let d = descriptor(&[
        Param::query("a"),
        Param::query("b").default_value("x"),
        Param::query_map(),
        Param::file("f"),
        Param::file_set(),
        Param::of::<Clock>(),
    ]);
    assert_eq!(d.bound_count(), 4);
    assert_eq!(d.map_count(), 1);
    assert_eq!(d.file_count(), 1);
    assert_eq!(d.default_count(), 1);
    assert_eq!(d.non_map_count(), 3);
    assert!(d.has_defaults());

    let maps_only = descriptor(&[Param::header_map()]);
    assert!(!maps_only.has_non_map_params());
}

#[test]
fn test_unbindable_parameter_is_rejected() {
    let err = HandlerDescriptor::new(
        "Binding::broken",
        ContextKey::of::<()>(),
        &[Param::from_markers(vec![ParamMarker::Tag("orphan".into())])],
        MethodFlags::default(),
        noop(),
    )
    .unwrap_err();
    assert!(matches!(err, RestError::Configuration { .. }));
}
