#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Value coercion tests
//!
//! # Test Coverage
//!
//! - Scalars: integers, floats, strict booleans, untrimmed strings
//! - Sequences with and without separators, bracketed and nested composites
//! - Fully wrapped composites stripped before splitting
//! - Separated values re-joined and re-parsed to the same value
//! - Defaults applied when no raw value exists
//! - Malformed input reported as coercion errors
//! - Registry extension and serializer fallback for application shapes

use restmapper::coerce::{Coercer, CoercionRegistry, Separator, Shape};
use restmapper::serializer::{JsonSerializer, Serializer};
use restmapper::RestError;
use serde_json::{json, Value};

fn coerce(values: &[&str], default: Option<&str>, shape: &Shape, sep: Option<&Separator>) -> Result<Option<Value>, RestError> {
    let registry = CoercionRegistry::default();
    Coercer::new(&registry, &JsonSerializer).coerce_values(values, default, shape, sep)
}

#[test]
fn test_scalars() {
    assert_eq!(coerce(&[" 42 "], None, &Shape::i32(), None).unwrap(), Some(json!(42)));
    assert_eq!(coerce(&["2.5"], None, &Shape::f64(), None).unwrap(), Some(json!(2.5)));
    assert_eq!(coerce(&["TRUE"], None, &Shape::boolean(), None).unwrap(), Some(json!(true)));
    assert_eq!(coerce(&[" padded "], None, &Shape::string(), None).unwrap(), Some(json!(" padded ")));
    assert_eq!(coerce(&[], None, &Shape::i32(), None).unwrap(), None);
}

#[test]
fn test_boolean_is_strict() {
    let err = coerce(&["yes"], None, &Shape::boolean(), None).unwrap_err();
    assert!(matches!(err, RestError::Coercion { ref shape, .. } if shape == "bool"));
}

#[test]
fn test_out_of_range_integer_is_coercion_error() {
    let err = coerce(&["300"], None, &Shape::named("u8"), None).unwrap_err();
    assert!(matches!(err, RestError::Coercion { ref value, .. } if value == "300"));
}

#[test]
fn test_comma_separated_array() {
    let sep = Separator::new(",");
    let value = coerce(&["1,2,3"], None, &Shape::array_of(Shape::i32()), Some(&sep)).unwrap();
    assert_eq!(value, Some(json!([1, 2, 3])));
}

#[test]
fn test_separated_array_reparses_to_same_value() {
    let sep = Separator::new(",");
    let shape = Shape::array_of(Shape::i32());
    let first = coerce(&["1,2,3"], None, &shape, Some(&sep)).unwrap().unwrap();

    let joined = first
        .as_array()
        .unwrap()
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(",");
    assert_eq!(joined, "1,2,3");
    let second = coerce(&[joined.as_str()], None, &shape, Some(&sep)).unwrap().unwrap();
    assert_eq!(second, first);

    let serializer = JsonSerializer;
    let text = serializer.serialize(&first).unwrap();
    assert_eq!(serializer.deserialize(&text, &shape).unwrap(), first);
}

#[test]
fn test_separator_applies_to_every_raw_value() {
    let sep = Separator::new(";");
    let value = coerce(&["1;2", "3"], None, &Shape::list_of(Shape::i64()), Some(&sep)).unwrap();
    assert_eq!(value, Some(json!([1, 2, 3])));
}

#[test]
fn test_bracketed_nested_arrays() {
    let sep = Separator::new(",")
        .brackets("[", "]")
        .inner(Separator::new("|"));
    let shape = Shape::array_of(Shape::array_of(Shape::i32()));
    let value = coerce(&["[1|2],[3|4]"], None, &shape, Some(&sep)).unwrap();
    assert_eq!(value, Some(json!([[1, 2], [3, 4]])));
}

#[test]
fn test_fully_wrapped_nested_arrays() {
    let sep = Separator::new(",")
        .brackets("[", "]")
        .inner(Separator::new("|"));
    let shape = Shape::array_of(Shape::array_of(Shape::i32()));
    let value = coerce(&["[[1|2],[3|4]]"], None, &shape, Some(&sep)).unwrap();
    assert_eq!(value, Some(json!([[1, 2], [3, 4]])));
    let single = coerce(&["[[5|6]]"], None, &shape, Some(&sep)).unwrap();
    assert_eq!(single, Some(json!([[5, 6]])));
}

#[test]
fn test_wrapped_flat_array() {
    let sep = Separator::new(",").brackets("[", "]");
    let value = coerce(&["[1,2,3]"], None, &Shape::array_of(Shape::i32()), Some(&sep)).unwrap();
    assert_eq!(value, Some(json!([1, 2, 3])));
}

#[test]
fn test_nested_without_inner_separator_reuses_outer() {
    let sep = Separator::new(",").brackets("(", ")");
    let shape = Shape::list_of(Shape::list_of(Shape::i32()));
    let value = coerce(&["(1,2),(3)"], None, &shape, Some(&sep)).unwrap();
    assert_eq!(value, Some(json!([[1, 2], [3]])));
}

#[test]
fn test_list_element_override() {
    let sep = Separator::new(",").element(Shape::boolean());
    let value = coerce(&["true,false"], None, &Shape::list_of(Shape::string()), Some(&sep)).unwrap();
    assert_eq!(value, Some(json!([true, false])));
}

#[test]
fn test_sequence_without_separator_wraps_each_value() {
    let value = coerce(&["7", "8"], None, &Shape::array_of(Shape::i32()), None).unwrap();
    assert_eq!(value, Some(json!([7, 8])));
}

#[test]
fn test_default_used_when_absent() {
    let sep = Separator::new(",");
    let shape = Shape::array_of(Shape::i32());
    assert_eq!(coerce(&[], Some("4,5"), &shape, Some(&sep)).unwrap(), Some(json!([4, 5])));
    assert_eq!(coerce(&[], Some("9"), &Shape::i32(), None).unwrap(), Some(json!(9)));
}

#[test]
fn test_malformed_element_fails_whole_sequence() {
    let sep = Separator::new(",");
    let err = coerce(&["1,x,3"], None, &Shape::array_of(Shape::i32()), Some(&sep)).unwrap_err();
    assert!(matches!(err, RestError::Coercion { ref value, .. } if value == "x"));
}

#[test]
fn test_unknown_shape_falls_back_to_serializer() {
    let value = coerce(&[r#"{"name":"rex"}"#], None, &Shape::named("Pet"), None).unwrap();
    assert_eq!(value, Some(json!({ "name": "rex" })));
    let err = coerce(&["not json"], None, &Shape::named("Pet"), None).unwrap_err();
    assert!(matches!(err, RestError::Coercion { ref shape, .. } if shape == "Pet"));
}

#[test]
fn test_empty_registry_defers_everything_to_serializer() {
    let registry = CoercionRegistry::empty();
    let coercer = Coercer::new(&registry, &JsonSerializer);
    let value = coercer.coerce_value(Some("12"), None, &Shape::i32(), None).unwrap();
    assert_eq!(value, Some(json!(12)));
}
