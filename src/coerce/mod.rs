//! # Type Coercion Module
//!
//! Converts untyped request text into `serde_json::Value`s of a declared [`Shape`].
//!
//! - Scalars (`i8`..`u64`, `f32`/`f64`, `bool`, `string`) are parsed by the
//!   [`CoercionRegistry`]; malformed text is a hard [`RestError::Coercion`](crate::RestError).
//! - Sequences without a [`Separator`] wrap the single raw value.
//! - With a separator, values are split on a literal, element brackets are stripped and
//!   nested sequences recurse with the inner (or the same) separator.
//! - Unknown shape names are handed to the [`Serializer`](crate::serializer::Serializer).
//!
//! ```rust
//! use restmapper::coerce::{Coercer, CoercionRegistry, Separator, Shape};
//! use restmapper::serializer::JsonSerializer;
//! use serde_json::json;
//!
//! let registry = CoercionRegistry::default();
//! let coercer = Coercer::new(&registry, &JsonSerializer);
//! let sep = Separator::new(",");
//! let value = coercer
//!     .coerce_values(&["1,2,3"], None, &Shape::array_of(Shape::i32()), Some(&sep))
//!     .unwrap();
//! assert_eq!(value, Some(json!([1, 2, 3])));
//! ```

mod core;
mod shape;

pub use core::{split_bracketed, split_literal, strip_brackets, CoerceFn, Coercer, CoercionRegistry};
pub use shape::{Separator, Shape};
