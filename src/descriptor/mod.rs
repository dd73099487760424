//! # Handler Descriptor Module
//!
//! A [`HandlerDescriptor`] is built once per handler method from its [`Param`]
//! declarations. Each parameter is classified into exactly one [`BindingKind`] by
//! scanning its markers in order; the descriptor keeps the counts used to rank
//! overloads and binds a concrete [`Args`] list for each request attempt.
//!
//! | Kind | Request source |
//! |------|----------------|
//! | `Query`, `Header`, `FormField` | multi-valued lookup by name, coerced |
//! | `PathSegment` | single path parameter, coerced |
//! | `Body` | JSON value/object/array, raw bytes, first upload or coerced text |
//! | `File`, `FileSet`, `FileMap` | uploaded files |
//! | `QueryMap`, `HeaderMap`, `FormMap`, `PathMap` | the whole map |
//! | `Context` | per-request context, then the registry |

mod args;
mod binding;
mod core;
mod param;

pub use args::{Arg, Args};
pub use binding::{BindingKind, ParamBinding, Source};
pub use core::{BindContext, HandlerDescriptor, HandlerFn, MethodFlags, Reply};
pub use param::{BodyTarget, Param, ParamMarker};
