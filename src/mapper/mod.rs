//! # Mapper Module
//!
//! Declares resources and turns them into route groups.
//!
//! A resource implements [`Resource`] and describes its routes through the
//! [`ResourceDecl`] / [`MethodDecl`] builders. [`RestMapper`] walks every registered
//! resource (following mounts), merges resource-level and method-level paths and
//! negotiation lists, and registers one route group per route key.
//!
//! ## Example
//!
//! ```rust
//! use restmapper::descriptor::Param;
//! use restmapper::mapper::{Resource, ResourceDecl, RestMapper};
//! use restmapper::spec::UrlSpec;
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct Greeting;
//!
//! impl Resource for Greeting {
//!     fn declare(decl: &mut ResourceDecl<Self>) {
//!         decl.url(UrlSpec::new("/greet")).method("hello", |m| {
//!             m.get()
//!                 .param(Param::query("name").default_value("world"))
//!                 .handler(|_, args| Ok(Some(json!({ "hello": args.str(0) }))))
//!         });
//!     }
//! }
//!
//! let mut mapper = RestMapper::new();
//! mapper.add_resource::<Greeting>();
//! let groups = mapper.build_routes().unwrap();
//! assert_eq!(groups[0].key(), "GET /greet");
//! ```

mod core;
mod resource;

pub use core::RestMapper;
pub use resource::{
    MethodDecl, MethodDefinition, Resource, ResourceDecl, ResourceDefinition, ResourceType,
    VerbDecl,
};
