//! # Server Contract Module
//!
//! The types the dispatch engine consumes from the HTTP transport. A transport
//! (or a test) builds a [`RestRequest`] per inbound request and a [`ResponseHandle`]
//! wrapping a [`ResponseSink`]; everything upstream of that (connection handling, wire
//! parsing, multipart decoding) stays in the transport.
//!
//! - [`RestRequest`] - query/header/form/path accessors, raw and JSON body, uploads
//! - [`MultiMap`] - ordered multi-valued maps
//! - [`ResponseHandle`] - status, headers, single-shot `end`, headers-end hook

mod multimap;
mod request;
mod response;

pub use multimap::MultiMap;
pub use request::{parse_query_params, FileUpload, RestRequest, REQUEST_ID_HEADER};
pub use response::{
    status_reason, ChannelSink, ResponseHandle, ResponseHead, ResponseSink, SentResponse,
};
