//! Transport layer for askdb.
//!
//! askdb is served over plain HTTP with JSON bodies.

pub mod http;

pub use http::{HttpTransport, router};
