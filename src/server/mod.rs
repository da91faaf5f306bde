//! HTTP/SSE surface the graphical front end drives the controller through.

pub mod api;
pub mod http;
pub mod sse;

pub use http::{router, AppState, HttpServer};
