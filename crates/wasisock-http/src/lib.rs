//! Minimal HTTP/1.1 client for wasisock.
//!
//! The client is parameterised by the [`SocketProvider`](wasisock_core::SocketProvider)
//! it connects through, so the same code runs over the host TCP stack, a
//! guarded provider, or a test double:
//! - [`HttpClient`]: request execution
//! - [`HttpRequest`] / [`HttpMethod`]: request construction and rendering
//! - [`HttpResponse`]: status line, header, and chunked body parsing

pub mod client;
pub mod error;
pub mod request;
pub mod response;

pub use client::{DEFAULT_MAX_RESPONSE_BYTES, HttpClient};
pub use error::HttpError;
pub use request::{HttpMethod, HttpRequest};
pub use response::HttpResponse;
