//! Turns an HTTP request reaching a dispatch route into an engine request.

pub mod web;

pub use web::{from_http_request, serve, RequestError, RequestScope, WebRequest};

#[cfg(test)]
mod tests;
