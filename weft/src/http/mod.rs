//! Minimal HTTP/1.1 collaborator used by the server transport.
//!
//! Deliberately small: one request per connection, a single receive per
//! request, no chunked bodies and no keep-alive. Parsing produces a
//! [`Request`]; a [`Router`] picks a [`Handler`]; [`dispatch`] runs the
//! handler method matching the request and turns failures into `500`.
//! Bodies sent as `application/json` are merged into the request
//! parameters, and [`Response::json`] writes JSON answers.

mod handler;
mod request;
mod response;

pub use handler::{FnHandler, Handler, NotFound, Router, dispatch};
pub use request::Request;
pub use response::{Response, http_date, reason_phrase};
