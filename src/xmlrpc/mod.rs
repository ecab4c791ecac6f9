//! Minimal XML-RPC client used to talk to the Cobbler API.
//!
//! Only the subset of XML-RPC that Cobbler exercises is modelled: scalar
//! values, arrays, structs and `<nil/>`. The [`Transport`] trait is the seam
//! between the Cobbler session logic and the wire; [`HttpTransport`] is the
//! production implementation and tests substitute an in-memory backend.

mod codec;
mod http;
mod value;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use codec::{decode_response, encode_call};
pub use http::HttpTransport;
pub use value::{Struct, Value};

/// Future returned by [`Transport::call`].
pub type RpcFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, XmlRpcError>> + Send + 'a>>;

/// Errors raised while performing an XML-RPC call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum XmlRpcError {
    /// Raised when the HTTP exchange fails or returns a non-success status.
    #[error("transport error: {0}")]
    Transport(String),
    /// Raised when the server answers with an XML-RPC fault.
    #[error("fault {code}: {message}")]
    Fault {
        /// Numeric fault code reported by the server.
        code: i64,
        /// Fault description reported by the server.
        message: String,
    },
    /// Raised when the response body is not a valid `methodResponse`.
    #[error("malformed response: {0}")]
    Parse(String),
    /// Raised when the request document cannot be rendered.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// Performs XML-RPC method calls against a remote endpoint.
pub trait Transport: Send + Sync {
    /// Invokes `method` with positional `params` and returns the result value.
    ///
    /// # Errors
    ///
    /// Returns [`XmlRpcError`] when the call cannot be delivered, the reply
    /// cannot be parsed, or the server reports a fault.
    fn call<'a>(&'a self, method: &'a str, params: Vec<Value>) -> RpcFuture<'a, Value>;
}
