//! `reqwest`-backed XML-RPC transport.

use reqwest::header::CONTENT_TYPE;
use tracing::trace;

use super::{RpcFuture, Transport, Value, XmlRpcError, decode_response, encode_call};

/// Sends XML-RPC calls as `text/xml` POST requests to a single endpoint.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport targeting `endpoint`, for example
    /// `http://cobbler.example.org/cobbler_api`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, method: &str, params: &[Value]) -> Result<Value, XmlRpcError> {
        let body = encode_call(method, params)?;
        trace!(method, endpoint = %self.endpoint, "xml-rpc call");
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| XmlRpcError::Transport(err.to_string()))?;
        let text = response
            .text()
            .await
            .map_err(|err| XmlRpcError::Transport(err.to_string()))?;
        decode_response(&text)
    }
}

impl Transport for HttpTransport {
    fn call<'a>(&'a self, method: &'a str, params: Vec<Value>) -> RpcFuture<'a, Value> {
        Box::pin(async move { self.post(method, &params).await })
    }
}
