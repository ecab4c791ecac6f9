//! Error type shared by the provisioning lifecycle operations.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::remote::CommandError;
use crate::xmlrpc::XmlRpcError;

/// Errors surfaced by sessions, discovery, hosts and profiles.
///
/// None of these are retried internally; every failure halts the current
/// operation and leaves the backend in whatever state the last successful
/// remote call produced.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the backend rejects the configured credentials.
    #[error("authentication against {server_url} failed: {message}")]
    Authentication {
        /// Backend endpoint the login was attempted against.
        server_url: String,
        /// Reason reported by the backend.
        message: String,
    },
    /// Raised when binding a profile the backend does not know.
    #[error("unknown profile '{name}'")]
    UnknownProfile {
        /// Requested profile name.
        name: String,
    },
    /// Raised when a destructive operation targets a record without the
    /// ownership marker.
    #[error("{kind} '{name}' is not managed by igor")]
    NotOwned {
        /// Record kind (`profile` or `system`).
        kind: String,
        /// Record name.
        name: String,
    },
    /// Raised when a backend remote procedure call fails.
    #[error("remote call {method} failed: {source}")]
    RemoteCall {
        /// XML-RPC method that failed.
        method: String,
        /// Underlying transport or fault error.
        #[source]
        source: XmlRpcError,
    },
    /// Raised when a remote shell or file-transfer step fails.
    #[error("remote command failed: {0}")]
    Command(#[from] CommandError),
    /// Raised when a backend reply lacks an expected field or has the wrong
    /// shape.
    #[error("unexpected reply to {method}: {message}")]
    MalformedRecord {
        /// XML-RPC method whose reply was malformed.
        method: String,
        /// Description of the mismatch.
        message: String,
    },
    /// Raised when a boot artifact path cannot be staged.
    #[error("invalid boot artifact path {path}")]
    InvalidArtifact {
        /// Offending local path.
        path: Utf8PathBuf,
    },
    /// Raised when the host whitelist file cannot be read.
    #[error("failed to read whitelist {path}: {message}")]
    Whitelist {
        /// Whitelist file path.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when configuration is incomplete or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProvisionError {
    pub(crate) fn remote_call(method: &str, source: XmlRpcError) -> Self {
        Self::RemoteCall {
            method: method.to_owned(),
            source,
        }
    }

    pub(crate) fn malformed(method: &str, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            method: method.to_owned(),
            message: message.into(),
        }
    }
}
