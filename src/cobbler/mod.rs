//! Cobbler backend handle and scoped sessions.
//!
//! [`Cobbler`] bundles everything later operations need to reach the
//! provisioning server: the XML-RPC transport with its credentials and the
//! remote shell used to stage boot artifacts. Work against the API happens in
//! a [`Session`] opened per operation.

mod session;
mod types;

use std::fmt;

use camino::Utf8PathBuf;
use tracing::debug;

use crate::error::ProvisionError;
use crate::remote::{CommandRunner, ProcessCommandRunner, RemoteShell, ShellConfig};
use crate::xmlrpc::{HttpTransport, Transport, Value, XmlRpcError};

pub use session::Session;
pub use types::{
    CloseAction, ObjectHandle, PowerAction, SystemBinding, SystemSnapshot, render_kernel_options,
    text_field,
};

/// Marker written into the `comment` field of every record this crate
/// creates. Records without it are never destroyed.
pub const OWNERSHIP_MARKER: &str = "managed-by-igor";

/// Login credentials for the Cobbler API.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    /// Cobbler user name.
    pub username: String,
    /// Cobbler password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolved settings for a [`Cobbler`] handle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CobblerSettings {
    /// XML-RPC endpoint of the Cobbler API.
    pub server_url: String,
    /// Login credentials.
    pub credentials: Credentials,
    /// Remote shell used for artifact staging and the `cobbler` CLI.
    pub shell: ShellConfig,
    /// Architecture stamped onto distro records.
    pub architecture: String,
    /// Remote staging path prefix; the profile name is appended.
    pub staging_prefix: String,
    /// Session exit policy.
    pub close_action: CloseAction,
}

/// Handle to a Cobbler server shared by discovered hosts and profiles.
pub struct Cobbler<T: Transport, R: CommandRunner> {
    settings: CobblerSettings,
    transport: T,
    shell: RemoteShell<R>,
}

impl Cobbler<HttpTransport, ProcessCommandRunner> {
    /// Builds a handle talking HTTP to the configured endpoint and shelling
    /// out to the system `ssh`/`scp` clients.
    #[must_use]
    pub fn connect(settings: CobblerSettings) -> Self {
        let transport = HttpTransport::new(settings.server_url.as_str());
        Self::new(settings, transport, ProcessCommandRunner)
    }
}

impl<T: Transport, R: CommandRunner> Cobbler<T, R> {
    /// Creates a handle from explicit transport and command runner.
    #[must_use]
    pub fn new(settings: CobblerSettings, transport: T, runner: R) -> Self {
        let shell = RemoteShell::new(settings.shell.clone(), runner);
        Self {
            settings,
            transport,
            shell,
        }
    }

    /// Returns the API endpoint.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.settings.server_url
    }

    /// Returns the resolved settings.
    #[must_use]
    pub const fn settings(&self) -> &CobblerSettings {
        &self.settings
    }

    /// Returns the remote shell bound to the provisioning host.
    #[must_use]
    pub const fn shell(&self) -> &RemoteShell<R> {
        &self.shell
    }

    /// Returns the remote staging directory for `profile`.
    #[must_use]
    pub fn staging_dir(&self, profile: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}{profile}", self.settings.staging_prefix))
    }

    /// Authenticates and opens a session.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Authentication`] when the backend rejects the
    /// credentials, and [`ProvisionError::RemoteCall`] when the backend cannot
    /// be reached.
    pub async fn open(&self) -> Result<Session<'_, T>, ProvisionError> {
        let credentials = &self.settings.credentials;
        let params = vec![
            Value::from(credentials.username.as_str()),
            Value::from(credentials.password.as_str()),
        ];
        let reply = self
            .transport
            .call("login", params)
            .await
            .map_err(|err| match err {
                XmlRpcError::Fault { message, .. } => ProvisionError::Authentication {
                    server_url: self.settings.server_url.clone(),
                    message,
                },
                other => ProvisionError::remote_call("login", other),
            })?;
        let token = reply
            .as_str()
            .ok_or_else(|| ProvisionError::malformed("login", "expected a token string"))?
            .to_owned();
        debug!(server_url = %self.settings.server_url, "session opened");
        Ok(Session::new(
            &self.transport,
            token,
            self.settings.close_action,
        ))
    }
}

impl<T: Transport, R: CommandRunner> fmt::Debug for Cobbler<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cobbler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
