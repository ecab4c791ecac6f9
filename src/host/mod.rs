//! Test machines discovered from Cobbler system records.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::cobbler::{Cobbler, PowerAction};
use crate::error::ProvisionError;
use crate::remote::CommandRunner;
use crate::xmlrpc::Transport;

/// One test machine known to the backend.
///
/// The fully-qualified name is the authoritative identity for backend calls;
/// callers outside the provisioning boundary only ever see [`Host::name`].
pub struct Host<T: Transport, R: CommandRunner> {
    fqdn: String,
    mac: String,
    origin: String,
    cobbler: Arc<Cobbler<T, R>>,
}

impl<T: Transport, R: CommandRunner> Host<T, R> {
    /// Creates a host record as produced by discovery.
    #[must_use]
    pub fn new(
        fqdn: impl Into<String>,
        mac: impl Into<String>,
        origin: impl Into<String>,
        cobbler: Arc<Cobbler<T, R>>,
    ) -> Self {
        Self {
            fqdn: fqdn.into(),
            mac: mac.into(),
            origin: origin.into(),
            cobbler,
        }
    }

    /// Returns the short host name with any domain suffix removed.
    #[must_use]
    pub fn name(&self) -> &str {
        self.fqdn
            .split_once('.')
            .map_or(self.fqdn.as_str(), |(short, _)| short)
    }

    /// Returns the authoritative, fully-qualified name.
    #[must_use]
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Returns the boot interface MAC address, empty when unknown.
    #[must_use]
    pub fn mac_address(&self) -> &str {
        &self.mac
    }

    /// Returns the name of the origin that discovered this host.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Power-cycles the host so it network boots its bound profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the session cannot be opened or the
    /// power request fails.
    pub async fn start(&self) -> Result<(), ProvisionError> {
        self.power(PowerAction::Reboot).await
    }

    /// Powers the host off.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the session cannot be opened or the
    /// power request fails.
    pub async fn purge(&self) -> Result<(), ProvisionError> {
        self.power(PowerAction::Off).await
    }

    /// Sends an arbitrary power command to the host.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the session cannot be opened or the
    /// power request fails.
    pub async fn power(&self, action: PowerAction) -> Result<(), ProvisionError> {
        info!(host = %self.fqdn, %action, "requesting power change");
        let session = self.cobbler.open().await?;
        let result = session.power_system(&self.fqdn, action).await;
        session.close(result).await
    }
}

impl<T: Transport, R: CommandRunner> fmt::Debug for Host<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("fqdn", &self.fqdn)
            .field("mac", &self.mac)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
