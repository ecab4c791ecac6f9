//! Per-test binding of a profile to a host.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cobbler::{
    OWNERSHIP_MARKER, Session, SystemBinding, SystemSnapshot, render_kernel_options, text_field,
};
use crate::error::ProvisionError;
use crate::host::Host;
use crate::remote::CommandRunner;
use crate::xmlrpc::{Transport, Value};

use super::{COOKIE_PLACEHOLDER, Profile, SystemProvenance};

/// Builds the boot parameters written onto a system record.
///
/// Non-empty parts are joined by single spaces and every
/// [`COOKIE_PLACEHOLDER`] is replaced by `cookie`.
#[must_use]
pub fn compose_kernel_options(
    base: &str,
    extra: Option<&str>,
    additional: &str,
    cookie: &str,
) -> String {
    [base, extra.unwrap_or_default(), additional]
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace(COOKIE_PLACEHOLDER, cookie)
}

impl<T: Transport, R: CommandRunner> Profile<T, R> {
    /// Binds this profile to `host` for one test run.
    ///
    /// Reuses the host's system record when one exists, remembering the
    /// profile it was bound to, and creates one otherwise. The record is
    /// stamped with the ownership marker and network boot is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::UnknownProfile`] without touching the
    /// backend when the profile is not registered, and any session or
    /// remote call error otherwise.
    pub async fn assign_to(
        &mut self,
        host: &Host<T, R>,
        additional: &str,
        cookie: &str,
    ) -> Result<(), ProvisionError> {
        let cobbler = Arc::clone(&self.cobbler);
        let session = cobbler.open().await?;
        let result = self.bind(&session, host, additional, cookie).await;
        session.close(result).await
    }

    async fn bind(
        &mut self,
        session: &Session<'_, T>,
        host: &Host<T, R>,
        additional: &str,
        cookie: &str,
    ) -> Result<(), ProvisionError> {
        let profiles = session.profiles().await?;
        if !profiles.contains(&self.name) {
            info!(profile = %self.name, available = ?profiles, "profile is not registered");
            return Err(ProvisionError::UnknownProfile {
                name: self.name.clone(),
            });
        }

        let fqdn = host.fqdn();
        let handle = if session.systems().await?.iter().any(|name| name == fqdn) {
            info!(host = fqdn, "reusing existing system");
            let existing = session.system(fqdn).await?;
            if self.provenance.is_none() {
                self.provenance = Some(SystemProvenance::Existing(SystemSnapshot::capture(
                    &existing,
                )));
            }
            session.system_handle(fqdn).await?
        } else {
            self.provenance = Some(SystemProvenance::Created);
            session.new_system().await?
        };

        let record = session.profile(&self.name).await?;
        let base = record
            .get("kernel_options")
            .map(render_kernel_options)
            .unwrap_or_default();
        let kernel_options = compose_kernel_options(
            &base,
            self.extra_kernel_options.as_deref(),
            additional,
            cookie,
        );
        debug!(host = fqdn, %kernel_options, "binding profile");

        let binding = SystemBinding {
            name: fqdn.to_owned(),
            mac: host.mac_address().to_owned(),
            profile: self.name.clone(),
            kernel_options,
        };
        session.assign_defaults(&handle, &binding).await?;
        session.set_netboot_enable(fqdn, true).await
    }

    /// Reverses a previous [`Profile::assign_to`] on `host`.
    ///
    /// A reused record gets its previous profile back; a record created by
    /// the bind is removed. A missing record is logged and ignored. When this
    /// instance never bound the host, only records carrying the ownership
    /// marker are removed.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NotOwned`] for an unmarked record of unknown
    /// provenance, and any session or remote call error otherwise.
    pub async fn revoke_from(&self, host: &Host<T, R>) -> Result<(), ProvisionError> {
        let session = self.cobbler.open().await?;
        let result = self.unbind(&session, host).await;
        session.close(result).await
    }

    async fn unbind(
        &self,
        session: &Session<'_, T>,
        host: &Host<T, R>,
    ) -> Result<(), ProvisionError> {
        let fqdn = host.fqdn();
        if !session.systems().await?.iter().any(|name| name == fqdn) {
            info!(host = fqdn, profile = %self.name, "no system to revoke");
            return Ok(());
        }

        match &self.provenance {
            Some(SystemProvenance::Existing(snapshot)) => {
                info!(host = fqdn, previous = %snapshot.profile, "restoring pre-existing system");
                let handle = session.system_handle(fqdn).await?;
                session.modify_system(&handle, snapshot.restore_fields()).await
            }
            Some(SystemProvenance::Created) => session.remove_system(fqdn).await,
            None => {
                let record = session.system(fqdn).await?;
                let owned = text_field(&record, "comment")
                    .is_some_and(|comment| comment.contains(OWNERSHIP_MARKER));
                if !owned {
                    return Err(ProvisionError::NotOwned {
                        kind: String::from("system"),
                        name: fqdn.to_owned(),
                    });
                }
                session.remove_system(fqdn).await
            }
        }
    }

    /// Returns the profile's kernel options, replacing them first when
    /// `replacement` is given.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the session or any remote call fails.
    pub async fn kernel_options(&self, replacement: Option<&str>) -> Result<String, ProvisionError> {
        let session = self.cobbler.open().await?;
        let result = self.update_kernel_options(&session, replacement).await;
        session.close(result).await
    }

    async fn update_kernel_options(
        &self,
        session: &Session<'_, T>,
        replacement: Option<&str>,
    ) -> Result<String, ProvisionError> {
        if let Some(options) = replacement {
            let handle = session.profile_handle(&self.name).await?;
            session
                .modify_profile(&handle, vec![("kernel_options", Value::from(options))])
                .await?;
        }
        let record = session.profile(&self.name).await?;
        Ok(record
            .get("kernel_options")
            .map(render_kernel_options)
            .unwrap_or_default())
    }

    /// Enables or disables network boot for `host`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the session or any remote call fails.
    pub async fn enable_pxe(&self, host: &Host<T, R>, enabled: bool) -> Result<(), ProvisionError> {
        let session = self.cobbler.open().await?;
        let result = session.set_netboot_enable(host.fqdn(), enabled).await;
        session.close(result).await
    }
}
