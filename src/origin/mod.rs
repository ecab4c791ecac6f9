//! Discovery of profiles and candidate hosts.
//!
//! An [`Origin`] enumerates items from the backend, each carrying a shared
//! handle to the [`Cobbler`] it came from so later operations can dispatch
//! without re-discovery.

mod whitelist;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use camino::Utf8Path;
use tracing::{debug, warn};

use crate::cobbler::{Cobbler, Session, text_field};
use crate::error::ProvisionError;
use crate::host::Host;
use crate::profile::Profile;
use crate::remote::CommandRunner;
use crate::xmlrpc::Transport;

pub use whitelist::{Whitelist, parse as parse_whitelist};

/// Default substring selecting hosts by name.
pub const DEFAULT_HOST_EXPRESSION: &str = "igor-";

/// Future returned by [`Origin::items`].
pub type ItemsFuture<'a, I> =
    Pin<Box<dyn Future<Output = Result<BTreeMap<String, I>, ProvisionError>> + Send + 'a>>;

/// Source of discoverable items.
pub trait Origin {
    /// Item produced by this origin.
    type Item;

    /// Returns a display name identifying this origin and its backend.
    fn name(&self) -> String;

    /// Enumerates the items currently available, keyed by name.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the session cannot be opened or the
    /// listing fails.
    fn items(&self) -> ItemsFuture<'_, Self::Item>;
}

/// Lists every profile registered with the backend.
pub struct ProfileOrigin<T: Transport, R: CommandRunner> {
    cobbler: Arc<Cobbler<T, R>>,
    extra_kernel_options: Option<String>,
}

impl<T: Transport, R: CommandRunner> ProfileOrigin<T, R> {
    /// Creates a profile origin whose profiles append `extra_kernel_options`
    /// on every bind.
    #[must_use]
    pub const fn new(cobbler: Arc<Cobbler<T, R>>, extra_kernel_options: Option<String>) -> Self {
        Self {
            cobbler,
            extra_kernel_options,
        }
    }

    fn profile(&self, name: &str) -> Profile<T, R> {
        Profile::new(
            name,
            self.extra_kernel_options.clone(),
            self.name(),
            Arc::clone(&self.cobbler),
        )
    }

    /// Registers a new profile from local boot artifacts and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when staging or registration fails.
    pub fn create_item(
        &self,
        name: &str,
        kernel: &Utf8Path,
        initrd: &Utf8Path,
        kargs: &Utf8Path,
    ) -> Result<Profile<T, R>, ProvisionError> {
        let created = self.profile(name);
        created.populate_with(kernel, initrd, kargs)?;
        Ok(created)
    }
}

impl<T: Transport, R: CommandRunner> Origin for ProfileOrigin<T, R> {
    type Item = Profile<T, R>;

    fn name(&self) -> String {
        format!("CobblerProfilesOrigin({})", self.cobbler.server_url())
    }

    fn items(&self) -> ItemsFuture<'_, Self::Item> {
        Box::pin(async move {
            let session = self.cobbler.open().await?;
            let listing = session.profiles().await;
            let names = session.close(listing).await?;
            debug!(count = names.len(), "discovered profiles");
            Ok(names
                .into_iter()
                .map(|name| {
                    let item = self.profile(&name);
                    (name, item)
                })
                .collect())
        })
    }
}

/// Lists backend systems selected by name expression or whitelist.
pub struct HostsOrigin<T: Transport, R: CommandRunner> {
    cobbler: Arc<Cobbler<T, R>>,
    expression: String,
    whitelist: Whitelist,
}

impl<T: Transport, R: CommandRunner> HostsOrigin<T, R> {
    /// Creates a hosts origin.
    #[must_use]
    pub fn new(
        cobbler: Arc<Cobbler<T, R>>,
        expression: impl Into<String>,
        whitelist: Whitelist,
    ) -> Self {
        Self {
            cobbler,
            expression: expression.into(),
            whitelist,
        }
    }

    /// Returns a handle for `fqdn` attributed to this origin without
    /// discovering it; the MAC address is left empty.
    #[must_use]
    pub fn host(&self, fqdn: impl Into<String>) -> Host<T, R> {
        Host::new(fqdn, "", self.name(), Arc::clone(&self.cobbler))
    }

    async fn discover(
        &self,
        session: &Session<'_, T>,
        whitelisted: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, Host<T, R>>, ProvisionError> {
        let origin = self.name();
        let mut hosts = BTreeMap::new();
        for name in session.systems().await? {
            if !name.contains(&self.expression) && !whitelisted.contains(&name) {
                continue;
            }
            let mac = session.system(&name).await.map_or_else(
                |err| {
                    warn!(host = %name, error = %err, "MAC lookup failed");
                    String::new()
                },
                |record| {
                    text_field(&record, "mac_address_eth0").map_or_else(
                        || {
                            warn!(host = %name, "system has no boot interface MAC");
                            String::new()
                        },
                        str::to_owned,
                    )
                },
            );
            let host = Host::new(name.as_str(), mac, origin.as_str(), Arc::clone(&self.cobbler));
            hosts.insert(name, host);
        }
        Ok(hosts)
    }
}

impl<T: Transport, R: CommandRunner> Origin for HostsOrigin<T, R> {
    type Item = Host<T, R>;

    fn name(&self) -> String {
        format!("CobblerHostsOrigin({})", self.cobbler.server_url())
    }

    fn items(&self) -> ItemsFuture<'_, Self::Item> {
        Box::pin(async move {
            let whitelisted = self.whitelist.resolve()?;
            let session = self.cobbler.open().await?;
            let discovered = self.discover(&session, &whitelisted).await;
            let hosts = session.close(discovered).await?;
            debug!(count = hosts.len(), "discovered hosts");
            Ok(hosts)
        })
    }
}
