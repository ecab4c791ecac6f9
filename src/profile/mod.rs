//! Bootable test profiles and their binding to hosts.
//!
//! A [`Profile`] names a Cobbler profile record. Operators stage new boot
//! images through [`Profile::populate_with`] and retire them with
//! [`Profile::delete`]; the per-test cycle binds the profile to a host with
//! [`Profile::assign_to`] and reverses that with [`Profile::revoke_from`].
//!
//! Binding remembers whether the host's system record existed beforehand.
//! Unbinding restores the previous profile on such records and removes the
//! records it created, so machines owned by someone else are never destroyed
//! and single-run records never leak.

mod binding;
mod image;

use std::fmt;
use std::sync::Arc;

use crate::cobbler::{Cobbler, SystemSnapshot};
use crate::remote::CommandRunner;
use crate::xmlrpc::Transport;

pub use binding::compose_kernel_options;

/// Placeholder in boot parameter templates replaced by the session cookie.
pub const COOKIE_PLACEHOLDER: &str = "{igor_cookie}";

/// How the system record bound by a profile came to exist.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SystemProvenance {
    /// The record was created by the bind and is removed on unbind.
    Created,
    /// The record existed before the bind; the captured fields are written
    /// back on unbind.
    Existing(SystemSnapshot),
}

/// A named boot image registered, or to be registered, with Cobbler.
pub struct Profile<T: Transport, R: CommandRunner> {
    name: String,
    extra_kernel_options: Option<String>,
    origin: String,
    cobbler: Arc<Cobbler<T, R>>,
    provenance: Option<SystemProvenance>,
}

impl<T: Transport, R: CommandRunner> Profile<T, R> {
    /// Creates an unbound profile value.
    ///
    /// `extra_kernel_options` is a boot parameter template appended to the
    /// profile's own parameters on every bind.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        extra_kernel_options: Option<String>,
        origin: impl Into<String>,
        cobbler: Arc<Cobbler<T, R>>,
    ) -> Self {
        Self {
            name: name.into(),
            extra_kernel_options,
            origin: origin.into(),
            cobbler,
            provenance: None,
        }
    }

    /// Returns the profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the origin that produced this profile.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the provenance captured by the last bind, if any.
    #[must_use]
    pub const fn provenance(&self) -> Option<&SystemProvenance> {
        self.provenance.as_ref()
    }

    /// Returns `true` when the last bind reused an existing system record.
    #[must_use]
    pub const fn system_pre_existed(&self) -> bool {
        matches!(self.provenance, Some(SystemProvenance::Existing(_)))
    }

    /// Returns the profile the reused system record was bound to before.
    #[must_use]
    pub fn previous_profile_name(&self) -> Option<&str> {
        match &self.provenance {
            Some(SystemProvenance::Existing(snapshot)) => Some(&snapshot.profile),
            _ => None,
        }
    }
}

impl<T: Transport, R: CommandRunner> fmt::Debug for Profile<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("provenance", &self.provenance)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
