//! Provisioning lifecycle manager for network-booted test hosts.
//!
//! The crate drives a Cobbler server over XML-RPC and a remote shell: it
//! discovers candidate hosts and bootable profiles, binds a profile to a host
//! for one test run and later reverses that binding. Records that existed
//! before a bind are restored and records created for a single run are
//! removed, so machines owned by someone else are never destroyed.

pub mod cobbler;
pub mod config;
pub mod error;
pub mod host;
pub mod origin;
pub mod profile;
pub mod remote;
pub mod test_support;
pub mod xmlrpc;

pub use cobbler::{
    CloseAction, Cobbler, CobblerSettings, Credentials, OWNERSHIP_MARKER, PowerAction, Session,
};
pub use config::{CobblerConfig, ConfigError};
pub use error::ProvisionError;
pub use host::Host;
pub use origin::{HostsOrigin, Origin, ProfileOrigin, Whitelist};
pub use profile::{COOKIE_PLACEHOLDER, Profile, SystemProvenance};
pub use remote::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner, RemoteShell};
pub use xmlrpc::{HttpTransport, Transport, Value, XmlRpcError};
