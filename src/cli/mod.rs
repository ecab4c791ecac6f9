//! Command-line interface definitions for the `igor-cobbler` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};

/// Top-level CLI for the `igor-cobbler` binary.
#[derive(Debug, Parser)]
#[command(
    name = "igor-cobbler",
    about = "Manage Cobbler profiles and test hosts for igor",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// List every profile registered with Cobbler.
    #[command(name = "profiles", about = "List every profile registered with Cobbler")]
    Profiles,
    /// List hosts selected by the name expression or whitelist.
    #[command(name = "hosts", about = "List hosts selected for testing")]
    Hosts,
    /// Stage boot artifacts and register a new profile.
    #[command(name = "add-profile", about = "Stage boot artifacts and register a profile")]
    AddProfile(AddProfileCommand),
    /// Remove a profile created by igor, with its distro and staged files.
    #[command(name = "remove-profile", about = "Remove a profile created by igor")]
    RemoveProfile(RemoveProfileCommand),
    /// Show or replace a profile's kernel options.
    #[command(name = "kargs", about = "Show or replace a profile's kernel options")]
    Kargs(KargsCommand),
    /// Send a power command to a host.
    #[command(name = "power", about = "Send a power command to a host")]
    Power(PowerCommand),
}

/// Arguments for the `igor-cobbler add-profile` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct AddProfileCommand {
    /// Name of the profile to register.
    pub(crate) name: String,
    /// Local kernel image to stage.
    #[arg(long, value_name = "PATH")]
    pub(crate) kernel: Utf8PathBuf,
    /// Local initial ramdisk to stage.
    #[arg(long, value_name = "PATH")]
    pub(crate) initrd: Utf8PathBuf,
    /// Local file holding the profile's kernel options.
    #[arg(long, value_name = "PATH")]
    pub(crate) kargs: Utf8PathBuf,
}

/// Arguments for the `igor-cobbler remove-profile` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct RemoveProfileCommand {
    /// Name of the profile to remove.
    pub(crate) name: String,
}

/// Arguments for the `igor-cobbler kargs` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct KargsCommand {
    /// Name of the profile.
    pub(crate) name: String,
    /// Replace the kernel options before printing them.
    #[arg(long, value_name = "OPTIONS")]
    pub(crate) set: Option<String>,
}

/// Arguments for the `igor-cobbler power` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct PowerCommand {
    /// Fully-qualified host name as known to Cobbler.
    pub(crate) host: String,
    /// Power command to send.
    #[arg(value_enum)]
    pub(crate) action: PowerArg,
}

/// Power commands accepted on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum PowerArg {
    /// Power the host on.
    On,
    /// Power the host off.
    Off,
    /// Power-cycle the host.
    Reboot,
}
