//! Value types used by the Cobbler session API.

use std::fmt;

use crate::error::ProvisionError;
use crate::xmlrpc::{Struct, Value};

/// Opaque handle issued by Cobbler for editing a system or profile object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectHandle(String);

impl ObjectHandle {
    /// Wraps a handle string returned by the backend.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the handle as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Power commands understood by `background_power_system`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerAction {
    /// Power the system on.
    On,
    /// Power the system off.
    Off,
    /// Power-cycle the system.
    Reboot,
}

impl PowerAction {
    /// Returns the wire representation of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Reboot => "reboot",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a session does when its unit of work finishes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CloseAction {
    /// Release the session without further backend calls.
    #[default]
    Nothing,
    /// Run a backend `sync` after successful work.
    Sync,
}

/// Fields written onto a system record when a profile is bound to a host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SystemBinding {
    /// Authoritative host name.
    pub name: String,
    /// MAC address of the boot interface; may be empty.
    pub mac: String,
    /// Profile to boot.
    pub profile: String,
    /// Fully rendered kernel options.
    pub kernel_options: String,
}

/// Fields of a pre-existing system record that a bind overwrites.
///
/// Captured before the bind and written back on unbind, so a reused record
/// leaves the test run without the ownership marker or the test binding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SystemSnapshot {
    /// Profile the record was bound to.
    pub profile: String,
    /// Comment, typically naming the record's owner.
    pub comment: String,
    /// Lifecycle status, when the record carried one.
    pub status: Option<String>,
    /// Rendered kernel options; empty when the record had none.
    pub kernel_options: String,
    /// Rendered post-install kernel options; empty when the record had none.
    pub kernel_options_post: String,
    /// Boot interface MAC, when the record carried one.
    pub mac: Option<String>,
    /// Network boot flag, when the record reported one.
    pub netboot_enabled: Option<bool>,
}

impl SystemSnapshot {
    /// Captures the fields a bind overwrites from a rendered system record.
    #[must_use]
    pub fn capture(record: &Struct) -> Self {
        let owned = |key: &str| text_field(record, key).map(str::to_owned);
        Self {
            profile: owned("profile").unwrap_or_default(),
            comment: owned("comment").unwrap_or_default(),
            status: owned("status"),
            kernel_options: record
                .get("kernel_options")
                .map(render_kernel_options)
                .unwrap_or_default(),
            kernel_options_post: record
                .get("kernel_options_post")
                .map(render_kernel_options)
                .unwrap_or_default(),
            mac: owned("mac_address_eth0").filter(|mac| !mac.is_empty()),
            netboot_enabled: flag_field(record, "netboot_enabled")
                .or_else(|| flag_field(record, "netboot-enabled")),
        }
    }

    /// Returns the modifications that put the captured fields back.
    #[must_use]
    pub fn restore_fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields = vec![
            ("profile", Value::from(self.profile.as_str())),
            ("comment", Value::from(self.comment.as_str())),
            ("kernel_options", Value::from(self.kernel_options.as_str())),
            ("kernel_options_post", Value::from(self.kernel_options_post.as_str())),
        ];
        if let Some(status) = &self.status {
            fields.push(("status", Value::from(status.as_str())));
        }
        if let Some(mac) = &self.mac {
            fields.push((
                "modify_interface",
                Value::structure([("macaddress-eth0", Value::from(mac.as_str()))]),
            ));
        }
        if let Some(enabled) = self.netboot_enabled {
            fields.push(("netboot-enabled", Value::from(i32::from(enabled))));
        }
        fields
    }
}

/// Extracts the `name` member of every struct in a list reply.
pub(crate) fn names_from(method: &str, reply: &Value) -> Result<Vec<String>, ProvisionError> {
    let items = reply
        .as_array()
        .ok_or_else(|| ProvisionError::malformed(method, "expected an array"))?;
    items
        .iter()
        .map(|item| {
            item.as_struct()
                .and_then(|record| record.get("name"))
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| ProvisionError::malformed(method, "entry without a name"))
        })
        .collect()
}

/// Returns a string member of a record, if present.
#[must_use]
pub fn text_field<'r>(record: &'r Struct, key: &str) -> Option<&'r str> {
    record.get(key).and_then(Value::as_str)
}

/// Reads a boolean member reported as a bool, an integer or a string.
fn flag_field(record: &Struct, key: &str) -> Option<bool> {
    match record.get(key)? {
        Value::Bool(flag) => Some(*flag),
        Value::Int(number) => Some(*number != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" => Some(true),
            "0" | "false" | "no" | "n" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Renders kernel options as a single command-line string.
///
/// Cobbler reports kernel options either as a preformatted string or as a
/// mapping; mappings are flattened to `key=value` pairs, with bare `key` for
/// empty values and one pair per element for list values.
#[must_use]
pub fn render_kernel_options(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Struct(options) => {
            let mut parts = Vec::new();
            for (key, option) in options {
                match option {
                    Value::Array(values) => {
                        parts.extend(values.iter().map(|item| render_pair(key, item)));
                    }
                    single => parts.push(render_pair(key, single)),
                }
            }
            parts.join(" ")
        }
        _ => String::new(),
    }
}

fn render_pair(key: &str, value: &Value) -> String {
    match value {
        Value::Nil => key.to_owned(),
        Value::String(text) if text.is_empty() => key.to_owned(),
        Value::String(text) => format!("{key}={text}"),
        Value::Int(number) => format!("{key}={number}"),
        Value::Bool(flag) => format!("{key}={}", u8::from(*flag)),
        Value::Double(number) => format!("{key}={number}"),
        _ => key.to_owned(),
    }
}
