//! Configuration loading via `ortho-config`.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::cobbler::{CloseAction, CobblerSettings, Credentials};
use crate::origin::{DEFAULT_HOST_EXPRESSION, Whitelist};
use crate::remote::ShellConfig;

/// Default remote staging path prefix; the profile name is appended.
pub const DEFAULT_STAGING_PREFIX: &str = "/tmp/igor-cobbler-";

const CONFIG_FILE: &str = "igor.toml";
const SECTION: &str = "cobbler";

/// Cobbler backend, remote shell and discovery settings derived from
/// environment variables and configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "IGOR_COBBLER",
    discovery(
        app_name = "igor",
        env_var = "IGOR_CONFIG_PATH",
        config_file_name = "igor.toml",
        dotfile_name = ".igor.toml",
        project_file_name = "igor.toml"
    )
)]
pub struct CobblerConfig {
    /// XML-RPC endpoint of the Cobbler API, e.g. `http://cobbler/cobbler_api`.
    pub server_url: String,
    /// Cobbler user name.
    #[ortho_config(default = "cobbler".to_owned())]
    pub username: String,
    /// Cobbler password. This value is required.
    pub password: String,
    /// Remote shell target for the provisioning host, e.g. `root@cobbler`.
    pub ssh_uri: String,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Substring selecting hosts by name during discovery.
    #[ortho_config(default = DEFAULT_HOST_EXPRESSION.to_owned())]
    pub host_expression: String,
    /// Comma separated host names always admitted by discovery.
    pub whitelist: Option<String>,
    /// File listing host names always admitted by discovery. Mutually
    /// exclusive with `whitelist`.
    pub whitelist_file: Option<String>,
    /// Architecture stamped onto distro records.
    #[ortho_config(default = "x86_64".to_owned())]
    pub architecture: String,
    /// Remote staging path prefix for boot artifacts.
    #[ortho_config(default = DEFAULT_STAGING_PREFIX.to_owned())]
    pub staging_prefix: String,
    /// Boot parameter template appended to every bind; `{igor_cookie}` is
    /// replaced by the session cookie.
    pub extra_kernel_options: Option<String>,
    /// Whether sessions run a backend `sync` when they close.
    #[ortho_config(default = false)]
    pub sync_on_close: bool,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

const REQUIRED_FIELDS: [FieldMetadata; 8] = [
    FieldMetadata::new("Cobbler API URL", "IGOR_COBBLER_SERVER_URL", "server_url"),
    FieldMetadata::new("Cobbler user name", "IGOR_COBBLER_USERNAME", "username"),
    FieldMetadata::new("Cobbler password", "IGOR_COBBLER_PASSWORD", "password"),
    FieldMetadata::new("provisioning host SSH target", "IGOR_COBBLER_SSH_URI", "ssh_uri"),
    FieldMetadata::new("ssh executable", "IGOR_COBBLER_SSH_BIN", "ssh_bin"),
    FieldMetadata::new("scp executable", "IGOR_COBBLER_SCP_BIN", "scp_bin"),
    FieldMetadata::new("host name expression", "IGOR_COBBLER_HOST_EXPRESSION", "host_expression"),
    FieldMetadata::new("distro architecture", "IGOR_COBBLER_ARCHITECTURE", "architecture"),
];

impl CobblerConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{SECTION}] in {CONFIG_FILE}",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    fn required_values(&self) -> [&str; 8] {
        [
            &self.server_url,
            &self.username,
            &self.password,
            &self.ssh_uri,
            &self.ssh_bin,
            &self.scp_bin,
            &self.host_expression,
            &self.architecture,
        ]
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("igor-cobbler")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty,
    /// and [`ConfigError::Conflict`] when both whitelist forms are set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (value, metadata) in self.required_values().into_iter().zip(&REQUIRED_FIELDS) {
            Self::require_field(value, metadata)?;
        }
        if self.whitelist.is_some() && self.whitelist_file.is_some() {
            return Err(ConfigError::Conflict(format!(
                "whitelist and whitelist_file are mutually exclusive in [{SECTION}] in {CONFIG_FILE}"
            )));
        }
        if self
            .whitelist_file
            .as_deref()
            .is_some_and(|path| path.trim().is_empty())
        {
            return Err(ConfigError::MissingField(format!(
                "whitelist_file must not be blank: set IGOR_COBBLER_WHITELIST_FILE or remove \
                 whitelist_file from [{SECTION}] in {CONFIG_FILE}"
            )));
        }
        Ok(())
    }

    /// Returns the session exit policy selected by `sync_on_close`.
    #[must_use]
    pub const fn close_action(&self) -> CloseAction {
        if self.sync_on_close {
            CloseAction::Sync
        } else {
            CloseAction::Nothing
        }
    }

    /// Builds the backend settings after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn settings(&self) -> Result<CobblerSettings, ConfigError> {
        self.validate()?;
        Ok(CobblerSettings {
            server_url: self.server_url.trim().to_owned(),
            credentials: Credentials {
                username: self.username.clone(),
                password: self.password.clone(),
            },
            shell: ShellConfig {
                ssh_bin: self.ssh_bin.clone(),
                scp_bin: self.scp_bin.clone(),
                target: self.ssh_uri.trim().to_owned(),
                batch_mode: self.ssh_batch_mode,
            },
            architecture: self.architecture.clone(),
            staging_prefix: self.staging_prefix.clone(),
            close_action: self.close_action(),
        })
    }

    /// Returns the configured host whitelist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn host_whitelist(&self) -> Result<Whitelist, ConfigError> {
        self.validate()?;
        Ok(match (&self.whitelist, &self.whitelist_file) {
            (_, Some(path)) => Whitelist::File(Utf8PathBuf::from(path.trim())),
            (Some(names), None) => Whitelist::from_names(
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty()),
            ),
            (None, None) => Whitelist::default(),
        })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates mutually exclusive settings were both provided.
    #[error("conflicting configuration: {0}")]
    Conflict(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<ConfigError> for crate::error::ProvisionError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
