//! Remote shell and file-transfer execution against the Cobbler host.
//!
//! Boot artifacts are staged on the provisioning server with `scp` and the
//! `cobbler` command line is driven over `ssh`. Every invocation is a blocking
//! external process whose exit status decides success; a non-zero status is
//! reported as [`CommandError::CommandFailure`] and nothing is rolled back.

mod types;

use std::ffi::OsString;

use camino::Utf8Path;
use shell_escape::unix::escape;
use tracing::debug;

pub use types::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};

/// Executables and target used to reach the provisioning host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShellConfig {
    /// Path to the `ssh` executable.
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    pub scp_bin: String,
    /// Remote target in `user@host` form.
    pub target: String,
    /// Whether to force batch mode to avoid password prompts.
    pub batch_mode: bool,
}

/// Runs commands and copies files on the provisioning host.
#[derive(Clone, Debug)]
pub struct RemoteShell<R: CommandRunner> {
    config: ShellConfig,
    runner: R,
}

impl<R: CommandRunner> RemoteShell<R> {
    /// Creates a shell using the provided runner.
    #[must_use]
    pub const fn new(config: ShellConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Returns the shell configuration.
    #[must_use]
    pub const fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Creates `path` (and its parents) on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when `ssh` cannot be spawned or exits non-zero.
    pub fn make_dir(&self, path: &Utf8Path) -> Result<(), CommandError> {
        let escaped = escape(path.as_str().into());
        self.run(&format!("mkdir -p {escaped}")).map(|_| ())
    }

    /// Copies local `files` into `remote_dir` on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when `scp` cannot be spawned or exits non-zero.
    pub fn copy_files(
        &self,
        files: &[&Utf8Path],
        remote_dir: &Utf8Path,
    ) -> Result<(), CommandError> {
        let mut args = self.common_options();
        args.extend(files.iter().map(|file| OsString::from(file.as_str())));
        let destination = escape(remote_dir.as_str().into());
        args.push(OsString::from(format!("{}:{destination}/", self.config.target)));
        debug!(remote = %self.config.target, %remote_dir, count = files.len(), "copying files");
        self.execute(&self.config.scp_bin, &args).map(|_| ())
    }

    /// Runs `script` through the remote login shell.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when `ssh` cannot be spawned or the script
    /// exits non-zero.
    ///
    /// # Security
    ///
    /// `script` is passed verbatim to the remote shell; callers must escape
    /// any interpolated values.
    pub fn run(&self, script: &str) -> Result<CommandOutput, CommandError> {
        let mut args = self.common_options();
        args.push(OsString::from(&self.config.target));
        args.push(OsString::from(script));
        debug!(remote = %self.config.target, script, "running remote command");
        self.execute(&self.config.ssh_bin, &args)
    }

    fn common_options(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if self.config.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }
        args
    }

    fn execute(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        let output = self.runner.run(program, args)?;
        if output.is_success() {
            return Ok(output);
        }

        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(CommandError::CommandFailure {
            program: program.to_owned(),
            status: output.code,
            status_text,
            stderr: output.stderr,
        })
    }
}
