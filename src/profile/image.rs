//! Boot image lifecycle: staging artifacts and registering or removing the
//! distro and profile records through the remote `cobbler` command line.

use std::borrow::Cow;

use camino::{Utf8Path, Utf8PathBuf};
use shell_escape::unix::escape;
use tracing::info;

use crate::cobbler::{OWNERSHIP_MARKER, text_field};
use crate::error::ProvisionError;
use crate::remote::CommandRunner;
use crate::xmlrpc::Transport;

use super::Profile;

fn quote(value: &str) -> String {
    escape(Cow::Borrowed(value)).into_owned()
}

fn staged_path(dir: &Utf8Path, local: &Utf8Path) -> Result<Utf8PathBuf, ProvisionError> {
    local
        .file_name()
        .map(|file_name| dir.join(file_name))
        .ok_or_else(|| ProvisionError::InvalidArtifact {
            path: local.to_path_buf(),
        })
}

impl<T: Transport, R: CommandRunner> Profile<T, R> {
    fn distro_name(&self) -> String {
        format!("{}-distro", self.name)
    }

    /// Stages `kernel`, `initrd` and the boot parameter file `kargs` on the
    /// provisioning host and registers a distro and profile record for them.
    ///
    /// Both records carry the ownership marker. Nothing is cleaned up when a
    /// step fails.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidArtifact`] when a path has no file
    /// name, and [`ProvisionError::Command`] when a remote step fails.
    pub fn populate_with(
        &self,
        kernel: &Utf8Path,
        initrd: &Utf8Path,
        kargs: &Utf8Path,
    ) -> Result<(), ProvisionError> {
        let dir = self.cobbler.staging_dir(&self.name);
        let remote_kernel = staged_path(&dir, kernel)?;
        let remote_initrd = staged_path(&dir, initrd)?;
        let remote_kargs = staged_path(&dir, kargs)?;

        let shell = self.cobbler.shell();
        info!(profile = %self.name, staging = %dir, "staging boot artifacts");
        shell.make_dir(&dir)?;
        shell.copy_files(&[kernel, initrd, kargs], &dir)?;

        let distro = self.distro_name();
        let architecture = &self.cobbler.settings().architecture;
        let script = format!(
            "cobbler distro add --name={distro} --kernel={kernel} --initrd={initrd} \
             --arch={arch} --breed=other --os-version='' --comment={marker} && \
             cobbler profile add --name={profile} --distro={distro} \
             --kopts=\"$(cat {kargs})\" --kickstart='' --repos='' --comment={marker}",
            distro = quote(&distro),
            kernel = quote(remote_kernel.as_str()),
            initrd = quote(remote_initrd.as_str()),
            arch = quote(architecture),
            marker = quote(OWNERSHIP_MARKER),
            profile = quote(&self.name),
            kargs = quote(remote_kargs.as_str()),
        );
        shell.run(&script)?;
        Ok(())
    }

    /// Removes the profile record, its distro record and the staged files.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::NotOwned`] without running anything
    /// destructive when the profile's comment lacks the ownership marker,
    /// and [`ProvisionError::Command`] when the removal script fails.
    pub async fn delete(&self) -> Result<(), ProvisionError> {
        let session = self.cobbler.open().await?;
        let lookup = session.profile(&self.name).await;
        let record = session.close(lookup).await?;
        let owned = text_field(&record, "comment")
            .is_some_and(|comment| comment.contains(OWNERSHIP_MARKER));
        if !owned {
            return Err(ProvisionError::NotOwned {
                kind: String::from("profile"),
                name: self.name.clone(),
            });
        }

        let dir = self.cobbler.staging_dir(&self.name);
        let staged = quote(dir.as_str());
        let script = format!(
            "cobbler profile remove --name={profile} && \
             cobbler distro remove --name={distro} && \
             rm -f {staged}/* && rmdir {staged}",
            profile = quote(&self.name),
            distro = quote(&self.distro_name()),
        );
        info!(profile = %self.name, "removing profile");
        self.cobbler.shell().run(&script)?;
        Ok(())
    }
}
