//! Token-scoped unit of work against the Cobbler API.

use tracing::debug;

use crate::error::ProvisionError;
use crate::xmlrpc::{Struct, Transport, Value};

use super::OWNERSHIP_MARKER;
use super::types::{CloseAction, ObjectHandle, PowerAction, SystemBinding, names_from};

const PAGE: i32 = 1;
const RESULTS_PER_PAGE: i32 = 1000;

/// An authenticated session obtained from [`super::Cobbler::open`].
///
/// Every mutating call is tagged with the token acquired when the session was
/// opened. Callers finish the unit of work with [`Session::close`] on every
/// exit path, passing the work's result through it.
pub struct Session<'c, T: Transport> {
    transport: &'c T,
    token: String,
    close_action: CloseAction,
}

impl<'c, T: Transport> Session<'c, T> {
    pub(super) const fn new(transport: &'c T, token: String, close_action: CloseAction) -> Self {
        Self {
            transport,
            token,
            close_action,
        }
    }

    fn token(&self) -> Value {
        Value::from(self.token.as_str())
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ProvisionError> {
        self.transport
            .call(method, params)
            .await
            .map_err(|err| ProvisionError::remote_call(method, err))
    }

    async fn record(&self, method: &str, params: Vec<Value>) -> Result<Struct, ProvisionError> {
        match self.call(method, params).await? {
            Value::Struct(record) => Ok(record),
            _ => Err(ProvisionError::malformed(method, "expected a struct")),
        }
    }

    async fn handle(&self, method: &str, params: Vec<Value>) -> Result<ObjectHandle, ProvisionError> {
        let reply = self.call(method, params).await?;
        reply
            .as_str()
            .map(ObjectHandle::new)
            .ok_or_else(|| ProvisionError::malformed(method, "expected a handle string"))
    }

    /// Lists the names of all profiles known to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails or the reply is not a
    /// list of named records.
    pub async fn profiles(&self) -> Result<Vec<String>, ProvisionError> {
        let method = "get_profiles";
        let reply = self
            .call(method, vec![self.token(), PAGE.into(), RESULTS_PER_PAGE.into()])
            .await?;
        names_from(method, &reply)
    }

    /// Lists the names of all system records known to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails or the reply is not a
    /// list of named records.
    pub async fn systems(&self) -> Result<Vec<String>, ProvisionError> {
        let method = "get_systems";
        let reply = self
            .call(method, vec![self.token(), PAGE.into(), RESULTS_PER_PAGE.into()])
            .await?;
        names_from(method, &reply)
    }

    /// Returns the rendered view of the system record `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails or the reply is not a
    /// struct.
    pub async fn system(&self, name: &str) -> Result<Struct, ProvisionError> {
        self.record("get_system_as_rendered", vec![name.into()])
            .await
    }

    /// Returns the blended view of the profile record `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails or the reply is not a
    /// struct.
    pub async fn profile(&self, name: &str) -> Result<Struct, ProvisionError> {
        self.record("get_blended_data", vec![name.into(), "".into()])
            .await
    }

    /// Returns an edit handle for the existing system `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails.
    pub async fn system_handle(&self, name: &str) -> Result<ObjectHandle, ProvisionError> {
        self.handle("get_system_handle", vec![name.into(), self.token()])
            .await
    }

    /// Creates a new, empty system record and returns its edit handle.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails.
    pub async fn new_system(&self) -> Result<ObjectHandle, ProvisionError> {
        debug!("adding a new system");
        self.handle("new_system", vec![self.token()]).await
    }

    /// Applies `fields` to the system behind `handle` and saves it.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when any modification or the save fails.
    pub async fn modify_system(
        &self,
        handle: &ObjectHandle,
        fields: Vec<(&str, Value)>,
    ) -> Result<(), ProvisionError> {
        for (key, value) in fields {
            debug!(key, ?value, "modifying system");
            self.call(
                "modify_system",
                vec![handle.as_str().into(), key.into(), value, self.token()],
            )
            .await?;
        }
        self.call("save_system", vec![handle.as_str().into(), self.token()])
            .await
            .map(|_| ())
    }

    /// Returns an edit handle for the existing profile `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails.
    pub async fn profile_handle(&self, name: &str) -> Result<ObjectHandle, ProvisionError> {
        self.handle("get_profile_handle", vec![name.into(), self.token()])
            .await
    }

    /// Applies `fields` to the profile behind `handle` and saves it.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when any modification or the save fails.
    pub async fn modify_profile(
        &self,
        handle: &ObjectHandle,
        fields: Vec<(&str, Value)>,
    ) -> Result<(), ProvisionError> {
        for (key, value) in fields {
            debug!(key, ?value, "modifying profile");
            self.call(
                "modify_profile",
                vec![handle.as_str().into(), key.into(), value, self.token()],
            )
            .await?;
        }
        self.call("save_profile", vec![handle.as_str().into(), self.token()])
            .await
            .map(|_| ())
    }

    /// Writes the test binding onto the system behind `handle` in one batch.
    ///
    /// The record is stamped with the ownership marker, marked as `testing`
    /// and its boot interface MAC is set alongside the top-level MAC field.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when any modification or the save fails.
    pub async fn assign_defaults(
        &self,
        handle: &ObjectHandle,
        binding: &SystemBinding,
    ) -> Result<(), ProvisionError> {
        let fields = vec![
            ("name", Value::from(binding.name.as_str())),
            ("mac", Value::from(binding.mac.as_str())),
            ("profile", Value::from(binding.profile.as_str())),
            ("comment", Value::from(OWNERSHIP_MARKER)),
            ("status", Value::from("testing")),
            ("kernel_options", Value::from(binding.kernel_options.as_str())),
            ("kernel_options_post", Value::from("")),
            (
                "modify_interface",
                Value::structure([("macaddress-eth0", Value::from(binding.mac.as_str()))]),
            ),
        ];
        self.modify_system(handle, fields).await
    }

    /// Enables or disables network boot for the system `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the handle lookup or modification
    /// fails.
    pub async fn set_netboot_enable(&self, name: &str, enabled: bool) -> Result<(), ProvisionError> {
        let handle = self.system_handle(name).await?;
        self.modify_system(&handle, vec![("netboot-enabled", Value::from(i32::from(enabled)))])
            .await
    }

    /// Removes the system record `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails.
    pub async fn remove_system(&self, name: &str) -> Result<(), ProvisionError> {
        debug!(name, "removing system");
        self.call("remove_system", vec![name.into(), self.token()])
            .await
            .map(|_| ())
    }

    /// Queues a power command for the system `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails.
    pub async fn power_system(&self, name: &str, action: PowerAction) -> Result<(), ProvisionError> {
        debug!(name, %action, "setting power");
        let options = Value::structure([
            ("power", Value::from(action.as_str())),
            ("systems", Value::Array(vec![name.into()])),
        ]);
        self.call("background_power_system", vec![options, self.token()])
            .await
            .map(|_| ())
    }

    /// Asks the backend to regenerate its boot configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the call fails.
    pub async fn sync(&self) -> Result<(), ProvisionError> {
        debug!("syncing");
        self.call("sync", vec![self.token()]).await.map(|_| ())
    }

    /// Finishes the unit of work, applying the configured [`CloseAction`]
    /// when the work succeeded.
    ///
    /// A failed unit of work is returned unchanged and the close action is
    /// skipped, so nothing is published to the backend after a failure.
    ///
    /// # Errors
    ///
    /// Returns the work's error, or the close action's error.
    pub async fn close<R>(self, result: Result<R, ProvisionError>) -> Result<R, ProvisionError> {
        let value = result.inspect_err(|err| {
            debug!(error = %err, action = ?self.close_action, "skipping close action");
        })?;
        match self.close_action {
            CloseAction::Nothing => {}
            CloseAction::Sync => self.sync().await?,
        }
        Ok(value)
    }
}
