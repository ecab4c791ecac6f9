//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedRunner`] stands in for `ssh`/`scp` and [`FakeCobbler`] is an
//! in-memory Cobbler API behind the [`Transport`] seam. Both record every
//! interaction so tests can assert on exactly what reached the backend.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ffi::OsString;
use std::future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cobbler::{CloseAction, Cobbler, CobblerSettings, Credentials};
use crate::remote::{CommandError, CommandOutput, CommandRunner, ShellConfig};
use crate::xmlrpc::{RpcFuture, Struct, Transport, Value, XmlRpcError};

/// User name accepted by [`FakeCobbler`].
pub const FAKE_USERNAME: &str = "cobbler";
/// Password accepted by [`FakeCobbler`].
pub const FAKE_PASSWORD: &str = "hunter2";
/// Endpoint reported by [`fake_settings`].
pub const FAKE_SERVER_URL: &str = "http://cobbler.test/cobbler_api";

const AUTH_FAULT: i64 = 1;
const LOOKUP_FAULT: i64 = 2;

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        locked(&self.invocations).clone()
    }

    /// Pushes `count` successful exit statuses.
    pub fn push_successes(&self, count: usize) {
        for _ in 0..count {
            self.push_success();
        }
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        locked(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        locked(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        locked(&self.responses)
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// A single XML-RPC call observed by [`FakeCobbler`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    /// Method name.
    pub method: String,
    /// Positional parameters as sent.
    pub params: Vec<Value>,
}

impl RecordedCall {
    /// Returns the first parameter when it is a string.
    #[must_use]
    pub fn first_str(&self) -> Option<&str> {
        self.params.first().and_then(Value::as_str)
    }
}

const MUTATING_METHODS: &[&str] = &[
    "new_system",
    "modify_system",
    "save_system",
    "remove_system",
    "modify_profile",
    "save_profile",
    "background_power_system",
    "sync",
];

#[derive(Debug)]
enum PendingEdit {
    NewSystem(Struct),
    System { name: String, edits: Struct },
    Profile { name: String, edits: Struct },
}

#[derive(Debug, Default)]
struct FakeState {
    tokens: BTreeSet<String>,
    next_id: u32,
    profiles: BTreeMap<String, Struct>,
    systems: BTreeMap<String, Struct>,
    handles: BTreeMap<String, PendingEdit>,
    calls: Vec<RecordedCall>,
    faults: Vec<(String, Option<String>)>,
    unreachable: bool,
}

/// In-memory Cobbler API used to exercise sessions without a server.
///
/// Accepts [`FAKE_USERNAME`]/[`FAKE_PASSWORD`], validates tokens on every
/// token-bearing call and applies system and profile edits on save. Clones
/// share state so a test can keep a handle after giving one to
/// [`Cobbler::new`].
#[derive(Clone, Debug, Default)]
pub struct FakeCobbler {
    state: Arc<Mutex<FakeState>>,
}

type Reply = Result<Value, XmlRpcError>;

fn fault(code: i64, message: impl Into<String>) -> XmlRpcError {
    XmlRpcError::Fault {
        code,
        message: message.into(),
    }
}

fn name_list(records: &BTreeMap<String, Struct>) -> Value {
    Value::Array(
        records
            .keys()
            .map(|name| Value::structure([("name", Value::from(name.as_str()))]))
            .collect(),
    )
}

fn param_str<'p>(params: &'p [Value], index: usize) -> Result<&'p str, XmlRpcError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| fault(LOOKUP_FAULT, format!("parameter {index} must be a string")))
}

fn merge_edits(record: &mut Struct, edits: Struct) {
    for (key, value) in edits {
        if key == "modify_interface" {
            if let Value::Struct(interface) = value {
                for (field, setting) in interface {
                    if field == "macaddress-eth0" {
                        record.insert(String::from("mac_address_eth0"), setting.clone());
                    }
                    record.insert(field, setting);
                }
            }
        } else {
            record.insert(key, value);
        }
    }
}

impl FakeCobbler {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        locked(&self.state)
    }

    /// Adds a profile record carrying `comment` and empty kernel options.
    #[must_use]
    pub fn with_profile(self, name: &str, comment: &str) -> Self {
        self.with_profile_record(
            name,
            Struct::from([
                (String::from("comment"), Value::from(comment)),
                (String::from("kernel_options"), Value::from("")),
            ]),
        )
    }

    /// Adds a profile record with explicit fields; `name` is filled in.
    #[must_use]
    pub fn with_profile_record(self, name: &str, mut record: Struct) -> Self {
        record.insert(String::from("name"), Value::from(name));
        self.state().profiles.insert(name.to_owned(), record);
        self
    }

    /// Adds a system record bound to `profile` with the given boot MAC and
    /// comment.
    #[must_use]
    pub fn with_system(self, name: &str, profile: &str, mac: &str, comment: &str) -> Self {
        let record = Struct::from([
            (String::from("name"), Value::from(name)),
            (String::from("profile"), Value::from(profile)),
            (String::from("mac_address_eth0"), Value::from(mac)),
            (String::from("comment"), Value::from(comment)),
        ]);
        self.state().systems.insert(name.to_owned(), record);
        self
    }

    /// Adds a system record with explicit fields; `name` is filled in.
    #[must_use]
    pub fn with_system_record(self, name: &str, mut record: Struct) -> Self {
        record.insert(String::from("name"), Value::from(name));
        self.state().systems.insert(name.to_owned(), record);
        self
    }

    /// Makes every call to `method` answer with a fault.
    pub fn fail_method(&self, method: &str) {
        self.state().faults.push((method.to_owned(), None));
    }

    /// Makes calls to `method` whose first parameter is `argument` answer
    /// with a fault.
    pub fn fail_method_for(&self, method: &str, argument: &str) {
        self.state()
            .faults
            .push((method.to_owned(), Some(argument.to_owned())));
    }

    /// Makes every subsequent call fail at the transport level.
    pub fn go_offline(&self) {
        self.state().unreachable = true;
    }

    /// Returns every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Returns the method names of every call received so far.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .map(|call| call.method.clone())
            .collect()
    }

    /// Returns the calls that change backend state.
    #[must_use]
    pub fn mutating_calls(&self) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| MUTATING_METHODS.contains(&call.method.as_str()))
            .cloned()
            .collect()
    }

    /// Returns the calls made to `method`.
    #[must_use]
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    /// Returns the stored system record `name`.
    #[must_use]
    pub fn system_record(&self, name: &str) -> Option<Struct> {
        self.state().systems.get(name).cloned()
    }

    /// Returns the stored profile record `name`.
    #[must_use]
    pub fn profile_record(&self, name: &str) -> Option<Struct> {
        self.state().profiles.get(name).cloned()
    }

    fn dispatch(&self, method: &str, params: Vec<Value>) -> Reply {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            method: method.to_owned(),
            params: params.clone(),
        });
        if state.unreachable {
            return Err(XmlRpcError::Transport(String::from("connection refused")));
        }
        let first = params.first().and_then(Value::as_str);
        let injected = state.faults.iter().any(|(failing, argument)| {
            failing == method && argument.as_deref().is_none_or(|arg| Some(arg) == first)
        });
        if injected {
            return Err(fault(LOOKUP_FAULT, format!("injected failure in {method}")));
        }
        state.handle(method, params)
    }
}

impl FakeState {
    fn issue(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn check_token(&self, params: &[Value], index: usize) -> Result<(), XmlRpcError> {
        let token = param_str(params, index)?;
        if self.tokens.contains(token) {
            Ok(())
        } else {
            Err(fault(AUTH_FAULT, "invalid token"))
        }
    }

    fn handle(&mut self, method: &str, params: Vec<Value>) -> Reply {
        match method {
            "login" => self.login(&params),
            "sync" => {
                self.check_token(&params, 0)?;
                Ok(Value::Bool(true))
            }
            "get_profiles" => {
                self.check_token(&params, 0)?;
                Ok(name_list(&self.profiles))
            }
            "get_systems" => {
                self.check_token(&params, 0)?;
                Ok(name_list(&self.systems))
            }
            "get_system_as_rendered" => {
                let name = param_str(&params, 0)?;
                lookup(&self.systems, name, "system")
            }
            "get_blended_data" => {
                let name = param_str(&params, 0)?;
                lookup(&self.profiles, name, "profile")
            }
            "new_system" => {
                self.check_token(&params, 0)?;
                let handle = self.issue("system-handle");
                self.handles
                    .insert(handle.clone(), PendingEdit::NewSystem(Struct::new()));
                Ok(Value::String(handle))
            }
            "get_system_handle" => {
                self.check_token(&params, 1)?;
                let name = param_str(&params, 0)?.to_owned();
                lookup(&self.systems, &name, "system")?;
                let handle = self.issue("system-handle");
                self.handles.insert(
                    handle.clone(),
                    PendingEdit::System {
                        name,
                        edits: Struct::new(),
                    },
                );
                Ok(Value::String(handle))
            }
            "get_profile_handle" => {
                self.check_token(&params, 1)?;
                let name = param_str(&params, 0)?.to_owned();
                lookup(&self.profiles, &name, "profile")?;
                let handle = self.issue("profile-handle");
                self.handles.insert(
                    handle.clone(),
                    PendingEdit::Profile {
                        name,
                        edits: Struct::new(),
                    },
                );
                Ok(Value::String(handle))
            }
            "modify_system" | "modify_profile" => self.modify(params),
            "save_system" | "save_profile" => self.save(&params),
            "remove_system" => {
                self.check_token(&params, 1)?;
                let name = param_str(&params, 0)?;
                self.systems
                    .remove(name)
                    .map(|_| Value::Bool(true))
                    .ok_or_else(|| fault(LOOKUP_FAULT, format!("unknown system {name}")))
            }
            "background_power_system" => {
                self.check_token(&params, 1)?;
                Ok(Value::String(self.issue("task")))
            }
            other => Err(fault(LOOKUP_FAULT, format!("unknown remote method {other}"))),
        }
    }

    fn login(&mut self, params: &[Value]) -> Reply {
        let username = param_str(params, 0)?;
        let password = param_str(params, 1)?;
        if username != FAKE_USERNAME || password != FAKE_PASSWORD {
            return Err(fault(AUTH_FAULT, "login failed"));
        }
        let token = self.issue("token");
        self.tokens.insert(token.clone());
        Ok(Value::String(token))
    }

    fn modify(&mut self, params: Vec<Value>) -> Reply {
        self.check_token(&params, 3)?;
        let mut values = params.into_iter();
        let handle = values.next().and_then(|value| value.as_str().map(str::to_owned));
        let key = values.next().and_then(|value| value.as_str().map(str::to_owned));
        let value = values.next();
        let (Some(handle_id), Some(field), Some(setting)) = (handle, key, value) else {
            return Err(fault(LOOKUP_FAULT, "modify expects handle, key and value"));
        };
        let edits = match self.handles.get_mut(&handle_id) {
            Some(
                PendingEdit::NewSystem(edits)
                | PendingEdit::System { edits, .. }
                | PendingEdit::Profile { edits, .. },
            ) => edits,
            None => return Err(fault(LOOKUP_FAULT, format!("unknown handle {handle_id}"))),
        };
        edits.insert(field, setting);
        Ok(Value::Bool(true))
    }

    fn save(&mut self, params: &[Value]) -> Reply {
        self.check_token(params, 1)?;
        let handle = param_str(params, 0)?;
        let pending = self
            .handles
            .remove(handle)
            .ok_or_else(|| fault(LOOKUP_FAULT, format!("unknown handle {handle}")))?;
        match pending {
            PendingEdit::NewSystem(edits) => {
                let name = edits
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| fault(LOOKUP_FAULT, "system needs a name"))?;
                let mut record = Struct::new();
                merge_edits(&mut record, edits);
                self.systems.insert(name, record);
            }
            PendingEdit::System { name, edits } => {
                let record = self.systems.entry(name).or_default();
                merge_edits(record, edits);
            }
            PendingEdit::Profile { name, edits } => {
                let record = self.profiles.entry(name).or_default();
                merge_edits(record, edits);
            }
        }
        Ok(Value::Bool(true))
    }
}

fn lookup(records: &BTreeMap<String, Struct>, name: &str, kind: &str) -> Reply {
    records
        .get(name)
        .cloned()
        .map(Value::Struct)
        .ok_or_else(|| fault(LOOKUP_FAULT, format!("unknown {kind} {name}")))
}

impl Transport for FakeCobbler {
    fn call<'a>(&'a self, method: &'a str, params: Vec<Value>) -> RpcFuture<'a, Value> {
        Box::pin(future::ready(self.dispatch(method, params)))
    }
}

/// Settings matching the credentials [`FakeCobbler`] accepts.
#[must_use]
pub fn fake_settings() -> CobblerSettings {
    CobblerSettings {
        server_url: String::from(FAKE_SERVER_URL),
        credentials: Credentials {
            username: String::from(FAKE_USERNAME),
            password: String::from(FAKE_PASSWORD),
        },
        shell: ShellConfig {
            ssh_bin: String::from("ssh"),
            scp_bin: String::from("scp"),
            target: String::from("root@cobbler.test"),
            batch_mode: true,
        },
        architecture: String::from("x86_64"),
        staging_prefix: String::from("/tmp/igor-cobbler-"),
        close_action: CloseAction::Nothing,
    }
}

/// Wraps the fakes in a shared [`Cobbler`] handle using [`fake_settings`].
#[must_use]
pub fn fake_cobbler(
    backend: &FakeCobbler,
    runner: &ScriptedRunner,
) -> Arc<Cobbler<FakeCobbler, ScriptedRunner>> {
    fake_cobbler_with(fake_settings(), backend, runner)
}

/// Wraps the fakes in a shared [`Cobbler`] handle using `settings`.
#[must_use]
pub fn fake_cobbler_with(
    settings: CobblerSettings,
    backend: &FakeCobbler,
    runner: &ScriptedRunner,
) -> Arc<Cobbler<FakeCobbler, ScriptedRunner>> {
    Arc::new(Cobbler::new(settings, backend.clone(), runner.clone()))
}
