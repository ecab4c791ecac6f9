//! Unit tests for the Cobbler session layer.

use super::*;
use crate::test_support::{FakeCobbler, ScriptedRunner, fake_cobbler, fake_cobbler_with, fake_settings};
use crate::xmlrpc::Struct;
use rstest::rstest;

fn options(pairs: &[(&str, Value)]) -> Value {
    Value::structure(pairs.iter().cloned())
}

#[rstest]
#[case(Value::from("  console=ttyS0 quiet "), "console=ttyS0 quiet")]
#[case(options(&[("quiet", Value::from(""))]), "quiet")]
#[case(options(&[("console", Value::from("ttyS0"))]), "console=ttyS0")]
#[case(options(&[("nosmp", Value::Nil), ("loglevel", Value::Int(7))]), "loglevel=7 nosmp")]
#[case(
    options(&[("console", Value::Array(vec![Value::from("tty0"), Value::from("ttyS0")]))]),
    "console=tty0 console=ttyS0"
)]
#[case(Value::Int(3), "")]
fn renders_kernel_options(#[case] raw: Value, #[case] expected: &str) {
    assert_eq!(render_kernel_options(&raw), expected);
}

#[rstest]
fn names_from_rejects_entries_without_name() {
    let reply = Value::Array(vec![Value::structure([("comment", Value::from("x"))])]);
    let err = types::names_from("get_systems", &reply).expect_err("missing name");
    assert!(matches!(err, ProvisionError::MalformedRecord { ref method, .. } if method == "get_systems"));
}

#[rstest]
fn credentials_debug_redacts_password() {
    let rendered = format!("{:?}", fake_settings().credentials);
    assert!(rendered.contains("cobbler"), "rendered: {rendered}");
    assert!(!rendered.contains(crate::test_support::FAKE_PASSWORD), "rendered: {rendered}");
}

#[rstest]
fn staging_dir_appends_profile_name() {
    let cobbler = fake_cobbler(&FakeCobbler::new(), &ScriptedRunner::new());
    assert_eq!(cobbler.staging_dir("lab"), "/tmp/igor-cobbler-lab");
}

#[tokio::test]
async fn open_rejects_bad_credentials() {
    let mut settings = fake_settings();
    settings.credentials.password = String::from("wrong");
    let backend = FakeCobbler::new();
    let cobbler = fake_cobbler_with(settings, &backend, &ScriptedRunner::new());

    let err = cobbler.open().await.err().expect("login should fail");

    assert!(
        matches!(err, ProvisionError::Authentication { ref server_url, .. } if server_url == crate::test_support::FAKE_SERVER_URL),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn open_reports_unreachable_backend_as_remote_call() {
    let backend = FakeCobbler::new();
    backend.go_offline();
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());

    let err = cobbler.open().await.err().expect("login should fail");

    assert!(
        matches!(err, ProvisionError::RemoteCall { ref method, .. } if method == "login"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn listings_return_record_names() {
    let backend = FakeCobbler::new()
        .with_profile("lab", OWNERSHIP_MARKER)
        .with_profile("centos", "")
        .with_system("igor-01", "lab", "aa:bb", "");
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");

    let profiles = session.profiles().await.expect("profiles");
    let systems = session.systems().await.expect("systems");

    assert_eq!(profiles, vec![String::from("centos"), String::from("lab")]);
    assert_eq!(systems, vec![String::from("igor-01")]);
    let listing = backend.calls_to("get_profiles");
    let call = listing.first().expect("get_profiles call");
    assert_eq!(call.params.get(1), Some(&Value::Int(1)));
    assert_eq!(call.params.get(2), Some(&Value::Int(1000)));
}

#[tokio::test]
async fn assign_defaults_writes_every_field_then_saves() {
    let backend = FakeCobbler::new().with_profile("lab", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");
    let binding = SystemBinding {
        name: String::from("igor-01"),
        mac: String::from("aa:bb:cc:dd:ee:ff"),
        profile: String::from("lab"),
        kernel_options: String::from("quiet"),
    };

    let handle = session.new_system().await.expect("handle");
    session
        .assign_defaults(&handle, &binding)
        .await
        .expect("assign defaults");

    let keys: Vec<String> = backend
        .calls_to("modify_system")
        .iter()
        .filter_map(|call| call.params.get(1).and_then(Value::as_str).map(str::to_owned))
        .collect();
    assert_eq!(
        keys,
        [
            "name",
            "mac",
            "profile",
            "comment",
            "status",
            "kernel_options",
            "kernel_options_post",
            "modify_interface"
        ]
    );
    assert_eq!(backend.methods().last().map(String::as_str), Some("save_system"));
    let record: Struct = backend.system_record("igor-01").expect("system saved");
    assert_eq!(text_field(&record, "comment"), Some(OWNERSHIP_MARKER));
    assert_eq!(text_field(&record, "status"), Some("testing"));
    assert_eq!(text_field(&record, "macaddress-eth0"), Some("aa:bb:cc:dd:ee:ff"));
}

#[tokio::test]
async fn set_netboot_enable_sends_integer_flag() {
    let backend = FakeCobbler::new().with_system("igor-01", "lab", "", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");

    session
        .set_netboot_enable("igor-01", false)
        .await
        .expect("netboot");

    let record = backend.system_record("igor-01").expect("system");
    assert_eq!(record.get("netboot-enabled"), Some(&Value::Int(0)));
}

#[tokio::test]
async fn power_system_sends_single_element_system_list() {
    let backend = FakeCobbler::new();
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");

    session
        .power_system("igor-01", PowerAction::Reboot)
        .await
        .expect("power");

    let calls = backend.calls_to("background_power_system");
    let call = calls.first().expect("power call");
    let request = call
        .params
        .first()
        .and_then(Value::as_struct)
        .expect("options struct");
    assert_eq!(text_field(request, "power"), Some("reboot"));
    assert_eq!(
        request.get("systems"),
        Some(&Value::Array(vec![Value::from("igor-01")]))
    );
}

#[tokio::test]
async fn close_with_nothing_makes_no_calls() {
    let backend = FakeCobbler::new();
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");

    let value = session.close(Ok(7)).await.expect("close");

    assert_eq!(value, 7);
    assert_eq!(backend.methods(), vec![String::from("login")]);
}

#[tokio::test]
async fn close_with_sync_runs_sync() {
    let mut settings = fake_settings();
    settings.close_action = CloseAction::Sync;
    let backend = FakeCobbler::new();
    let cobbler = fake_cobbler_with(settings, &backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");

    session.close(Ok(())).await.expect("close");

    assert_eq!(backend.methods(), vec![String::from("login"), String::from("sync")]);
}

#[tokio::test]
async fn close_skips_sync_after_failed_work() {
    let mut settings = fake_settings();
    settings.close_action = CloseAction::Sync;
    let backend = FakeCobbler::new();
    let cobbler = fake_cobbler_with(settings, &backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");
    let primary = ProvisionError::UnknownProfile {
        name: String::from("ghost"),
    };

    let err = session
        .close::<()>(Err(primary.clone()))
        .await
        .expect_err("error preserved");

    assert_eq!(err, primary);
    assert_eq!(backend.methods(), vec![String::from("login")]);
}

#[tokio::test]
async fn close_reports_failure_after_successful_work() {
    let mut settings = fake_settings();
    settings.close_action = CloseAction::Sync;
    let backend = FakeCobbler::new();
    backend.fail_method("sync");
    let cobbler = fake_cobbler_with(settings, &backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");

    let err = session.close(Ok(())).await.expect_err("close failure");

    assert!(matches!(err, ProvisionError::RemoteCall { ref method, .. } if method == "sync"));
}

#[tokio::test]
async fn lookup_fault_is_reported_as_remote_call() {
    let backend = FakeCobbler::new();
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let session = cobbler.open().await.expect("session");

    let err = session.system("absent").await.expect_err("lookup fails");

    assert!(matches!(err, ProvisionError::RemoteCall { ref method, .. } if method == "get_system_as_rendered"));
}

#[rstest]
#[case(Value::Bool(false), Some(false))]
#[case(Value::Int(1), Some(true))]
#[case(Value::from("True"), Some(true))]
#[case(Value::from("0"), Some(false))]
#[case(Value::from("sometimes"), None)]
fn snapshot_reads_netboot_flag_forms(#[case] raw: Value, #[case] expected: Option<bool>) {
    let record = Struct::from([(String::from("netboot_enabled"), raw)]);
    assert_eq!(SystemSnapshot::capture(&record).netboot_enabled, expected);
}

#[rstest]
fn snapshot_restores_every_overwritten_field() {
    let record = Struct::from([
        (String::from("profile"), Value::from("production")),
        (String::from("comment"), Value::from("owned by ops")),
        (String::from("status"), Value::from("production")),
        (
            String::from("kernel_options"),
            Value::structure([("console", Value::from("tty0"))]),
        ),
        (String::from("mac_address_eth0"), Value::from("11:22:33:44:55:66")),
        (String::from("netboot_enabled"), Value::Bool(false)),
    ]);

    let fields = SystemSnapshot::capture(&record).restore_fields();

    assert_eq!(
        fields,
        vec![
            ("profile", Value::from("production")),
            ("comment", Value::from("owned by ops")),
            ("kernel_options", Value::from("console=tty0")),
            ("kernel_options_post", Value::from("")),
            ("status", Value::from("production")),
            (
                "modify_interface",
                Value::structure([("macaddress-eth0", Value::from("11:22:33:44:55:66"))]),
            ),
            ("netboot-enabled", Value::Int(0)),
        ]
    );
}

#[rstest]
fn snapshot_of_sparse_record_skips_unknown_fields() {
    let record = Struct::from([(String::from("profile"), Value::from("production"))]);

    let fields = SystemSnapshot::capture(&record).restore_fields();

    let keys: Vec<&str> = fields.iter().map(|(key, _)| *key).collect();
    assert_eq!(keys, ["profile", "comment", "kernel_options", "kernel_options_post"]);
}
