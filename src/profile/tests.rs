//! Unit tests for profile binding and image lifecycle.

use std::sync::Arc;

use camino::Utf8Path;
use rstest::rstest;

use super::*;
use crate::cobbler::{OWNERSHIP_MARKER, text_field};
use crate::error::ProvisionError;
use crate::host::Host;
use crate::cobbler::CloseAction;
use crate::test_support::{FakeCobbler, ScriptedRunner, fake_cobbler, fake_cobbler_with, fake_settings};
use crate::xmlrpc::{Struct, Value};

type TestCobbler = Arc<Cobbler<FakeCobbler, ScriptedRunner>>;

fn profile(name: &str, cobbler: &TestCobbler) -> Profile<FakeCobbler, ScriptedRunner> {
    Profile::new(name, None, "CobblerProfilesOrigin(test)", Arc::clone(cobbler))
}

fn host(fqdn: &str, cobbler: &TestCobbler) -> Host<FakeCobbler, ScriptedRunner> {
    Host::new(fqdn, "aa:bb:cc:dd:ee:ff", "CobblerHostsOrigin(test)", Arc::clone(cobbler))
}

#[rstest]
#[case("console=ttyS0", None, "", "console=ttyS0")]
#[case("", None, "debug", "debug")]
#[case("quiet", Some("igor.cookie={igor_cookie}"), "", "quiet igor.cookie=c00k1e")]
#[case(" quiet ", Some(" "), " rd.shell ", "quiet rd.shell")]
#[case("a={igor_cookie}", None, "b={igor_cookie}", "a=c00k1e b=c00k1e")]
fn composes_kernel_options(
    #[case] base: &str,
    #[case] extra: Option<&str>,
    #[case] additional: &str,
    #[case] expected: &str,
) {
    assert_eq!(
        compose_kernel_options(base, extra, additional, "c00k1e"),
        expected
    );
}

#[tokio::test]
async fn fresh_host_is_created_then_removed() {
    let backend = FakeCobbler::new().with_profile("lab", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let mut subject = profile("lab", &cobbler);
    let target = host("igor-01.lab.example.org", &cobbler);

    subject
        .assign_to(&target, "debug", "c00k1e")
        .await
        .expect("assign");

    assert_eq!(subject.provenance(), Some(&SystemProvenance::Created));
    assert!(!subject.system_pre_existed());
    assert_eq!(subject.previous_profile_name(), None);
    let record: Struct = backend
        .system_record("igor-01.lab.example.org")
        .expect("system created");
    assert_eq!(text_field(&record, "profile"), Some("lab"));
    assert_eq!(text_field(&record, "comment"), Some(OWNERSHIP_MARKER));
    assert_eq!(text_field(&record, "kernel_options"), Some("debug"));
    assert_eq!(record.get("netboot-enabled"), Some(&Value::Int(1)));

    subject.revoke_from(&target).await.expect("revoke");

    assert_eq!(backend.system_record("igor-01.lab.example.org"), None);
}

#[tokio::test]
async fn existing_host_is_restored_to_previous_profile() {
    let backend = FakeCobbler::new()
        .with_profile("lab", OWNERSHIP_MARKER)
        .with_profile("production", "")
        .with_system("node7", "production", "11:22:33:44:55:66", "");
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let mut subject = profile("lab", &cobbler);
    let target = host("node7", &cobbler);

    subject.assign_to(&target, "", "c00k1e").await.expect("assign");

    assert!(subject.system_pre_existed());
    assert_eq!(subject.previous_profile_name(), Some("production"));
    assert_eq!(backend.calls_to("new_system"), Vec::new());

    subject.revoke_from(&target).await.expect("revoke");

    let record = backend.system_record("node7").expect("system kept");
    assert_eq!(text_field(&record, "profile"), Some("production"));
    assert_eq!(backend.calls_to("remove_system"), Vec::new());
}

fn foreign_system() -> Struct {
    Struct::from([
        (String::from("profile"), Value::from("production")),
        (String::from("comment"), Value::from("owned by ops")),
        (String::from("status"), Value::from("production")),
        (String::from("kernel_options"), Value::from("console=tty0")),
        (String::from("mac_address_eth0"), Value::from("11:22:33:44:55:66")),
        (String::from("netboot_enabled"), Value::Bool(false)),
    ])
}

#[tokio::test]
async fn restored_system_loses_the_ownership_marker() {
    let backend = FakeCobbler::new()
        .with_profile("lab", OWNERSHIP_MARKER)
        .with_system_record("node7", foreign_system());
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let target = host("node7", &cobbler);
    let mut subject = profile("lab", &cobbler);

    subject.assign_to(&target, "debug", "c00k1e").await.expect("assign");
    let bound = backend.system_record("node7").expect("bound");
    assert_eq!(text_field(&bound, "comment"), Some(OWNERSHIP_MARKER));

    subject.revoke_from(&target).await.expect("revoke");

    let restored = backend.system_record("node7").expect("system kept");
    assert_eq!(text_field(&restored, "profile"), Some("production"));
    assert_eq!(text_field(&restored, "comment"), Some("owned by ops"));
    assert_eq!(text_field(&restored, "status"), Some("production"));
    assert_eq!(text_field(&restored, "kernel_options"), Some("console=tty0"));
    assert_eq!(restored.get("netboot-enabled"), Some(&Value::Int(0)));
}

#[tokio::test]
async fn later_profile_cannot_remove_a_restored_foreign_system() {
    let backend = FakeCobbler::new()
        .with_profile("lab", OWNERSHIP_MARKER)
        .with_system_record("node7", foreign_system());
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let target = host("node7", &cobbler);
    let mut first = profile("lab", &cobbler);
    first.assign_to(&target, "", "c00k1e").await.expect("assign");
    first.revoke_from(&target).await.expect("revoke");

    let err = profile("lab", &cobbler)
        .revoke_from(&target)
        .await
        .expect_err("unowned system");

    assert!(matches!(err, ProvisionError::NotOwned { ref kind, .. } if kind == "system"));
    assert!(backend.system_record("node7").is_some());
    assert_eq!(backend.calls_to("remove_system"), Vec::new());
}

#[tokio::test]
async fn unknown_profile_skips_sync_on_close() {
    let settings = crate::cobbler::CobblerSettings {
        close_action: CloseAction::Sync,
        ..fake_settings()
    };
    let backend = FakeCobbler::new().with_profile("lab", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler_with(settings, &backend, &ScriptedRunner::new());
    let mut subject = profile("ghost", &cobbler);

    let err = subject
        .assign_to(&host("igor-01", &cobbler), "", "c00k1e")
        .await
        .expect_err("unknown profile");

    assert!(matches!(err, ProvisionError::UnknownProfile { .. }));
    assert_eq!(backend.mutating_calls(), Vec::new());
}

#[tokio::test]
async fn rebinding_keeps_first_captured_provenance() {
    let backend = FakeCobbler::new()
        .with_profile("lab", OWNERSHIP_MARKER)
        .with_system("node7", "production", "", "");
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let mut subject = profile("lab", &cobbler);
    let target = host("node7", &cobbler);

    subject.assign_to(&target, "", "one").await.expect("first assign");
    subject.assign_to(&target, "", "two").await.expect("second assign");

    assert_eq!(subject.previous_profile_name(), Some("production"));
}

#[tokio::test]
async fn unknown_profile_performs_no_mutation() {
    let backend = FakeCobbler::new().with_profile("lab", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let mut subject = profile("ghost", &cobbler);
    let target = host("igor-01", &cobbler);

    let err = subject
        .assign_to(&target, "", "c00k1e")
        .await
        .expect_err("unknown profile");

    assert_eq!(
        err,
        ProvisionError::UnknownProfile {
            name: String::from("ghost")
        }
    );
    assert_eq!(backend.mutating_calls(), Vec::new());
    assert_eq!(subject.provenance(), None);
}

#[tokio::test]
async fn revoke_without_record_is_a_no_op() {
    let backend = FakeCobbler::new().with_profile("lab", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let subject = profile("lab", &cobbler);

    subject
        .revoke_from(&host("igor-01", &cobbler))
        .await
        .expect("revoke");

    assert_eq!(backend.mutating_calls(), Vec::new());
}

#[rstest]
#[case(OWNERSHIP_MARKER, true)]
#[case("hand made", false)]
#[tokio::test]
async fn revoke_of_unknown_provenance_respects_marker(#[case] comment: &str, #[case] removed: bool) {
    let backend = FakeCobbler::new().with_system("igor-01", "lab", "", comment);
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let subject = profile("lab", &cobbler);

    let result = subject.revoke_from(&host("igor-01", &cobbler)).await;

    assert_eq!(result.is_ok(), removed);
    assert_eq!(backend.system_record("igor-01").is_none(), removed);
    if !removed {
        assert!(matches!(result, Err(ProvisionError::NotOwned { ref kind, .. }) if kind == "system"));
    }
}

#[tokio::test]
async fn kernel_options_replaces_then_reads_back() {
    let backend = FakeCobbler::new().with_profile("lab", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let subject = profile("lab", &cobbler);

    let options = subject
        .kernel_options(Some("console=ttyS0"))
        .await
        .expect("kernel options");

    assert_eq!(options, "console=ttyS0");
    assert_eq!(backend.calls_to("save_profile").len(), 1);
}

#[tokio::test]
async fn enable_pxe_toggles_netboot() {
    let backend = FakeCobbler::new().with_system("igor-01", "lab", "", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler(&backend, &ScriptedRunner::new());
    let subject = profile("lab", &cobbler);

    subject
        .enable_pxe(&host("igor-01", &cobbler), false)
        .await
        .expect("pxe");

    let record = backend.system_record("igor-01").expect("system");
    assert_eq!(record.get("netboot-enabled"), Some(&Value::Int(0)));
}

#[rstest]
fn populate_stages_files_and_registers_records() {
    let runner = ScriptedRunner::new();
    runner.push_successes(3);
    let cobbler = fake_cobbler(&FakeCobbler::new(), &runner);
    let subject = profile("lab", &cobbler);

    subject
        .populate_with(
            Utf8Path::new("/srv/images/vmlinuz"),
            Utf8Path::new("/srv/images/initrd.img"),
            Utf8Path::new("kargs.txt"),
        )
        .expect("populate");

    let commands: Vec<String> = runner
        .invocations()
        .iter()
        .map(|call| call.command_string())
        .collect();
    assert_eq!(
        commands.first().map(String::as_str),
        Some("ssh -o BatchMode=yes root@cobbler.test mkdir -p /tmp/igor-cobbler-lab")
    );
    assert_eq!(
        commands.get(1).map(String::as_str),
        Some(
            "scp -o BatchMode=yes /srv/images/vmlinuz /srv/images/initrd.img kargs.txt \
             root@cobbler.test:/tmp/igor-cobbler-lab/"
        )
    );
    let script = commands.get(2).expect("cobbler script");
    assert!(script.contains("cobbler distro add --name=lab-distro --kernel=/tmp/igor-cobbler-lab/vmlinuz"));
    assert!(script.contains("--initrd=/tmp/igor-cobbler-lab/initrd.img --arch=x86_64"));
    assert!(script.contains("cobbler profile add --name=lab --distro=lab-distro"));
    assert!(script.contains("--kopts=\"$(cat /tmp/igor-cobbler-lab/kargs.txt)\""));
    assert_eq!(script.matches("--comment=managed-by-igor").count(), 2);
}

#[rstest]
fn populate_rejects_artifact_without_file_name() {
    let runner = ScriptedRunner::new();
    let cobbler = fake_cobbler(&FakeCobbler::new(), &runner);
    let subject = profile("lab", &cobbler);

    let err = subject
        .populate_with(Utf8Path::new("/"), Utf8Path::new("initrd"), Utf8Path::new("kargs"))
        .expect_err("invalid artifact");

    assert!(matches!(err, ProvisionError::InvalidArtifact { .. }));
    assert!(runner.invocations().is_empty());
}

#[rstest]
fn populate_propagates_command_failure() {
    let runner = ScriptedRunner::new();
    runner.push_successes(2);
    runner.push_failure(1);
    let cobbler = fake_cobbler(&FakeCobbler::new(), &runner);
    let subject = profile("lab", &cobbler);

    let err = subject
        .populate_with(
            Utf8Path::new("vmlinuz"),
            Utf8Path::new("initrd"),
            Utf8Path::new("kargs"),
        )
        .expect_err("script fails");

    assert!(matches!(err, ProvisionError::Command(_)));
}

#[tokio::test]
async fn delete_refuses_unowned_profile() {
    let runner = ScriptedRunner::new();
    let backend = FakeCobbler::new().with_profile("centos", "installed by hand");
    let cobbler = fake_cobbler(&backend, &runner);

    let err = profile("centos", &cobbler)
        .delete()
        .await
        .expect_err("not owned");

    assert_eq!(
        err,
        ProvisionError::NotOwned {
            kind: String::from("profile"),
            name: String::from("centos"),
        }
    );
    assert!(runner.invocations().is_empty());
    assert_eq!(backend.mutating_calls(), Vec::new());
}

#[tokio::test]
async fn delete_removes_owned_profile() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let backend = FakeCobbler::new().with_profile("lab", OWNERSHIP_MARKER);
    let cobbler = fake_cobbler(&backend, &runner);

    profile("lab", &cobbler).delete().await.expect("delete");

    let invocations = runner.invocations();
    let script = invocations
        .first()
        .and_then(|call| call.args.last())
        .map(|arg| arg.to_string_lossy().into_owned())
        .expect("removal script");
    assert_eq!(
        script,
        "cobbler profile remove --name=lab && cobbler distro remove --name=lab-distro && \
         rm -f /tmp/igor-cobbler-lab/* && rmdir /tmp/igor-cobbler-lab"
    );
}
