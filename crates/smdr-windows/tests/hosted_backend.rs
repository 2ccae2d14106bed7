#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use smdr_core::error::{ErrorKind, InstallError};
use smdr_core::service::{ServiceBackend, ServiceDescriptor, StartMode};
use smdr_windows::process::{run_with_timeout, ProcessError};
use smdr_windows::service::HostedServiceBackend;
use uuid::Uuid;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

struct CleanupDir(PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// 写入一个模拟服务程序：记录收到的命令，`start` 以退出码 3 失败。
fn write_fake_service(dir: &Path) -> PathBuf {
    let script = dir.join("smdr_service.sh");
    std::fs::write(
        &script,
        r#"echo "$1" >> calls.log
case "$1" in
  start) echo "port 7004 already bound" >&2; exit 3 ;;
  *) exit 0 ;;
esac
"#,
    )
    .expect("write fake service");
    script
}

fn backend(script: &Path) -> HostedServiceBackend {
    HostedServiceBackend::new(script, Duration::from_secs(10))
        .with_interpreter(Some(PathBuf::from("/bin/sh")))
}

fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn run_with_timeout_reports_exit_code_and_output() {
    let mut cmd = Command::new("/bin/sh");
    cmd.args(["-c", "echo out; echo err >&2; exit 7"]);
    let out = run_with_timeout(cmd, Duration::from_secs(10)).expect("run");
    assert!(!out.success());
    assert_eq!(out.code(), 7);
    assert_eq!(out.stdout.trim(), "out");
    assert_eq!(out.stderr.trim(), "err");
    let summary = out.summary();
    assert!(summary.contains("退出码 7"), "{summary}");
    assert!(summary.contains("err"), "{summary}");
}

#[test]
fn run_with_timeout_kills_a_hung_command() {
    let mut cmd = Command::new("/bin/sh");
    cmd.args(["-c", "exec sleep 30"]);
    let started = Instant::now();
    let err = run_with_timeout(cmd, Duration::from_millis(300)).expect_err("must time out");
    assert!(matches!(err, ProcessError::TimedOut { .. }), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn missing_program_is_a_spawn_error() {
    let cmd = Command::new("/nonexistent/smdr_service.exe");
    let err = run_with_timeout(cmd, Duration::from_secs(1)).expect_err("must fail");
    assert!(matches!(err, ProcessError::Spawn { .. }), "{err}");
}

#[test]
fn hosted_commands_run_next_to_the_executable() {
    let dir = unique_temp_dir("smdr-windows-hosted");
    let _cleanup = CleanupDir(dir.clone());
    let script = write_fake_service(&dir);
    let mut backend = backend(&script);

    let descriptor = ServiceDescriptor {
        name: "SMDRReceiverTest".to_string(),
        display_name: "SMDR Receiver Test".to_string(),
        description: "test".to_string(),
        executable_path: script.clone(),
        start_mode: StartMode::Auto,
    };
    backend.install(&descriptor).expect("install");
    backend.stop("SMDRReceiverTest").expect("stop");
    backend.remove("SMDRReceiverTest").expect("remove");

    assert_eq!(calls(&dir), vec!["install", "stop", "remove"]);
}

#[test]
fn failed_start_carries_a_debug_hint() {
    let dir = unique_temp_dir("smdr-windows-hosted");
    let _cleanup = CleanupDir(dir.clone());
    let script = write_fake_service(&dir);
    let mut backend = backend(&script);

    let err = backend.start("SMDRReceiverTest").expect_err("start must fail");
    assert_eq!(err.kind(), ErrorKind::ServiceStart);
    match &err {
        InstallError::ServiceStart {
            message,
            remediation,
            ..
        } => {
            assert!(message.contains("退出码 3"), "{message}");
            assert!(message.contains("already bound"), "{message}");
            assert!(remediation.contains("debug"), "{remediation}");
            assert!(remediation.contains("smdr_service.sh"), "{remediation}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unreachable_executable_is_a_service_control_error() {
    let mut backend = HostedServiceBackend::new("/nonexistent/smdr_service.exe", Duration::from_secs(1));
    let err = backend.stop("SMDRReceiverTest").expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::ServiceControl);
}

#[test]
fn query_is_unsupported_without_a_service_manager() {
    let backend = HostedServiceBackend::new("/nonexistent/smdr_service.exe", Duration::from_secs(1));
    let err = backend.query("SMDRReceiverTest").expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::ServiceControl);
}
