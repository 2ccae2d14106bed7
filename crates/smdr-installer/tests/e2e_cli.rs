use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use smdr_core::artifact::read_artifact;
use smdr_core::result::{InstallationResult, StepId};
use uuid::Uuid;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_file(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().expect("parent"))
        .unwrap_or_else(|e| panic!("create parent for {} failed: {e}", path.display()));
    std::fs::write(path, content).unwrap_or_else(|e| panic!("write {} failed: {e}", path.display()));
}

/// 以无人值守模式运行安装程序（跳过管理员检查，ProgramData 指向沙箱）。
fn run_installer(root: &Path, args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_smdr-installer");
    Command::new(exe)
        .env("SMDR_TEST_ALLOW_NON_ADMIN", "1")
        .env("ProgramData", root.join("ProgramData"))
        .arg("--install-dir")
        .arg(root.join("InstallRoot"))
        .arg("--silent")
        .args(args)
        .output()
        .expect("run smdr-installer")
}

fn describe(out: &Output) -> String {
    format!(
        "code={:?}\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

fn parse_result(out: &Output) -> InstallationResult {
    serde_json::from_slice(&out.stdout)
        .unwrap_or_else(|e| panic!("stdout is not an installation result: {e}\n{}", describe(out)))
}

#[test]
fn e2e_viewer_only_install_then_uninstall_in_sandbox() {
    let root = unique_temp_dir("smdr-installer-e2e");
    let _cleanup = CleanupDir(root.clone());
    let install_root = root.join("InstallRoot");
    let state_file = root
        .join("ProgramData")
        .join("SMDRReceiver")
        .join("install-state.json");

    let install_out = run_installer(
        &root,
        &["install", "--components", "viewer", "--viewer-port", "7010", "--host", "smdr-host"],
    );
    assert!(install_out.status.success(), "install failed\n{}", describe(&install_out));

    let result = parse_result(&install_out);
    assert!(result.success);
    assert!(result.has_completed(StepId::WriteArtifact));
    assert!(!result.has_completed(StepId::InstallService));

    let artifact = read_artifact(&install_root.join("smdr_config.json")).expect("artifact");
    assert_eq!(artifact.viewer_port, Some(7010));
    assert_eq!(artifact.service_host.as_deref(), Some("smdr-host"));
    assert!(state_file.exists(), "expected state file: {}", state_file.display());

    let uninstall_out = run_installer(&root, &["uninstall"]);
    assert!(uninstall_out.status.success(), "uninstall failed\n{}", describe(&uninstall_out));
    assert!(parse_result(&uninstall_out).success);
    assert!(install_root.join("smdr_config.json").exists(), "artifact should be kept");
    assert!(!state_file.exists(), "state file should be removed");
}

#[test]
fn e2e_invalid_port_exits_with_failure_and_writes_nothing() {
    let root = unique_temp_dir("smdr-installer-e2e");
    let _cleanup = CleanupDir(root.clone());
    let install_root = root.join("InstallRoot");
    write_file(&install_root.join("smdr_service.exe"), "smdr service v1");

    let out = run_installer(&root, &["install", "--port", "70000"]);

    assert_eq!(out.status.code(), Some(1), "{}", describe(&out));
    let result = parse_result(&out);
    assert!(!result.success);
    assert_eq!(result.errors[0].step, StepId::CollectConfig);
    assert!(!install_root.join("smdr_config.json").exists());
}

#[test]
fn e2e_missing_executable_exits_with_failure() {
    let root = unique_temp_dir("smdr-installer-e2e");
    let _cleanup = CleanupDir(root.clone());

    let out = run_installer(&root, &["install", "--port", "7004"]);

    assert_eq!(out.status.code(), Some(1), "{}", describe(&out));
    let result = parse_result(&out);
    assert_eq!(result.errors[0].step, StepId::CheckPrerequisites);
    assert!(!root.join("InstallRoot").join("smdr_config.json").exists());
}

#[test]
fn e2e_very_silent_prints_no_result() {
    let root = unique_temp_dir("smdr-installer-e2e");
    let _cleanup = CleanupDir(root.clone());

    let out = run_installer(&root, &["--very-silent", "install", "--port", "7004"]);

    assert_eq!(out.status.code(), Some(1), "{}", describe(&out));
    assert!(out.stdout.is_empty(), "{}", describe(&out));
}

#[test]
fn e2e_doctor_reports_layout() {
    let root = unique_temp_dir("smdr-installer-e2e");
    let _cleanup = CleanupDir(root.clone());

    let out = run_installer(&root, &["doctor"]);

    assert!(out.status.success(), "{}", describe(&out));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("install_dir = "), "{stdout}");
    assert!(stdout.contains("present = false"), "{stdout}");
}

struct CleanupDir(PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
