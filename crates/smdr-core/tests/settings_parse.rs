mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{unique_temp_dir, write_file, CleanupDir};
use smdr_core::settings::InstallerSettings;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

#[test]
fn parse_shipped_installer_settings_json() {
    let path = repo_root().join("installer-settings.json");
    let settings = InstallerSettings::load(&path)
        .unwrap_or_else(|e| panic!("load {} failed: {e:#}", path.display()));

    assert_eq!(settings.service_name, "SMDRReceiver");
    assert_eq!(settings.executable_name, "smdr_service.exe");
    assert_eq!(settings.artifact_file_name, "smdr_config.json");
    assert!(settings.install_dir.is_none());
    assert_eq!(settings.timeouts.command_secs, 30);
}

#[test]
fn partial_settings_fall_back_to_defaults() {
    let dir = unique_temp_dir("smdr-core-settings");
    let _cleanup = CleanupDir(dir.clone());
    let path = dir.join("settings.json");
    write_file(&path, r#"{ "service_name": "SMDRReceiverTest", "timeouts": { "settle_secs": 3 } }"#);

    let settings = InstallerSettings::load(&path).expect("load");
    assert_eq!(settings.service_name, "SMDRReceiverTest");
    assert_eq!(settings.display_name, "SMDR Receiver Service");
    assert_eq!(settings.timeouts.command_secs, 30);
    assert_eq!(settings.timeouts.settle_secs, 3);
}

#[test]
fn resolve_places_artifact_beside_executable() {
    let dir = unique_temp_dir("smdr-core-settings");
    let _cleanup = CleanupDir(dir.clone());
    let settings = InstallerSettings {
        install_dir: Some("install".to_string()),
        state_file: Some("state/install-state.json".to_string()),
        ..InstallerSettings::default()
    };

    let layout = settings.resolve(&dir).expect("resolve");
    let install_dir = dir.join("install");
    assert_eq!(layout.install_dir, install_dir);
    assert_eq!(layout.executable_path, install_dir.join("smdr_service.exe"));
    assert_eq!(layout.artifact_path, install_dir.join("smdr_config.json"));
    assert_eq!(layout.default_log_path, install_dir.join("smdr.log"));
    assert_eq!(layout.state_file, dir.join("state").join("install-state.json"));
    assert_eq!(layout.command_timeout, Duration::from_secs(30));
    assert_eq!(layout.artifact_path.parent(), layout.executable_path.parent());
}

#[test]
fn load_reports_missing_file() {
    let err = InstallerSettings::load(Path::new("definitely-missing-settings.json")).unwrap_err();
    assert!(format!("{err:#}").contains("definitely-missing-settings.json"));
}
