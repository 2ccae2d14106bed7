#![allow(dead_code)]

#[path = "../../../smdr-core/tests/common/mod.rs"]
mod fakes;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use smdr_core::config::{Component, RawInputs};
use smdr_core::firewall::FirewallSynchronizer;
use smdr_core::service::ServiceController;
use smdr_core::settings::InstallLayout;
use smdr_installer::orchestrator::InstallOrchestrator;

pub use fakes::*;

/// 一套隔离的安装环境：临时安装目录 + 模拟服务管理器 + 模拟防火墙。
pub struct Harness {
    pub dir: PathBuf,
    pub layout: InstallLayout,
    pub services: FakeServices,
    pub firewall: FakeFirewall,
    _cleanup: CleanupDir,
}

impl Harness {
    pub fn new(prefix: &str) -> Self {
        let dir = unique_temp_dir(prefix);
        let layout = InstallLayout::in_dir(
            &dir.join("install"),
            &dir.join("ProgramData").join("SMDRReceiver").join("install-state.json"),
        );
        write_file(&layout.executable_path, "smdr service v1");
        Self {
            _cleanup: CleanupDir(dir.clone()),
            dir,
            layout,
            services: FakeServices::new(),
            firewall: FakeFirewall::new(),
        }
    }

    /// 端口始终可用的编排器。
    pub fn orchestrator(&self) -> InstallOrchestrator {
        self.orchestrator_with_probe(|_| true)
    }

    pub fn orchestrator_with_probe(&self, probe: fn(u16) -> bool) -> InstallOrchestrator {
        let services =
            ServiceController::new(self.services.boxed()).with_settle_timeout(Duration::from_millis(200));
        let firewall = FirewallSynchronizer::new(self.firewall.boxed(), self.layout.product_name.clone());
        InstallOrchestrator::new(self.layout.clone(), services, firewall).with_port_probe(probe)
    }

    pub fn service_name(&self) -> &str {
        &self.layout.service_name
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("logs").join("smdr.log")
    }
}

pub fn raw(port: &str, log_path: &Path) -> RawInputs {
    RawInputs {
        port: Some(port.to_string()),
        log_path: Some(log_path.to_string_lossy().into_owned()),
        viewer_port: None,
        service_host: None,
        components: BTreeSet::from([Component::Service, Component::Viewer]),
        auto_start: true,
    }
}
