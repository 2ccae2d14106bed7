#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use smdr_core::error::InstallError;
use smdr_core::firewall::{FirewallBackend, FirewallRule};
use smdr_core::service::{ServiceBackend, ServiceDescriptor, ServiceState, StartMode};
use uuid::Uuid;

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn write_file(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().expect("parent"))
        .unwrap_or_else(|e| panic!("create parent for {} failed: {e}", path.display()));
    std::fs::write(path, content).unwrap_or_else(|e| panic!("write {} failed: {e}", path.display()));
}

pub struct CleanupDir(pub PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[derive(Debug, Clone)]
pub struct FakeService {
    pub state: ServiceState,
    pub start_mode: StartMode,
    pub executable: PathBuf,
}

/// 模拟服务管理器：与真实 SCM 一样严格（重复安装、停止未运行的服务都会报错）。
#[derive(Debug, Default)]
pub struct ServiceWorld {
    pub services: BTreeMap<String, FakeService>,
    pub calls: Vec<String>,
    /// 启动命令返回成功但进程立即退出。
    pub exit_on_start: bool,
    /// 启动命令本身失败。
    pub fail_start_command: bool,
}

#[derive(Clone, Default)]
pub struct FakeServices(pub Rc<RefCell<ServiceWorld>>);

impl FakeServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, name: &str) -> ServiceState {
        self.0
            .borrow()
            .services
            .get(name)
            .map(|s| s.state)
            .unwrap_or(ServiceState::Absent)
    }

    pub fn start_mode(&self, name: &str) -> Option<StartMode> {
        self.0.borrow().services.get(name).map(|s| s.start_mode)
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().calls.clone()
    }

    pub fn set_state(&self, name: &str, state: ServiceState) {
        let mut world = self.0.borrow_mut();
        world.services.insert(
            name.to_string(),
            FakeService {
                state,
                start_mode: StartMode::Manual,
                executable: PathBuf::new(),
            },
        );
    }

    pub fn boxed(&self) -> Box<dyn ServiceBackend> {
        Box::new(self.clone())
    }
}

impl ServiceBackend for FakeServices {
    fn query(&self, name: &str) -> Result<ServiceState, InstallError> {
        Ok(self.state(name))
    }

    fn install(&mut self, descriptor: &ServiceDescriptor) -> Result<(), InstallError> {
        let mut world = self.0.borrow_mut();
        world.calls.push(format!("install {}", descriptor.name));
        if world.services.contains_key(&descriptor.name) {
            return Err(InstallError::service_control(&descriptor.name, "install", "服务已存在 (1073)"));
        }
        world.services.insert(
            descriptor.name.clone(),
            FakeService {
                state: ServiceState::Stopped,
                start_mode: descriptor.start_mode,
                executable: descriptor.executable_path.clone(),
            },
        );
        Ok(())
    }

    fn set_start_mode(&mut self, name: &str, mode: StartMode) -> Result<(), InstallError> {
        let mut world = self.0.borrow_mut();
        world.calls.push(format!("config {name} {mode:?}"));
        match world.services.get_mut(name) {
            Some(s) => {
                s.start_mode = mode;
                Ok(())
            }
            None => Err(InstallError::service_control(name, "configure", "服务不存在 (1060)")),
        }
    }

    fn start(&mut self, name: &str) -> Result<(), InstallError> {
        let mut world = self.0.borrow_mut();
        world.calls.push(format!("start {name}"));
        if world.fail_start_command {
            return Err(InstallError::ServiceStart {
                service: name.to_string(),
                message: "退出码 1".to_string(),
                remediation: "debug".to_string(),
            });
        }
        let exit_on_start = world.exit_on_start;
        match world.services.get_mut(name) {
            Some(s) if s.state == ServiceState::Stopped => {
                if !exit_on_start {
                    s.state = ServiceState::Running;
                }
                Ok(())
            }
            Some(_) => Err(InstallError::service_control(name, "start", "服务已在运行 (1056)")),
            None => Err(InstallError::service_control(name, "start", "服务不存在 (1060)")),
        }
    }

    fn stop(&mut self, name: &str) -> Result<(), InstallError> {
        let mut world = self.0.borrow_mut();
        world.calls.push(format!("stop {name}"));
        match world.services.get_mut(name) {
            Some(s) if s.state == ServiceState::Running => {
                s.state = ServiceState::Stopped;
                Ok(())
            }
            Some(_) => Err(InstallError::service_control(name, "stop", "服务未启动 (1062)")),
            None => Err(InstallError::service_control(name, "stop", "服务不存在 (1060)")),
        }
    }

    fn remove(&mut self, name: &str) -> Result<(), InstallError> {
        let mut world = self.0.borrow_mut();
        world.calls.push(format!("remove {name}"));
        match world.services.get(name).map(|s| s.state) {
            Some(ServiceState::Stopped) => {
                world.services.remove(name);
                Ok(())
            }
            Some(_) => Err(InstallError::service_control(name, "remove", "服务仍在运行")),
            None => Err(InstallError::service_control(name, "remove", "服务不存在 (1060)")),
        }
    }

    fn diagnostic_hint(&self, name: &str) -> String {
        format!("run {name} debug")
    }
}

/// 模拟防火墙：与 `netsh` 一样，重复添加会产生重复规则。
#[derive(Debug, Default)]
pub struct FirewallWorld {
    pub rules: Vec<FirewallRule>,
    pub fail_add: bool,
    pub fail_delete: bool,
}

#[derive(Clone, Default)]
pub struct FakeFirewall(pub Rc<RefCell<FirewallWorld>>);

impl FakeFirewall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.0.borrow().rules.iter().map(|r| r.name.clone()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.0.borrow().rules.iter().filter(|r| r.name == name).count()
    }

    pub fn boxed(&self) -> Box<dyn FirewallBackend> {
        Box::new(self.clone())
    }
}

impl FirewallBackend for FakeFirewall {
    fn rule_exists(&self, name: &str) -> Result<bool, InstallError> {
        Ok(self.count(name) > 0)
    }

    fn add_rule(&mut self, rule: &FirewallRule) -> Result<(), InstallError> {
        let mut world = self.0.borrow_mut();
        if world.fail_add {
            return Err(InstallError::Firewall {
                rule: rule.name.clone(),
                message: "拒绝访问".to_string(),
            });
        }
        world.rules.push(rule.clone());
        Ok(())
    }

    fn delete_rule(&mut self, name: &str) -> Result<(), InstallError> {
        let mut world = self.0.borrow_mut();
        if world.fail_delete {
            return Err(InstallError::Firewall {
                rule: name.to_string(),
                message: "拒绝访问".to_string(),
            });
        }
        world.rules.retain(|r| r.name != name);
        Ok(())
    }
}
