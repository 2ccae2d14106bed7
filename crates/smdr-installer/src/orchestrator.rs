//! 安装编排（InstallOrchestrator）。
//!
//! 职责：
//! - 将采集到的配置依次交给配置写入、服务控制与防火墙同步步骤
//! - 安装：按顺序执行各步骤的 `execute`；致命错误终止本次运行，已完成步骤不回滚
//! - 卸载：按安装状态中记录的步骤，逆序执行 `compensate`
//! - 升级：仅删除服务注册（保留文件）→ 替换文件 → 全新安装
//! - 每次运行结束后落盘 `install-state.json`，供下次运行（重配置/卸载）使用
//!
//! 权限要求：
//! - 调用方负责在执行前完成管理员权限检查
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::path::Path;

use serde::Serialize;
use smdr_core::artifact::{self, ConfigArtifact};
use smdr_core::config::{self, Component, InstallationConfig, RawInputs, DEFAULT_PORT};
use smdr_core::error::InstallError;
use smdr_core::firewall::FirewallSynchronizer;
use smdr_core::net;
use smdr_core::result::{InstallationResult, StepId};
use smdr_core::service::{ServiceController, ServiceState, StartMode};
use smdr_core::settings::InstallLayout;
use smdr_core::state::InstallState;
use tracing::{error, info, warn};

use crate::steps::{
    service_descriptor, ConfigureAutoStart, EnsureFirewallRule, InstallService, PortProbe,
    RestartService, StartService, Step, StepContext, WriteConfigArtifact,
};

/// 卸载时是否删除配置文件与日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDeletion {
    /// 保留（默认）。
    Keep,
    /// 删除；调用方必须已取得操作员的二次确认。
    Delete,
}

/// `status` 命令输出。
#[derive(Debug, Clone, Serialize)]
pub struct InstallStatus {
    pub service_name: String,
    pub service_state: Option<ServiceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_error: Option<String>,
    pub executable_present: bool,
    pub artifact: Option<ConfigArtifact>,
    pub firewall_rules: Vec<String>,
    pub completed_steps: Vec<StepId>,
}

pub struct InstallOrchestrator {
    layout: InstallLayout,
    services: ServiceController,
    firewall: FirewallSynchronizer,
    port_probe: PortProbe,
}

impl InstallOrchestrator {
    pub fn new(layout: InstallLayout, services: ServiceController, firewall: FirewallSynchronizer) -> Self {
        Self {
            layout,
            services,
            firewall,
            port_probe: net::port_is_available,
        }
    }

    /// 替换启动前的端口探测。
    pub fn with_port_probe(mut self, probe: PortProbe) -> Self {
        self.port_probe = probe;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// 安装。
    ///
    /// 主要步骤：
    /// 1) 选择了服务时检查托管可执行文件存在（在任何系统修改之前）
    /// 2) 采集并校验配置（会创建日志目录）
    /// 3) 写入配置文件
    /// 4) 选择了服务：注册服务 → 设置启动方式 → 启动 → 同步防火墙规则
    pub fn install(&mut self, raw: &RawInputs) -> InstallationResult {
        info!("开始安装: {}", self.layout.product_name);
        let mut result = InstallationResult::new();
        if !self.check_prerequisites(raw.components.contains(&Component::Service), &mut result) {
            return result;
        }
        let Some(config) = collect_config(raw, &mut result) else {
            return result;
        };
        self.run_install(&config, result)
    }

    /// 重新配置：写入配置文件 → 重启服务 → 同步防火墙规则（删除旧端口的规则）。
    pub fn reconfigure(&mut self, raw: &RawInputs) -> InstallationResult {
        info!("开始重新配置: {}", self.layout.product_name);
        let mut result = InstallationResult::new();
        if !self.check_prerequisites(raw.components.contains(&Component::Service), &mut result) {
            return result;
        }
        let Some(config) = collect_config(raw, &mut result) else {
            return result;
        };

        let mut steps: Vec<Box<dyn Step>> = vec![Box::new(WriteConfigArtifact {
            config: config.clone(),
        })];
        if config.service_selected() {
            steps.push(Box::new(RestartService {
                service: self.layout.service_name.clone(),
                port: config.port,
            }));
            steps.push(Box::new(EnsureFirewallRule { port: config.port }));
        }

        let mut state = self.load_state();
        self.run_steps(&steps, &mut state, &mut result);
        self.persist_state(&mut state, &mut result);
        result
    }

    /// 重启服务（配置不变）。
    pub fn restart(&mut self) -> InstallationResult {
        let mut result = InstallationResult::new();
        let mut state = self.load_state();
        let port = self.configured_port(&state);
        let name = state
            .service_name
            .clone()
            .unwrap_or_else(|| self.layout.service_name.clone());
        let steps: Vec<Box<dyn Step>> = vec![Box::new(RestartService { service: name, port })];
        self.run_steps(&steps, &mut state, &mut result);
        self.persist_state(&mut state, &mut result);
        result
    }

    /// 卸载。
    ///
    /// 主要步骤：
    /// 1) 读取安装状态；缺失时视为所有步骤都可能执行过（各补偿操作幂等）
    /// 2) 逆序补偿：删除防火墙规则 → 停止服务 → 删除服务
    ///    （托管可执行文件不存在时跳过服务相关补偿）
    /// 3) 仅在 [`DataDeletion::Delete`] 时删除配置文件与日志
    /// 4) 所有修改均已撤销时删除安装状态文件；否则保留，供下次重试
    pub fn uninstall(&mut self, data: DataDeletion) -> InstallationResult {
        info!("开始卸载: {}", self.layout.product_name);
        let mut result = InstallationResult::new();
        let existing = self.read_artifact();

        let (mut state, from_ledger) = match InstallState::load(&self.layout.state_file) {
            Ok(Some(state)) => (state, true),
            Ok(None) => (self.assumed_state(existing.as_ref()), false),
            Err(e) => {
                warn!("安装状态文件无法读取，按全部步骤执行卸载: {e}");
                (self.assumed_state(existing.as_ref()), false)
            }
        };

        let port = self.configured_port(&state);
        let name = state
            .service_name
            .clone()
            .unwrap_or_else(|| self.layout.service_name.clone());
        let mut descriptor = service_descriptor(&self.layout, StartMode::Auto);
        descriptor.name = name.clone();

        let executable_present = self.layout.executable_path.exists();
        if !executable_present {
            warn!(
                "托管可执行文件不存在，跳过服务停止与删除: {}",
                self.layout.executable_path.display()
            );
        }
        let plan: Vec<Box<dyn Step>> = vec![
            Box::new(InstallService { descriptor }),
            Box::new(StartService {
                service: name,
                port,
            }),
            Box::new(EnsureFirewallRule { port }),
        ];
        let steps: Vec<Box<dyn Step>> = plan
            .into_iter()
            .filter(|step| !from_ledger || state.has_step(step.id()))
            .filter(|step| executable_present || step.id() == StepId::EnsureFirewallRule)
            .collect();

        let completed = self.compensate_steps(&steps, &mut state, &mut result);
        if completed && data == DataDeletion::Delete {
            self.delete_data(&state, existing.as_ref(), &mut result);
        }

        let leftover = !state.firewall_rules.is_empty()
            || state.has_step(StepId::InstallService)
            || state.has_step(StepId::StartService);
        if result.success && !leftover {
            if let Err(e) = InstallState::remove(&self.layout.state_file) {
                error!("删除安装状态文件失败: {e}");
                result.fail(StepId::PersistState, &e);
            }
        } else {
            if leftover {
                warn!("部分系统修改未撤销，保留安装状态文件以便重试");
            }
            self.persist_state(&mut state, &mut result);
        }
        result
    }

    /// 升级：删除服务注册（保留文件与配置）→ 用新版本文件覆盖安装目录 → 全新安装。
    ///
    /// 参数：
    /// - `raw`：安装参数（通常以已有配置文件为默认值）
    /// - `payload`：新版本文件目录（结构与安装目录一致）
    pub fn upgrade(&mut self, raw: &RawInputs, payload: &Path) -> InstallationResult {
        info!("开始升级: {} <- {}", self.layout.product_name, payload.display());
        let mut result = InstallationResult::new();
        if !payload.is_dir() {
            let e = InstallError::PrerequisiteMissing {
                path: payload.to_path_buf(),
            };
            error!("{e}");
            result.fail(StepId::CheckPrerequisites, &e);
            return result;
        }
        result.complete(StepId::CheckPrerequisites);
        let Some(config) = collect_config(raw, &mut result) else {
            return result;
        };

        let mut state = self.load_state();
        let name = state
            .service_name
            .clone()
            .unwrap_or_else(|| self.layout.service_name.clone());
        match self.services.remove(&name) {
            Ok(()) => {
                for step in [StepId::InstallService, StepId::ConfigureAutoStart, StepId::StartService] {
                    state.forget_step(step);
                }
                state.service_name = None;
                result.complete(StepId::RemoveService);
            }
            Err(e) => {
                error!("删除旧服务失败: {e}");
                result.fail(StepId::RemoveService, &e);
                self.persist_state(&mut state, &mut result);
                return result;
            }
        }

        match copy_recursively(payload, &self.layout.install_dir) {
            Ok(()) => {
                info!("已替换安装文件: {}", self.layout.install_dir.display());
                result.complete(StepId::ReplaceFiles);
            }
            Err(e) => {
                error!("替换安装文件失败: {e}");
                result.fail(StepId::ReplaceFiles, &e);
                self.persist_state(&mut state, &mut result);
                return result;
            }
        }

        let steps = self.install_plan(&config);
        self.run_steps(&steps, &mut state, &mut result);
        self.persist_state(&mut state, &mut result);
        result
    }

    /// 查询当前安装状态（只读）。
    pub fn status(&self) -> InstallStatus {
        let state = InstallState::load(&self.layout.state_file).ok().flatten();
        let service_name = state
            .as_ref()
            .and_then(|s| s.service_name.clone())
            .unwrap_or_else(|| self.layout.service_name.clone());
        let (service_state, service_error) = match self.services.state(&service_name) {
            Ok(s) => (Some(s), None),
            Err(e) => (None, Some(e.to_string())),
        };
        InstallStatus {
            service_name,
            service_state,
            service_error,
            executable_present: self.layout.executable_path.exists(),
            artifact: self.read_artifact(),
            firewall_rules: state.as_ref().map(|s| s.firewall_rules.clone()).unwrap_or_default(),
            completed_steps: state.map(|s| s.completed_steps).unwrap_or_default(),
        }
    }

    fn run_install(&mut self, config: &InstallationConfig, mut result: InstallationResult) -> InstallationResult {
        let steps = self.install_plan(config);
        let mut state = self.load_state();
        state.install_dir = Some(self.layout.install_dir.to_string_lossy().into_owned());
        self.run_steps(&steps, &mut state, &mut result);
        self.persist_state(&mut state, &mut result);
        if result.success {
            info!("安装完成");
        }
        result
    }

    fn install_plan(&self, config: &InstallationConfig) -> Vec<Box<dyn Step>> {
        let mut steps: Vec<Box<dyn Step>> = vec![Box::new(WriteConfigArtifact {
            config: config.clone(),
        })];
        if config.service_selected() {
            let mode = StartMode::from_auto_start(config.auto_start);
            let name = self.layout.service_name.clone();
            steps.push(Box::new(InstallService {
                descriptor: service_descriptor(&self.layout, mode),
            }));
            steps.push(Box::new(ConfigureAutoStart {
                service: name.clone(),
                mode,
            }));
            steps.push(Box::new(StartService {
                service: name,
                port: config.port,
            }));
            steps.push(Box::new(EnsureFirewallRule { port: config.port }));
        }
        steps
    }

    fn check_prerequisites(&self, service_selected: bool, result: &mut InstallationResult) -> bool {
        if service_selected && !self.layout.executable_path.exists() {
            let e = InstallError::PrerequisiteMissing {
                path: self.layout.executable_path.clone(),
            };
            error!("{e}");
            result.fail(StepId::CheckPrerequisites, &e);
            return false;
        }
        result.complete(StepId::CheckPrerequisites);
        true
    }

    fn context<'a>(&'a mut self, state: &'a mut InstallState) -> StepContext<'a> {
        StepContext {
            layout: &self.layout,
            services: &mut self.services,
            firewall: &mut self.firewall,
            state,
            port_probe: self.port_probe,
        }
    }

    /// 顺序执行步骤；返回 `false` 表示被致命错误终止。
    fn run_steps(
        &mut self,
        steps: &[Box<dyn Step>],
        state: &mut InstallState,
        result: &mut InstallationResult,
    ) -> bool {
        for step in steps {
            let id = step.id();
            info!("执行步骤: {id}");
            let outcome = step.execute(&mut self.context(state));
            match outcome {
                Ok(()) => {
                    state.record_step(id);
                    result.complete(id);
                }
                Err(e) if !e.is_fatal() => {
                    warn!("步骤 {id} 未完成，安装继续: {e}");
                    state.record_step(id);
                    result.warn(id, &e);
                }
                Err(e) => {
                    error!("步骤 {id} 失败，终止后续步骤: {e}");
                    result.fail(id, &e);
                    return false;
                }
            }
        }
        true
    }

    /// 逆序执行补偿；返回 `false` 表示被致命错误终止。
    fn compensate_steps(
        &mut self,
        steps: &[Box<dyn Step>],
        state: &mut InstallState,
        result: &mut InstallationResult,
    ) -> bool {
        for step in steps.iter().rev() {
            let Some(id) = step.compensation() else {
                continue;
            };
            info!("执行步骤: {id}");
            let outcome = step.compensate(&mut self.context(state));
            match outcome {
                Ok(()) => {
                    state.forget_step(step.id());
                    result.complete(id);
                }
                Err(e) if !e.is_fatal() => {
                    warn!("步骤 {id} 未完成，卸载继续: {e}");
                    result.warn(id, &e);
                }
                Err(e) => {
                    error!("步骤 {id} 失败，终止后续步骤: {e}");
                    result.fail(id, &e);
                    return false;
                }
            }
        }
        true
    }

    /// 删除配置文件与日志文件（不存在视为已删除）。
    fn delete_data(&self, state: &InstallState, existing: Option<&ConfigArtifact>, result: &mut InstallationResult) {
        let mut targets = vec![self.layout.artifact_path.clone()];
        match (state.log_path.as_deref(), existing) {
            (Some(log), _) => targets.push(log.into()),
            (None, Some(artifact)) => targets.push(artifact.log_file.clone().into()),
            (None, None) => {}
        }
        for path in targets {
            match std::fs::remove_file(&path) {
                Ok(()) => info!("已删除: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    let e = InstallError::io(path, e);
                    error!("删除数据失败: {e}");
                    result.fail(StepId::DeleteData, &e);
                    return;
                }
            }
        }
        result.complete(StepId::DeleteData);
    }

    /// 读取安装状态；缺失或无法读取时按已有配置文件重建。
    fn load_state(&self) -> InstallState {
        match InstallState::load(&self.layout.state_file) {
            Ok(Some(state)) => state,
            Ok(None) => self.recovered_state(),
            Err(e) => {
                warn!("安装状态文件无法读取，按已有配置文件重建: {e}");
                self.recovered_state()
            }
        }
    }

    /// 没有安装状态时，已有配置文件中的端口可能已经开放了防火墙规则；
    /// 将其加入跟踪，端口变更时旧规则才会被删除。
    fn recovered_state(&self) -> InstallState {
        let mut state = InstallState::new(&self.layout.product_name);
        if let Some(existing) = self.read_artifact() {
            let rule = self.firewall.rule_for_port(existing.port);
            info!("未找到安装状态，按配置文件跟踪防火墙规则: {}", rule.name);
            state.configured_port = Some(existing.port);
            state.firewall_rules = vec![rule.name];
        }
        state
    }

    /// 没有安装状态时，按配置文件推断可能存在的防火墙规则。
    fn assumed_state(&self, existing: Option<&ConfigArtifact>) -> InstallState {
        let mut state = InstallState::new(&self.layout.product_name);
        let port = existing.map(|a| a.port).unwrap_or(DEFAULT_PORT);
        state.configured_port = Some(port);
        state.firewall_rules = vec![self.firewall.rule_for_port(port).name];
        state
    }

    fn persist_state(&self, state: &mut InstallState, result: &mut InstallationResult) {
        if let Err(e) = state.save(&self.layout.state_file) {
            error!("写入安装状态失败: {e}");
            result.fail(StepId::PersistState, &e);
        }
    }

    fn read_artifact(&self) -> Option<ConfigArtifact> {
        artifact::read_artifact(&self.layout.artifact_path).ok()
    }

    fn configured_port(&self, state: &InstallState) -> u16 {
        state
            .configured_port
            .or_else(|| self.read_artifact().map(|a| a.port))
            .unwrap_or(DEFAULT_PORT)
    }
}

/// 采集配置并记录结果。
fn collect_config(raw: &RawInputs, result: &mut InstallationResult) -> Option<InstallationConfig> {
    match config::collect(raw) {
        Ok(config) => {
            result.complete(StepId::CollectConfig);
            Some(config)
        }
        Err(e) => {
            let e = InstallError::from(e);
            error!("{e}");
            result.fail(StepId::CollectConfig, &e);
            None
        }
    }
}

/// 递归复制目录（覆盖同名文件）。
fn copy_recursively(src: &Path, dst: &Path) -> Result<(), InstallError> {
    if src.is_file() {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
        }
        std::fs::copy(src, dst).map_err(|e| InstallError::io(dst, e))?;
        return Ok(());
    }

    std::fs::create_dir_all(dst).map_err(|e| InstallError::io(dst, e))?;
    for entry in std::fs::read_dir(src).map_err(|e| InstallError::io(src, e))? {
        let entry = entry.map_err(|e| InstallError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| InstallError::io(&from, e))?;
        if file_type.is_dir() {
            copy_recursively(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| InstallError::io(&to, e))?;
        }
    }
    Ok(())
}
