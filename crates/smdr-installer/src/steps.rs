//! 安装步骤（有序、幂等、可补偿）。
//!
//! 约定：
//! - `execute` 可重复执行：目标状态已满足时直接成功
//! - `compensate` 撤销该步骤造成的系统修改，卸载时按安装顺序的逆序执行
//! - 步骤所需的数据（配置、服务描述、端口）在构造时显式传入，不依赖共享的全局变量
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use smdr_core::artifact;
use smdr_core::config::InstallationConfig;
use smdr_core::error::InstallError;
use smdr_core::firewall::FirewallSynchronizer;
use smdr_core::result::StepId;
use smdr_core::service::{ServiceController, ServiceDescriptor, ServiceState, StartMode};
use smdr_core::settings::InstallLayout;
use smdr_core::state::InstallState;
use tracing::info;

/// 端口探测函数：返回 `true` 表示端口当前可被监听。
pub type PortProbe = fn(u16) -> bool;

/// 步骤执行上下文。
pub struct StepContext<'a> {
    pub layout: &'a InstallLayout,
    pub services: &'a mut ServiceController,
    pub firewall: &'a mut FirewallSynchronizer,
    pub state: &'a mut InstallState,
    pub port_probe: PortProbe,
}

impl StepContext<'_> {
    /// 启动前检查端口占用。
    fn ensure_port_free(&self, port: u16) -> Result<(), InstallError> {
        if (self.port_probe)(port) {
            return Ok(());
        }
        Err(InstallError::PortInUse { port })
    }
}

/// 单个安装步骤。
pub trait Step {
    fn id(&self) -> StepId;

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError>;

    /// 卸载时对应的步骤标识；`None` 表示该步骤没有需要撤销的系统修改。
    fn compensation(&self) -> Option<StepId> {
        None
    }

    fn compensate(&self, _ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        Ok(())
    }
}

/// 按安装布局生成服务描述。
pub fn service_descriptor(layout: &InstallLayout, mode: StartMode) -> ServiceDescriptor {
    ServiceDescriptor {
        name: layout.service_name.clone(),
        display_name: layout.display_name.clone(),
        description: layout.description.clone(),
        executable_path: layout.executable_path.clone(),
        start_mode: mode,
    }
}

/// 写入配置文件。
///
/// 配置文件不在补偿中删除：日志与配置可能包含需要保留的历史记录，删除由单独确认的步骤完成。
pub struct WriteConfigArtifact {
    pub config: InstallationConfig,
}

impl Step for WriteConfigArtifact {
    fn id(&self) -> StepId {
        StepId::WriteArtifact
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        artifact::write_artifact(&self.config, &ctx.layout.artifact_path)?;
        ctx.state.artifact_path = Some(ctx.layout.artifact_path.to_string_lossy().into_owned());
        ctx.state.log_path = Some(self.config.log_path.to_string_lossy().into_owned());
        Ok(())
    }
}

/// 注册服务（已存在时先拆除再注册）。
pub struct InstallService {
    pub descriptor: ServiceDescriptor,
}

impl Step for InstallService {
    fn id(&self) -> StepId {
        StepId::InstallService
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        ctx.services.install(&self.descriptor)?;
        ctx.state.service_name = Some(self.descriptor.name.clone());
        Ok(())
    }

    fn compensation(&self) -> Option<StepId> {
        Some(StepId::RemoveService)
    }

    fn compensate(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        ctx.services.remove(&self.descriptor.name)?;
        ctx.state.service_name = None;
        Ok(())
    }
}

/// 持久化服务启动方式。
pub struct ConfigureAutoStart {
    pub service: String,
    pub mode: StartMode,
}

impl Step for ConfigureAutoStart {
    fn id(&self) -> StepId {
        StepId::ConfigureAutoStart
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        ctx.services.configure_auto_start(&self.service, self.mode)
    }
}

/// 启动服务。
///
/// 服务未运行时先探测端口；端口被其他进程占用时直接返回 `PortInUse`，不调用启动命令。
pub struct StartService {
    pub service: String,
    pub port: u16,
}

impl Step for StartService {
    fn id(&self) -> StepId {
        StepId::StartService
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        if ctx.services.state(&self.service)? != ServiceState::Running {
            ctx.ensure_port_free(self.port)?;
        }
        ctx.services.start(&self.service)
    }

    fn compensation(&self) -> Option<StepId> {
        Some(StepId::StopService)
    }

    fn compensate(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        ctx.services.stop(&self.service)
    }
}

/// 重启服务，使新的配置文件生效。
pub struct RestartService {
    pub service: String,
    pub port: u16,
}

impl Step for RestartService {
    fn id(&self) -> StepId {
        StepId::RestartService
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        ctx.services.stop(&self.service)?;
        ctx.ensure_port_free(self.port)?;
        ctx.services.start(&self.service)?;
        // 重启成功说明服务已注册并运行，卸载时需要停止并删除
        ctx.state.service_name = Some(self.service.clone());
        ctx.state.record_step(StepId::InstallService);
        ctx.state.record_step(StepId::StartService);
        Ok(())
    }
}

/// 将防火墙入站规则同步到当前端口（删除旧端口的规则）。
pub struct EnsureFirewallRule {
    pub port: u16,
}

impl Step for EnsureFirewallRule {
    fn id(&self) -> StepId {
        StepId::EnsureFirewallRule
    }

    fn execute(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        ctx.state.configured_port = Some(self.port);
        let rule = ctx.firewall.sync_port(&mut ctx.state.firewall_rules, self.port)?;
        info!("防火墙规则已同步: {}", rule.name);
        Ok(())
    }

    fn compensation(&self) -> Option<StepId> {
        Some(StepId::RemoveFirewallRule)
    }

    fn compensate(&self, ctx: &mut StepContext<'_>) -> Result<(), InstallError> {
        ctx.firewall.remove_tracked(&mut ctx.state.firewall_rules)
    }
}
