//! 托管可执行文件形态的服务后端。
//!
//! 命令约定（由被托管的服务程序实现）：
//! - `install` / `start` / `stop` / `remove`：服务注册与生命周期控制
//! - `debug`：前台诊断模式（输出到控制台，不经服务宿主）
//! - 退出码 0 表示成功，非 0 表示失败；不根据输出文本推断成败
//!
//! 状态查询：
//! - Windows：通过 `windows-service` 查询服务管理器（SCM）
//! - 启动方式：通过 `sc config` 持久化
//!
//! 权限要求：
//! - 注册/删除/启停服务通常需要管理员权限
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use smdr_core::error::InstallError;
use smdr_core::service::{ServiceBackend, ServiceDescriptor, ServiceState, StartMode};
use tracing::info;

use crate::process::{self, CommandOutput};

/// 通过被托管程序自身的命令行完成服务注册与启停。
#[derive(Debug, Clone)]
pub struct HostedServiceBackend {
    executable: PathBuf,
    interpreter: Option<PathBuf>,
    timeout: Duration,
}

impl HostedServiceBackend {
    /// 创建后端。
    ///
    /// 参数：
    /// - `executable`：被托管的服务程序
    /// - `timeout`：单条命令的最长等待时间
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            interpreter: None,
            timeout,
        }
    }

    /// 通过解释器运行服务程序（例如 `python smdr_service.py install`）。
    pub fn with_interpreter(mut self, interpreter: Option<PathBuf>) -> Self {
        self.interpreter = interpreter;
        self
    }

    fn command(&self, action: &str) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.executable);
                cmd
            }
            None => Command::new(&self.executable),
        };
        if let Some(dir) = self.executable.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }
        cmd.arg(action);
        cmd
    }

    /// 执行一条托管命令。
    ///
    /// 异常处理：
    /// - 启动失败/超时：返回 `ServiceControl`
    fn run(&self, service: &str, action: &'static str) -> Result<CommandOutput, InstallError> {
        process::run_with_timeout(self.command(action), self.timeout)
            .map_err(|e| InstallError::service_control(service, action, e.to_string()))
    }

    /// 执行托管命令并要求退出码为 0。
    fn run_checked(&self, service: &str, action: &'static str) -> Result<(), InstallError> {
        let out = self.run(service, action)?;
        if out.success() {
            return Ok(());
        }
        Err(InstallError::service_control(service, action, out.summary()))
    }

    fn display_command(&self) -> String {
        match &self.interpreter {
            Some(interpreter) => format!(
                "\"{}\" \"{}\"",
                interpreter.display(),
                self.executable.display()
            ),
            None => format!("\"{}\"", self.executable.display()),
        }
    }
}

impl ServiceBackend for HostedServiceBackend {
    fn query(&self, name: &str) -> Result<ServiceState, InstallError> {
        query_service_state(name)
    }

    fn install(&mut self, descriptor: &ServiceDescriptor) -> Result<(), InstallError> {
        info!("注册服务: {} -> {}", descriptor.name, descriptor.executable_path.display());
        self.run_checked(&descriptor.name, "install")
    }

    fn set_start_mode(&mut self, name: &str, mode: StartMode) -> Result<(), InstallError> {
        let start = match mode {
            StartMode::Auto => "auto",
            StartMode::Manual => "demand",
        };
        let mut cmd = Command::new("sc");
        cmd.args(["config", name, "start=", start]);
        let out = process::run_with_timeout(cmd, self.timeout)
            .map_err(|e| InstallError::service_control(name, "configure", e.to_string()))?;
        if out.success() {
            return Ok(());
        }
        Err(InstallError::service_control(name, "configure", out.summary()))
    }

    fn start(&mut self, name: &str) -> Result<(), InstallError> {
        let out = self.run(name, "start")?;
        if out.success() {
            return Ok(());
        }
        Err(InstallError::ServiceStart {
            service: name.to_string(),
            message: out.summary(),
            remediation: self.diagnostic_hint(name),
        })
    }

    fn stop(&mut self, name: &str) -> Result<(), InstallError> {
        self.run_checked(name, "stop")
    }

    fn remove(&mut self, name: &str) -> Result<(), InstallError> {
        self.run_checked(name, "remove")
    }

    fn diagnostic_hint(&self, name: &str) -> String {
        format!(
            "请在管理员控制台中运行 {} debug，以前台模式查看服务 {name} 的输出（常见原因：配置文件缺失或端口已被占用）",
            self.display_command()
        )
    }
}

/// 查询服务管理器中的服务状态。
///
/// 返回值：
/// - 服务不存在（1060 = ERROR_SERVICE_DOES_NOT_EXIST）：`Absent`
/// - 启动/停止/暂停进行中：`Pending`
#[cfg(windows)]
pub fn query_service_state(name: &str) -> Result<ServiceState, InstallError> {
    use windows_service::service::{ServiceAccess, ServiceState as ScmState};
    use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

    let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
        .map_err(|e| InstallError::service_control(name, "query", format!("打开 ServiceManager 失败: {e}")))?;
    let service = match manager.open_service(name, ServiceAccess::QUERY_STATUS) {
        Ok(service) => service,
        Err(windows_service::Error::Winapi(e)) if e.raw_os_error() == Some(1060) => {
            return Ok(ServiceState::Absent);
        }
        Err(e) => {
            return Err(InstallError::service_control(name, "query", format!("打开服务失败: {e}")));
        }
    };
    let status = service
        .query_status()
        .map_err(|e| InstallError::service_control(name, "query", format!("查询服务状态失败: {e}")))?;
    Ok(match status.current_state {
        ScmState::Stopped => ServiceState::Stopped,
        ScmState::Running | ScmState::Paused => ServiceState::Running,
        ScmState::StartPending
        | ScmState::StopPending
        | ScmState::ContinuePending
        | ScmState::PausePending => ServiceState::Pending,
    })
}

/// 非 Windows 平台没有服务管理器，查询直接报错。
#[cfg(not(windows))]
pub fn query_service_state(name: &str) -> Result<ServiceState, InstallError> {
    Err(InstallError::service_control(
        name,
        "query",
        "当前平台不支持 Windows 服务管理器",
    ))
}
