//! 服务生命周期状态机（ServiceController）。
//!
//! 状态模型（每个服务名一份）：
//! - `Absent` → `Stopped`（install）→ `Running`（start）
//! - `Running` → `Stopped`（stop）→ `Absent`（remove）
//!
//! 约定：
//! - 所有操作可安全重试：目标状态已满足时直接返回成功
//! - 服务管理器拒绝在已有注册上重复安装，因此 install 总是先拆除已有服务再安装
//! - 启动/停止之后按有界时间轮询状态；等待超时视为致命的 `ServiceControl` 错误
//! - 具体平台交互通过 [`ServiceBackend`] 注入（Windows 实现见 `smdr-windows`）
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::InstallError;

/// 服务启动方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartMode {
    Manual,
    Auto,
}

impl StartMode {
    pub fn from_auto_start(auto_start: bool) -> Self {
        if auto_start {
            StartMode::Auto
        } else {
            StartMode::Manual
        }
    }
}

/// 服务描述。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// 服务名（本机唯一）。
    pub name: String,
    /// 显示名。
    pub display_name: String,
    /// 描述。
    pub description: String,
    /// 被托管的可执行文件路径（安装前必须存在）。
    pub executable_path: PathBuf,
    /// 启动方式。
    pub start_mode: StartMode,
}

/// 服务当前状态。
///
/// `Pending` 只会出现在查询结果中（启动/停止进行中），不作为目标状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Absent,
    Stopped,
    Running,
    Pending,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Absent => "absent",
            ServiceState::Stopped => "stopped",
            ServiceState::Running => "running",
            ServiceState::Pending => "pending",
        };
        f.write_str(s)
    }
}

/// 平台服务管理能力。
///
/// 实现要求：
/// - 每个方法都必须根据子进程/系统调用的完成状态判断成败，不能只看有无异常
/// - 状态转换方法不需要幂等，幂等性由 [`ServiceController`] 保证
pub trait ServiceBackend {
    /// 查询服务状态。
    fn query(&self, name: &str) -> Result<ServiceState, InstallError>;
    /// 注册服务（调用前服务必须不存在）。
    fn install(&mut self, descriptor: &ServiceDescriptor) -> Result<(), InstallError>;
    /// 持久化启动方式。
    fn set_start_mode(&mut self, name: &str, mode: StartMode) -> Result<(), InstallError>;
    /// 启动已停止的服务。
    fn start(&mut self, name: &str) -> Result<(), InstallError>;
    /// 停止运行中的服务。
    fn stop(&mut self, name: &str) -> Result<(), InstallError>;
    /// 删除已停止的服务。
    fn remove(&mut self, name: &str) -> Result<(), InstallError>;

    /// 服务启动后立即退出时给操作员的排障建议。
    fn diagnostic_hint(&self, name: &str) -> String {
        format!("请检查服务 {name} 的配置文件与端口占用情况")
    }
}

/// 幂等的服务生命周期控制器。
pub struct ServiceController {
    backend: Box<dyn ServiceBackend>,
    settle_timeout: Duration,
    poll_interval: Duration,
}

impl ServiceController {
    pub fn new(backend: Box<dyn ServiceBackend>) -> Self {
        Self {
            backend,
            settle_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }

    /// 设置启动/停止后等待状态稳定的最长时间。
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// 查询服务状态（等待进行中的启动/停止结束，最长 `settle_timeout`）。
    pub fn state(&self, name: &str) -> Result<ServiceState, InstallError> {
        let deadline = Instant::now() + self.settle_timeout;
        loop {
            let state = self.backend.query(name)?;
            if state != ServiceState::Pending || Instant::now() >= deadline {
                return Ok(state);
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// 安装服务：已存在（任意状态）时先停止并删除，再重新注册。
    ///
    /// 结果：
    /// - 服务处于 `Stopped`
    ///
    /// 异常处理：
    /// - 可执行文件不存在：返回 `PrerequisiteMissing`，不做任何修改
    /// - 拆除或注册失败：返回 `ServiceControl`
    pub fn install(&mut self, descriptor: &ServiceDescriptor) -> Result<(), InstallError> {
        if !descriptor.executable_path.exists() {
            return Err(InstallError::PrerequisiteMissing {
                path: descriptor.executable_path.clone(),
            });
        }
        if self.state(&descriptor.name)? != ServiceState::Absent {
            info!("检测到已存在的服务，先停止并删除: {}", descriptor.name);
            self.remove(&descriptor.name)?;
        }
        self.register(descriptor)
    }

    /// 持久化启动方式（不改变运行状态）。
    pub fn configure_auto_start(&mut self, name: &str, mode: StartMode) -> Result<(), InstallError> {
        if self.state(name)? == ServiceState::Absent {
            return Err(InstallError::service_control(name, "configure", "服务未安装"));
        }
        self.backend.set_start_mode(name, mode)?;
        info!("已设置服务启动方式: {name} -> {mode:?}");
        Ok(())
    }

    /// 启动服务。
    ///
    /// 异常处理：
    /// - 服务未安装：`ServiceControl`
    /// - 启动后进程立即退出：`ServiceStart`，附带排障建议
    /// - 启动状态在超时时间内未稳定：`ServiceControl`
    pub fn start(&mut self, name: &str) -> Result<(), InstallError> {
        match self.state(name)? {
            ServiceState::Running => {
                debug!("服务已在运行，跳过启动: {name}");
                return Ok(());
            }
            ServiceState::Absent => {
                return Err(InstallError::service_control(name, "start", "服务未安装"));
            }
            ServiceState::Stopped | ServiceState::Pending => {}
        }

        self.backend.start(name)?;

        let deadline = Instant::now() + self.settle_timeout;
        loop {
            match self.backend.query(name)? {
                ServiceState::Running => {
                    info!("服务已启动: {name}");
                    return Ok(());
                }
                ServiceState::Stopped | ServiceState::Absent => {
                    return Err(InstallError::ServiceStart {
                        service: name.to_string(),
                        message: "服务进程启动后立即退出".to_string(),
                        remediation: self.backend.diagnostic_hint(name),
                    });
                }
                ServiceState::Pending if Instant::now() >= deadline => {
                    return Err(InstallError::service_control(
                        name,
                        "start",
                        format!("等待服务启动超时（{}s）", self.settle_timeout.as_secs()),
                    ));
                }
                ServiceState::Pending => std::thread::sleep(self.poll_interval),
            }
        }
    }

    /// 停止服务；服务不存在或已停止时直接返回成功。
    pub fn stop(&mut self, name: &str) -> Result<(), InstallError> {
        match self.state(name)? {
            ServiceState::Absent | ServiceState::Stopped => {
                debug!("服务未运行，无需停止: {name}");
                return Ok(());
            }
            ServiceState::Running | ServiceState::Pending => {}
        }

        self.backend.stop(name)?;

        let deadline = Instant::now() + self.settle_timeout;
        loop {
            match self.backend.query(name)? {
                ServiceState::Stopped | ServiceState::Absent => {
                    info!("服务已停止: {name}");
                    return Ok(());
                }
                _ if Instant::now() >= deadline => {
                    return Err(InstallError::service_control(
                        name,
                        "stop",
                        format!("等待服务停止超时（{}s）", self.settle_timeout.as_secs()),
                    ));
                }
                _ => std::thread::sleep(self.poll_interval),
            }
        }
    }

    /// 删除服务；运行中时先停止，不存在时直接返回成功。
    pub fn remove(&mut self, name: &str) -> Result<(), InstallError> {
        match self.state(name)? {
            ServiceState::Absent => {
                debug!("服务不存在，无需删除: {name}");
                return Ok(());
            }
            ServiceState::Running | ServiceState::Pending => self.stop(name)?,
            ServiceState::Stopped => {}
        }

        self.backend.remove(name)?;

        if self.state(name)? != ServiceState::Absent {
            warn!("服务已标记删除但仍存在: {name}");
            return Err(InstallError::service_control(
                name,
                "remove",
                "服务已标记为删除但仍在服务管理器中，请关闭服务管理控制台后重试",
            ));
        }
        info!("服务已删除: {name}");
        Ok(())
    }

    /// 重启服务（停止后启动）。
    pub fn restart(&mut self, name: &str) -> Result<(), InstallError> {
        self.stop(name)?;
        self.start(name)
    }

    /// 将服务收敛到目标状态。
    ///
    /// 参数：
    /// - `descriptor`：服务描述（需要注册时使用）
    /// - `target`：目标状态（`Absent` / `Stopped` / `Running`）
    ///
    /// 说明：
    /// - 与 [`install`](Self::install) 不同，已满足目标状态时不会重新注册
    pub fn ensure_service_state(
        &mut self,
        descriptor: &ServiceDescriptor,
        target: ServiceState,
    ) -> Result<(), InstallError> {
        let name = descriptor.name.as_str();
        let current = self.state(name)?;
        if current == target {
            return Ok(());
        }
        match target {
            ServiceState::Absent => self.remove(name),
            ServiceState::Stopped => {
                if current == ServiceState::Absent {
                    self.register(descriptor)
                } else {
                    self.stop(name)
                }
            }
            ServiceState::Running => {
                if current == ServiceState::Absent {
                    self.register(descriptor)?;
                }
                self.start(name)
            }
            ServiceState::Pending => Err(InstallError::service_control(
                name,
                "converge",
                "pending 不能作为目标状态",
            )),
        }
    }

    /// 注册服务（调用前服务不存在）。
    fn register(&mut self, descriptor: &ServiceDescriptor) -> Result<(), InstallError> {
        if !descriptor.executable_path.exists() {
            return Err(InstallError::PrerequisiteMissing {
                path: descriptor.executable_path.clone(),
            });
        }
        self.backend.install(descriptor)?;
        if self.state(&descriptor.name)? == ServiceState::Absent {
            return Err(InstallError::service_control(
                &descriptor.name,
                "install",
                "安装命令返回成功但服务未注册",
            ));
        }
        info!("服务已安装: {} ({})", descriptor.display_name, descriptor.name);
        Ok(())
    }
}
