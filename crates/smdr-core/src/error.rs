//! 安装过程错误分类。
//!
//! 分类与处理策略：
//! - `Validation`：操作员输入非法；交互模式重新提示，无人值守模式终止本次运行
//! - `PrerequisiteMissing` / `Privilege`：致命，在任何系统修改之前终止
//! - `ServiceControl` / `ServiceStart` / `PortInUse`：致命，停止后续服务步骤，已完成步骤不回滚
//! - `Firewall`：非致命，仅记录告警，安装继续
//! - `Io`：致命，配置文件/目录写入失败时在服务步骤之前终止
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 需要校验的输入字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Port,
    LogPath,
    ViewerPort,
    ServiceHost,
    Components,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Port => "port",
            Field::LogPath => "log_path",
            Field::ViewerPort => "viewer_port",
            Field::ServiceHost => "service_host",
            Field::Components => "components",
        };
        f.write_str(s)
    }
}

/// 单个输入字段的校验失败。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("参数 {field} 无效: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// 错误种类（可序列化，用于安装结果记录与退出报告）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    PrerequisiteMissing,
    Privilege,
    ServiceControl,
    ServiceStart,
    PortInUse,
    Firewall,
    Io,
}

/// 安装/卸载/升级过程中可能出现的错误。
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("缺少服务可执行文件: {}", path.display())]
    PrerequisiteMissing { path: PathBuf },

    #[error("需要管理员权限，请以管理员方式运行")]
    Privilege,

    #[error("服务 {service} 执行 {action} 失败: {message}")]
    ServiceControl {
        service: String,
        action: &'static str,
        message: String,
    },

    #[error("服务 {service} 启动失败: {message}；{remediation}")]
    ServiceStart {
        service: String,
        message: String,
        remediation: String,
    },

    #[error("端口 {port} 已被其他进程占用")]
    PortInUse { port: u16 },

    #[error("防火墙规则 {rule} 操作失败: {message}")]
    Firewall { rule: String, message: String },

    #[error("文件操作失败: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    /// 便捷构造：服务控制失败。
    pub fn service_control(
        service: impl Into<String>,
        action: &'static str,
        message: impl Into<String>,
    ) -> Self {
        InstallError::ServiceControl {
            service: service.into(),
            action,
            message: message.into(),
        }
    }

    /// 便捷构造：文件系统错误。
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InstallError::Validation(_) => ErrorKind::Validation,
            InstallError::PrerequisiteMissing { .. } => ErrorKind::PrerequisiteMissing,
            InstallError::Privilege => ErrorKind::Privilege,
            InstallError::ServiceControl { .. } => ErrorKind::ServiceControl,
            InstallError::ServiceStart { .. } => ErrorKind::ServiceStart,
            InstallError::PortInUse { .. } => ErrorKind::PortInUse,
            InstallError::Firewall { .. } => ErrorKind::Firewall,
            InstallError::Io { .. } => ErrorKind::Io,
        }
    }

    /// 是否为致命错误（致命错误会终止本次运行的剩余步骤）。
    ///
    /// 防火墙失败不影响服务运行，因此仅作为告警处理。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, InstallError::Firewall { .. })
    }
}
