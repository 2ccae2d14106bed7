//! 安装参数采集与校验（ConfigCollector）。
//!
//! 说明：
//! - 原始输入（命令行覆盖值、交互提示回答）统一以字符串形式进入 [`RawInputs`]
//! - 每个字段都有独立的校验函数，交互模式下校验失败只阻塞当前字段（重新提示）
//! - 未选择服务组件时，端口/日志路径的校验被整体跳过
//! - 采集成功时确保日志目录存在，后续步骤可直接假定目录可用
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::ConfigArtifact;
use crate::error::{Field, ValidationError};

/// 默认接收端口。
pub const DEFAULT_PORT: u16 = 7004;
/// 默认日志文件（相对路径，由托管服务按自身工作目录解析）。
pub const DEFAULT_LOG_FILE: &str = "smdr.log";
/// 默认服务主机（查看器连接目标）。
pub const DEFAULT_SERVICE_HOST: &str = "localhost";

/// 可选安装组件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// 后台接收服务。
    Service,
    /// 查看器。
    Viewer,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Service => f.write_str("service"),
            Component::Viewer => f.write_str("viewer"),
        }
    }
}

impl FromStr for Component {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(Component::Service),
            "viewer" => Ok(Component::Viewer),
            other => Err(ValidationError::new(
                Field::Components,
                format!("未知组件: {other}（可选 service / viewer）"),
            )),
        }
    }
}

/// 未经校验的原始安装输入。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInputs {
    pub port: Option<String>,
    pub log_path: Option<String>,
    pub viewer_port: Option<String>,
    pub service_host: Option<String>,
    pub components: BTreeSet<Component>,
    pub auto_start: bool,
}

impl RawInputs {
    /// 用默认值补齐未提供的字段。
    ///
    /// 参数：
    /// - `defaults`：默认值来源（已存在的配置文件，或按安装布局生成的默认配置）
    ///
    /// 返回值：
    /// - 补齐后的输入；已提供的字段保持不变
    pub fn with_defaults(mut self, defaults: &ConfigArtifact) -> Self {
        self.port.get_or_insert_with(|| defaults.port.to_string());
        self.log_path.get_or_insert_with(|| defaults.log_file.clone());
        if self.viewer_port.is_none() {
            self.viewer_port = defaults.viewer_port.map(|p| p.to_string());
        }
        if self.service_host.is_none() {
            self.service_host = defaults.service_host.clone();
        }
        self
    }
}

/// 校验后的安装配置（贯穿后续各步骤的显式配置值）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationConfig {
    pub port: u16,
    pub log_path: PathBuf,
    pub viewer_port: Option<u16>,
    pub service_host: Option<String>,
    pub components: BTreeSet<Component>,
    pub auto_start: bool,
}

impl InstallationConfig {
    pub fn service_selected(&self) -> bool {
        self.components.contains(&Component::Service)
    }
}

/// 校验端口字符串。
///
/// 参数：
/// - `field`：出错时报告的字段（接收端口或查看器端口）
/// - `raw`：原始输入
///
/// 返回值：
/// - `Ok(port)`：整数且位于 `[1, 65535]`
///
/// 异常处理：
/// - 空值、非整数、越界均返回 [`ValidationError`]
pub fn validate_port(field: Field, raw: &str) -> Result<u16, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "不能为空"));
    }
    let value: i64 = trimmed
        .parse()
        .map_err(|_| ValidationError::new(field, format!("不是整数: {trimmed}")))?;
    match u16::try_from(value) {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(ValidationError::new(
            field,
            format!("超出范围 1-65535: {value}"),
        )),
    }
}

/// 校验日志路径（只做语法校验，不创建目录）。
pub fn validate_log_path(raw: &str) -> Result<PathBuf, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(Field::LogPath, "不能为空"));
    }
    let path = PathBuf::from(trimmed);
    if path.is_dir() {
        return Err(ValidationError::new(
            Field::LogPath,
            format!("指向的是目录而不是文件: {trimmed}"),
        ));
    }
    Ok(path)
}

/// 校验服务主机名。
pub fn validate_service_host(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(Field::ServiceHost, "不能为空"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(ValidationError::new(
            Field::ServiceHost,
            format!("不能包含空白字符: {trimmed}"),
        ));
    }
    Ok(trimmed.to_string())
}

/// 确保日志文件所在目录存在。
///
/// 异常处理：
/// - 目录无法创建时以 `log_path` 字段的校验错误返回，交互模式可据此重新提示。
pub fn ensure_log_dir(log_path: &Path) -> Result<(), ValidationError> {
    let Some(parent) = log_path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|e| {
        ValidationError::new(
            Field::LogPath,
            format!("无法创建日志目录 {}: {e}", parent.display()),
        )
    })?;
    debug!("已创建日志目录: {}", parent.display());
    Ok(())
}

/// 采集并校验安装参数。
///
/// 主要步骤：
/// 1) 组件选择不能为空
/// 2) 选择了服务：校验端口与日志路径，并创建日志目录
/// 3) 未选择服务：端口/日志路径不做校验，非法值回落为默认值
/// 4) 查看器端口、服务主机如提供则校验
///
/// 异常处理：
/// - 返回第一个失败字段的 [`ValidationError`]
pub fn collect(raw: &RawInputs) -> Result<InstallationConfig, ValidationError> {
    if raw.components.is_empty() {
        return Err(ValidationError::new(Field::Components, "至少选择一个组件"));
    }

    let service_selected = raw.components.contains(&Component::Service);
    let (port, log_path) = if service_selected {
        let port = validate_port(Field::Port, raw.port.as_deref().unwrap_or_default())?;
        let log_path = validate_log_path(raw.log_path.as_deref().unwrap_or_default())?;
        ensure_log_dir(&log_path)?;
        (port, log_path)
    } else {
        let port = raw
            .port
            .as_deref()
            .and_then(|p| validate_port(Field::Port, p).ok())
            .unwrap_or(DEFAULT_PORT);
        let log_path = raw
            .log_path
            .as_deref()
            .and_then(|p| validate_log_path(p).ok())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        (port, log_path)
    };

    let viewer_port = raw
        .viewer_port
        .as_deref()
        .map(|p| validate_port(Field::ViewerPort, p))
        .transpose()?;
    let service_host = raw
        .service_host
        .as_deref()
        .map(validate_service_host)
        .transpose()?;

    Ok(InstallationConfig {
        port,
        log_path,
        viewer_port,
        service_host,
        components: raw.components.clone(),
        auto_start: raw.auto_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_port_in_range_is_accepted() {
        for p in 1..=u16::MAX {
            assert_eq!(validate_port(Field::Port, &p.to_string()), Ok(p));
        }
    }

    #[test]
    fn out_of_range_and_non_numeric_ports_are_rejected() {
        for raw in ["0", "65536", "-1", "70000", "abc", "", "   ", "70 04", "7004.0"] {
            let err = validate_port(Field::Port, raw).expect_err(raw);
            assert_eq!(err.field, Field::Port, "input {raw:?}");
        }
    }

    #[test]
    fn port_is_trimmed() {
        assert_eq!(validate_port(Field::Port, " 7004 "), Ok(7004));
    }

    #[test]
    fn viewer_port_error_reports_viewer_field() {
        let err = validate_port(Field::ViewerPort, "0").unwrap_err();
        assert_eq!(err.field, Field::ViewerPort);
    }

    #[test]
    fn components_parse_case_insensitively() {
        assert_eq!("Service".parse::<Component>(), Ok(Component::Service));
        assert_eq!(" viewer ".parse::<Component>(), Ok(Component::Viewer));
        assert!("gui".parse::<Component>().is_err());
    }

    #[test]
    fn blank_host_is_rejected() {
        assert!(validate_service_host("  ").is_err());
        assert!(validate_service_host("pbx host").is_err());
        assert_eq!(validate_service_host(" pbx01 "), Ok("pbx01".to_string()));
    }
}
