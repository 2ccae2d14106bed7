//! 配置文件（`smdr_config.json`）的渲染、写入与读取（ConfigWriter）。
//!
//! 约定：
//! - JSON，4 空格缩进，字段顺序固定，末尾换行；相同配置两次写入字节完全一致
//! - 可选字段（`viewer_port` / `service_host`）缺省时不写出
//! - 路径中的反斜杠按 JSON 规则转义（由 `serde_json` 负责）
//! - 写入为整体替换（先写临时文件再重命名），从不与旧文件合并
//! - 读取时缺失字段按默认值补齐，兼容旧版本配置文件
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{InstallationConfig, DEFAULT_LOG_FILE, DEFAULT_PORT};
use crate::error::InstallError;
use crate::settings::InstallLayout;

/// 配置文件内容（托管服务与查看器启动时各自解析）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigArtifact {
    /// 接收端口。
    pub port: u16,
    /// 日志文件路径。
    pub log_file: String,
    /// 查看器端口。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_port: Option<u16>,
    /// 查看器连接的服务主机。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_host: Option<String>,
    /// 是否随系统自动启动。
    pub auto_start: bool,
}

impl Default for ConfigArtifact {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_file: DEFAULT_LOG_FILE.to_string(),
            viewer_port: None,
            service_host: None,
            auto_start: true,
        }
    }
}

impl From<&InstallationConfig> for ConfigArtifact {
    fn from(config: &InstallationConfig) -> Self {
        Self {
            port: config.port,
            log_file: config.log_path.to_string_lossy().into_owned(),
            viewer_port: config.viewer_port,
            service_host: config.service_host.clone(),
            auto_start: config.auto_start,
        }
    }
}

/// 将配置渲染为配置文件字节。
pub fn render_artifact(config: &InstallationConfig) -> Result<Vec<u8>, serde_json::Error> {
    let artifact = ConfigArtifact::from(config);
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    artifact.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// 将配置写入目标路径（整体替换）。
///
/// 参数：
/// - `config`：校验后的安装配置
/// - `dest`：配置文件路径（通常位于服务可执行文件旁）
///
/// 异常处理：
/// - 目录创建、临时文件写入或重命名失败返回 [`InstallError::Io`]
pub fn write_artifact(config: &InstallationConfig, dest: &Path) -> Result<(), InstallError> {
    let bytes = render_artifact(config).map_err(|e| InstallError::io(dest, e.into()))?;
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
        }
    }
    let tmp = dest.with_extension("json.tmp");
    std::fs::write(&tmp, &bytes).map_err(|e| InstallError::io(&tmp, e))?;
    std::fs::rename(&tmp, dest).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        InstallError::io(dest, e)
    })?;
    info!("已写入配置文件: {}", dest.display());
    Ok(())
}

/// 读取并解析配置文件。
///
/// 异常处理：
/// - 文件不存在/不可读、JSON 非法均返回 [`InstallError::Io`]
pub fn read_artifact(path: &Path) -> Result<ConfigArtifact, InstallError> {
    let bytes = std::fs::read(path).map_err(|e| InstallError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| InstallError::io(path, e.into()))
}

/// 计算交互提示/无人值守运行使用的默认值。
///
/// 规则：
/// - 已存在可解析的配置文件：沿用其中的值（重复安装保留操作员配置）
/// - 否则：默认端口，日志文件位于安装目录下
pub fn defaults_for(layout: &InstallLayout) -> ConfigArtifact {
    match read_artifact(&layout.artifact_path) {
        Ok(existing) => {
            debug!("沿用已有配置文件作为默认值: {}", layout.artifact_path.display());
            existing
        }
        Err(_) => ConfigArtifact {
            log_file: layout.default_log_path.to_string_lossy().into_owned(),
            ..ConfigArtifact::default()
        },
    }
}
