//! 安装程序设置（installer-settings.json）与解析后的安装布局。
//!
//! 约定：
//! - 所有字段通过 `#[serde(default)]` 提供默认值，设置文件可以只覆盖关心的字段
//! - 该模块只做路径解析，不执行任何系统修改
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::paths;

/// 默认服务名（服务管理器中的唯一标识）。
pub const DEFAULT_SERVICE_NAME: &str = "SMDRReceiver";
/// 默认配置文件名（位于服务可执行文件旁）。
pub const DEFAULT_ARTIFACT_FILE_NAME: &str = "smdr_config.json";

/// 安装程序设置根对象。
///
/// 字段说明：
/// - `install_dir` / `state_file` 为空时使用 [`paths`] 中的默认约定
/// - `timeouts` 控制服务命令的有界等待
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// 产品名称（用于防火墙规则名与日志）。
    pub product_name: String,
    /// 服务名。
    pub service_name: String,
    /// 服务显示名。
    pub display_name: String,
    /// 服务描述。
    pub description: String,
    /// 安装目录。
    pub install_dir: Option<String>,
    /// 被托管的服务可执行文件名（相对安装目录）。
    pub executable_name: String,
    /// 运行服务程序的解释器（为空时直接执行 `executable_name`）。
    pub interpreter: Option<String>,
    /// 配置文件名（相对安装目录）。
    pub artifact_file_name: String,
    /// 默认日志文件名（相对安装目录）。
    pub log_file_name: String,
    /// 安装状态文件路径。
    pub state_file: Option<String>,
    /// 超时设置。
    pub timeouts: TimeoutSettings,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            product_name: "SMDR Receiver".to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            display_name: "SMDR Receiver Service".to_string(),
            description: "Receives and logs SMDR call data from phone systems".to_string(),
            install_dir: None,
            executable_name: "smdr_service.exe".to_string(),
            interpreter: None,
            artifact_file_name: DEFAULT_ARTIFACT_FILE_NAME.to_string(),
            log_file_name: "smdr.log".to_string(),
            state_file: None,
            timeouts: TimeoutSettings::default(),
        }
    }
}

/// 服务命令超时设置（秒）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// 单条服务/防火墙命令的最长等待时间。
    pub command_secs: u64,
    /// 启动/停止后等待服务状态稳定的最长时间。
    pub settle_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            command_secs: 30,
            settle_secs: 10,
        }
    }
}

impl InstallerSettings {
    /// 读取并解析设置文件（JSON）。
    ///
    /// 异常处理：
    /// - 文件读取失败（不存在/权限/IO）返回错误
    /// - JSON 解析失败返回错误
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("读取设置文件失败: {}", path.display()))?;
        let settings: InstallerSettings =
            serde_json::from_slice(&bytes).context("解析设置文件 JSON 失败")?;
        Ok(settings)
    }

    /// 将设置解析为具体的安装布局（所有路径均已确定）。
    ///
    /// 参数：
    /// - `base`：相对路径的基准目录（通常为设置文件所在目录）
    ///
    /// 异常处理：
    /// - 未配置 `install_dir` 且缺少 `ProgramFiles` 环境变量时返回错误
    /// - 未配置 `state_file` 且缺少 `ProgramData` 环境变量时返回错误
    pub fn resolve(&self, base: &Path) -> Result<InstallLayout> {
        let install_dir = match self.install_dir.as_deref() {
            Some(raw) => paths::resolve_path(base, raw)?,
            None => paths::default_install_dir()?,
        };
        let state_file = match self.state_file.as_deref() {
            Some(raw) => paths::resolve_path(base, raw)?,
            None => paths::default_state_file()?,
        };
        let interpreter = self.interpreter.as_deref().map(PathBuf::from);
        Ok(InstallLayout {
            product_name: self.product_name.clone(),
            service_name: self.service_name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            executable_path: install_dir.join(&self.executable_name),
            interpreter,
            artifact_path: install_dir.join(&self.artifact_file_name),
            default_log_path: install_dir.join(&self.log_file_name),
            install_dir,
            state_file,
            command_timeout: Duration::from_secs(self.timeouts.command_secs),
            settle_timeout: Duration::from_secs(self.timeouts.settle_secs),
        })
    }
}

/// 解析后的安装布局（贯穿各安装步骤的显式参数）。
#[derive(Debug, Clone)]
pub struct InstallLayout {
    pub product_name: String,
    pub service_name: String,
    pub display_name: String,
    pub description: String,
    pub install_dir: PathBuf,
    pub executable_path: PathBuf,
    pub interpreter: Option<PathBuf>,
    pub artifact_path: PathBuf,
    pub default_log_path: PathBuf,
    pub state_file: PathBuf,
    pub command_timeout: Duration,
    pub settle_timeout: Duration,
}

impl InstallLayout {
    /// 以默认设置在指定安装目录下构造布局。
    pub fn in_dir(install_dir: &Path, state_file: &Path) -> Self {
        let settings = InstallerSettings::default();
        Self {
            product_name: settings.product_name,
            service_name: settings.service_name,
            display_name: settings.display_name,
            description: settings.description,
            executable_path: install_dir.join(&settings.executable_name),
            interpreter: None,
            artifact_path: install_dir.join(&settings.artifact_file_name),
            default_log_path: install_dir.join(&settings.log_file_name),
            install_dir: install_dir.to_path_buf(),
            state_file: state_file.to_path_buf(),
            command_timeout: Duration::from_secs(settings.timeouts.command_secs),
            settle_timeout: Duration::from_secs(settings.timeouts.settle_secs),
        }
    }
}
