//! 安装状态落盘模型（install-state.json）。
//!
//! 目的：
//! - 记录“安装做过哪些系统修改”（已完成步骤、服务名、防火墙规则），卸载时据此反向补偿
//! - 记录上一次配置的端口，重新配置时精确删除旧端口对应的防火墙规则
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::InstallError;
use crate::result::StepId;

/// 安装状态（序列化为 JSON 存储到 ProgramData）。
///
/// 字段说明：
/// - `state_id`：状态文件 ID（每次全新安装重新生成）
/// - `product_name`：产品名称
/// - `updated_at`：最后一次写入时间（UTC）
/// - `completed_steps`：已完成的安装步骤（去重，按首次完成顺序）
/// - `service_name`：已注册的服务名
/// - `firewall_rules`：当前由安装程序创建并跟踪的防火墙规则名
/// - `configured_port`：当前配置的接收端口
/// - `install_dir` / `artifact_path` / `log_path`：落盘位置（卸载删除数据时使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallState {
    pub state_id: Uuid,
    pub product_name: String,
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub completed_steps: Vec<StepId>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub firewall_rules: Vec<String>,
    #[serde(default)]
    pub configured_port: Option<u16>,
    #[serde(default)]
    pub install_dir: Option<String>,
    #[serde(default)]
    pub artifact_path: Option<String>,
    #[serde(default)]
    pub log_path: Option<String>,
}

impl InstallState {
    /// 创建一份新的安装状态。
    pub fn new(product_name: impl Into<String>) -> Self {
        Self {
            state_id: Uuid::new_v4(),
            product_name: product_name.into(),
            updated_at: OffsetDateTime::now_utc(),
            completed_steps: Vec::new(),
            service_name: None,
            firewall_rules: Vec::new(),
            configured_port: None,
            install_dir: None,
            artifact_path: None,
            log_path: None,
        }
    }

    /// 读取状态文件；文件不存在时返回 `Ok(None)`。
    ///
    /// 异常处理：
    /// - 读取失败或 JSON 非法返回 [`InstallError::Io`]
    pub fn load(path: &Path) -> Result<Option<Self>, InstallError> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path).map_err(|e| InstallError::io(path, e))?;
        let state = serde_json::from_slice(&bytes).map_err(|e| InstallError::io(path, e.into()))?;
        Ok(Some(state))
    }

    /// 将状态写入文件（自动创建父目录）。
    pub fn save(&mut self, path: &Path) -> Result<(), InstallError> {
        self.updated_at = OffsetDateTime::now_utc();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
            }
        }
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| InstallError::io(path, e.into()))?;
        std::fs::write(path, bytes).map_err(|e| InstallError::io(path, e))
    }

    /// 删除状态文件（不存在视为已删除）。
    pub fn remove(path: &Path) -> Result<(), InstallError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InstallError::io(path, e)),
        }
    }

    /// 记录一个已完成的步骤（重复记录无效果）。
    pub fn record_step(&mut self, step: StepId) {
        if !self.completed_steps.contains(&step) {
            self.completed_steps.push(step);
        }
    }

    /// 撤销步骤记录（补偿完成后调用）。
    pub fn forget_step(&mut self, step: StepId) {
        self.completed_steps.retain(|s| *s != step);
    }

    pub fn has_step(&self, step: StepId) -> bool {
        self.completed_steps.contains(&step)
    }
}
