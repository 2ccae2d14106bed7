//! 安装/卸载/升级结果模型。
//!
//! 目的：
//! - 按执行顺序记录已完成步骤与失败原因，操作员据此决定如何重试
//! - 非致命问题（防火墙）记录为告警，不影响 `success`
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, InstallError};

/// 步骤标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    CheckPrerequisites,
    CollectConfig,
    WriteArtifact,
    InstallService,
    ConfigureAutoStart,
    StartService,
    RestartService,
    EnsureFirewallRule,
    StopService,
    RemoveService,
    RemoveFirewallRule,
    ReplaceFiles,
    DeleteData,
    PersistState,
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepId::CheckPrerequisites => "check_prerequisites",
            StepId::CollectConfig => "collect_config",
            StepId::WriteArtifact => "write_artifact",
            StepId::InstallService => "install_service",
            StepId::ConfigureAutoStart => "configure_auto_start",
            StepId::StartService => "start_service",
            StepId::RestartService => "restart_service",
            StepId::EnsureFirewallRule => "ensure_firewall_rule",
            StepId::StopService => "stop_service",
            StepId::RemoveService => "remove_service",
            StepId::RemoveFirewallRule => "remove_firewall_rule",
            StepId::ReplaceFiles => "replace_files",
            StepId::DeleteData => "delete_data",
            StepId::PersistState => "persist_state",
        };
        f.write_str(s)
    }
}

/// 单个步骤的失败/告警记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: StepId,
    pub kind: ErrorKind,
    pub cause: String,
}

/// 一次运行的结果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationResult {
    pub success: bool,
    pub steps_completed: Vec<StepId>,
    pub errors: Vec<StepFailure>,
    #[serde(default)]
    pub warnings: Vec<StepFailure>,
}

impl Default for InstallationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallationResult {
    pub fn new() -> Self {
        Self {
            success: true,
            steps_completed: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// 直接以单个失败构造结果（用于运行在第一步即被拒绝的场景）。
    pub fn failed(step: StepId, error: &InstallError) -> Self {
        let mut result = Self::new();
        result.fail(step, error);
        result
    }

    pub fn complete(&mut self, step: StepId) {
        self.steps_completed.push(step);
    }

    /// 记录致命失败，`success` 置为 false。
    pub fn fail(&mut self, step: StepId, error: &InstallError) {
        self.success = false;
        self.errors.push(StepFailure {
            step,
            kind: error.kind(),
            cause: error.to_string(),
        });
    }

    /// 记录非致命告警。
    pub fn warn(&mut self, step: StepId, error: &InstallError) {
        self.warnings.push(StepFailure {
            step,
            kind: error.kind(),
            cause: error.to_string(),
        });
    }

    pub fn has_completed(&self, step: StepId) -> bool {
        self.steps_completed.contains(&step)
    }

    /// 第一个致命错误的种类。
    pub fn first_error_kind(&self) -> Option<ErrorKind> {
        self.errors.first().map(|e| e.kind)
    }
}
