//! Windows 防火墙规则管理（基于 `netsh`）。
//!
//! 说明：
//! - 使用 `netsh advfirewall` 查询/创建/删除规则，避免直接绑定复杂的防火墙 COM API
//! - 命令行输出可直接复现，便于排障
//!
//! 权限要求：
//! - 需要管理员权限
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::process::Command;
use std::time::Duration;

use smdr_core::error::InstallError;
use smdr_core::firewall::{Direction, FirewallBackend, FirewallRule, Protocol};

use crate::process::{self, CommandOutput};

/// `netsh advfirewall firewall` 后端。
#[derive(Debug, Clone)]
pub struct NetshFirewall {
    timeout: Duration,
}

impl NetshFirewall {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 执行 `netsh` 子命令。
    ///
    /// 异常处理：
    /// - 启动失败/超时：返回 `Firewall` 错误（通常是系统缺失 netsh 或权限问题）
    fn run_netsh(&self, rule: &str, args: &[String]) -> Result<CommandOutput, InstallError> {
        let mut cmd = Command::new("netsh");
        cmd.args(["advfirewall", "firewall"]).args(args);
        process::run_with_timeout(cmd, self.timeout).map_err(|e| InstallError::Firewall {
            rule: rule.to_string(),
            message: e.to_string(),
        })
    }

    /// 执行 `netsh` 子命令并要求退出码为 0，失败时附带 stdout/stderr。
    fn run_netsh_checked(&self, rule: &str, args: &[String]) -> Result<(), InstallError> {
        let out = self.run_netsh(rule, args)?;
        if out.success() {
            return Ok(());
        }
        Err(InstallError::Firewall {
            rule: rule.to_string(),
            message: format!("netsh 执行失败: {}", out.summary()),
        })
    }
}

impl FirewallBackend for NetshFirewall {
    /// `show rule` 在没有匹配规则时以非 0 退出码结束。
    fn rule_exists(&self, name: &str) -> Result<bool, InstallError> {
        let out = self.run_netsh(name, &["show".into(), "rule".into(), format!("name={name}")])?;
        Ok(out.success())
    }

    fn add_rule(&mut self, rule: &FirewallRule) -> Result<(), InstallError> {
        let dir = match rule.direction {
            Direction::Inbound => "in",
        };
        let protocol = match rule.protocol {
            Protocol::Tcp => "TCP",
        };
        self.run_netsh_checked(
            &rule.name,
            &[
                "add".into(),
                "rule".into(),
                format!("name={}", rule.name),
                format!("dir={dir}"),
                "action=allow".into(),
                format!("protocol={protocol}"),
                format!("localport={}", rule.port),
                "enable=yes".into(),
                "profile=any".into(),
            ],
        )
    }

    fn delete_rule(&mut self, name: &str) -> Result<(), InstallError> {
        self.run_netsh_checked(name, &["delete".into(), "rule".into(), format!("name={name}")])
    }
}
