//! 防火墙入站规则同步（FirewallSynchronizer）。
//!
//! 约定：
//! - 规则名嵌入产品名、方向、协议与端口，不同端口的规则互不冲突，且可按端口精确删除
//! - 添加已存在的规则不会产生重复规则；删除不存在的规则视为成功
//! - 重新配置端口时先删除旧端口规则再添加新规则，避免遗留过期规则
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::InstallError;

/// 协议。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
}

/// 方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
}

/// 防火墙规则定义。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub name: String,
    pub protocol: Protocol,
    pub direction: Direction,
    pub port: u16,
}

impl FirewallRule {
    pub fn inbound_tcp(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            protocol: Protocol::Tcp,
            direction: Direction::Inbound,
            port,
        }
    }
}

/// 生成入站 TCP 规则名，例如 `SMDRReceiver-In-TCP-7004`。
///
/// 产品名中的空白字符会被去掉，避免 `netsh` 参数引号问题。
pub fn inbound_rule_name(product: &str, port: u16) -> String {
    let product: String = product.chars().filter(|c| !c.is_whitespace()).collect();
    format!("{product}-In-TCP-{port}")
}

/// 平台防火墙能力。
pub trait FirewallBackend {
    /// 指定名称的规则是否存在。
    fn rule_exists(&self, name: &str) -> Result<bool, InstallError>;
    /// 添加规则（不检查重复）。
    fn add_rule(&mut self, rule: &FirewallRule) -> Result<(), InstallError>;
    /// 删除指定名称的所有规则。
    fn delete_rule(&mut self, name: &str) -> Result<(), InstallError>;
}

/// 入站规则同步器。
pub struct FirewallSynchronizer {
    backend: Box<dyn FirewallBackend>,
    product: String,
}

impl FirewallSynchronizer {
    pub fn new(backend: Box<dyn FirewallBackend>, product: impl Into<String>) -> Self {
        Self {
            backend,
            product: product.into(),
        }
    }

    /// 指定端口对应的规则。
    pub fn rule_for_port(&self, port: u16) -> FirewallRule {
        FirewallRule::inbound_tcp(inbound_rule_name(&self.product, port), port)
    }

    /// 确保入站规则存在（已存在时不做任何操作）。
    pub fn ensure_inbound_rule(&mut self, name: &str, port: u16) -> Result<FirewallRule, InstallError> {
        let rule = FirewallRule::inbound_tcp(name, port);
        if self.backend.rule_exists(name)? {
            debug!("防火墙规则已存在，跳过: {name}");
            return Ok(rule);
        }
        self.backend.add_rule(&rule)?;
        info!("已添加防火墙规则: {name} (TCP {port})");
        Ok(rule)
    }

    /// 删除入站规则（不存在时直接返回成功）。
    pub fn remove_inbound_rule(&mut self, name: &str) -> Result<(), InstallError> {
        if !self.backend.rule_exists(name)? {
            debug!("防火墙规则不存在，无需删除: {name}");
            return Ok(());
        }
        self.backend.delete_rule(name)?;
        info!("已删除防火墙规则: {name}");
        Ok(())
    }

    /// 将跟踪的规则集合同步为“仅有当前端口的规则”。
    ///
    /// 参数：
    /// - `tracked`：此前由安装程序创建的规则名（来自安装状态，会被原地更新）
    /// - `port`：当前配置的端口
    ///
    /// 主要步骤：
    /// 1) 删除所有不属于当前端口的已跟踪规则
    /// 2) 确保当前端口规则存在并加入跟踪
    ///
    /// 异常处理：
    /// - 删除旧规则失败不会阻止添加新规则；失败的旧规则保留在跟踪列表中，下次同步重试
    /// - 返回遇到的第一个错误
    pub fn sync_port(&mut self, tracked: &mut Vec<String>, port: u16) -> Result<FirewallRule, InstallError> {
        let rule = self.rule_for_port(port);
        let mut first_error = None;

        let stale: Vec<String> = tracked.iter().filter(|n| **n != rule.name).cloned().collect();
        for name in stale {
            match self.remove_inbound_rule(&name) {
                Ok(()) => tracked.retain(|n| *n != name),
                Err(e) => {
                    warn!("删除旧防火墙规则失败: {name}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match self.ensure_inbound_rule(&rule.name, port) {
            Ok(_) => {
                if !tracked.contains(&rule.name) {
                    tracked.push(rule.name.clone());
                }
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(rule),
        }
    }

    /// 删除所有已跟踪的规则；成功删除的规则从列表中移除。
    pub fn remove_tracked(&mut self, tracked: &mut Vec<String>) -> Result<(), InstallError> {
        let mut first_error = None;
        for name in tracked.clone() {
            match self.remove_inbound_rule(&name) {
                Ok(()) => tracked.retain(|n| *n != name),
                Err(e) => {
                    warn!("删除防火墙规则失败: {name}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
