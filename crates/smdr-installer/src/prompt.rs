//! 交互式参数采集。
//!
//! 约定：
//! - 每个输入在提交时立即校验，失败则提示原因并重新询问该项，不会中止整个流程
//! - 交互采集的结果是 [`RawInputs`]，与无人值守模式走同一条 `collect` 路径，
//!   因此相同的输入产生相同的配置文件
//! - 未选择服务组件时，不询问端口与日志路径
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Result};
use inquire::{Confirm, Text};
use smdr_core::artifact::ConfigArtifact;
use smdr_core::config::{self, Component, RawInputs, DEFAULT_SERVICE_HOST};
use smdr_core::error::{Field, ValidationError};

/// 交互提示能力（终端实现见 [`InquirePrompter`]，测试可注入脚本化实现）。
pub trait Prompter {
    /// 文本输入；`default` 为空字符串表示无默认值。
    fn text(&mut self, message: &str, default: &str) -> Result<String>;
    /// 是/否确认。
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
    /// 显示校验失败等提示信息。
    fn notify(&mut self, message: &str);
}

/// 基于 `inquire` 的终端提示。
#[derive(Debug, Default)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn text(&mut self, message: &str, default: &str) -> Result<String> {
        let mut prompt = Text::new(message);
        if !default.is_empty() {
            prompt = prompt.with_default(default);
        }
        prompt
            .prompt()
            .map_err(|e| anyhow!("输入已取消: {e}"))
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        Confirm::new(message)
            .with_default(default)
            .prompt()
            .map_err(|e| anyhow!("输入已取消: {e}"))
    }

    fn notify(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// 交互式采集安装参数。
///
/// 参数：
/// - `prompter`：提示实现
/// - `defaults`：默认值（已有配置文件或安装布局默认值）
///
/// 返回值：
/// - 逐项校验通过的原始输入（未询问的字段已用 `defaults` 补齐）
///
/// 异常处理：
/// - 操作员取消输入（Ctrl+C / Esc）返回错误
pub fn collect_interactive(prompter: &mut dyn Prompter, defaults: &ConfigArtifact) -> Result<RawInputs> {
    let components = prompt_components(prompter)?;
    let mut raw = RawInputs {
        components,
        auto_start: defaults.auto_start,
        ..RawInputs::default()
    };

    if raw.components.contains(&Component::Service) {
        let port = prompt_valid(prompter, "接收端口:", &defaults.port.to_string(), |v| {
            config::validate_port(Field::Port, v).map(|_| ())
        })?;
        raw.port = Some(port);

        let log_path = prompt_valid(prompter, "日志文件路径:", &defaults.log_file, |v| {
            config::validate_log_path(v).map(|_| ())
        })?;
        raw.log_path = Some(log_path);

        raw.auto_start = prompter.confirm("开机自动启动服务?", defaults.auto_start)?;
    }

    if raw.components.contains(&Component::Viewer) {
        let viewer_default = defaults.viewer_port.map(|p| p.to_string()).unwrap_or_default();
        let viewer_port = prompt_optional(prompter, "查看器端口（留空使用查看器默认值）:", &viewer_default, |v| {
            config::validate_port(Field::ViewerPort, v).map(|_| ())
        })?;
        raw.viewer_port = viewer_port;

        let host_message = format!("服务主机（留空为 {DEFAULT_SERVICE_HOST}）:");
        let host_default = defaults.service_host.clone().unwrap_or_default();
        let service_host = prompt_optional(prompter, &host_message, &host_default, |v| {
            config::validate_service_host(v).map(|_| ())
        })?;
        raw.service_host = service_host;
    }

    Ok(raw.with_defaults(defaults))
}

/// 卸载时删除数据的二次确认。
///
/// 返回值：
/// - 两次确认均为“是”时返回 `true`（默认均为“否”）
pub fn confirm_data_deletion(prompter: &mut dyn Prompter, artifact: &Path, log: Option<&Path>) -> Result<bool> {
    let mut targets = artifact.display().to_string();
    if let Some(log) = log {
        targets.push_str(&format!("、{}", log.display()));
    }
    if !prompter.confirm(&format!("是否删除配置文件与日志（{targets}）?"), false)? {
        return Ok(false);
    }
    prompter.confirm("删除后无法恢复，历史通话记录将丢失。确认删除?", false)
}

fn prompt_components(prompter: &mut dyn Prompter) -> Result<BTreeSet<Component>> {
    loop {
        let mut components = BTreeSet::new();
        if prompter.confirm("安装 SMDR 接收服务?", true)? {
            components.insert(Component::Service);
        }
        if prompter.confirm("安装 SMDR 查看器?", true)? {
            components.insert(Component::Viewer);
        }
        if !components.is_empty() {
            return Ok(components);
        }
        prompter.notify(&ValidationError::new(Field::Components, "至少选择一个组件").to_string());
    }
}

/// 询问必填项，直到校验通过。
fn prompt_valid<F>(prompter: &mut dyn Prompter, message: &str, default: &str, validate: F) -> Result<String>
where
    F: Fn(&str) -> Result<(), ValidationError>,
{
    loop {
        let value = prompter.text(message, default)?;
        match validate(&value) {
            Ok(()) => return Ok(value.trim().to_string()),
            Err(e) => prompter.notify(&e.to_string()),
        }
    }
}

/// 询问可选项；留空返回 `None`。
fn prompt_optional<F>(
    prompter: &mut dyn Prompter,
    message: &str,
    default: &str,
    validate: F,
) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<(), ValidationError>,
{
    loop {
        let value = prompter.text(message, default)?;
        if value.trim().is_empty() {
            return Ok(None);
        }
        match validate(&value) {
            Ok(()) => return Ok(Some(value.trim().to_string())),
            Err(e) => prompter.notify(&e.to_string()),
        }
    }
}
