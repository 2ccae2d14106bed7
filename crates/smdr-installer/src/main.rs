//! SMDR 接收服务安装程序（命令行入口）。
//!
//! 职责：
//! - 读取 `installer-settings.json`（可选）与命令行参数，解析安装布局
//! - 交互模式逐项询问安装参数；`--silent` / `--very-silent` 为无人值守模式，只使用命令行参数
//! - 分发到安装编排：install / uninstall / upgrade / reconfigure / restart
//! - status / doctor 为只读命令，不做系统修改
//!
//! 权限要求：
//! - 会修改系统的命令在执行前检查管理员权限，未提权时直接退出（退出码 1）
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use smdr_core::artifact::{self, ConfigArtifact};
use smdr_core::config::{Component, RawInputs};
use smdr_core::error::{InstallError, ValidationError};
use smdr_core::firewall::FirewallSynchronizer;
use smdr_core::net;
use smdr_core::result::{InstallationResult, StepId};
use smdr_core::service::ServiceController;
use smdr_core::settings::{InstallLayout, InstallerSettings};
use smdr_installer::orchestrator::{DataDeletion, InstallOrchestrator};
use smdr_installer::prompt::{self, InquirePrompter};
use smdr_windows::elevation;
use smdr_windows::firewall::NetshFirewall;
use smdr_windows::service::HostedServiceBackend;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 命令行参数。
///
/// 说明：
/// - `settings` 指向安装程序设置文件（缺省时使用内置默认值）
/// - `silent` / `very_silent` 用于企业部署场景（不做任何交互提示；后者同时只输出告警与错误）
#[derive(Debug, Parser)]
#[command(name = "smdr-installer", version)]
struct Cli {
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// 覆盖服务名。
    #[arg(long, global = true)]
    service_name: Option<String>,

    /// 覆盖安装目录。
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    silent: bool,

    #[arg(long, global = true, default_value_t = false)]
    very_silent: bool,

    #[command(subcommand)]
    command: Commands,
}

/// 安装参数覆盖项（无人值守模式下未提供的字段使用已有配置文件或默认值）。
#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// 接收端口（1-65535）。
    #[arg(long, allow_hyphen_values = true)]
    port: Option<String>,

    /// 日志文件路径。
    #[arg(long)]
    log_path: Option<String>,

    /// 查看器端口。
    #[arg(long, allow_hyphen_values = true)]
    viewer_port: Option<String>,

    /// 查看器连接的服务主机。
    #[arg(long)]
    host: Option<String>,

    /// 组件（逗号分隔：service,viewer；默认全部）。
    #[arg(long)]
    components: Option<String>,

    /// 不随系统自动启动服务。
    #[arg(long, default_value_t = false)]
    no_auto_start: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 安装（可重复执行：已存在的服务会先删除再注册）。
    Install(ConfigArgs),
    /// 卸载（默认保留配置文件与日志）。
    Uninstall {
        /// 删除配置文件与日志。
        #[arg(long, default_value_t = false)]
        delete_data: bool,
        /// 无人值守模式下确认删除（必须与 --delete-data 同时指定）。
        #[arg(long, default_value_t = false)]
        confirm_delete_data: bool,
    },
    /// 升级：删除服务注册 → 替换文件 → 重新安装。
    Upgrade {
        /// 新版本文件目录。
        #[arg(long)]
        payload: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// 修改配置并重启服务。
    Reconfigure(ConfigArgs),
    /// 重启服务。
    Restart,
    /// 输出服务、配置文件与防火墙规则状态（不做系统修改）。
    Status,
    /// 环境自检（管理员权限、托管程序、端口占用）。
    Doctor,
}

/// 参数采集结果。
enum Gathered {
    Ready(RawInputs),
    Rejected(InstallationResult),
}

/// 程序入口：解析参数并分发子命令。
///
/// 退出码：
/// - 0：成功
/// - 1：任意失败（参数校验、缺少托管程序、权限不足、子进程失败等）
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.very_silent);
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(very_silent: bool) {
    let default_level = if very_silent { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<bool> {
    let result = match &cli.command {
        Commands::Status => return status(cli).map(|()| true),
        Commands::Doctor => return doctor(cli).map(|()| true),
        Commands::Install(args) => guarded(|| install(cli, args))?,
        Commands::Uninstall {
            delete_data,
            confirm_delete_data,
        } => guarded(|| uninstall(cli, *delete_data, *confirm_delete_data))?,
        Commands::Upgrade { payload, config } => guarded(|| upgrade(cli, payload, config))?,
        Commands::Reconfigure(args) => guarded(|| reconfigure(cli, args))?,
        Commands::Restart => guarded(|| restart(cli))?,
    };
    report(cli, &result)?;
    Ok(result.success)
}

fn allow_non_admin_for_tests() -> bool {
    matches!(std::env::var("SMDR_TEST_ALLOW_NON_ADMIN").as_deref(), Ok("1"))
}

/// 管理员权限检查，通过后执行 `f`。
///
/// 未提权时不做任何系统修改，直接返回 `Privilege` 失败结果。
fn guarded(f: impl FnOnce() -> Result<InstallationResult>) -> Result<InstallationResult> {
    if !allow_non_admin_for_tests() && !elevation::is_running_as_admin()? {
        let e = InstallError::Privilege;
        error!("{e}");
        return Ok(InstallationResult::failed(StepId::CheckPrerequisites, &e));
    }
    f()
}

fn install(cli: &Cli, args: &ConfigArgs) -> Result<InstallationResult> {
    let layout = load_layout(cli)?;
    let defaults = artifact::defaults_for(&layout);
    let raw = match gather(cli, args, &defaults)? {
        Gathered::Ready(raw) => raw,
        Gathered::Rejected(result) => return Ok(result),
    };
    Ok(build_orchestrator(layout).install(&raw))
}

fn reconfigure(cli: &Cli, args: &ConfigArgs) -> Result<InstallationResult> {
    let layout = load_layout(cli)?;
    let defaults = artifact::defaults_for(&layout);
    let raw = match gather(cli, args, &defaults)? {
        Gathered::Ready(raw) => raw,
        Gathered::Rejected(result) => return Ok(result),
    };
    Ok(build_orchestrator(layout).reconfigure(&raw))
}

fn upgrade(cli: &Cli, payload: &Path, args: &ConfigArgs) -> Result<InstallationResult> {
    let layout = load_layout(cli)?;
    let defaults = artifact::defaults_for(&layout);
    let raw = match gather(cli, args, &defaults)? {
        Gathered::Ready(raw) => raw,
        Gathered::Rejected(result) => return Ok(result),
    };
    let payload = absolute(payload)?;
    Ok(build_orchestrator(layout).upgrade(&raw, &payload))
}

fn restart(cli: &Cli) -> Result<InstallationResult> {
    let layout = load_layout(cli)?;
    Ok(build_orchestrator(layout).restart())
}

/// 卸载。
///
/// 删除数据需要二次确认：
/// - 无人值守：同时指定 `--delete-data` 与 `--confirm-delete-data`
/// - 交互：连续两次确认
fn uninstall(cli: &Cli, delete_data: bool, confirm_delete_data: bool) -> Result<InstallationResult> {
    let layout = load_layout(cli)?;
    let deletion = if unattended(cli) {
        if delete_data && confirm_delete_data {
            DataDeletion::Delete
        } else {
            if delete_data {
                warn!("--delete-data 需要同时指定 --confirm-delete-data，配置文件与日志将保留");
            }
            DataDeletion::Keep
        }
    } else {
        let log = artifact::read_artifact(&layout.artifact_path)
            .ok()
            .map(|a| PathBuf::from(a.log_file));
        if prompt::confirm_data_deletion(&mut InquirePrompter, &layout.artifact_path, log.as_deref())? {
            DataDeletion::Delete
        } else {
            DataDeletion::Keep
        }
    };
    Ok(build_orchestrator(layout).uninstall(deletion))
}

fn status(cli: &Cli) -> Result<()> {
    let layout = load_layout(cli)?;
    let status = build_orchestrator(layout).status();
    println!("{}", serde_json::to_string_pretty(&status).context("序列化状态失败")?);
    Ok(())
}

fn doctor(cli: &Cli) -> Result<()> {
    let layout = load_layout(cli)?;
    let defaults = artifact::defaults_for(&layout);
    println!("admin = {}", elevation::is_running_as_admin()?);
    println!("install_dir = {}", layout.install_dir.display());
    println!(
        "executable = {} (present = {})",
        layout.executable_path.display(),
        layout.executable_path.exists()
    );
    println!(
        "artifact = {} (present = {})",
        layout.artifact_path.display(),
        layout.artifact_path.exists()
    );
    println!("state_file = {}", layout.state_file.display());
    println!(
        "port {} available = {}",
        defaults.port,
        net::port_is_available(defaults.port)
    );
    Ok(())
}

fn unattended(cli: &Cli) -> bool {
    cli.silent || cli.very_silent
}

/// 采集安装参数：无人值守模式取命令行参数，交互模式逐项询问。
fn gather(cli: &Cli, args: &ConfigArgs, defaults: &ConfigArtifact) -> Result<Gathered> {
    if !unattended(cli) {
        let raw = prompt::collect_interactive(&mut InquirePrompter, defaults)?;
        return Ok(Gathered::Ready(raw));
    }
    match raw_inputs(args, defaults) {
        Ok(raw) => Ok(Gathered::Ready(raw)),
        Err(e) => {
            let e = InstallError::from(e);
            error!("{e}");
            Ok(Gathered::Rejected(InstallationResult::failed(StepId::CollectConfig, &e)))
        }
    }
}

/// 由命令行参数构造原始输入；未提供的字段使用默认值。
fn raw_inputs(args: &ConfigArgs, defaults: &ConfigArtifact) -> Result<RawInputs, ValidationError> {
    let components = match args.components.as_deref() {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<Component>)
            .collect::<Result<BTreeSet<_>, _>>()?,
        None => BTreeSet::from([Component::Service, Component::Viewer]),
    };
    let raw = RawInputs {
        port: args.port.clone(),
        log_path: args.log_path.clone(),
        viewer_port: args.viewer_port.clone(),
        service_host: args.host.clone(),
        components,
        auto_start: !args.no_auto_start,
    };
    Ok(raw.with_defaults(defaults))
}

/// 解析安装布局：设置文件（可选）+ 命令行覆盖项。
fn load_layout(cli: &Cli) -> Result<InstallLayout> {
    let (mut settings, base) = match &cli.settings {
        Some(path) => {
            let settings = InstallerSettings::load(path)?;
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (settings, base)
        }
        None => (InstallerSettings::default(), std::env::current_dir().context("读取当前目录失败")?),
    };
    if let Some(name) = &cli.service_name {
        settings.service_name = name.clone();
    }
    if let Some(dir) = &cli.install_dir {
        settings.install_dir = Some(absolute(dir)?.to_string_lossy().into_owned());
    }
    let layout = settings.resolve(&base)?;
    info!(
        "安装目录: {}，服务名: {}",
        layout.install_dir.display(),
        layout.service_name
    );
    Ok(layout)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir().context("读取当前目录失败")?.join(path))
}

fn build_orchestrator(layout: InstallLayout) -> InstallOrchestrator {
    let backend = HostedServiceBackend::new(layout.executable_path.clone(), layout.command_timeout)
        .with_interpreter(layout.interpreter.clone());
    let services = ServiceController::new(Box::new(backend)).with_settle_timeout(layout.settle_timeout);
    let firewall = FirewallSynchronizer::new(
        Box::new(NetshFirewall::new(layout.command_timeout)),
        layout.product_name.clone(),
    );
    InstallOrchestrator::new(layout, services, firewall)
}

/// 输出运行结果：日志摘要 + 标准输出中的 JSON 结果（`--very-silent` 时不输出 JSON）。
fn report(cli: &Cli, result: &InstallationResult) -> Result<()> {
    for warning in &result.warnings {
        warn!("[{}] {}", warning.step, warning.cause);
    }
    if result.success {
        info!("全部完成，共 {} 个步骤", result.steps_completed.len());
    } else if let Some(first) = result.errors.first() {
        error!("在步骤 {} 失败，修复后可重新执行同一命令", first.step);
    }
    if !cli.very_silent {
        println!("{}", serde_json::to_string_pretty(result).context("序列化结果失败")?);
    }
    Ok(())
}
