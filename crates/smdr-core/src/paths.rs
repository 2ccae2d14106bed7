//! 统一路径与目录约定（主要面向 Windows ProgramFiles / ProgramData）。
//!
//! 目标：
//! - 将落盘路径集中管理，避免散落在各模块中
//! - 统一安装目录、配置文件与安装状态文件路径，便于无人值守部署与排障
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// ProgramData 下的产品目录名。
///
/// 示例（默认）：
/// - `%ProgramData%\SMDRReceiver`
pub const VENDOR_DIR: &str = "SMDRReceiver";

/// ProgramFiles 下的默认安装目录名。
pub const INSTALL_DIR_NAME: &str = "SMDR Receiver";

/// 安装状态文件名。
pub const STATE_FILE_NAME: &str = "install-state.json";

/// 获取本项目在 ProgramData 下的根目录。
///
/// 返回值：
/// - 成功：`%ProgramData%\SMDRReceiver`
///
/// 异常处理：
/// - 当环境变量 `ProgramData` 不存在或不可读时，返回错误。
pub fn program_data_dir() -> Result<PathBuf> {
    let program_data = std::env::var("ProgramData").context("读取 ProgramData 环境变量失败")?;
    Ok(PathBuf::from(program_data).join(VENDOR_DIR))
}

/// 默认安装目录。
///
/// 返回值：
/// - `%ProgramFiles%\SMDR Receiver`
///
/// 异常处理：
/// - 环境变量 `ProgramFiles` 不存在时返回错误（非 Windows 环境需显式传入 `--install-dir`）。
pub fn default_install_dir() -> Result<PathBuf> {
    let program_files =
        std::env::var("ProgramFiles").context("读取 ProgramFiles 环境变量失败，请通过 --install-dir 指定安装目录")?;
    Ok(PathBuf::from(program_files).join(INSTALL_DIR_NAME))
}

/// 默认安装状态文件路径。
///
/// 返回值：
/// - `%ProgramData%\SMDRReceiver\install-state.json`
pub fn default_state_file() -> Result<PathBuf> {
    Ok(program_data_dir()?.join(STATE_FILE_NAME))
}

/// 确保目录存在（不存在则递归创建）。
///
/// 异常处理：
/// - 目录创建失败（权限、路径非法等）会返回错误。
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("创建目录失败: {}", path.display()))?;
    Ok(())
}

/// 将配置中的路径字段解析为实际路径。
///
/// 参数：
/// - `base`：相对路径的基准目录（通常是设置文件所在目录或安装目录）
/// - `raw`：配置中的路径字符串
///
/// 返回值：
/// - `raw` 为绝对路径：直接返回
/// - `raw` 为相对路径：返回 `base.join(raw)`
///
/// 异常处理：
/// - `raw` 为空字符串时返回错误，避免误用导致写入基准目录本身。
pub fn resolve_path(base: &Path, raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(anyhow!("空路径"));
    }
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        Ok(p)
    } else {
        Ok(base.join(p))
    }
}
