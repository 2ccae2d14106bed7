//! 提权/权限相关检测。
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use anyhow::Result;

/// 判断当前进程是否以管理员权限运行。
///
/// 返回值：
/// - `Ok(true)`：当前为管理员（非 Windows 平台为 root）
/// - `Ok(false)`：当前非管理员
///
/// 安全注意：
/// - 该检查仅用于“是否应继续执行需要管理员权限的系统修改”，不能作为完整的安全边界。
#[cfg(windows)]
pub fn is_running_as_admin() -> Result<bool> {
    use windows::Win32::UI::Shell::IsUserAnAdmin;
    unsafe { Ok(IsUserAnAdmin().as_bool()) }
}

#[cfg(unix)]
pub fn is_running_as_admin() -> Result<bool> {
    Ok(unsafe { libc::geteuid() } == 0)
}

#[cfg(not(any(windows, unix)))]
pub fn is_running_as_admin() -> Result<bool> {
    Ok(false)
}
