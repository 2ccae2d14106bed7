//! 平台能力封装（服务管理、防火墙、提权检测、子进程执行）。
//!
//! 目标：
//! - 将服务管理器/防火墙等系统操作集中封装，上层编排只依赖 `smdr-core` 中的抽象
//! - 所有外部命令都以退出码判断成败，并施加有界等待，避免无限阻塞
//!
//! 安全注意：
//! - 服务注册/防火墙规则修改通常需要管理员权限
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

pub mod elevation;
pub mod firewall;
pub mod process;
pub mod service;
